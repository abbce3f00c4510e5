//! Card and table projections of one page of records.

#![forbid(unsafe_code)]

use serde_json::Value;
use tabula_core::{format_text, resolve, BaseModelData, CardViewConfig, FieldConfig, Path, Record, TableViewConfig, NO_VALUE};

use crate::model::{Badge, CardItem, DescriptionPreview, TableHeader, TableRow, TableView, DEFAULT_BADGE_COLOR};

const DEFAULT_FLEX: f32 = 1.0;

fn id_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Record id as text plus its navigation target.
fn link<R: Record + ?Sized>(record: &R, base: &BaseModelData, id_path: &Path) -> (Option<String>, String) {
    let id = resolve(record, Some(id_path)).map(id_text);
    let href = format!("{}{}", base.href, id.as_deref().unwrap_or_default());
    (id, href)
}

fn badges<R: Record + ?Sized>(record: &R, fields: &[FieldConfig]) -> Vec<Badge> {
    fields
        .iter()
        .map(|f| Badge {
            label: f.label.clone(),
            value: f.render(record),
            color: f.color.clone().unwrap_or_else(|| DEFAULT_BADGE_COLOR.to_string()),
        })
        .collect()
}

/// Present text at `path`, or `None` when absent or empty.
fn optional_text<R: Record + ?Sized>(record: &R, path: Option<&Path>) -> Option<String> {
    format_text(resolve(record, path))
}

pub fn render_cards<R: Record>(items: &[R], base: &BaseModelData, view: &CardViewConfig, description_limit: usize) -> Vec<CardItem> {
    let id_path = base.id_path();
    items
        .iter()
        .map(|item| {
            let (id, href) = link(item, base, &id_path);
            CardItem {
                id,
                href,
                title: format_text(resolve(item, Some(&view.card_title))).unwrap_or_else(|| NO_VALUE.to_string()),
                image: optional_text(item, view.card_image.as_ref()),
                description: optional_text(item, view.card_description.as_ref())
                    .map(|d| DescriptionPreview::new(d, description_limit)),
                properties: badges(item, &view.card_properties),
                sub_properties: badges(item, &view.card_sub_properties),
            }
        })
        .collect()
}

pub fn render_table<R: Record>(items: &[R], base: &BaseModelData, view: &TableViewConfig) -> TableView {
    let id_path = base.id_path();
    let headers = view
        .table_columns
        .iter()
        .map(|c| {
            let flex = c.flex.unwrap_or(DEFAULT_FLEX);
            TableHeader { label: c.label.clone(), flex, width_pct: flex * 10.0 }
        })
        .collect();
    let rows = items
        .iter()
        .map(|item| {
            let (id, href) = link(item, base, &id_path);
            TableRow { id, href, cells: view.table_columns.iter().map(|c| c.render(item)).collect() }
        })
        .collect();
    TableView { headers, rows }
}
