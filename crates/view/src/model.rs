//! Display model: plain, serializable structs a GUI, TUI or web layer draws.

#![forbid(unsafe_code)]

use serde::Serialize;
use tabula_query::{ControlValue, ViewMode};

pub const DEFAULT_BADGE_COLOR: &str = "blue";
pub const EMPTY_MESSAGE: &str = "No items found for the selected filters.";
pub const FAILED_TITLE: &str = "Failed to load data";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Badge {
    pub label: String,
    pub value: String,
    pub color: String,
}

/// Collapsible description: `preview` is shown until the reader expands it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptionPreview {
    pub full: String,
    pub preview: String,
    pub truncated: bool,
}

impl DescriptionPreview {
    /// Bound `text` to `limit` characters.
    pub fn new(text: impl Into<String>, limit: usize) -> Self {
        let full = text.into();
        let truncated = full.chars().count() > limit;
        let preview = if truncated { full.chars().take(limit).collect::<String>().trim_end().to_string() } else { full.clone() };
        Self { full, preview, truncated }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardItem {
    pub id: Option<String>,
    pub href: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<DescriptionPreview>,
    pub properties: Vec<Badge>,
    pub sub_properties: Vec<Badge>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableHeader {
    pub label: String,
    pub flex: f32,
    /// Relative width in percent (`flex * 10`).
    pub width_pct: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub id: Option<String>,
    pub href: String,
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableView {
    pub headers: Vec<TableHeader>,
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", content = "items", rename_all = "lowercase")]
pub enum ListBody {
    Cards(Vec<CardItem>),
    Table(TableView),
}

impl ListBody {
    pub fn len(&self) -> usize {
        match self {
            ListBody::Cards(c) => c.len(),
            ListBody::Table(t) => t.rows.len(),
        }
    }
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// Display state tag of the list area.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ListPhase {
    Loading { placeholder: bool },
    Failed { title: String, message: String },
    Empty { message: String },
    Ready,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchControl {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub control: ControlValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchSectionView {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub open: bool,
    pub controls: Vec<SearchControl>,
}

/// Everything a list page shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListScreen {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub view_mode: ViewMode,
    pub page: u32,
    pub page_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    pub phase: ListPhase,
    /// Rows for `Ready`, or the retained placeholder while loading.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<ListBody>,
    pub search: Vec<SearchSectionView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyRow {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GalleryImage {
    pub src: Option<String>,
    pub name: Option<String>,
    pub caption: Option<String>,
}

/// Enlarged image shown over the detail page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImagePreview {
    pub index: usize,
    pub src: String,
    pub name: Option<String>,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChapterTab {
    pub title: String,
    pub active: bool,
}

/// Everything a detail page shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailScreen {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edit_href: Option<String>,
    pub gallery: Vec<GalleryImage>,
    pub properties: Vec<PropertyRow>,
    pub chapters: Vec<ChapterTab>,
    /// Rows of the active chapter only.
    pub chapter_rows: Vec<PropertyRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<ImagePreview>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_preview_bounds_by_chars() {
        let d = DescriptionPreview::new("Grat über den Gipfel", 10);
        assert!(d.truncated);
        assert_eq!(d.preview, "Grat über");
        let short = DescriptionPreview::new("Loop", 10);
        assert!(!short.truncated);
        assert_eq!(short.preview, "Loop");
    }
}
