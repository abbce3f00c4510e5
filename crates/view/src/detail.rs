//! Detail projection of a single record.
//!
//! Title and gallery are resolved once on construction. Property rows are
//! formatted on demand, and chapter rows only for the active chapter.

#![forbid(unsafe_code)]

use std::sync::Arc;

use serde_json::Value;
use tabula_core::{format_text, resolve, FieldConfig, Record, RetrieveConfig, NO_VALUE};
use tracing::debug;

use crate::model::{ChapterTab, DetailScreen, GalleryImage, ImagePreview, PropertyRow};

pub struct DetailRenderer<T> {
    config: Arc<RetrieveConfig>,
    record: Arc<T>,
    id: String,
    title: String,
    gallery: Vec<GalleryImage>,
    active: usize,
    preview: Option<ImagePreview>,
}

fn rows<R: Record + ?Sized>(record: &R, fields: &[FieldConfig]) -> Vec<PropertyRow> {
    fields.iter().map(|f| PropertyRow { label: f.label.clone(), value: f.render(record) }).collect()
}

impl<T: Record> DetailRenderer<T> {
    pub fn new(config: Arc<RetrieveConfig>, id: impl Into<String>, record: Arc<T>) -> Self {
        let title = format_text(resolve(&*record, Some(&config.title.value))).unwrap_or_else(|| NO_VALUE.to_string());
        let gallery = match &config.image {
            Some(g) => match resolve(&*record, Some(&g.value)) {
                Some(Value::Array(entries)) => entries
                    .iter()
                    .map(|e| GalleryImage {
                        src: format_text(resolve(e, Some(&g.src))),
                        name: format_text(resolve(e, Some(&g.name))),
                        caption: format_text(resolve(e, Some(&g.caption))),
                    })
                    .collect(),
                _ => Vec::new(),
            },
            None => Vec::new(),
        };
        Self { config, record, id: id.into(), title, gallery, active: 0, preview: None }
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn title(&self) -> &str { &self.title }
    pub fn gallery(&self) -> &[GalleryImage] { &self.gallery }
    pub fn record(&self) -> &Arc<T> { &self.record }

    pub fn edit_href(&self) -> Option<String> { self.config.edit_href(&self.id) }

    pub fn properties(&self) -> Vec<PropertyRow> { rows(&*self.record, &self.config.properties) }

    pub fn chapters(&self) -> Vec<ChapterTab> {
        self.config
            .chapters
            .iter()
            .enumerate()
            .map(|(i, c)| ChapterTab { title: c.title.clone(), active: i == self.active })
            .collect()
    }

    pub fn active_chapter(&self) -> Option<usize> { (self.active < self.config.chapters.len()).then_some(self.active) }

    /// Out-of-range indices leave the selection unchanged.
    pub fn select_chapter(&mut self, index: usize) {
        if index < self.config.chapters.len() {
            self.active = index;
        } else {
            debug!(index, chapters = self.config.chapters.len(), "detail: chapter out of range");
        }
    }

    /// Rows of the active chapter; empty when there are no chapters.
    pub fn chapter_rows(&self) -> Vec<PropertyRow> {
        self.config.chapters.get(self.active).map(|c| rows(&*self.record, &c.properties)).unwrap_or_default()
    }

    pub fn preview(&self) -> Option<&ImagePreview> { self.preview.as_ref() }

    /// Enlarge gallery entry `index`. Entries without an image source are ignored.
    pub fn open_preview(&mut self, index: usize) {
        let Some(img) = self.gallery.get(index) else { return };
        let Some(src) = img.src.clone() else { return };
        self.preview = Some(ImagePreview { index, src, name: img.name.clone(), caption: img.caption.clone() });
    }

    pub fn close_preview(&mut self) { self.preview = None; }

    /// Clicking the enlarged image dismisses it like the close button.
    pub fn click_preview_image(&mut self) { self.close_preview(); }

    pub fn screen(&self) -> DetailScreen {
        DetailScreen {
            id: self.id.clone(),
            title: self.title.clone(),
            edit_href: self.edit_href(),
            gallery: self.gallery.clone(),
            properties: self.properties(),
            chapters: self.chapters(),
            chapter_rows: self.chapter_rows(),
            preview: self.preview.clone(),
        }
    }
}
