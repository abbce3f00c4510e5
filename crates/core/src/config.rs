//! Author-supplied view configuration.
//!
//! Key names follow the JSON the page authors write (`cardTitle`,
//! `itemType`, `SearchBar`, ...). Unknown keys are ignored, so configuration
//! written for richer front ends (icons, widths) loads unchanged.

#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::{smallvec, SmallVec};

use crate::format::ValueFormat;
use crate::path::{resolve, Path, PathError, Record};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Path(#[from] PathError),
}

// ---------------- Fields ----------------

/// One scalar extracted from a record and decorated for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default)]
    pub label: String,
    #[serde(alias = "value")]
    pub path: Path,
    #[serde(flatten)]
    pub format: ValueFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Relative column width (table view only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flex: Option<f32>,
}

impl FieldConfig {
    pub fn new(label: impl Into<String>, path: impl Into<Path>) -> Self {
        Self { key: None, label: label.into(), path: path.into(), format: ValueFormat::default(), color: None, flex: None }
    }

    /// Build from a dotted path string.
    pub fn at(label: impl Into<String>, dotted: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(label, Path::parse(dotted)?))
    }

    pub fn with_format(mut self, format: ValueFormat) -> Self { self.format = format; self }
    pub fn with_color(mut self, color: impl Into<String>) -> Self { self.color = Some(color.into()); self }

    /// Resolve and format this field against one record.
    pub fn render<R: Record + ?Sized>(&self, record: &R) -> String {
        self.format.format(resolve(record, Some(&self.path)))
    }
}

// ---------------- List view ----------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardViewConfig {
    pub card_title: Path,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_image: Option<Path>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_description: Option<Path>,
    #[serde(default)]
    pub card_properties: Vec<FieldConfig>,
    #[serde(default)]
    pub card_sub_properties: Vec<FieldConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableViewConfig {
    #[serde(default)]
    pub table_columns: Vec<FieldConfig>,
}

/// Card and table projections of the same list (the page's right bar).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListViewConfig {
    pub card_view: CardViewConfig,
    #[serde(default)]
    pub table_view: TableViewConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeftBar {
    #[serde(rename = "SearchBar", default)]
    pub search_bar: Vec<SearchSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPageContent {
    pub list_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_description: Option<String>,
    #[serde(default)]
    pub left_bar: LeftBar,
    pub right_bar: ListViewConfig,
}

/// Identity and navigation data for one model type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseModelData {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub plural: String,
    /// Navigation base; the record id is appended.
    pub href: String,
    /// Name of the identity field on each record.
    pub id: String,
}

impl BaseModelData {
    pub fn id_path(&self) -> Path { Path::new([self.id.as_str()]) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    pub list_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelListConfig {
    pub base_model_data: BaseModelData,
    pub list_page_content: ListPageContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<ApiConfig>,
}

impl ModelListConfig {
    pub fn from_json(s: &str) -> Result<Self, ConfigError> { Ok(serde_json::from_str(s)?) }

    pub fn sections(&self) -> &[SearchSection] { &self.list_page_content.left_bar.search_bar }
    pub fn views(&self) -> &ListViewConfig { &self.list_page_content.right_bar }
}

// ---------------- Search items ----------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSection {
    pub section_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_description: Option<String>,
    #[serde(default)]
    pub section_items: Vec<SearchItemConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: Value,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliderMark {
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Lower/upper parameter keys of a range filter, e.g. `total_distance__gt` / `total_distance__lt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct RangeKeys {
    pub lower: String,
    pub upper: String,
}

impl From<(String, String)> for RangeKeys {
    fn from((lower, upper): (String, String)) -> Self { Self { lower, upper } }
}

impl From<RangeKeys> for (String, String) {
    fn from(k: RangeKeys) -> Self { (k.lower, k.upper) }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeUi {
    #[default]
    Slider,
    Inputs,
}

/// One filter control. Closed set; every consumer matches exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "itemType", rename_all = "lowercase")]
pub enum SearchItemConfig {
    #[serde(rename_all = "camelCase")]
    Text {
        item_label: String,
        item_value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item_description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item_placeholder: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Integer {
        item_label: String,
        item_value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item_description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item_placeholder: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
    },
    #[serde(rename_all = "camelCase")]
    Date {
        item_label: String,
        item_value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item_description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item_placeholder: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Boolean {
        item_label: String,
        item_value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item_description: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Select {
        item_label: String,
        item_value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item_description: Option<String>,
        #[serde(default)]
        options: Vec<SelectOption>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        placeholder: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Range {
        item_label: String,
        item_value: RangeKeys,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item_description: Option<String>,
        #[serde(default, alias = "itemUi")]
        ui: RangeUi,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        slider_min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        slider_max: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        slider_step: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        slider_default: Option<(f64, f64)>,
        #[serde(default)]
        slider_marks: Vec<SliderMark>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input_min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input_max: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input_step: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input_placeholders: Option<(String, String)>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchItemKind {
    Text,
    Integer,
    Date,
    Boolean,
    Select,
    Range,
}

impl fmt::Display for SearchItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SearchItemKind::Text => "text",
            SearchItemKind::Integer => "integer",
            SearchItemKind::Date => "date",
            SearchItemKind::Boolean => "boolean",
            SearchItemKind::Select => "select",
            SearchItemKind::Range => "range",
        };
        f.write_str(s)
    }
}

impl SearchItemConfig {
    pub fn kind(&self) -> SearchItemKind {
        match self {
            SearchItemConfig::Text { .. } => SearchItemKind::Text,
            SearchItemConfig::Integer { .. } => SearchItemKind::Integer,
            SearchItemConfig::Date { .. } => SearchItemKind::Date,
            SearchItemConfig::Boolean { .. } => SearchItemKind::Boolean,
            SearchItemConfig::Select { .. } => SearchItemKind::Select,
            SearchItemConfig::Range { .. } => SearchItemKind::Range,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            SearchItemConfig::Text { item_label, .. }
            | SearchItemConfig::Integer { item_label, .. }
            | SearchItemConfig::Date { item_label, .. }
            | SearchItemConfig::Boolean { item_label, .. }
            | SearchItemConfig::Select { item_label, .. }
            | SearchItemConfig::Range { item_label, .. } => item_label,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            SearchItemConfig::Text { item_description, .. }
            | SearchItemConfig::Integer { item_description, .. }
            | SearchItemConfig::Date { item_description, .. }
            | SearchItemConfig::Boolean { item_description, .. }
            | SearchItemConfig::Select { item_description, .. }
            | SearchItemConfig::Range { item_description, .. } => item_description.as_deref(),
        }
    }

    /// Backend parameter keys this item writes: one, or two for ranges.
    pub fn param_keys(&self) -> SmallVec<[&str; 2]> {
        match self {
            SearchItemConfig::Text { item_value, .. }
            | SearchItemConfig::Integer { item_value, .. }
            | SearchItemConfig::Date { item_value, .. }
            | SearchItemConfig::Boolean { item_value, .. }
            | SearchItemConfig::Select { item_value, .. } => smallvec![item_value.as_str()],
            SearchItemConfig::Range { item_value, .. } => {
                smallvec![item_value.lower.as_str(), item_value.upper.as_str()]
            }
        }
    }
}

// ---------------- Detail view ----------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub value: Path,
}

fn default_src() -> Path { Path::from(["photo", "path"]) }
fn default_name() -> Path { Path::from(["photo", "name"]) }
fn default_caption() -> Path { Path::from(["photo", "snippet"]) }

/// Image collection on a record; each entry is itself resolved with the sub-paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub value: Path,
    #[serde(default = "default_src")]
    pub src: Path,
    #[serde(default = "default_name")]
    pub name: Path,
    #[serde(default = "default_caption")]
    pub caption: Path,
}

impl GalleryConfig {
    pub fn at(value: impl Into<Path>) -> Self {
        Self { key: None, label: None, value: value.into(), src: default_src(), name: default_name(), caption: default_caption() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterConfig {
    pub title: String,
    #[serde(default)]
    pub properties: Vec<FieldConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrieveConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub routes: RoutesConfig,
    pub title: TitleConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<GalleryConfig>,
    #[serde(default)]
    pub properties: Vec<FieldConfig>,
    #[serde(default)]
    pub chapters: Vec<ChapterConfig>,
}

impl RetrieveConfig {
    pub fn from_json(s: &str) -> Result<Self, ConfigError> { Ok(serde_json::from_str(s)?) }

    /// Resource path of one record: `<listUrl><id>/`.
    pub fn retrieve_path(&self, id: &str) -> String { format!("{}{}/", self.api.list_url, id) }

    pub fn edit_href(&self, id: &str) -> Option<String> {
        self.routes.edit.as_ref().map(|base| format!("{}/{}/edit", base, id))
    }
}
