//! Tabula core types: field paths, value formatting, query params and the
//! author-supplied view configuration.
//!
//! Everything here is pure data plus pure functions. Records are opaque
//! `serde_json` trees reached only through [`Path`] resolution.

#![forbid(unsafe_code)]

pub mod config;
pub mod format;
pub mod page;
pub mod params;
pub mod path;

pub use config::{
    ApiConfig, BaseModelData, CardViewConfig, ChapterConfig, ConfigError, FieldConfig,
    GalleryConfig, LeftBar, ListPageContent, ListViewConfig, ModelListConfig, RangeKeys, RangeUi,
    RetrieveConfig, RoutesConfig, SearchItemConfig, SearchItemKind, SearchSection, SelectOption,
    SliderMark, TableViewConfig, TitleConfig,
};
pub use format::{format_text, format_value, TransformOp, ValueFormat, ValueTransform, NO_VALUE};
pub use page::Page;
pub use params::{compact, is_blank, serialize, Params, QueryKey, PAGE_NUMBER, PAGE_SIZE};
pub use path::{resolve, Path, PathError, Record};

pub mod prelude {
    pub use super::{
        compact, format_value, resolve, serialize, FieldConfig, Page, Params, Path, QueryKey,
        Record, ValueFormat, NO_VALUE,
    };
}
