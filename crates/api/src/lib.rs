//! Tabula data-source façade.
//!
//! Views never talk to a transport directly: they are handed a [`DataSource`]
//! and consume pages through it. This crate defines that contract, its error
//! taxonomy, the runtime [`Settings`], and [`MemorySource`], an in-process
//! backend that follows the same query conventions as the HTTP API.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use tabula_core::{Page, Params, Record};

mod memory;

pub use memory::MemorySource;

/// Errors surfaced by a data source. Carried as data into view state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum SourceError {
    #[error("transport: {0}")]
    Transport(String),
    #[error("status {code}: {message}")]
    Status { code: u16, message: String },
    #[error("decode: {0}")]
    Decode(String),
    #[error("not_found: {0}")]
    NotFound(String),
}

impl From<serde_json::Error> for SourceError {
    fn from(e: serde_json::Error) -> Self { SourceError::Decode(e.to_string()) }
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Asynchronous provider of list pages and single records.
#[async_trait::async_trait]
pub trait DataSource: Send + Sync + 'static {
    /// Record type handed to renderers.
    type Item: Record + Serialize + Clone + 'static;

    /// Fetch one page of `resource` (a list URL such as `/api/tracks/`) filtered by `params`.
    async fn list(&self, resource: &str, params: &Params) -> SourceResult<Page<Self::Item>>;

    /// Fetch a single record by its full path (`/api/tracks/7/`).
    async fn retrieve(&self, resource: &str) -> SourceResult<Self::Item>;
}

#[async_trait::async_trait]
impl<S: DataSource> DataSource for std::sync::Arc<S> {
    type Item = S::Item;

    async fn list(&self, resource: &str, params: &Params) -> SourceResult<Page<Self::Item>> {
        (**self).list(resource, params).await
    }

    async fn retrieve(&self, resource: &str) -> SourceResult<Self::Item> { (**self).retrieve(resource).await }
}

// ----------------- Runtime settings -----------------

/// Runtime knobs, read from `TABULA_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Completed pages kept in the page cache.
    pub cache_cap: usize,
    /// Page size assumed by backends when the query carries none.
    pub page_size: u32,
    /// Characters of a card description shown before "show more".
    pub description_preview: usize,
}

impl Default for Settings {
    fn default() -> Self { Self { cache_cap: 64, page_size: 10, description_preview: 160 } }
}

impl Settings {
    pub fn from_env() -> Self {
        let d = Self::default();
        let cache_cap = env_parse("TABULA_CACHE_CAP").filter(|n: &usize| *n > 0).unwrap_or(d.cache_cap);
        let page_size = env_parse("TABULA_PAGE_SIZE").filter(|n: &u32| *n > 0).unwrap_or(d.page_size);
        let description_preview = env_parse("TABULA_DESCRIPTION_PREVIEW").unwrap_or(d.description_preview);
        Self { cache_cap, page_size, description_preview }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_env_is_unset() {
        let s = Settings::default();
        assert_eq!(s.cache_cap, 64);
        assert_eq!(s.page_size, 10);
        assert_eq!(s.description_preview, 160);
    }

    #[test]
    fn source_errors_render_and_serialize() {
        let e = SourceError::Status { code: 503, message: "unavailable".into() };
        assert_eq!(e.to_string(), "status 503: unavailable");
        let v = serde_json::to_value(&e).unwrap();
        let back: SourceError = serde_json::from_value(v).unwrap();
        assert_eq!(back, e);
        let decode: SourceError = serde_json::from_str::<u32>("x").unwrap_err().into();
        assert!(matches!(decode, SourceError::Decode(_)));
    }
}
