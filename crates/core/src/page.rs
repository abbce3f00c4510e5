//! Paginated response shape returned by list endpoints.

#![forbid(unsafe_code)]

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire shape: `{ page_results, page_count, page_number?, page_size?, total_count? }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(rename = "page_results")]
    pub results: Vec<T>,
    pub page_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
}

impl<T> Page<T> {
    /// Everything on one page, as returned by unpaginated endpoints.
    pub fn single(results: Vec<T>) -> Self {
        let total = results.len() as u64;
        Self { results, page_count: 1, page_number: Some(1), page_size: None, total_count: Some(total) }
    }

    pub fn empty() -> Self { Self::single(Vec::new()) }

    /// Page count as displayed; never below one.
    pub fn pages(&self) -> u32 { self.page_count.max(1) }
    pub fn len(&self) -> usize { self.results.len() }
    pub fn is_empty(&self) -> bool { self.results.is_empty() }
}

impl<T: DeserializeOwned> Page<T> {
    /// Decode either the paginated object or a bare result array.
    pub fn from_value(v: Value) -> Result<Self, serde_json::Error> {
        match v {
            Value::Array(_) => Ok(Self::single(serde_json::from_value(v)?)),
            other => serde_json::from_value(other),
        }
    }
}
