//! Query parameter normalization and cache keys.

#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Insertion-ordered parameter set.
pub type Params = Map<String, Value>;

pub const PAGE_NUMBER: &str = "page_number";
pub const PAGE_SIZE: &str = "page_size";

/// Null values and blank strings carry no filter.
pub fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Drop every entry whose value is null or a blank string. Order is preserved.
pub fn compact(params: &Params) -> Params {
    params
        .iter()
        .filter(|(_, v)| !is_blank(v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Canonical encoding: JSON with object keys sorted at every depth.
pub fn serialize(params: &Params) -> String {
    let mut out = String::with_capacity(params.len() * 16);
    write_map(params, &mut out);
    out
}

fn write_map(map: &Map<String, Value>, out: &mut String) {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    out.push('{');
    for (i, k) in keys.into_iter().enumerate() {
        if i > 0 { out.push(','); }
        write_json(&Value::String(k.clone()), out);
        out.push(':');
        write_value(&map[k.as_str()], out);
    }
    out.push('}');
}

fn write_value(v: &Value, out: &mut String) {
    match v {
        Value::Object(map) => write_map(map, out),
        Value::Array(items) => {
            out.push('[');
            for (i, it) in items.iter().enumerate() {
                if i > 0 { out.push(','); }
                write_value(it, out);
            }
            out.push(']');
        }
        scalar => write_json(scalar, out),
    }
}

fn write_json(v: &Value, out: &mut String) {
    // scalars always serialize
    out.push_str(&serde_json::to_string(v).unwrap_or_default());
}

/// Identity of one list fetch: target resource, page and canonical params.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryKey {
    pub resource: String,
    pub page: u32,
    pub params: String,
}

impl QueryKey {
    pub fn new(resource: impl Into<String>, page: u32, params: &Params) -> Self {
        Self { resource: resource.into(), page, params: serialize(params) }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}{}", self.resource, self.page, self.params)
    }
}
