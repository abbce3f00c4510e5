//! In-process backend over JSON fixtures.
//!
//! Filters follow the Django lookup convention the HTTP API uses:
//! `field`, `field__icontains`, `field__gt`, `nested__field__lte`, ...
//! `page_number` and `page_size` drive pagination.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::time::Instant;

use serde_json::Value;
use smallvec::SmallVec;
use tabula_core::{is_blank, Page, Params, Path, Record, PAGE_NUMBER, PAGE_SIZE};
use tracing::{debug, info};

use crate::{DataSource, SourceError, SourceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookup {
    Exact,
    IContains,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Lookup {
    fn from_suffix(s: &str) -> Option<Self> {
        Some(match s {
            "exact" => Lookup::Exact,
            "icontains" => Lookup::IContains,
            "gt" => Lookup::Gt,
            "gte" => Lookup::Gte,
            "lt" => Lookup::Lt,
            "lte" => Lookup::Lte,
            _ => return None,
        })
    }
}

/// One parsed filter parameter.
#[derive(Debug, Clone)]
struct Filter {
    path: Path,
    lookup: Lookup,
    want: Value,
}

impl Filter {
    fn parse(key: &str, want: &Value) -> Self {
        let mut segs: SmallVec<[&str; 4]> = key.split("__").collect();
        let lookup = match segs.last().and_then(|s| Lookup::from_suffix(s)) {
            Some(l) if segs.len() > 1 => {
                segs.pop();
                l
            }
            _ => Lookup::Exact,
        };
        Self { path: Path::new(segs), lookup, want: want.clone() }
    }

    fn matches(&self, record: &Value) -> bool {
        let Some(have) = record.lookup(&self.path) else { return false };
        match self.lookup {
            Lookup::Exact => loose_eq(have, &self.want),
            Lookup::IContains => text(have).to_lowercase().contains(&text(&self.want).to_lowercase()),
            Lookup::Gt => compare(have, &self.want) == Some(Ordering::Greater),
            Lookup::Gte => matches!(compare(have, &self.want), Some(Ordering::Greater | Ordering::Equal)),
            Lookup::Lt => compare(have, &self.want) == Some(Ordering::Less),
            Lookup::Lte => matches!(compare(have, &self.want), Some(Ordering::Less | Ordering::Equal)),
        }
    }
}

fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Query strings carry no types, so `"120"` equals `120` and `"true"` equals `true`.
fn loose_eq(have: &Value, want: &Value) -> bool {
    if let (Some(a), Some(b)) = (number(have), number(want)) {
        return a == b;
    }
    match (have, want) {
        (Value::Bool(a), Value::String(s)) | (Value::String(s), Value::Bool(a)) => {
            s.eq_ignore_ascii_case(if *a { "true" } else { "false" })
        }
        _ => text(have) == text(want),
    }
}

fn compare(have: &Value, want: &Value) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (number(have), number(want)) {
        return a.partial_cmp(&b);
    }
    match (have, want) {
        // ISO dates and other ordered strings
        (Value::String(a), Value::String(b)) => Some(a.as_str().cmp(b.as_str())),
        _ => None,
    }
}

fn param_u32(params: &Params, key: &str) -> Option<u32> {
    match params.get(key)? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Fixture-backed [`DataSource`] keyed by list URL.
pub struct MemorySource {
    resources: HashMap<String, Vec<Value>>,
    id_field: String,
    default_page_size: u32,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl MemorySource {
    pub fn new(id_field: impl Into<String>, default_page_size: u32) -> Self {
        Self {
            resources: HashMap::new(),
            id_field: id_field.into(),
            default_page_size: default_page_size.max(1),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_resource(mut self, list_url: impl Into<String>, records: Vec<Value>) -> Self {
        self.resources.insert(list_url.into(), records);
        self
    }

    /// Build from `{ "<list url>": [records...] }`.
    pub fn from_fixture(fixture: Value, id_field: impl Into<String>, default_page_size: u32) -> SourceResult<Self> {
        let Value::Object(map) = fixture else {
            return Err(SourceError::Decode("fixture must be an object keyed by list url".into()));
        };
        let mut src = Self::new(id_field, default_page_size);
        for (url, records) in map {
            match records {
                Value::Array(items) => { src.resources.insert(url, items); }
                _ => return Err(SourceError::Decode(format!("fixture {url}: expected an array"))),
            }
        }
        Ok(src)
    }

    /// Make every subsequent call fail with a 503.
    pub fn set_failing(&self, on: bool) { self.failing.store(on, AtomicOrdering::SeqCst); }

    /// Number of `list`/`retrieve` calls served so far.
    pub fn calls(&self) -> usize { self.calls.load(AtomicOrdering::SeqCst) }

    fn enter(&self) -> SourceResult<()> {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
        if self.failing.load(AtomicOrdering::SeqCst) {
            return Err(SourceError::Status { code: 503, message: "source unavailable".into() });
        }
        Ok(())
    }

    fn records(&self, resource: &str) -> SourceResult<&[Value]> {
        self.resources
            .get(resource)
            .map(Vec::as_slice)
            .ok_or_else(|| SourceError::NotFound(format!("no resource {resource}")))
    }

    fn id_of<'a>(&self, record: &'a Value) -> Option<&'a Value> { record.get(&self.id_field) }
}

#[async_trait::async_trait]
impl DataSource for MemorySource {
    type Item = Value;

    async fn list(&self, resource: &str, params: &Params) -> SourceResult<Page<Value>> {
        let t0 = Instant::now();
        self.enter()?;
        let all = self.records(resource)?;
        let filters: Vec<Filter> = params
            .iter()
            .filter(|(k, v)| k.as_str() != PAGE_NUMBER && k.as_str() != PAGE_SIZE && !is_blank(v))
            .map(|(k, v)| Filter::parse(k, v))
            .collect();
        let hits: Vec<&Value> = all.iter().filter(|r| filters.iter().all(|f| f.matches(r))).collect();

        let size = param_u32(params, PAGE_SIZE).filter(|n| *n > 0).unwrap_or(self.default_page_size);
        let number = param_u32(params, PAGE_NUMBER).unwrap_or(1).max(1);
        let total = hits.len();
        let page_count = total.div_ceil(size as usize).max(1) as u32;
        if number > page_count {
            return Err(SourceError::Status { code: 404, message: format!("invalid page {number}") });
        }
        let start = (number as usize - 1) * size as usize;
        let results: Vec<Value> = hits.into_iter().skip(start).take(size as usize).cloned().collect();
        debug!(resource, filters = filters.len(), "memory: list filtered");
        info!(resource, total, page = number, page_count, took_ms = %t0.elapsed().as_millis(), "memory: list ok");
        Ok(Page {
            results,
            page_count,
            page_number: Some(number),
            page_size: Some(size),
            total_count: Some(total as u64),
        })
    }

    async fn retrieve(&self, resource: &str) -> SourceResult<Value> {
        self.enter()?;
        let trimmed = resource.trim_end_matches('/');
        let (base, id) = trimmed
            .rsplit_once('/')
            .ok_or_else(|| SourceError::NotFound(format!("no record at {resource}")))?;
        let list_url = format!("{base}/");
        let found = self
            .records(&list_url)?
            .iter()
            .find(|r| self.id_of(r).map(|v| text(v) == id).unwrap_or(false))
            .cloned();
        info!(resource, found = found.is_some(), "memory: retrieve");
        found.ok_or_else(|| SourceError::NotFound(format!("no record at {resource}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tracks() -> MemorySource {
        MemorySource::new("pk", 2).with_resource(
            "/api/tracks/",
            vec![
                json!({"pk": 1, "name": "Ridge Loop", "category": {"value": 120, "label": "Hike"}, "total_distance": 8000, "date": "2024-05-01", "public": true}),
                json!({"pk": 2, "name": "Lake Run", "category": {"value": 110, "label": "Running"}, "total_distance": 12000, "date": "2024-06-10", "public": false}),
                json!({"pk": 3, "name": "North Ridge", "category": {"value": 120, "label": "Hike"}, "total_distance": 15000, "date": "2024-07-04", "public": true}),
            ],
        )
    }

    fn params(v: Value) -> Params { v.as_object().cloned().unwrap_or_default() }

    #[tokio::test]
    async fn icontains_and_ranges_filter() {
        let src = tracks();
        let p = src.list("/api/tracks/", &params(json!({"name__icontains": "ridge"}))).await.unwrap();
        assert_eq!(p.total_count, Some(2));
        let p = src
            .list("/api/tracks/", &params(json!({"total_distance__gt": 9000, "total_distance__lt": "16000"})))
            .await
            .unwrap();
        let ids: Vec<_> = p.results.iter().map(|r| r["pk"].clone()).collect();
        assert_eq!(ids, vec![json!(2), json!(3)]);
        let p = src.list("/api/tracks/", &params(json!({"date__gte": "2024-06-10"}))).await.unwrap();
        assert_eq!(p.total_count, Some(2));
    }

    #[tokio::test]
    async fn exact_matches_nested_and_loose_types() {
        let src = tracks();
        let p = src.list("/api/tracks/", &params(json!({"category__value": "120"}))).await.unwrap();
        assert_eq!(p.total_count, Some(2));
        let p = src.list("/api/tracks/", &params(json!({"public": "false"}))).await.unwrap();
        assert_eq!(p.results[0]["pk"], json!(2));
        let p = src.list("/api/tracks/", &params(json!({"name": "", "category__label": null}))).await.unwrap();
        assert_eq!(p.total_count, Some(3));
    }

    #[tokio::test]
    async fn paginates_with_default_and_explicit_size() {
        let src = tracks();
        let p = src.list("/api/tracks/", &Params::new()).await.unwrap();
        assert_eq!((p.len(), p.page_count), (2, 2));
        let p = src.list("/api/tracks/", &params(json!({"page_number": 2}))).await.unwrap();
        assert_eq!(p.results[0]["pk"], json!(3));
        let p = src.list("/api/tracks/", &params(json!({"page_size": 10}))).await.unwrap();
        assert_eq!((p.len(), p.page_count), (3, 1));
        let err = src.list("/api/tracks/", &params(json!({"page_number": 5}))).await.unwrap_err();
        assert!(matches!(err, SourceError::Status { code: 404, .. }));
    }

    #[tokio::test]
    async fn empty_result_is_one_empty_page() {
        let src = tracks();
        let p = src.list("/api/tracks/", &params(json!({"name__icontains": "glacier"}))).await.unwrap();
        assert!(p.is_empty());
        assert_eq!(p.page_count, 1);
    }

    #[tokio::test]
    async fn retrieve_by_trailing_id() {
        let src = tracks();
        let r = src.retrieve("/api/tracks/3/").await.unwrap();
        assert_eq!(r["name"], json!("North Ridge"));
        assert!(matches!(src.retrieve("/api/tracks/9/").await, Err(SourceError::NotFound(_))));
        assert!(matches!(src.retrieve("/api/unknown/1/").await, Err(SourceError::NotFound(_))));
    }

    #[tokio::test]
    async fn failing_source_reports_status_and_counts_calls() {
        let src = tracks();
        src.set_failing(true);
        assert!(matches!(src.list("/api/tracks/", &Params::new()).await, Err(SourceError::Status { code: 503, .. })));
        src.set_failing(false);
        assert!(src.list("/api/tracks/", &Params::new()).await.is_ok());
        assert_eq!(src.calls(), 2);
    }

    #[test]
    fn fixture_must_be_keyed_arrays() {
        assert!(MemorySource::from_fixture(json!({"/api/tracks/": []}), "pk", 10).is_ok());
        assert!(MemorySource::from_fixture(json!([1, 2]), "pk", 10).is_err());
        assert!(MemorySource::from_fixture(json!({"/api/tracks/": {}}), "pk", 10).is_err());
    }
}
