//! List query state machine.
//!
//! Draft parameters follow user input; applied parameters change only on
//! [`ListQueryController::search`] and [`ListQueryController::reset`]. The
//! effective query and its cache key are derived, never stored.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tabula_core::{compact, serialize, Params, QueryKey, PAGE_NUMBER, PAGE_SIZE};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Cards,
    Table,
}

/// Page sizes offered by the table view; `None` leaves the backend default.
pub const PAGE_SIZE_CHOICES: [Option<u32>; 6] = [None, Some(10), Some(20), Some(30), Some(40), Some(50)];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryState {
    pub draft: Params,
    pub applied: Params,
    pub page: u32,
    pub page_size: Option<u32>,
    pub view_mode: ViewMode,
}

impl Default for QueryState {
    fn default() -> Self {
        Self { draft: Params::new(), applied: Params::new(), page: 1, page_size: None, view_mode: ViewMode::Cards }
    }
}

pub struct ListQueryController {
    resource: String,
    state: QueryState,
    revision: u64,
    last_key: QueryKey,
}

impl ListQueryController {
    pub fn new(resource: impl Into<String>) -> Self {
        let resource = resource.into();
        let state = QueryState::default();
        let last_key = key_for(&resource, &state);
        Self { resource, state, revision: 0, last_key }
    }

    pub fn resource(&self) -> &str { &self.resource }
    pub fn state(&self) -> &QueryState { &self.state }
    pub fn draft(&self) -> &Params { &self.state.draft }
    pub fn applied(&self) -> &Params { &self.state.applied }
    pub fn page(&self) -> u32 { self.state.page }
    pub fn page_size(&self) -> Option<u32> { self.state.page_size }
    pub fn view_mode(&self) -> ViewMode { self.state.view_mode }

    /// Bumped whenever the effective query changes.
    pub fn revision(&self) -> u64 { self.revision }

    /// Edit one draft value. The fetched data is unaffected until [`Self::search`].
    pub fn update_param(&mut self, key: impl Into<String>, value: Value) {
        self.state.draft.insert(key.into(), value);
    }

    /// Edit both bounds of a range filter in one step.
    pub fn set_range(&mut self, lower_key: &str, upper_key: &str, (lo, hi): (f64, f64)) {
        self.update_param(lower_key, number(lo));
        self.update_param(upper_key, number(hi));
    }

    pub fn search(&mut self) {
        self.state.applied = compact(&self.state.draft);
        self.state.page = 1;
        info!(resource = %self.resource, filters = self.state.applied.len(), "query: search applied");
        self.settle();
    }

    pub fn reset(&mut self) {
        self.state.draft.clear();
        self.state.applied.clear();
        self.state.page = 1;
        info!(resource = %self.resource, "query: reset");
        self.settle();
    }

    /// Navigate to `page`; values below one clamp to one.
    pub fn set_page(&mut self, page: u32) {
        self.state.page = page.max(1);
        debug!(page = self.state.page, "query: page");
        self.settle();
    }

    /// Only honored in table view. Resets to the first page.
    pub fn set_page_size(&mut self, size: Option<u32>) {
        if self.state.view_mode != ViewMode::Table {
            debug!(?size, "query: page size ignored outside table view");
            return;
        }
        self.state.page_size = size.filter(|n| *n > 0);
        self.state.page = 1;
        self.settle();
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        if self.state.view_mode == mode {
            return;
        }
        self.state.view_mode = mode;
        self.state.page = 1;
        debug!(?mode, "query: view mode");
        self.settle();
    }

    /// Applied filters plus pagination, compacted.
    pub fn effective_query(&self) -> Params { effective(&self.state) }

    pub fn query_key(&self) -> QueryKey { key_for(&self.resource, &self.state) }

    fn settle(&mut self) {
        let key = self.query_key();
        if key != self.last_key {
            self.revision += 1;
            debug!(revision = self.revision, key = %key, "query: effective query changed");
            self.last_key = key;
        }
    }
}

fn effective(state: &QueryState) -> Params {
    let mut p = state.applied.clone();
    p.insert(PAGE_NUMBER.to_string(), Value::from(state.page));
    if let (ViewMode::Table, Some(size)) = (state.view_mode, state.page_size) {
        p.insert(PAGE_SIZE.to_string(), Value::from(size));
    }
    compact(&p)
}

fn key_for(resource: &str, state: &QueryState) -> QueryKey {
    let params = effective(state);
    QueryKey { resource: resource.to_string(), page: state.page, params: serialize(&params) }
}

/// Integral floats become JSON integers so `20000.0` and `20000` share a key.
pub(crate) fn number(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctl() -> ListQueryController { ListQueryController::new("/api/tracks/") }

    #[test]
    fn search_compacts_draft_and_resets_page() {
        let mut c = ctl();
        c.set_page(4);
        c.update_param("name__icontains", json!("ridge"));
        c.update_param("category", json!(""));
        c.search();
        assert_eq!(Value::Object(c.applied().clone()), json!({"name__icontains": "ridge"}));
        assert_eq!(c.page(), 1);
    }

    #[test]
    fn draft_edits_do_not_touch_effective_query() {
        let mut c = ctl();
        let before = c.query_key();
        let rev = c.revision();
        c.update_param("name__icontains", json!("lake"));
        c.set_range("total_distance__gt", "total_distance__lt", (0.0, 20000.0));
        assert_eq!(c.query_key(), before);
        assert_eq!(c.revision(), rev);
        assert_eq!(c.draft()["total_distance__lt"], json!(20000));
    }

    #[test]
    fn paging_keeps_applied_filters() {
        let mut c = ctl();
        c.update_param("category", json!("Hike"));
        c.search();
        c.set_page(2);
        assert_eq!(Value::Object(c.applied().clone()), json!({"category": "Hike"}));
        assert_eq!(c.query_key().params, r#"{"category":"Hike","page_number":2}"#);
        c.set_page(0);
        assert_eq!(c.page(), 1);
    }

    #[test]
    fn reset_clears_filters_and_page() {
        let mut c = ctl();
        c.update_param("category", json!("Hike"));
        c.search();
        c.set_page(3);
        c.update_param("name__icontains", json!("x"));
        c.reset();
        assert!(c.draft().is_empty());
        assert!(c.applied().is_empty());
        assert_eq!(c.page(), 1);
        assert_eq!(Value::Object(c.effective_query()), json!({"page_number": 1}));
    }

    #[test]
    fn page_size_applies_only_in_table_view() {
        let mut c = ctl();
        c.set_page_size(Some(20));
        assert_eq!(c.page_size(), None);
        c.set_view_mode(ViewMode::Table);
        c.set_page(3);
        c.set_page_size(Some(20));
        assert_eq!(c.page(), 1);
        assert_eq!(Value::Object(c.effective_query()), json!({"page_number": 1, "page_size": 20}));
        c.set_view_mode(ViewMode::Cards);
        assert_eq!(Value::Object(c.effective_query()), json!({"page_number": 1}));
    }

    #[test]
    fn switching_view_resets_page_only_on_change() {
        let mut c = ctl();
        c.set_page(3);
        c.set_view_mode(ViewMode::Cards);
        assert_eq!(c.page(), 3);
        c.set_view_mode(ViewMode::Table);
        assert_eq!(c.page(), 1);
    }

    #[test]
    fn revision_tracks_effective_changes() {
        let mut c = ctl();
        c.set_page(2);
        assert_eq!(c.revision(), 1);
        c.set_page(2);
        assert_eq!(c.revision(), 1);
        c.search();
        assert_eq!(c.revision(), 2);
        c.search();
        assert_eq!(c.revision(), 2);
    }

    #[test]
    fn permuted_filters_share_a_key() {
        let mut a = ctl();
        a.update_param("a", json!(1));
        a.update_param("b", json!(2));
        a.search();
        let mut b = ctl();
        b.update_param("b", json!(2));
        b.update_param("a", json!(1));
        b.search();
        assert_eq!(a.query_key(), b.query_key());
    }

    #[test]
    fn page_size_choices_match_table_selector() {
        assert_eq!(PAGE_SIZE_CHOICES[0], None);
        assert_eq!(PAGE_SIZE_CHOICES.iter().flatten().copied().collect::<Vec<_>>(), vec![10, 20, 30, 40, 50]);
    }
}
