#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tabula_api::{DataSource, MemorySource, Settings, SourceError, SourceResult};
use tabula_core::{ModelListConfig, Page, Params, PAGE_NUMBER};
use tabula_query::ViewMode;
use tabula_view::{ListBody, ListPhase, ListStatus, ListView};
use tokio::sync::Notify;

const TRACKS: &str = "/api/tracks/";

fn config() -> Arc<ModelListConfig> {
    Arc::new(
        serde_json::from_value(json!({
            "baseModelData": {"value": "track", "label": "Track", "plural": "Tracks", "href": "/explorer/track/", "id": "pk"},
            "listPageContent": {
                "listTitle": "All Tracks",
                "leftBar": {"SearchBar": [{"sectionTitle": "Filters", "sectionItems": [
                    {"itemLabel": "Name", "itemValue": "name__icontains", "itemType": "text"}
                ]}]},
                "rightBar": {
                    "cardView": {"cardTitle": ["name"], "cardProperties": [{"label": "Gain", "value": ["elevation_gain"], "suffix": "m"}]},
                    "tableView": {"tableColumns": [{"label": "Name", "value": ["name"]}, {"label": "Category", "value": ["category"]}]}
                }
            }
        }))
        .unwrap(),
    )
}

fn records() -> Vec<Value> {
    (1..=25)
        .map(|i| json!({"pk": i, "name": format!("Track {i}"), "category": if i % 2 == 0 { "Hike" } else { "Run" }, "elevation_gain": i * 100}))
        .collect()
}

fn memory() -> Arc<MemorySource> { Arc::new(MemorySource::new("pk", 10).with_resource(TRACKS, records())) }

fn first_pk(status: &ListStatus<Value>) -> Option<Value> {
    match status {
        ListStatus::Ready(p) => p.results.first().map(|r| r["pk"].clone()),
        _ => None,
    }
}

/// Holds every `list` call until its page is released.
struct GatedSource {
    inner: MemorySource,
    gates: Mutex<HashMap<u64, Arc<Notify>>>,
}

impl GatedSource {
    fn new() -> Self { Self { inner: MemorySource::new("pk", 10).with_resource(TRACKS, records()), gates: Mutex::new(HashMap::new()) } }

    fn gate(&self, page: u64) -> Arc<Notify> {
        Arc::clone(self.gates.lock().unwrap().entry(page).or_insert_with(|| Arc::new(Notify::new())))
    }

    fn release(&self, page: u64) { self.gate(page).notify_one(); }
}

#[async_trait::async_trait]
impl DataSource for GatedSource {
    type Item = Value;

    async fn list(&self, resource: &str, params: &Params) -> SourceResult<Page<Value>> {
        let page = params.get(PAGE_NUMBER).and_then(Value::as_u64).unwrap_or(1);
        self.gate(page).notified().await;
        self.inner.list(resource, params).await
    }

    async fn retrieve(&self, resource: &str) -> SourceResult<Value> { self.inner.retrieve(resource).await }
}

#[tokio::test]
async fn first_load_goes_from_loading_to_ready() {
    let mut view = ListView::new(config(), TRACKS, memory(), &Settings::default());
    assert!(matches!(view.status(), ListStatus::Loading { placeholder: None }));
    view.settle().await;
    assert_eq!(first_pk(&view.status()), Some(json!(1)));
    let screen = view.screen();
    assert_eq!(screen.phase, ListPhase::Ready);
    assert_eq!(screen.page_count, 3);
    assert_eq!(screen.title, "All Tracks");
    match screen.body {
        Some(ListBody::Cards(cards)) => {
            assert_eq!(cards.len(), 10);
            assert_eq!(cards[0].href, "/explorer/track/1");
            assert_eq!(cards[0].properties[0].value, "100 m");
        }
        other => panic!("expected cards, got {other:?}"),
    }
}

#[tokio::test]
async fn last_query_wins_under_out_of_order_completion() {
    let src = Arc::new(GatedSource::new());
    let mut view = ListView::new(config(), TRACKS, Arc::clone(&src), &Settings::default());
    view.set_page(2);

    src.release(2);
    view.next_update().await;
    assert_eq!(first_pk(&view.status()), Some(json!(11)));

    src.release(1);
    view.next_update().await;
    // page 1 arrived late: cached, not displayed
    assert_eq!(first_pk(&view.status()), Some(json!(11)));
    assert_eq!(view.display().current().map(|p| p.page_number), Some(Some(2)));
    assert_eq!(view.cache().len(), 2);

    view.set_page(1);
    assert_eq!(first_pk(&view.status()), Some(json!(1)));
}

#[tokio::test]
async fn previous_page_is_kept_as_placeholder() {
    let src = Arc::new(GatedSource::new());
    let mut view = ListView::new(config(), TRACKS, Arc::clone(&src), &Settings::default());
    src.release(1);
    view.settle().await;

    view.set_page(3);
    match view.status() {
        ListStatus::Loading { placeholder: Some(p) } => assert_eq!(p.page_number, Some(1)),
        other => panic!("expected loading with placeholder, got {other:?}"),
    }
    let screen = view.screen();
    assert_eq!(screen.phase, ListPhase::Loading { placeholder: true });
    assert_eq!(screen.body.map(|b| b.len()), Some(10));

    src.release(3);
    view.settle().await;
    assert_eq!(first_pk(&view.status()), Some(json!(21)));
    assert_eq!(view.screen().body.map(|b| b.len()), Some(5));
}

#[tokio::test]
async fn failure_and_empty_are_distinct() {
    let src = memory();
    src.set_failing(true);
    let mut view = ListView::new(config(), TRACKS, Arc::clone(&src), &Settings::default());
    view.settle().await;
    assert!(matches!(view.status(), ListStatus::Failed { .. }));
    assert!(matches!(view.screen().phase, ListPhase::Failed { .. }));

    src.set_failing(false);
    view.retry();
    view.settle().await;
    assert!(matches!(view.status(), ListStatus::Ready(_)));

    view.update_param("name__icontains", json!("glacier"));
    view.search();
    view.settle().await;
    assert!(matches!(view.status(), ListStatus::Empty));
    match view.screen().phase {
        ListPhase::Empty { message } => assert_eq!(message, "No items found for the selected filters."),
        other => panic!("expected empty, got {other:?}"),
    }
}

#[tokio::test]
async fn permuted_filters_do_not_refetch() {
    let src = memory();
    let mut view = ListView::new(config(), TRACKS, Arc::clone(&src), &Settings::default());
    view.settle().await;

    view.update_param("category", json!("Hike"));
    view.update_param("name__icontains", json!("1"));
    view.search();
    view.settle().await;
    let calls = src.calls();

    view.reset();
    view.update_param("name__icontains", json!("1"));
    view.update_param("category", json!("Hike"));
    view.search();
    assert!(matches!(view.status(), ListStatus::Ready(_)));
    assert_eq!(src.calls(), calls);
    assert_eq!(view.drain_updates(), 0);
}

#[tokio::test]
async fn table_view_honors_page_size() {
    let mut view = ListView::new(config(), TRACKS, memory(), &Settings::default());
    view.set_page(2);
    view.set_view_mode(ViewMode::Table);
    assert_eq!(view.controller().page(), 1);
    view.set_page_size(Some(20));
    view.settle().await;
    let screen = view.screen();
    assert_eq!(screen.page_count, 2);
    match screen.body {
        Some(ListBody::Table(t)) => {
            assert_eq!(t.rows.len(), 20);
            assert_eq!(t.headers.len(), 2);
            assert_eq!(t.rows[1].cells, vec!["Track 2".to_string(), "Hike".to_string()]);
        }
        other => panic!("expected table, got {other:?}"),
    }
}

#[tokio::test]
async fn search_panel_reports_draft_controls() {
    let mut view = ListView::new(config(), TRACKS, memory(), &Settings::default());
    view.panel_mut().toggle(0);
    view.update_param("name__icontains", json!("ridge"));
    let screen = view.screen();
    assert!(screen.search[0].open);
    assert_eq!(
        serde_json::to_value(&screen.search[0].controls[0].control).unwrap(),
        json!({"kind": "text", "value": "ridge"})
    );
}

#[tokio::test]
async fn evicted_current_page_is_fetched_again() {
    let src = Arc::new(GatedSource::new());
    let settings = Settings { cache_cap: 1, ..Settings::default() };
    let mut view = ListView::new(config(), TRACKS, Arc::clone(&src), &settings);
    view.set_page(2);

    src.release(2);
    view.next_update().await;
    assert_eq!(first_pk(&view.status()), Some(json!(11)));

    // late page 1 takes the only cache slot and pushes page 2 out
    src.release(1);
    view.next_update().await;
    assert!(view.cache().is_inflight(&view.controller().query_key()));

    src.release(2);
    view.settle().await;
    assert_eq!(first_pk(&view.status()), Some(json!(11)));
    assert_eq!(src.inner.calls(), 3);
}

/// Source whose calls always panic.
struct Exploding;

#[async_trait::async_trait]
impl DataSource for Exploding {
    type Item = Value;

    async fn list(&self, _resource: &str, _params: &Params) -> SourceResult<Page<Value>> { panic!("backend bug") }

    async fn retrieve(&self, _resource: &str) -> SourceResult<Value> { panic!("backend bug") }
}

#[tokio::test]
async fn panicking_source_fails_instead_of_loading_forever() {
    let mut view = ListView::new(config(), TRACKS, Arc::new(Exploding), &Settings::default());
    view.settle().await;
    assert!(matches!(view.status(), ListStatus::Failed { error: SourceError::Transport(_) }));
    assert!(matches!(view.screen().phase, ListPhase::Failed { .. }));

    view.retry();
    assert!(view.cache().is_inflight(&view.controller().query_key()));
    view.settle().await;
    assert!(matches!(view.status(), ListStatus::Failed { .. }));
}
