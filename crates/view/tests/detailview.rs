#![forbid(unsafe_code)]

use std::sync::Arc;

use serde_json::json;
use tabula_api::{MemorySource, SourceError};
use tabula_core::{Params, QueryKey, RetrieveConfig};
use tabula_store::FetchUpdate;
use tabula_view::{DetailStatus, DetailView};

fn config() -> Arc<RetrieveConfig> {
    Arc::new(
        serde_json::from_value(json!({
            "api": {"listUrl": "/api/tracks/"},
            "routes": {"edit": "/explorer/track"},
            "title": {"key": "name", "value": ["name"]},
            "image": {"key": "photos", "value": ["photos"]},
            "properties": [{"label": "Gain", "value": ["elevation_gain"], "suffix": "m"}],
            "chapters": [
                {"title": "Overview", "properties": [{"label": "Region", "value": ["region"]}]},
                {"title": "Stats", "properties": [{"label": "Distance", "value": ["total_distance"], "suffix": "km",
                    "transform": {"op": "divide", "by": 1000, "decimals": 2}}]}
            ]
        }))
        .unwrap(),
    )
}

fn source() -> Arc<MemorySource> {
    Arc::new(MemorySource::new("pk", 10).with_resource(
        "/api/tracks/",
        vec![
            json!({"pk": 7, "name": "Piz Palü", "elevation_gain": 2200, "region": "Bernina", "total_distance": 14250,
                   "photos": [{"photo": {"path": "/media/palu.jpg", "name": "Summit", "snippet": "June"}}]}),
            json!({"pk": 8, "name": "Lake Loop"}),
        ],
    ))
}

#[tokio::test]
async fn loads_and_renders_record() {
    let mut view = DetailView::new(config(), source());
    assert_eq!(view.status(), DetailStatus::Idle);
    view.open("7");
    assert_eq!(view.status(), DetailStatus::Loading);
    view.settle().await;
    assert_eq!(view.status(), DetailStatus::Ready);

    let screen = view.screen().expect("screen");
    assert_eq!(screen.title, "Piz Palü");
    assert_eq!(screen.edit_href.as_deref(), Some("/explorer/track/7/edit"));
    assert_eq!(screen.properties[0].value, "2200 m");
    assert_eq!(screen.chapter_rows[0].value, "Bernina");
    assert_eq!(screen.gallery[0].name.as_deref(), Some("Summit"));

    let r = view.renderer_mut().expect("renderer");
    r.select_chapter(1);
    r.open_preview(0);
    let screen = view.screen().expect("screen");
    assert_eq!(screen.chapter_rows[0].value, "14.25 km");
    assert_eq!(screen.preview.map(|p| p.src), Some("/media/palu.jpg".to_string()));
}

#[tokio::test]
async fn missing_record_fails() {
    let mut view = DetailView::new(config(), source());
    view.open("99");
    view.settle().await;
    assert!(matches!(view.status(), DetailStatus::Failed { error: SourceError::NotFound(_) }));
    assert!(view.screen().is_none());
}

#[tokio::test]
async fn switching_records_drops_the_older_result() {
    let mut view = DetailView::new(config(), source());
    view.open("7");
    view.open("8");
    view.settle().await;
    // the stale record for 7 may still be queued; it must not replace 8
    tokio::task::yield_now().await;
    view.drain_updates();
    assert_eq!(view.screen().map(|s| s.title), Some("Lake Loop".to_string()));
}

#[tokio::test]
async fn earlier_fetch_of_reopened_record_keeps_selection() {
    let mut view = DetailView::new(config(), source());
    view.open("7");
    view.open("8");
    view.open("7");
    view.settle().await;
    assert_eq!(view.status(), DetailStatus::Ready);

    let r = view.renderer_mut().expect("renderer");
    r.select_chapter(1);
    r.open_preview(0);

    // the first fetch of record 7 completing late
    view.apply(FetchUpdate {
        key: QueryKey::new(config().retrieve_path("7"), 1, &Params::new()),
        ticket: 1,
        result: Ok(json!({"pk": 7, "name": "Piz Palü (old)"})),
    });
    tokio::task::yield_now().await;
    view.drain_updates();

    let screen = view.screen().expect("screen");
    assert_eq!(screen.title, "Piz Palü");
    assert!(screen.chapters[1].active);
    assert!(screen.preview.is_some());
}
