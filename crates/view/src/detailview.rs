//! Stateful detail view: fetches one record and wraps it in a [`DetailRenderer`].

#![forbid(unsafe_code)]

use std::sync::Arc;

use tabula_api::{DataSource, SourceError};
use tabula_core::{Params, QueryKey, RetrieveConfig};
use tabula_store::{spawn_retrieve, RecordUpdate};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::detail::DetailRenderer;
use crate::model::DetailScreen;

#[derive(Debug, Clone, PartialEq)]
pub enum DetailStatus {
    Idle,
    Loading,
    Failed { error: SourceError },
    Ready,
}

pub struct DetailView<S: DataSource> {
    config: Arc<RetrieveConfig>,
    source: Arc<S>,
    current: Option<(String, QueryKey)>,
    renderer: Option<DetailRenderer<S::Item>>,
    error: Option<SourceError>,
    ticket: u64,
    tx: mpsc::UnboundedSender<RecordUpdate<S>>,
    rx: mpsc::UnboundedReceiver<RecordUpdate<S>>,
}

impl<S: DataSource> DetailView<S> {
    pub fn new(config: Arc<RetrieveConfig>, source: Arc<S>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { config, source, current: None, renderer: None, error: None, ticket: 0, tx, rx }
    }

    /// Navigate to record `id`. Requires a tokio runtime.
    pub fn open(&mut self, id: impl Into<String>) {
        let id = id.into();
        if self.current.as_ref().map(|(cur, _)| cur == &id).unwrap_or(false) && self.error.is_none() {
            return;
        }
        let key = QueryKey::new(self.config.retrieve_path(&id), 1, &Params::new());
        self.ticket += 1;
        info!(id = %id, path = %key.resource, ticket = self.ticket, "detail: open");
        self.renderer = None;
        self.error = None;
        self.current = Some((id, key.clone()));
        spawn_retrieve(Arc::clone(&self.source), key, self.ticket, self.tx.clone());
    }

    /// Apply a fetch result. Only the fetch issued by the latest `open` counts;
    /// results for other records, or earlier fetches of the same record, are dropped.
    pub fn apply(&mut self, update: RecordUpdate<S>) {
        let Some((id, key)) = &self.current else { return };
        if key != &update.key || update.ticket != self.ticket {
            debug!(path = %update.key.resource, ticket = update.ticket, "detail: stale record ignored");
            return;
        }
        match update.result {
            Ok(record) => {
                self.renderer = Some(DetailRenderer::new(Arc::clone(&self.config), id.clone(), Arc::new(record)));
            }
            Err(error) => self.error = Some(error),
        }
    }

    pub fn drain_updates(&mut self) -> usize {
        let mut n = 0;
        while let Ok(update) = self.rx.try_recv() {
            self.apply(update);
            n += 1;
        }
        n
    }

    pub async fn next_update(&mut self) {
        if let Some(update) = self.rx.recv().await {
            self.apply(update);
        }
    }

    /// Wait until the open record has loaded or failed.
    pub async fn settle(&mut self) {
        while self.status() == DetailStatus::Loading {
            self.next_update().await;
        }
    }

    pub fn status(&self) -> DetailStatus {
        match (&self.current, &self.renderer, &self.error) {
            (None, _, _) => DetailStatus::Idle,
            (_, _, Some(error)) => DetailStatus::Failed { error: error.clone() },
            (_, Some(_), _) => DetailStatus::Ready,
            (_, None, None) => DetailStatus::Loading,
        }
    }

    pub fn renderer(&self) -> Option<&DetailRenderer<S::Item>> { self.renderer.as_ref() }
    pub fn renderer_mut(&mut self) -> Option<&mut DetailRenderer<S::Item>> { self.renderer.as_mut() }

    pub fn screen(&self) -> Option<DetailScreen> { self.renderer.as_ref().map(DetailRenderer::screen) }
}
