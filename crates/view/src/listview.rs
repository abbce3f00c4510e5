//! Stateful list view: query controller + page cache + data source.
//!
//! The view owns one [`ListQueryController`]. Every action re-syncs the
//! current query key against the cache and starts a fetch when needed.
//! Fetch results arrive on a channel and are applied by [`ListView::drain_updates`]
//! or [`ListView::next_update`]; the displayed state always derives from the
//! entry for the current key.

#![forbid(unsafe_code)]

use std::sync::Arc;

use metrics::counter;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tabula_api::{DataSource, Settings, SourceError};
use tabula_core::{ModelListConfig, Page, QueryKey, SearchItemConfig};
use tabula_query::{ControlError, ControlInput, ListQueryController, SearchPanel, ViewMode};
use tabula_store::{spawn_fetch, DisplayHandle, DisplaySlot, ListUpdate, PageCache};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::list::{render_cards, render_table};
use crate::model::{ListBody, ListPhase, ListScreen, SearchControl, SearchSectionView, EMPTY_MESSAGE, FAILED_TITLE};

/// Data state of the current query.
#[derive(Debug)]
pub enum ListStatus<T> {
    /// Current key in flight; `placeholder` is the last displayed page, if any.
    Loading { placeholder: Option<Arc<Page<T>>> },
    Failed { error: SourceError },
    Empty,
    Ready(Arc<Page<T>>),
}

pub struct ListView<S: DataSource> {
    config: Arc<ModelListConfig>,
    source: Arc<S>,
    description_limit: usize,
    controller: ListQueryController,
    panel: SearchPanel,
    cache: PageCache<S::Item>,
    slot: DisplaySlot<S::Item>,
    errors: FxHashMap<QueryKey, SourceError>,
    tx: mpsc::UnboundedSender<ListUpdate<S>>,
    rx: mpsc::UnboundedReceiver<ListUpdate<S>>,
}

impl<S: DataSource> ListView<S> {
    /// Build the view and start fetching the first page. Requires a tokio runtime.
    pub fn new(config: Arc<ModelListConfig>, list_url: impl Into<String>, source: Arc<S>, settings: &Settings) -> Self {
        Self::with_controller(config, ListQueryController::new(list_url), source, settings)
    }

    /// Build the view around an already configured controller; only its
    /// current query is fetched. Requires a tokio runtime.
    pub fn with_controller(
        config: Arc<ModelListConfig>,
        controller: ListQueryController,
        source: Arc<S>,
        settings: &Settings,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let panel = SearchPanel::new(config.sections().len());
        let mut view = Self {
            config,
            source,
            description_limit: settings.description_preview,
            controller,
            panel,
            cache: PageCache::with_capacity(settings.cache_cap),
            slot: DisplaySlot::new(),
            errors: FxHashMap::default(),
            tx,
            rx,
        };
        view.sync();
        view
    }

    pub fn config(&self) -> &ModelListConfig { &self.config }
    pub fn controller(&self) -> &ListQueryController { &self.controller }
    pub fn panel(&self) -> &SearchPanel { &self.panel }
    pub fn panel_mut(&mut self) -> &mut SearchPanel { &mut self.panel }
    pub fn cache(&self) -> &PageCache<S::Item> { &self.cache }
    pub fn display(&self) -> DisplayHandle<S::Item> { self.slot.handle() }

    // ---------------- actions ----------------

    pub fn update_param(&mut self, key: impl Into<String>, value: Value) { self.controller.update_param(key, value); }

    pub fn edit(&mut self, item: &SearchItemConfig, input: ControlInput) -> Result<(), ControlError> {
        self.controller.edit(item, input)
    }

    pub fn search(&mut self) {
        self.controller.search();
        self.sync();
    }

    pub fn reset(&mut self) {
        self.controller.reset();
        self.sync();
    }

    pub fn set_page(&mut self, page: u32) {
        self.controller.set_page(page);
        self.sync();
    }

    pub fn set_page_size(&mut self, size: Option<u32>) {
        self.controller.set_page_size(size);
        self.sync();
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.controller.set_view_mode(mode);
        self.sync();
    }

    /// Fetch the current key again after a failure.
    pub fn retry(&mut self) { self.sync(); }

    /// Show the cached page for the current key, or start fetching it.
    /// A recorded failure for the key is dropped and the fetch reissued.
    fn sync(&mut self) {
        let key = self.controller.query_key();
        if let Some(page) = self.cache.get(&key) {
            self.show(page);
            return;
        }
        if self.errors.remove(&key).is_some() {
            info!(key = %key, "list: refetching failed query");
        }
        if self.cache.begin(&key) {
            debug!(key = %key, "list: fetch");
            let params = self.controller.effective_query();
            spawn_fetch(Arc::clone(&self.source), key, params, self.controller.revision(), self.tx.clone());
        }
    }

    fn show(&mut self, page: Arc<Page<S::Item>>) {
        let same = self.slot.current().map(|cur| Arc::ptr_eq(&cur, &page)).unwrap_or(false);
        if !same {
            self.slot.publish(page);
        }
    }

    // ---------------- updates ----------------

    /// Apply one fetch result. Results for keys other than the current one are
    /// cached (or recorded as failed) but never displayed.
    pub fn apply(&mut self, update: ListUpdate<S>) {
        let current = self.controller.query_key() == update.key;
        if !current {
            counter!("stale_results_total", 1u64);
            debug!(key = %update.key, "list: stale result ignored for display");
        }
        match update.result {
            Ok(page) => {
                let page = Arc::new(page);
                self.errors.remove(&update.key);
                self.cache.complete(update.key, Arc::clone(&page));
                if current {
                    self.show(page);
                }
            }
            Err(error) => {
                self.cache.fail(&update.key);
                self.errors.insert(update.key, error);
            }
        }
        // a stale completion may have evicted the current page
        let key = self.controller.query_key();
        if !self.cache.contains(&key) && !self.cache.is_inflight(&key) && !self.errors.contains_key(&key) {
            self.sync();
        }
    }

    /// Apply every update already delivered. Returns how many were applied.
    pub fn drain_updates(&mut self) -> usize {
        let mut n = 0;
        while let Ok(update) = self.rx.try_recv() {
            self.apply(update);
            n += 1;
        }
        n
    }

    /// Wait for the next fetch result and apply it.
    pub async fn next_update(&mut self) {
        if let Some(update) = self.rx.recv().await {
            self.apply(update);
        }
    }

    /// Wait until the current key is no longer in flight.
    pub async fn settle(&mut self) {
        while self.cache.is_inflight(&self.controller.query_key()) {
            self.next_update().await;
        }
    }

    // ---------------- display ----------------

    pub fn status(&self) -> ListStatus<S::Item> {
        let key = self.controller.query_key();
        if let Some(page) = self.cache.peek(&key) {
            return if page.is_empty() { ListStatus::Empty } else { ListStatus::Ready(Arc::clone(page)) };
        }
        if let Some(error) = self.errors.get(&key) {
            return ListStatus::Failed { error: error.clone() };
        }
        ListStatus::Loading { placeholder: self.slot.current() }
    }

    fn body(&self, page: &Page<S::Item>) -> ListBody {
        let base = &self.config.base_model_data;
        let views = self.config.views();
        match self.controller.view_mode() {
            ViewMode::Cards => ListBody::Cards(render_cards(&page.results, base, &views.card_view, self.description_limit)),
            ViewMode::Table => ListBody::Table(render_table(&page.results, base, &views.table_view)),
        }
    }

    fn search_sections(&self) -> Vec<SearchSectionView> {
        self.config
            .sections()
            .iter()
            .enumerate()
            .map(|(i, s)| SearchSectionView {
                title: s.section_title.clone(),
                description: s.section_description.clone(),
                open: self.panel.is_open(i),
                controls: self
                    .controller
                    .controls(&s.section_items)
                    .into_iter()
                    .map(|(item, control)| SearchControl {
                        label: item.label().to_string(),
                        description: item.description().map(str::to_string),
                        control,
                    })
                    .collect(),
            })
            .collect()
    }

    pub fn screen(&self) -> ListScreen {
        let (phase, shown) = match self.status() {
            ListStatus::Ready(page) => (ListPhase::Ready, Some(page)),
            ListStatus::Empty => (ListPhase::Empty { message: EMPTY_MESSAGE.to_string() }, None),
            ListStatus::Failed { error } => {
                (ListPhase::Failed { title: FAILED_TITLE.to_string(), message: error.to_string() }, None)
            }
            ListStatus::Loading { placeholder } => (ListPhase::Loading { placeholder: placeholder.is_some() }, placeholder),
        };
        let content = &self.config.list_page_content;
        ListScreen {
            title: content.list_title.clone(),
            description: content.list_description.clone(),
            view_mode: self.controller.view_mode(),
            page: self.controller.page(),
            page_count: shown.as_ref().map(|p| p.pages()).unwrap_or(1),
            page_size: self.controller.page_size(),
            phase,
            body: shown.map(|p| self.body(&p)),
            search: self.search_sections(),
        }
    }
}
