//! Search state machine driven by a UI.
//!
//! The orchestrator is owned by a single task and every transition goes
//! through `&mut self`. A started search runs on the runtime and reports back
//! over a channel; its result is applied when the owner calls [`poll`] or
//! [`finish_search`].
//!
//! [`poll`]: SearchOrchestrator::poll
//! [`finish_search`]: SearchOrchestrator::finish_search

use std::{fmt, sync::Arc};

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::{
    app_error, cache::CacheService, error::AppError, model::WeatherRecord,
    provider::WeatherService,
};

/// What the UI should show. Exactly one variant is active at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum SearchState {
    /// Nothing searched or selected yet.
    #[default]
    Idle,
    /// A selected or cached city.
    Detail(WeatherRecord),
    Results(Vec<WeatherRecord>),
    /// A search is in flight; input is disabled.
    Searching,
    Error(AppError),
}

impl SearchState {
    pub fn is_searching(&self) -> bool {
        matches!(self, SearchState::Searching)
    }
}

/// What [`SearchOrchestrator::submit`] did with the current query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A search was already running; nothing changed.
    Ignored,
    /// The query was blank and the state went back to idle.
    Cleared,
    /// A search was launched.
    Started,
    /// No search could be launched; the state holds the error.
    Failed,
}

#[derive(Debug)]
enum SearchMessage {
    FetchDone {
        generation: u64,
        result: Result<Vec<WeatherRecord>, AppError>,
    },
}

pub struct SearchOrchestrator {
    service: Arc<dyn WeatherService>,
    cache: Option<Arc<dyn CacheService>>,
    state: watch::Sender<SearchState>,
    search_query: String,
    generation: u64,
    tx: mpsc::UnboundedSender<SearchMessage>,
    rx: mpsc::UnboundedReceiver<SearchMessage>,
}

impl fmt::Debug for SearchOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchOrchestrator")
            .field("service", &self.service)
            .field("has_cache", &self.cache.is_some())
            .field("state", &*self.state.borrow())
            .field("search_query", &self.search_query)
            .finish_non_exhaustive()
    }
}

impl SearchOrchestrator {
    pub fn new(service: Arc<dyn WeatherService>, cache: Option<Arc<dyn CacheService>>) -> Self {
        let (state, _) = watch::channel(SearchState::Idle);
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            service,
            cache,
            state,
            search_query: String::new(),
            generation: 0,
            tx,
            rx,
        }
    }

    pub fn state(&self) -> SearchState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.state.subscribe()
    }

    /// True while a search is in flight.
    pub fn is_interaction_disabled(&self) -> bool {
        self.state.borrow().is_searching()
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
    }

    /// Shows the cached city, if any. Meant to run once when the UI first appears.
    pub fn restore_from_cache(&mut self) -> bool {
        if self.is_interaction_disabled() {
            debug!("Not restoring cache while a search is running");
            return false;
        }
        let Some(cached) = self.cache.as_ref().and_then(|cache| cache.load()) else {
            return false;
        };
        info!(city = %cached.city_name, "Restored last viewed city");
        self.set_state(SearchState::Detail(cached));
        true
    }

    /// Shows `weather` and stores it as the last viewed city.
    pub fn select(&mut self, weather: WeatherRecord) {
        if let Some(cache) = &self.cache {
            cache.save(&weather);
        }
        self.set_state(SearchState::Detail(weather));
    }

    /// Starts a search for the current query.
    ///
    /// Rejected while another search runs. A blank query resets to idle.
    /// Launching needs a Tokio runtime; without one the state becomes an
    /// unexpected-nil error and [`SubmitOutcome::Failed`] is returned.
    pub fn submit(&mut self) -> SubmitOutcome {
        if self.is_interaction_disabled() {
            debug!(state = ?*self.state.borrow(), "Cannot search in current state");
            return SubmitOutcome::Ignored;
        }

        let query = self.search_query.trim().to_string();
        if query.is_empty() {
            debug!("Search query is empty. Resetting to idle state.");
            self.set_state(SearchState::Idle);
            return SubmitOutcome::Cleared;
        }

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "No runtime available to run the search");
                self.set_state(SearchState::Error(app_error!(UnexpectedNil, e)));
                return SubmitOutcome::Failed;
            }
        };

        self.generation += 1;
        let generation = self.generation;
        let service = Arc::clone(&self.service);
        let tx = self.tx.clone();

        self.set_state(SearchState::Searching);
        info!(%query, generation, "Search started");

        handle.spawn(async move {
            let result = service.search(&query).await;
            // the receiver lives as long as the orchestrator
            let _ = tx.send(SearchMessage::FetchDone { generation, result });
        });

        SubmitOutcome::Started
    }

    /// Applies any search results that already arrived. Returns whether the state changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(message) = self.rx.try_recv() {
            changed |= self.apply(message);
        }
        changed
    }

    /// Waits for the running search, if any, and applies its outcome.
    pub async fn finish_search(&mut self) -> SearchState {
        while self.is_interaction_disabled() {
            match self.rx.recv().await {
                Some(message) => {
                    self.apply(message);
                }
                None => break,
            }
        }
        self.state()
    }

    fn apply(&mut self, message: SearchMessage) -> bool {
        match message {
            SearchMessage::FetchDone { generation, result } => {
                if generation != self.generation || !self.is_interaction_disabled() {
                    debug!(generation, "Dropping stale search result");
                    return false;
                }
                match result {
                    Ok(records) => {
                        info!(count = records.len(), "Search finished");
                        self.set_state(SearchState::Results(records));
                        self.search_query.clear();
                    }
                    Err(err) => {
                        info!(kind = %err.kind(), "Search failed");
                        self.set_state(SearchState::Error(err));
                    }
                }
                true
            }
        }
    }

    fn set_state(&self, next: SearchState) {
        self.state.send_replace(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use async_trait::async_trait;
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };
    use tokio::sync::Semaphore;

    /// Returns a fixed result once the test releases it.
    #[derive(Debug)]
    struct GatedService {
        gate: Semaphore,
        result: Result<Vec<WeatherRecord>, AppError>,
        calls: AtomicUsize,
        queries: Mutex<Vec<String>>,
    }

    impl GatedService {
        fn new(result: Result<Vec<WeatherRecord>, AppError>) -> Arc<Self> {
            Arc::new(Self {
                gate: Semaphore::new(0),
                result,
                calls: AtomicUsize::new(0),
                queries: Mutex::new(Vec::new()),
            })
        }

        fn open(result: Result<Vec<WeatherRecord>, AppError>) -> Arc<Self> {
            let service = Self::new(result);
            service.release();
            service
        }

        fn release(&self) {
            self.gate.add_permits(1_000);
        }
    }

    #[async_trait]
    impl WeatherService for GatedService {
        async fn search(&self, query: &str) -> Result<Vec<WeatherRecord>, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().unwrap().push(query.to_string());
            let _permit = self.gate.acquire().await.unwrap();
            self.result.clone()
        }
    }

    #[derive(Default)]
    struct MemoryCache {
        stored: Mutex<Option<WeatherRecord>>,
        saves: Mutex<Vec<WeatherRecord>>,
    }

    impl CacheService for MemoryCache {
        fn save(&self, weather: &WeatherRecord) {
            self.saves.lock().unwrap().push(weather.clone());
            *self.stored.lock().unwrap() = Some(weather.clone());
        }

        fn load(&self) -> Option<WeatherRecord> {
            self.stored.lock().unwrap().clone()
        }
    }

    fn paris() -> WeatherRecord {
        WeatherRecord {
            id: "paris-ile-de-france-france".into(),
            city_name: "Paris".into(),
            ..WeatherRecord::example()
        }
    }

    fn orchestrator(service: Arc<GatedService>) -> (SearchOrchestrator, Arc<MemoryCache>) {
        let cache = Arc::new(MemoryCache::default());
        let orchestrator =
            SearchOrchestrator::new(service, Some(cache.clone() as Arc<dyn CacheService>));
        (orchestrator, cache)
    }

    #[test]
    fn starts_idle() {
        let (orchestrator, _) = orchestrator(GatedService::open(Ok(vec![])));
        assert_eq!(orchestrator.state(), SearchState::Idle);
        assert!(!orchestrator.is_interaction_disabled());
    }

    #[tokio::test]
    async fn successful_search_shows_results_and_clears_query() {
        let service = GatedService::open(Ok(vec![WeatherRecord::example()]));
        let (mut orchestrator, _) = orchestrator(service.clone());

        orchestrator.set_search_query("  chicago ");
        assert_eq!(orchestrator.submit(), SubmitOutcome::Started);
        assert_eq!(orchestrator.state(), SearchState::Searching);

        let state = orchestrator.finish_search().await;

        assert_eq!(state, SearchState::Results(vec![WeatherRecord::example()]));
        assert_eq!(orchestrator.search_query(), "");
        assert_eq!(*service.queries.lock().unwrap(), vec!["chicago".to_string()]);
    }

    #[tokio::test]
    async fn failed_search_shows_error_and_keeps_query() {
        let err = app_error!(CityNotFound);
        let service = GatedService::open(Err(err.clone()));
        let (mut orchestrator, _) = orchestrator(service);

        orchestrator.set_search_query("atlantis");
        orchestrator.submit();
        let state = orchestrator.finish_search().await;

        assert_eq!(state, SearchState::Error(err));
        assert_eq!(orchestrator.search_query(), "atlantis");
    }

    #[tokio::test]
    async fn submit_while_searching_is_ignored() {
        let service = GatedService::new(Ok(vec![WeatherRecord::example()]));
        let (mut orchestrator, _) = orchestrator(service.clone());

        orchestrator.set_search_query("chicago");
        assert_eq!(orchestrator.submit(), SubmitOutcome::Started);
        tokio::task::yield_now().await;

        orchestrator.set_search_query("paris");
        assert_eq!(orchestrator.submit(), SubmitOutcome::Ignored);
        orchestrator.set_search_query("");
        assert_eq!(orchestrator.submit(), SubmitOutcome::Ignored);
        assert_eq!(orchestrator.state(), SearchState::Searching);
        assert!(orchestrator.is_interaction_disabled());

        service.release();
        let state = orchestrator.finish_search().await;

        assert_eq!(state, SearchState::Results(vec![WeatherRecord::example()]));
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blank_query_resets_to_idle_from_any_settled_state() {
        let service = GatedService::open(Err(app_error!(Networking)));
        let (mut orchestrator, _) = orchestrator(service.clone());

        orchestrator.set_search_query(" \t ");
        assert_eq!(orchestrator.submit(), SubmitOutcome::Cleared);
        assert_eq!(orchestrator.state(), SearchState::Idle);

        orchestrator.select(WeatherRecord::example());
        orchestrator.submit();
        assert_eq!(orchestrator.state(), SearchState::Idle);

        orchestrator.set_search_query("somewhere");
        orchestrator.submit();
        assert!(matches!(orchestrator.finish_search().await, SearchState::Error(_)));
        orchestrator.set_search_query("");
        orchestrator.submit();
        assert_eq!(orchestrator.state(), SearchState::Idle);

        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn select_shows_detail_and_saves_once() {
        let (mut orchestrator, cache) = orchestrator(GatedService::open(Ok(vec![])));

        orchestrator.select(paris());

        assert_eq!(orchestrator.state(), SearchState::Detail(paris()));
        assert_eq!(*cache.saves.lock().unwrap(), vec![paris()]);
    }

    #[tokio::test]
    async fn select_from_results_replaces_them() {
        let service = GatedService::open(Ok(vec![WeatherRecord::example(), paris()]));
        let (mut orchestrator, cache) = orchestrator(service);

        orchestrator.set_search_query("c");
        orchestrator.submit();
        orchestrator.finish_search().await;
        orchestrator.select(WeatherRecord::example());

        assert_eq!(orchestrator.state(), SearchState::Detail(WeatherRecord::example()));
        assert_eq!(cache.saves.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn restore_shows_cached_detail() {
        let (mut orchestrator, cache) = orchestrator(GatedService::open(Ok(vec![])));
        *cache.stored.lock().unwrap() = Some(paris());

        assert!(orchestrator.restore_from_cache());
        assert_eq!(orchestrator.state(), SearchState::Detail(paris()));
        assert!(cache.saves.lock().unwrap().is_empty());
    }

    #[test]
    fn restore_with_empty_or_missing_cache_stays_idle() {
        let (mut orchestrator, _) = orchestrator(GatedService::open(Ok(vec![])));
        assert!(!orchestrator.restore_from_cache());
        assert_eq!(orchestrator.state(), SearchState::Idle);

        let mut uncached = SearchOrchestrator::new(GatedService::open(Ok(vec![])), None);
        assert!(!uncached.restore_from_cache());
        uncached.select(paris());
        assert_eq!(uncached.state(), SearchState::Detail(paris()));
    }

    #[tokio::test]
    async fn result_of_a_search_interrupted_by_select_is_dropped() {
        let service = GatedService::new(Ok(vec![WeatherRecord::example()]));
        let (mut orchestrator, _) = orchestrator(service.clone());

        orchestrator.set_search_query("chicago");
        orchestrator.submit();
        orchestrator.select(paris());

        service.release();
        let message = orchestrator.rx.recv().await.unwrap();

        assert!(!orchestrator.apply(message));
        assert_eq!(orchestrator.state(), SearchState::Detail(paris()));
    }

    #[tokio::test]
    async fn poll_applies_finished_search() {
        let service = GatedService::open(Ok(vec![paris()]));
        let (mut orchestrator, _) = orchestrator(service);
        let mut updates = orchestrator.subscribe();

        orchestrator.set_search_query("paris");
        orchestrator.submit();
        assert!(updates.has_changed().unwrap());
        assert_eq!(*updates.borrow_and_update(), SearchState::Searching);

        let mut applied = false;
        for _ in 0..100 {
            if orchestrator.poll() {
                applied = true;
                break;
            }
            tokio::task::yield_now().await;
        }

        assert!(applied);
        assert_eq!(*updates.borrow_and_update(), SearchState::Results(vec![paris()]));
    }

    #[test]
    fn submit_without_runtime_is_an_unexpected_nil_error() {
        let (mut orchestrator, _) = orchestrator(GatedService::open(Ok(vec![])));
        orchestrator.set_search_query("chicago");

        assert_eq!(orchestrator.submit(), SubmitOutcome::Failed);

        match orchestrator.state() {
            SearchState::Error(err) => assert_eq!(err.kind(), ErrorKind::UnexpectedNil),
            other => panic!("unexpected state {other:?}"),
        }
        assert!(!orchestrator.is_interaction_disabled());
        assert_eq!(orchestrator.search_query(), "chicago");
    }
}
