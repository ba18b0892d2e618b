use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use futures::FutureExt;
use futures::future::{LocalBoxFuture, ready};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::{
    Chart, ChartCapabilities, ChartCapability, ChartData, ChartId, DataFetcher, DrawRequest,
    Epoch, FetchFuture, FetchRequest, LegacyDrawRequest, QueryId, RefreshKind, RegistryEntry,
    SamplingCounter,
};
use crate::error::{ChartError, ChartResult};

use super::{RefreshOrchestrator, RefreshOutcome, RefreshState};

/// Shared reference to one attached chart.
pub type ChartHandle = Rc<ChartAsyncAdapter>;

/// Receives a commit failure reported by [`ChartAsyncAdapter::redraw_group`].
pub type CommitErrorCallback = Box<dyn FnOnce(ChartError)>;

/// Result of one per-chart render/redraw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrawOutcome {
    /// Refresh is globally disabled; nothing was fetched or drawn.
    Skipped,
    Drawn { query_id: QueryId },
}

/// Per-chart async state: query ids, cached data and the pluggable fetcher.
///
/// The adapter holds a weak reference to its [`RefreshState`]; the registry
/// owns the adapters, so a strong one would keep the state alive forever.
pub struct ChartAsyncAdapter {
    id: ChartId,
    capabilities: ChartCapabilities,
    chart: Rc<RefCell<dyn Chart>>,
    fetcher: RefCell<Rc<dyn DataFetcher>>,
    cache: Rc<RefCell<Option<ChartData>>>,
    last_query_id: Cell<u64>,
    group: RefCell<Option<String>>,
    state: Weak<RefreshState>,
}

impl fmt::Debug for ChartAsyncAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChartAsyncAdapter")
            .field("id", &self.id)
            .field("capabilities", &self.capabilities)
            .field("cached", &self.cache.borrow().is_some())
            .field("last_query_id", &self.last_query_id.get())
            .field("group", &self.group.borrow())
            .finish_non_exhaustive()
    }
}

impl ChartAsyncAdapter {
    /// Wraps `chart`, probing its identity and capabilities once.
    #[must_use]
    pub fn new(
        state: &Rc<RefreshState>,
        chart: Rc<RefCell<dyn Chart>>,
        fetcher: Rc<dyn DataFetcher>,
    ) -> ChartHandle {
        let (id, capabilities) = {
            let chart = chart.borrow();
            (ChartId::new(chart.anchor_name()), chart.capabilities())
        };
        Rc::new(Self {
            id,
            capabilities,
            chart,
            fetcher: RefCell::new(fetcher),
            cache: Rc::new(RefCell::new(None)),
            last_query_id: Cell::new(0),
            group: RefCell::new(None),
            state: Rc::downgrade(state),
        })
    }

    #[must_use]
    pub fn id(&self) -> &ChartId {
        &self.id
    }

    #[must_use]
    pub fn capabilities(&self) -> ChartCapabilities {
        self.capabilities
    }

    #[must_use]
    pub fn chart(&self) -> &Rc<RefCell<dyn Chart>> {
        &self.chart
    }

    #[must_use]
    pub fn group(&self) -> Option<String> {
        self.group.borrow().clone()
    }

    pub(crate) fn set_group(&self, group: Option<String>) {
        *self.group.borrow_mut() = group;
    }

    /// Installs a new data source; cached data from the old one is dropped.
    pub fn set_data_fetcher(&self, fetcher: Rc<dyn DataFetcher>) {
        *self.fetcher.borrow_mut() = fetcher;
        self.expire_cache();
    }

    #[must_use]
    pub fn data_fetcher(&self) -> Rc<dyn DataFetcher> {
        Rc::clone(&self.fetcher.borrow())
    }

    pub fn expire_cache(&self) {
        self.cache.borrow_mut().take();
    }

    #[must_use]
    pub fn cached_data(&self) -> Option<ChartData> {
        self.cache.borrow().clone()
    }

    #[must_use]
    pub fn last_query_id(&self) -> Option<QueryId> {
        match self.last_query_id.get() {
            0 => None,
            value => Some(QueryId::new(value)),
        }
    }

    fn next_query_id(&self) -> QueryId {
        let value = self.last_query_id.get() + 1;
        self.last_query_id.set(value);
        QueryId::new(value)
    }

    /// `true` when `epoch` is still the in-flight pass of `kind` (or none is).
    #[must_use]
    pub fn is_current_epoch(&self, kind: RefreshKind, epoch: Epoch) -> bool {
        self.state
            .upgrade()
            .is_some_and(|state| state.counters(kind).is_empty(Some(epoch)))
    }

    #[must_use]
    pub fn sampling_enabled(&self) -> bool {
        self.capabilities.contains(ChartCapability::Sampling)
            && self.chart.borrow().sampling_enabled()
    }

    /// Turns sampling on or off, keeping the process-wide count in step.
    pub fn set_sampling(&self, enabled: bool) -> ChartResult<()> {
        if !self.capabilities.contains(ChartCapability::Sampling) {
            debug!(chart = %self.id, "chart has no sampling capability; ignoring");
            return Ok(());
        }
        let state = self.upgrade_state()?;
        let was_enabled = self.chart.borrow().sampling_enabled();
        self.chart.borrow_mut().set_sampling(enabled);
        match (was_enabled, enabled) {
            (false, true) => state.sampling().increment(),
            (true, false) => state.sampling().decrement(),
            _ => {}
        }
        Ok(())
    }

    /// Runs the installed fetcher under a fresh query id and caches the data.
    pub fn data_async(&self) -> FetchFuture {
        let query_id = self.next_query_id();
        self.fetch(query_id)
    }

    fn fetch(&self, query_id: QueryId) -> FetchFuture {
        let request = FetchRequest {
            chart: self.id.clone(),
            query_id,
        };
        let fetcher = self.data_fetcher();
        let pending = fetcher.fetch(&request);
        let cache = Rc::clone(&self.cache);
        async move {
            let data = pending.await?;
            *cache.borrow_mut() = Some(data.clone());
            Ok(data)
        }
        .boxed_local()
    }

    pub fn render_async(
        &self,
        epoch: Epoch,
        total_charts: usize,
    ) -> LocalBoxFuture<'static, ChartResult<DrawOutcome>> {
        self.draw_async(RefreshKind::Render, epoch, total_charts)
    }

    /// Like [`Self::render_async`], but a failed fetch reopens the redraw gate.
    pub fn redraw_async(
        &self,
        epoch: Epoch,
        total_charts: usize,
    ) -> LocalBoxFuture<'static, ChartResult<DrawOutcome>> {
        self.draw_async(RefreshKind::Redraw, epoch, total_charts)
    }

    fn draw_async(
        &self,
        kind: RefreshKind,
        epoch: Epoch,
        total_charts: usize,
    ) -> LocalBoxFuture<'static, ChartResult<DrawOutcome>> {
        let state = match self.upgrade_state() {
            Ok(state) => state,
            Err(err) => return ready(Err(err)).boxed_local(),
        };
        if state.refresh_disabled() {
            return ready(Ok(DrawOutcome::Skipped)).boxed_local();
        }
        if self.capabilities.contains(ChartCapability::Sampling) {
            self.chart.borrow_mut().prepare_sampling();
        }

        let query_id = self.next_query_id();
        let fetch = self.fetch(query_id);
        let chart = Rc::clone(&self.chart);
        let id = self.id.clone();
        let state = Rc::downgrade(&state);

        async move {
            let data = match fetch.await {
                Ok(data) => data,
                Err(err) => {
                    warn!(chart = %id, kind = %kind, epoch = %epoch, error = %err, "data fetch failed");
                    if kind == RefreshKind::Redraw {
                        if let Some(state) = state.upgrade() {
                            state.reset_redraw_stack();
                        }
                    }
                    return Err(err);
                }
            };

            let request = DrawRequest {
                query_id,
                epoch,
                total_charts,
                data,
            };
            let draw = {
                let mut chart = chart.borrow_mut();
                match kind {
                    RefreshKind::Render => chart.render(request),
                    RefreshKind::Redraw => chart.redraw(request),
                }
            };
            draw.await?;
            Ok(DrawOutcome::Drawn { query_id })
        }
        .boxed_local()
    }

    /// Flushes pending local edits through the chart's commit handler, then
    /// redraws the chart's whole group.
    ///
    /// A commit failure goes to `on_commit_error` and resolves to `None`
    /// without redrawing.
    pub fn redraw_group(
        &self,
        on_commit_error: Option<CommitErrorCallback>,
    ) -> LocalBoxFuture<'static, ChartResult<Option<RefreshOutcome>>> {
        let state = match self.upgrade_state() {
            Ok(state) => state,
            Err(err) => return ready(Err(err)).boxed_local(),
        };
        let orchestrator = RefreshOrchestrator::new(state);
        let group = self.group();

        if !self.capabilities.contains(ChartCapability::CommitHandler) {
            return orchestrator
                .redraw_all_async(group.as_deref())
                .map(|outcome| outcome.map(Some))
                .boxed_local();
        }

        let commit = self.chart.borrow_mut().commit();
        let id = self.id.clone();
        async move {
            match commit.await {
                Ok(()) => orchestrator
                    .redraw_all_async(group.as_deref())
                    .await
                    .map(Some),
                Err(err) => {
                    warn!(chart = %id, error = %err, "commit failed; group redraw skipped");
                    if let Some(on_commit_error) = on_commit_error {
                        on_commit_error(err);
                    }
                    Ok(None)
                }
            }
        }
        .boxed_local()
    }

    pub(crate) fn notify_fetch_start(&self) {
        if self.capabilities.contains(ChartCapability::FetchListeners) {
            self.chart.borrow_mut().on_data_fetch_start();
        }
    }

    pub(crate) fn notify_fetch_error(&self, error: &ChartError) {
        if self.capabilities.contains(ChartCapability::FetchListeners) {
            self.chart.borrow_mut().on_data_fetch_error(error);
        }
    }

    pub(crate) fn draw_now(&self, request: LegacyDrawRequest) -> ChartResult<()> {
        self.chart.borrow_mut().draw_now(request)
    }

    fn upgrade_state(&self) -> ChartResult<Rc<RefreshState>> {
        self.state
            .upgrade()
            .ok_or_else(|| ChartError::Detached(self.id.clone()))
    }
}

impl RegistryEntry for ChartHandle {
    fn chart_id(&self) -> &ChartId {
        &self.id
    }

    fn release_sampling(&self, sampling: &SamplingCounter) {
        if self.sampling_enabled() {
            self.chart.borrow_mut().set_sampling(false);
            sampling.decrement();
        }
    }
}
