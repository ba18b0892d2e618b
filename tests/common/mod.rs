#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use chart_refresh::api::{RefreshConfig, RefreshOrchestrator, RefreshState};
use chart_refresh::core::{
    AggregationKey, Chart, ChartCapabilities, ChartCapability, ChartData, ChartId, DataFetcher,
    DrawFuture, DrawRequest, Epoch, FetchFuture, FetchRequest, LegacyDrawRequest, QueryId,
    RefreshKind,
};
use chart_refresh::error::{ChartError, ChartResult};
use chart_refresh::extensions::{GroupAll, ValueFuture};
use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::ready;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Render {
        chart: String,
        epoch: Epoch,
        total: usize,
        query_id: QueryId,
        data: ChartData,
    },
    Redraw {
        chart: String,
        epoch: Epoch,
        total: usize,
        query_id: QueryId,
        data: ChartData,
    },
    DrawNow {
        chart: String,
        kind: RefreshKind,
        epoch: Epoch,
        total: usize,
    },
    FetchStart(String),
    FetchError(String),
    PrepareSampling(String),
    Commit(String),
}

pub type EventLog = Rc<RefCell<Vec<Event>>>;

pub fn event_log() -> EventLog {
    Rc::new(RefCell::new(Vec::new()))
}

pub struct RecordingChart {
    name: String,
    capabilities: ChartCapabilities,
    log: EventLog,
    sampling: bool,
    fail_draw: bool,
    fail_commit: bool,
}

impl RecordingChart {
    pub fn new(name: impl Into<String>, log: EventLog) -> Self {
        Self {
            name: name.into(),
            capabilities: ChartCapabilities::none(),
            log,
            sampling: false,
            fail_draw: false,
            fail_commit: false,
        }
    }

    pub fn with_capability(mut self, capability: ChartCapability) -> Self {
        self.capabilities = self.capabilities.with(capability);
        self
    }

    pub fn failing_draw(mut self) -> Self {
        self.fail_draw = true;
        self
    }

    pub fn failing_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    pub fn shared(self) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(self))
    }

    pub fn is_sampling(&self) -> bool {
        self.sampling
    }

    fn draw_result(&self) -> DrawFuture {
        let result = if self.fail_draw {
            Err(ChartError::DrawFailed {
                chart: ChartId::new(self.name.as_str()),
                message: "renderer rejected frame".to_owned(),
            })
        } else {
            Ok(())
        };
        ready(result).boxed_local()
    }
}

impl Chart for RecordingChart {
    fn anchor_name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> ChartCapabilities {
        self.capabilities
    }

    fn render(&mut self, request: DrawRequest) -> DrawFuture {
        self.log.borrow_mut().push(Event::Render {
            chart: self.name.clone(),
            epoch: request.epoch,
            total: request.total_charts,
            query_id: request.query_id,
            data: request.data,
        });
        self.draw_result()
    }

    fn redraw(&mut self, request: DrawRequest) -> DrawFuture {
        self.log.borrow_mut().push(Event::Redraw {
            chart: self.name.clone(),
            epoch: request.epoch,
            total: request.total_charts,
            query_id: request.query_id,
            data: request.data,
        });
        self.draw_result()
    }

    fn sampling_enabled(&self) -> bool {
        self.sampling
    }

    fn set_sampling(&mut self, enabled: bool) {
        self.sampling = enabled;
    }

    fn prepare_sampling(&mut self) {
        self.log
            .borrow_mut()
            .push(Event::PrepareSampling(self.name.clone()));
    }

    fn commit(&mut self) -> DrawFuture {
        self.log.borrow_mut().push(Event::Commit(self.name.clone()));
        let result = if self.fail_commit {
            Err(ChartError::CommitFailed {
                chart: ChartId::new(self.name.as_str()),
                message: "transaction rejected".to_owned(),
            })
        } else {
            Ok(())
        };
        ready(result).boxed_local()
    }

    fn on_data_fetch_start(&mut self) {
        self.log.borrow_mut().push(Event::FetchStart(self.name.clone()));
    }

    fn on_data_fetch_error(&mut self, _error: &ChartError) {
        self.log.borrow_mut().push(Event::FetchError(self.name.clone()));
    }

    fn draw_now(&mut self, request: LegacyDrawRequest) -> ChartResult<()> {
        self.log.borrow_mut().push(Event::DrawNow {
            chart: self.name.clone(),
            kind: request.kind,
            epoch: request.epoch,
            total: request.total_charts,
        });
        if self.fail_draw {
            return Err(ChartError::DrawFailed {
                chart: ChartId::new(self.name.as_str()),
                message: "renderer rejected frame".to_owned(),
            });
        }
        Ok(())
    }
}

pub fn fresh_state() -> Rc<RefreshState> {
    RefreshState::new(RefreshConfig::default()).expect("default config is valid")
}

pub fn orchestrator() -> RefreshOrchestrator {
    RefreshOrchestrator::new(fresh_state())
}

/// Fetcher resolving immediately with `value`, counting calls.
pub struct StaticFetcher {
    value: ChartData,
    pub calls: Cell<usize>,
}

impl StaticFetcher {
    pub fn new(value: ChartData) -> Rc<Self> {
        Rc::new(Self {
            value,
            calls: Cell::new(0),
        })
    }
}

impl DataFetcher for StaticFetcher {
    fn fetch(&self, _request: &FetchRequest) -> FetchFuture {
        self.calls.set(self.calls.get() + 1);
        ready(Ok(self.value.clone())).boxed_local()
    }
}

/// Fetcher that always fails.
pub struct FailingFetcher;

impl DataFetcher for FailingFetcher {
    fn fetch(&self, request: &FetchRequest) -> FetchFuture {
        ready(Err(ChartError::FetchFailed {
            chart: request.chart.clone(),
            message: "backend unavailable".to_owned(),
        }))
        .boxed_local()
    }
}

/// Fetcher whose requests stay pending until released by the test.
#[derive(Default)]
pub struct GatedFetcher {
    pending: RefCell<Vec<oneshot::Sender<ChartResult<ChartData>>>>,
    pub requests: RefCell<Vec<FetchRequest>>,
}

impl GatedFetcher {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn release_all(&self, value: ChartData) {
        for sender in self.pending.borrow_mut().drain(..) {
            let _ = sender.send(Ok(value.clone()));
        }
    }

    pub fn fail_all(&self) {
        for sender in self.pending.borrow_mut().drain(..) {
            let _ = sender.send(Err(ChartError::FetchFailed {
                chart: ChartId::new("gated"),
                message: "query aborted".to_owned(),
            }));
        }
    }
}

impl DataFetcher for GatedFetcher {
    fn fetch(&self, request: &FetchRequest) -> FetchFuture {
        let (sender, receiver) = oneshot::channel();
        self.pending.borrow_mut().push(sender);
        self.requests.borrow_mut().push(request.clone());
        let chart = request.chart.clone();
        async move {
            receiver.await.unwrap_or_else(|_| {
                Err(ChartError::FetchFailed {
                    chart,
                    message: "fetch dropped".to_owned(),
                })
            })
        }
        .boxed_local()
    }
}

/// Group-all total resolving with the current `value`.
pub struct FixedGroupAll {
    key: AggregationKey,
    pub value: Cell<f64>,
    pub calls: Cell<usize>,
}

impl FixedGroupAll {
    pub fn new(key: impl Into<AggregationKey>, value: f64) -> Rc<Self> {
        Rc::new(Self {
            key: key.into(),
            value: Cell::new(value),
            calls: Cell::new(0),
        })
    }
}

impl GroupAll for FixedGroupAll {
    fn key(&self) -> AggregationKey {
        self.key.clone()
    }

    fn value_async(&self) -> ValueFuture {
        self.calls.set(self.calls.get() + 1);
        ready(Ok(self.value.get())).boxed_local()
    }
}

/// Group-all total that stays pending until `release` is called.
pub struct GatedGroupAll {
    key: AggregationKey,
    pending: RefCell<Option<oneshot::Sender<ChartResult<f64>>>>,
}

impl GatedGroupAll {
    pub fn new(key: impl Into<AggregationKey>) -> Rc<Self> {
        Rc::new(Self {
            key: key.into(),
            pending: RefCell::new(None),
        })
    }

    pub fn is_pending(&self) -> bool {
        self.pending.borrow().is_some()
    }

    pub fn release(&self, value: f64) {
        if let Some(sender) = self.pending.borrow_mut().take() {
            let _ = sender.send(Ok(value));
        }
    }
}

impl GroupAll for GatedGroupAll {
    fn key(&self) -> AggregationKey {
        self.key.clone()
    }

    fn value_async(&self) -> ValueFuture {
        let (sender, receiver) = oneshot::channel();
        *self.pending.borrow_mut() = Some(sender);
        let key = self.key.clone();
        async move {
            receiver.await.unwrap_or_else(|_| {
                Err(ChartError::AggregationFailed {
                    key,
                    message: "refresh dropped".to_owned(),
                })
            })
        }
        .boxed_local()
    }
}

/// Group-all total that always fails.
pub struct FailingGroupAll {
    key: AggregationKey,
}

impl FailingGroupAll {
    pub fn new(key: impl Into<AggregationKey>) -> Rc<Self> {
        Rc::new(Self { key: key.into() })
    }
}

impl GroupAll for FailingGroupAll {
    fn key(&self) -> AggregationKey {
        self.key.clone()
    }

    fn value_async(&self) -> ValueFuture {
        ready(Err(ChartError::AggregationFailed {
            key: self.key.clone(),
            message: "count query timed out".to_owned(),
        }))
        .boxed_local()
    }
}

pub fn redraws_of(log: &EventLog) -> Vec<(String, Epoch, usize)> {
    log.borrow()
        .iter()
        .filter_map(|event| match event {
            Event::Redraw {
                chart,
                epoch,
                total,
                ..
            } => Some((chart.clone(), *epoch, *total)),
            _ => None,
        })
        .collect()
}

pub fn renders_of(log: &EventLog) -> Vec<(String, Epoch, usize)> {
    log.borrow()
        .iter()
        .filter_map(|event| match event {
            Event::Render {
                chart,
                epoch,
                total,
                ..
            } => Some((chart.clone(), *epoch, *total)),
            _ => None,
        })
        .collect()
}
