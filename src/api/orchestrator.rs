use std::cell::RefCell;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::{LocalBoxFuture, join, join_all, ready};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::{Chart, ChartId, DataFetcher, Epoch, RefreshKind};
use crate::error::ChartResult;
use crate::extensions::RefreshTarget;

use super::{ChartAsyncAdapter, ChartHandle, RefreshState};

/// How a group-wide refresh request was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefreshOutcome {
    /// Refresh is globally disabled.
    Disabled,
    /// A pass of the same kind was already in flight; nothing was started.
    Coalesced,
    /// This request ran the pass with `epoch` over `charts` charts.
    Completed { epoch: Epoch, charts: usize },
}

impl RefreshOutcome {
    #[must_use]
    pub const fn epoch(self) -> Option<Epoch> {
        match self {
            Self::Completed { epoch, .. } => Some(epoch),
            Self::Disabled | Self::Coalesced => None,
        }
    }
}

/// Entry points for group-wide render and redraw passes.
///
/// Every pass goes `Idle -> InFlight -> Idle` on the counters of its kind.
/// Requests arriving while a pass of that kind is in flight resolve at once
/// with [`RefreshOutcome::Coalesced`]. On success the gate reopens once every
/// chart and the group-all refresh have settled. On failure only the redraw
/// gate is reopened; a failed render pass keeps the render gate set.
#[derive(Debug, Clone)]
pub struct RefreshOrchestrator {
    state: Rc<RefreshState>,
}

impl RefreshOrchestrator {
    #[must_use]
    pub fn new(state: Rc<RefreshState>) -> Self {
        Self { state }
    }

    #[must_use]
    pub fn state(&self) -> &Rc<RefreshState> {
        &self.state
    }

    /// Wraps `chart` in an adapter and registers it into `group`.
    pub fn attach(
        &self,
        chart: Rc<RefCell<dyn Chart>>,
        fetcher: Rc<dyn DataFetcher>,
        group: Option<&str>,
    ) -> ChartHandle {
        let handle = ChartAsyncAdapter::new(&self.state, chart, fetcher);
        self.state.register(Rc::clone(&handle), group);
        handle
    }

    pub fn detach(&self, chart: &ChartId, group: Option<&str>) -> Option<ChartHandle> {
        self.state.deregister(chart, group)
    }

    pub fn disable_refresh(&self) {
        self.state.disable_refresh();
    }

    pub fn enable_refresh(&self) {
        self.state.enable_refresh();
    }

    pub fn render_all_async(
        &self,
        group: Option<&str>,
    ) -> LocalBoxFuture<'static, ChartResult<RefreshOutcome>> {
        self.refresh_all_async(RefreshKind::Render, group)
    }

    pub fn redraw_all_async(
        &self,
        group: Option<&str>,
    ) -> LocalBoxFuture<'static, ChartResult<RefreshOutcome>> {
        self.refresh_all_async(RefreshKind::Redraw, group)
    }

    // Everything up to the returned future runs synchronously: the gate check,
    // epoch allocation and per-chart fan-out all happen inside this call.
    fn refresh_all_async(
        &self,
        kind: RefreshKind,
        group: Option<&str>,
    ) -> LocalBoxFuture<'static, ChartResult<RefreshOutcome>> {
        let state = &self.state;
        let group = state.group_name(group).to_owned();

        if state.refresh_disabled() {
            debug!(kind = %kind, group = %group, "refresh disabled; pass skipped");
            return ready(Ok(RefreshOutcome::Disabled)).boxed_local();
        }
        let Some(epoch) = state.counters(kind).try_begin() else {
            debug!(kind = %kind, group = %group, "pass in flight; request coalesced");
            return ready(Ok(RefreshOutcome::Coalesced)).boxed_local();
        };

        let charts = state.charts(Some(group.as_str()));
        let total = charts.len();
        debug!(kind = %kind, group = %group, epoch = %epoch, charts = total, "fan-out started");

        let passes: Vec<_> = charts
            .iter()
            .map(|chart| {
                chart.expire_cache();
                let pass = match kind {
                    RefreshKind::Render => chart.render_async(epoch, total),
                    RefreshKind::Redraw => {
                        chart.notify_fetch_start();
                        chart.redraw_async(epoch, total)
                    }
                };
                let chart = Rc::clone(chart);
                async move {
                    let result = pass.await;
                    if let (RefreshKind::Redraw, Err(err)) = (kind, &result) {
                        chart.notify_fetch_error(err);
                    }
                    result
                }
            })
            .collect();

        state.invoke_render_let(&group);

        let group_all = if state.group_all().is_empty() {
            ready(Ok(())).boxed_local()
        } else {
            state.group_all().refresh_async(RefreshTarget::All)
        };

        let state = Rc::clone(&self.state);
        async move {
            let (group_all_result, results) = join(group_all, join_all(passes)).await;
            let outcome = results
                .into_iter()
                .collect::<ChartResult<Vec<_>>>()
                .and(group_all_result)
                .map(|()| RefreshOutcome::Completed {
                    epoch,
                    charts: total,
                });

            // A pass that was reset and superseded must not close its successor.
            let counters = state.counters(kind);
            let owns_gate = counters.in_flight() == Some(epoch);
            match &outcome {
                Ok(_) => {
                    if owns_gate {
                        counters.reset();
                    }
                    debug!(kind = %kind, group = %group, epoch = %epoch, "pass completed");
                }
                Err(err) => match kind {
                    RefreshKind::Redraw => {
                        if owns_gate {
                            counters.reset();
                        }
                        warn!(group = %group, epoch = %epoch, error = %err, "redraw pass failed; gate reset");
                    }
                    RefreshKind::Render => {
                        warn!(group = %group, epoch = %epoch, error = %err, "render pass failed; gate left set");
                    }
                },
            }
            outcome
        }
        .boxed_local()
    }
}
