use std::rc::Rc;

use tracing::{debug, warn};

use crate::core::{ChartCapability, LegacyDrawRequest, RefreshKind};
use crate::error::ChartResult;

use super::{RefreshOutcome, RefreshState};

/// Synchronous group refresh with count-based completion.
///
/// Shares the render/redraw counters with [`super::RefreshOrchestrator`], so
/// a legacy pass and an async pass of the same kind coalesce against each
/// other. Each chart draws from state it already holds; completion is
/// detected by `is_equal_to_count` instead of joining futures.
#[derive(Debug, Clone)]
pub struct LegacyRefresh {
    state: Rc<RefreshState>,
}

impl LegacyRefresh {
    #[must_use]
    pub fn new(state: Rc<RefreshState>) -> Self {
        Self { state }
    }

    pub fn render_all(&self, group: Option<&str>) -> ChartResult<RefreshOutcome> {
        self.refresh_all(RefreshKind::Render, group)
    }

    pub fn redraw_all(&self, group: Option<&str>) -> ChartResult<RefreshOutcome> {
        self.refresh_all(RefreshKind::Redraw, group)
    }

    fn refresh_all(&self, kind: RefreshKind, group: Option<&str>) -> ChartResult<RefreshOutcome> {
        let state = &self.state;
        let group = state.group_name(group);

        if state.refresh_disabled() {
            debug!(kind = %kind, group, "refresh disabled; legacy pass skipped");
            return Ok(RefreshOutcome::Disabled);
        }
        let counters = state.counters(kind);
        let Some(epoch) = counters.try_begin() else {
            debug!(kind = %kind, group, "pass in flight; legacy request coalesced");
            return Ok(RefreshOutcome::Coalesced);
        };

        let mut charts = state.charts(Some(group));
        if state.config().legacy_count_widget_last && state.sampling().is_active() {
            // Stable sort: count widgets move to the back, everything else keeps its order.
            charts.sort_by_key(|chart| chart.capabilities().contains(ChartCapability::CountWidget));
        }
        let total = charts.len();
        debug!(kind = %kind, group, epoch = %epoch, charts = total, "legacy pass started");

        for chart in &charts {
            chart.expire_cache();
            let request = LegacyDrawRequest {
                kind,
                epoch,
                total_charts: total,
            };
            if let Err(err) = chart.draw_now(request) {
                if kind == RefreshKind::Redraw {
                    counters.reset();
                }
                warn!(kind = %kind, chart = %chart.id(), epoch = %epoch, error = %err, "legacy draw failed");
                return Err(err);
            }
            if counters.is_equal_to_count(total) {
                counters.reset();
            }
        }
        if total == 0 {
            counters.reset();
        }

        state.invoke_render_let(group);
        Ok(RefreshOutcome::Completed {
            epoch,
            charts: total,
        })
    }
}
