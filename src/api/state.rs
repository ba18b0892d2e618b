use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;
use tracing::{debug, info};

use crate::core::{ChartId, ChartRegistry, RefreshKind, SamplingCounter, SequenceCounters};
use crate::error::ChartResult;
use crate::extensions::GroupAllAggregator;

use super::{ChartHandle, RefreshConfig};

/// Hook invoked with the group name once a pass has issued its fan-out.
pub type RenderLet = Rc<dyn Fn(&str)>;

/// Snapshot of a group taken before a pass iterates it.
pub type ChartSnapshot = SmallVec<[ChartHandle; 8]>;

/// Everything that is process-wide in a dashboard: the chart registry, the
/// render and redraw counters, group-all aggregations, the sampling count,
/// the global refresh switch and the render-let hook.
///
/// Build one per dashboard (or per test) and share it by `Rc`.
pub struct RefreshState {
    config: RefreshConfig,
    registry: RefCell<ChartRegistry<ChartHandle>>,
    render_stack: SequenceCounters,
    redraw_stack: SequenceCounters,
    group_all: GroupAllAggregator,
    sampling: SamplingCounter,
    refresh_disabled: Cell<bool>,
    render_let: RefCell<Option<RenderLet>>,
}

impl fmt::Debug for RefreshState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshState")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("render_stack", &self.render_stack)
            .field("redraw_stack", &self.redraw_stack)
            .field("group_all", &self.group_all)
            .field("sampling", &self.sampling)
            .field("refresh_disabled", &self.refresh_disabled.get())
            .field("render_let", &self.render_let.borrow().is_some())
            .finish()
    }
}

impl RefreshState {
    pub fn new(config: RefreshConfig) -> ChartResult<Rc<Self>> {
        config.validate()?;
        let refresh_disabled = Cell::new(config.refresh_disabled);
        Ok(Rc::new(Self {
            config,
            registry: RefCell::new(ChartRegistry::new()),
            render_stack: SequenceCounters::new(RefreshKind::Render),
            redraw_stack: SequenceCounters::new(RefreshKind::Redraw),
            group_all: GroupAllAggregator::new(),
            sampling: SamplingCounter::new(),
            refresh_disabled,
            render_let: RefCell::new(None),
        }))
    }

    #[must_use]
    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    /// Resolves an optional group name against the configured default.
    #[must_use]
    pub fn group_name<'a>(&'a self, group: Option<&'a str>) -> &'a str {
        group.unwrap_or(&self.config.default_group)
    }

    #[must_use]
    pub fn counters(&self, kind: RefreshKind) -> &SequenceCounters {
        match kind {
            RefreshKind::Render => &self.render_stack,
            RefreshKind::Redraw => &self.redraw_stack,
        }
    }

    #[must_use]
    pub fn render_stack(&self) -> &SequenceCounters {
        &self.render_stack
    }

    #[must_use]
    pub fn redraw_stack(&self) -> &SequenceCounters {
        &self.redraw_stack
    }

    pub fn reset_render_stack(&self) {
        self.render_stack.reset();
    }

    pub fn reset_redraw_stack(&self) {
        self.redraw_stack.reset();
    }

    #[must_use]
    pub fn group_all(&self) -> &GroupAllAggregator {
        &self.group_all
    }

    #[must_use]
    pub fn sampling(&self) -> &SamplingCounter {
        &self.sampling
    }

    pub fn disable_refresh(&self) {
        if !self.refresh_disabled.replace(true) {
            info!("refresh disabled");
        }
    }

    pub fn enable_refresh(&self) {
        if self.refresh_disabled.replace(false) {
            info!("refresh enabled");
        }
    }

    #[must_use]
    pub fn refresh_disabled(&self) -> bool {
        self.refresh_disabled.get()
    }

    pub fn set_render_let(&self, render_let: Option<RenderLet>) {
        *self.render_let.borrow_mut() = render_let;
    }

    pub(crate) fn invoke_render_let(&self, group: &str) {
        let render_let = self.render_let.borrow().clone();
        if let Some(render_let) = render_let {
            render_let(group);
        }
    }

    /// Adds `chart` to `group` (default group when `None`).
    pub fn register(&self, chart: ChartHandle, group: Option<&str>) {
        let group = self.group_name(group);
        chart.set_group(Some(group.to_owned()));
        self.registry.borrow_mut().register(chart, group);
    }

    /// Removes the first chart of `group` named `chart`, releasing its sampling.
    pub fn deregister(&self, chart: &ChartId, group: Option<&str>) -> Option<ChartHandle> {
        let group = self.group_name(group);
        let removed = self
            .registry
            .borrow_mut()
            .deregister(chart, group, &self.sampling)?;
        removed.set_group(None);
        Some(removed)
    }

    #[must_use]
    pub fn has_chart(&self, chart: &ChartId) -> bool {
        self.registry.borrow().has(chart)
    }

    pub fn clear_charts(&self, group: Option<&str>) {
        self.registry.borrow_mut().clear(group);
    }

    /// Read access to the live registry.
    pub fn with_registry<R>(&self, read: impl FnOnce(&ChartRegistry<ChartHandle>) -> R) -> R {
        read(&self.registry.borrow())
    }

    /// Copies the handles of `group` so callers can iterate while charts
    /// register or leave.
    #[must_use]
    pub fn charts(&self, group: Option<&str>) -> ChartSnapshot {
        let group = self.group_name(group);
        self.registry.borrow().list(group).iter().cloned().collect()
    }

    /// Returns every piece of process-wide state to its initial value.
    ///
    /// Both gates are reopened but the epoch sequences keep counting, so an
    /// epoch issued before the reset never matches a later pass.
    pub fn reset(&self) {
        self.registry.borrow_mut().clear(None);
        self.render_stack.reset();
        self.redraw_stack.reset();
        self.group_all.clear();
        self.sampling.clear();
        self.refresh_disabled.set(self.config.refresh_disabled);
        self.render_let.borrow_mut().take();
        debug!("refresh state reset");
    }
}
