use futures::FutureExt;
use futures::future::{LocalBoxFuture, ready};
use serde::{Deserialize, Serialize};

use crate::error::{ChartError, ChartResult};

use super::{ChartData, Epoch, QueryId, RefreshKind};

/// Future returned by chart draw callbacks and commit handlers.
pub type DrawFuture = LocalBoxFuture<'static, ChartResult<()>>;

/// Optional chart capability probed once when a chart is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChartCapability {
    /// Chart can toggle sampling and needs a pre-render sampling setup.
    Sampling,
    /// Chart flushes pending local edits before a group redraw.
    CommitHandler,
    /// Chart wants "data fetch starting" / "data fetch error" notifications.
    FetchListeners,
    /// Chart displays dashboard totals (drawn last by the legacy mode while sampling).
    CountWidget,
}

impl ChartCapability {
    const fn bit(self) -> u8 {
        match self {
            Self::Sampling => 1 << 0,
            Self::CommitHandler => 1 << 1,
            Self::FetchListeners => 1 << 2,
            Self::CountWidget => 1 << 3,
        }
    }
}

/// Bitmask of optional capabilities a chart supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ChartCapabilities {
    bits: u8,
}

impl ChartCapabilities {
    #[must_use]
    pub const fn none() -> Self {
        Self { bits: 0 }
    }

    #[must_use]
    pub const fn from_capability(capability: ChartCapability) -> Self {
        Self {
            bits: capability.bit(),
        }
    }

    #[must_use]
    pub const fn with(self, capability: ChartCapability) -> Self {
        Self {
            bits: self.bits | capability.bit(),
        }
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }

    #[must_use]
    pub const fn contains(self, capability: ChartCapability) -> bool {
        (self.bits & capability.bit()) != 0
    }

    #[must_use]
    pub const fn is_none(self) -> bool {
        self.bits == 0
    }
}

/// Arguments of one chart render/redraw callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawRequest {
    pub query_id: QueryId,
    pub epoch: Epoch,
    pub total_charts: usize,
    pub data: ChartData,
}

/// Arguments of a synchronous draw issued by the legacy refresh mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyDrawRequest {
    pub kind: RefreshKind,
    pub epoch: Epoch,
    pub total_charts: usize,
}

/// Contract every dashboard widget implements to take part in refresh passes.
///
/// Only `anchor_name`, `render` and `redraw` are mandatory. The remaining
/// hooks are invoked only when `capabilities` advertises the matching
/// [`ChartCapability`]. Draw callbacks return a `'static` future so no chart
/// borrow is held while the pass is suspended.
pub trait Chart {
    fn anchor_name(&self) -> &str;

    fn capabilities(&self) -> ChartCapabilities {
        ChartCapabilities::none()
    }

    fn render(&mut self, request: DrawRequest) -> DrawFuture;

    fn redraw(&mut self, request: DrawRequest) -> DrawFuture;

    fn sampling_enabled(&self) -> bool {
        false
    }

    fn set_sampling(&mut self, _enabled: bool) {}

    /// Pre-render sampling setup, called before a render query is allocated.
    fn prepare_sampling(&mut self) {}

    fn commit(&mut self) -> DrawFuture {
        ready(Ok(())).boxed_local()
    }

    fn on_data_fetch_start(&mut self) {}

    fn on_data_fetch_error(&mut self, _error: &ChartError) {}

    /// Synchronous draw from already available state.
    fn draw_now(&mut self, _request: LegacyDrawRequest) -> ChartResult<()> {
        Ok(())
    }
}
