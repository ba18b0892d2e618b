//! chart-refresh: render/redraw coordination for chart dashboards.
//!
//! Many chart widgets share one backend connection. This crate serializes
//! their refreshes: group-wide passes are coalesced while one is in flight,
//! numbered by per-kind epochs, fanned out to every chart of a group and
//! joined into a single completion.

pub mod api;
pub mod core;
pub mod error;
pub mod extensions;
pub mod telemetry;

pub use api::{ChartHandle, RefreshConfig, RefreshOrchestrator, RefreshOutcome, RefreshState};
pub use error::{ChartError, ChartResult};
