//! Refresh coordination surface: per-chart adapters, group-wide passes and
//! the shared state both operate on.

mod chart_adapter;
mod config;
mod legacy;
mod orchestrator;
mod state;

pub use chart_adapter::{ChartAsyncAdapter, ChartHandle, CommitErrorCallback, DrawOutcome};
pub use config::RefreshConfig;
pub use legacy::LegacyRefresh;
pub use orchestrator::{RefreshOrchestrator, RefreshOutcome};
pub use state::{ChartSnapshot, RefreshState, RenderLet};
