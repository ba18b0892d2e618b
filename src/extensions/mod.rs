//! Optional collaborators of refresh passes live here.
//!
//! Group-all aggregations are independent of any chart; keep them out of
//! the per-chart paths.

pub mod group_all;

pub use group_all::{GroupAll, GroupAllAggregator, RefreshTarget, ValueFuture};
