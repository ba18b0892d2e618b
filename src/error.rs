use thiserror::Error;

use crate::core::{AggregationKey, ChartId};

pub type ChartResult<T> = Result<T, ChartError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChartError {
    #[error("data fetch failed for chart `{chart}`: {message}")]
    FetchFailed { chart: ChartId, message: String },

    #[error("draw callback failed for chart `{chart}`: {message}")]
    DrawFailed { chart: ChartId, message: String },

    #[error("commit handler failed for chart `{chart}`: {message}")]
    CommitFailed { chart: ChartId, message: String },

    #[error("group-all aggregation refresh failed for `{key}`: {message}")]
    AggregationFailed { key: AggregationKey, message: String },

    #[error("no group-all aggregation registered under `{0}`")]
    UnknownAggregation(AggregationKey),

    #[error(
        "invalid refresh target {0}: expected nothing, an aggregation key (number or string) \
         or an aggregation object carrying a `key`"
    )]
    InvalidRefreshTarget(String),

    #[error("{count} group-all aggregations are registered; select one by key")]
    AmbiguousGroupAll { count: usize },

    #[error("chart `{0}` is detached from its refresh state")]
    Detached(ChartId),

    #[error("invalid refresh config: {0}")]
    InvalidConfig(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}
