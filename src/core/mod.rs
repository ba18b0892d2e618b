pub mod chart;
pub mod fetch;
pub mod registry;
pub mod sampling;
pub mod sequence;
pub mod types;

pub use chart::{
    Chart, ChartCapabilities, ChartCapability, DrawFuture, DrawRequest, LegacyDrawRequest,
};
pub use fetch::{DataFetcher, FetchFuture, FetchRequest};
pub use registry::{ChartRegistry, RegistryEntry};
pub use sampling::SamplingCounter;
pub use sequence::SequenceCounters;
pub use types::{
    AggregationKey, ChartData, ChartId, DEFAULT_CHART_GROUP, Epoch, QueryId, RefreshKind,
};
