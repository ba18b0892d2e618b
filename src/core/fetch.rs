use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::ChartResult;

use super::{ChartData, ChartId, QueryId};

pub type FetchFuture = LocalBoxFuture<'static, ChartResult<ChartData>>;

/// What a chart asks its backend for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub chart: ChartId,
    pub query_id: QueryId,
}

/// Pluggable asynchronous data source of one chart.
///
/// The fetch is issued when `fetch` is called; the returned future only
/// carries its completion.
pub trait DataFetcher {
    fn fetch(&self, request: &FetchRequest) -> FetchFuture;
}

impl<F> DataFetcher for F
where
    F: Fn(&FetchRequest) -> FetchFuture,
{
    fn fetch(&self, request: &FetchRequest) -> FetchFuture {
        self(request)
    }
}
