use indexmap::IndexMap;
use tracing::debug;

use super::{ChartId, SamplingCounter};

/// What the registry needs from a stored chart reference.
pub trait RegistryEntry: Clone {
    fn chart_id(&self) -> &ChartId;

    /// Disables sampling (and decrements `sampling`) if the chart has it on.
    fn release_sampling(&self, sampling: &SamplingCounter);
}

/// Named, ordered groups of chart references.
///
/// Registration is permissive: the same chart can be appended twice and will
/// then be visited twice per pass. Unknown groups are created on access.
#[derive(Debug)]
pub struct ChartRegistry<H> {
    groups: IndexMap<String, Vec<H>>,
}

impl<H> Default for ChartRegistry<H> {
    fn default() -> Self {
        Self {
            groups: IndexMap::new(),
        }
    }
}

impl<H: RegistryEntry> ChartRegistry<H> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, chart: H, group: &str) {
        debug!(chart = %chart.chart_id(), group, "chart registered");
        self.groups.entry(group.to_owned()).or_default().push(chart);
    }

    /// Removes the first chart of `group` whose identity is `chart`.
    ///
    /// Sampling is released before removal so the process-wide sampling
    /// count never keeps counting a chart that left the dashboard.
    pub fn deregister(
        &mut self,
        chart: &ChartId,
        group: &str,
        sampling: &SamplingCounter,
    ) -> Option<H> {
        let charts = self.groups.entry(group.to_owned()).or_default();
        let position = charts.iter().position(|entry| entry.chart_id() == chart)?;
        charts[position].release_sampling(sampling);
        let removed = charts.remove(position);
        debug!(chart = %chart, group, "chart deregistered");
        Some(removed)
    }

    /// Live view of one group; empty for groups never touched.
    #[must_use]
    pub fn list(&self, group: &str) -> &[H] {
        self.groups.get(group).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn has(&self, chart: &ChartId) -> bool {
        self.groups
            .values()
            .any(|charts| charts.iter().any(|entry| entry.chart_id() == chart))
    }

    /// Clears one group, or every group when `group` is `None`.
    pub fn clear(&mut self, group: Option<&str>) {
        match group {
            Some(group) => {
                self.groups.shift_remove(group);
            }
            None => self.groups.clear(),
        }
    }

    #[must_use]
    pub fn len(&self, group: &str) -> usize {
        self.list(group).len()
    }

    #[must_use]
    pub fn group_names(&self) -> Vec<&str> {
        self.groups.keys().map(String::as_str).collect()
    }
}
