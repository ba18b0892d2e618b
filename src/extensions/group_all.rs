use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::{LocalBoxFuture, join_all, ready};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::AggregationKey;
use crate::error::{ChartError, ChartResult};

pub type ValueFuture = LocalBoxFuture<'static, ChartResult<f64>>;

/// Dashboard-wide unfiltered total computed independently of any chart.
pub trait GroupAll {
    fn key(&self) -> AggregationKey;

    fn value_async(&self) -> ValueFuture;
}

/// Which group-all entries a refresh recomputes.
#[derive(Clone)]
pub enum RefreshTarget {
    All,
    Key(AggregationKey),
    Aggregation(Rc<dyn GroupAll>),
}

impl RefreshTarget {
    /// Interprets an untyped selector: `null` selects every entry, a number
    /// or string selects by key, an object selects by its `key` field.
    pub fn from_json(selector: &Value) -> ChartResult<Self> {
        match selector {
            Value::Null => Ok(Self::All),
            Value::Number(number) => number
                .as_u64()
                .map(|id| Self::Key(AggregationKey::Id(id)))
                .ok_or_else(|| ChartError::InvalidRefreshTarget(selector.to_string())),
            Value::String(name) => Ok(Self::Key(AggregationKey::Name(name.clone()))),
            Value::Object(fields) => match fields.get("key") {
                Some(key @ (Value::Number(_) | Value::String(_))) => Self::from_json(key),
                _ => Err(ChartError::InvalidRefreshTarget(selector.to_string())),
            },
            Value::Bool(_) | Value::Array(_) => {
                Err(ChartError::InvalidRefreshTarget(selector.to_string()))
            }
        }
    }
}

impl fmt::Debug for RefreshTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("All"),
            Self::Key(key) => f.debug_tuple("Key").field(key).finish(),
            Self::Aggregation(aggregation) => f
                .debug_tuple("Aggregation")
                .field(&aggregation.key())
                .finish(),
        }
    }
}

impl From<AggregationKey> for RefreshTarget {
    fn from(value: AggregationKey) -> Self {
        Self::Key(value)
    }
}

impl From<Rc<dyn GroupAll>> for RefreshTarget {
    fn from(value: Rc<dyn GroupAll>) -> Self {
        Self::Aggregation(value)
    }
}

struct GroupAllEntry {
    aggregation: Rc<dyn GroupAll>,
    last_value: Option<f64>,
}

type EntryMap = IndexMap<AggregationKey, GroupAllEntry>;

/// Registry of group-all aggregations and their last computed values.
///
/// Cloning yields another handle onto the same entries, which lets refresh
/// futures outlive the borrow that started them.
#[derive(Clone, Default)]
pub struct GroupAllAggregator {
    entries: Rc<RefCell<EntryMap>>,
}

impl fmt::Debug for GroupAllAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.borrow();
        f.debug_map()
            .entries(entries.iter().map(|(key, entry)| (key, entry.last_value)))
            .finish()
    }
}

impl GroupAllAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `aggregation` under `key` unless an entry already exists, and
    /// returns whichever aggregation is now stored there.
    pub fn register_or_get(
        &self,
        key: AggregationKey,
        aggregation: Rc<dyn GroupAll>,
    ) -> Rc<dyn GroupAll> {
        let mut entries = self.entries.borrow_mut();
        let entry = entries.entry(key).or_insert_with_key(|key| {
            debug!(key = %key, "group-all aggregation registered");
            GroupAllEntry {
                aggregation,
                last_value: None,
            }
        });
        Rc::clone(&entry.aggregation)
    }

    /// The single registered aggregation, `None` when empty.
    ///
    /// With several entries there is no canonical one, so the caller must
    /// select by key instead.
    pub fn get(&self) -> ChartResult<Option<Rc<dyn GroupAll>>> {
        let entries = self.entries.borrow();
        match entries.len() {
            0 => Ok(None),
            1 => Ok(entries
                .values()
                .next()
                .map(|entry| Rc::clone(&entry.aggregation))),
            count => Err(ChartError::AmbiguousGroupAll { count }),
        }
    }

    #[must_use]
    pub fn get_by_key(&self, key: &AggregationKey) -> Option<Rc<dyn GroupAll>> {
        self.entries
            .borrow()
            .get(key)
            .map(|entry| Rc::clone(&entry.aggregation))
    }

    /// Last cached value, `None` until a refresh stored one.
    #[must_use]
    pub fn last_value(&self, key: &AggregationKey) -> Option<f64> {
        self.entries
            .borrow()
            .get(key)
            .and_then(|entry| entry.last_value)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn keys(&self) -> Vec<AggregationKey> {
        self.entries.borrow().keys().cloned().collect()
    }

    pub(crate) fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    /// Recomputes the selected entries concurrently and caches each result.
    ///
    /// Errors (including an unknown key) are reported through the returned
    /// future. Successful values are stored even when a sibling fails.
    pub fn refresh_async(
        &self,
        target: impl Into<RefreshTarget>,
    ) -> LocalBoxFuture<'static, ChartResult<()>> {
        let selected = match self.select(target.into()) {
            Ok(selected) => selected,
            Err(err) => return ready(Err(err)).boxed_local(),
        };

        let pending: Vec<_> = selected
            .into_iter()
            .map(|(key, aggregation)| {
                let value = aggregation.value_async();
                async move { (key, value.await) }
            })
            .collect();

        let entries = Rc::clone(&self.entries);
        async move {
            let settled = join_all(pending).await;
            let mut first_error = None;
            let mut entries = entries.borrow_mut();
            for (key, result) in settled {
                match result {
                    Ok(value) => {
                        if let Some(entry) = entries.get_mut(&key) {
                            entry.last_value = Some(value);
                        }
                    }
                    Err(err) => {
                        warn!(key = %key, error = %err, "group-all refresh failed");
                        first_error.get_or_insert(err);
                    }
                }
            }
            first_error.map_or(Ok(()), Err)
        }
        .boxed_local()
    }

    /// [`Self::refresh_async`] driven by an untyped selector.
    pub fn refresh_selector_async(
        &self,
        selector: &Value,
    ) -> LocalBoxFuture<'static, ChartResult<()>> {
        match RefreshTarget::from_json(selector) {
            Ok(target) => self.refresh_async(target),
            Err(err) => ready(Err(err)).boxed_local(),
        }
    }

    fn select(
        &self,
        target: RefreshTarget,
    ) -> ChartResult<Vec<(AggregationKey, Rc<dyn GroupAll>)>> {
        let entries = self.entries.borrow();
        let key = match target {
            RefreshTarget::All => {
                return Ok(entries
                    .iter()
                    .map(|(key, entry)| (key.clone(), Rc::clone(&entry.aggregation)))
                    .collect());
            }
            RefreshTarget::Key(key) => key,
            RefreshTarget::Aggregation(aggregation) => aggregation.key(),
        };
        let entry = entries
            .get(&key)
            .ok_or_else(|| ChartError::UnknownAggregation(key.clone()))?;
        Ok(vec![(key, Rc::clone(&entry.aggregation))])
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use futures::FutureExt;
    use futures::executor::block_on;
    use futures::future::ready;
    use serde_json::json;

    use super::{GroupAll, GroupAllAggregator, RefreshTarget, ValueFuture};
    use crate::core::AggregationKey;
    use crate::error::ChartError;

    struct FixedTotal {
        key: u64,
        value: f64,
    }

    impl GroupAll for FixedTotal {
        fn key(&self) -> AggregationKey {
            AggregationKey::Id(self.key)
        }

        fn value_async(&self) -> ValueFuture {
            ready(Ok(self.value)).boxed_local()
        }
    }

    fn fixed(key: u64, value: f64) -> Rc<dyn GroupAll> {
        Rc::new(FixedTotal { key, value })
    }

    #[test]
    fn register_or_get_keeps_first_registration() {
        let aggregator = GroupAllAggregator::new();
        aggregator.register_or_get(AggregationKey::Id(7), fixed(7, 1.0));
        let stored = aggregator.register_or_get(AggregationKey::Id(7), fixed(7, 2.0));

        let value = block_on(stored.value_async()).expect("fixed total");
        assert_eq!(value, 1.0);
        assert_eq!(aggregator.len(), 1);
    }

    #[test]
    fn get_is_ambiguous_with_several_entries() {
        let aggregator = GroupAllAggregator::new();
        assert!(aggregator.get().expect("empty is fine").is_none());

        aggregator.register_or_get(AggregationKey::Id(1), fixed(1, 1.0));
        assert!(aggregator.get().expect("single entry").is_some());

        aggregator.register_or_get(AggregationKey::Id(2), fixed(2, 2.0));
        assert_eq!(
            aggregator.get().err(),
            Some(ChartError::AmbiguousGroupAll { count: 2 })
        );
    }

    #[test]
    fn selector_shapes() {
        assert!(matches!(
            RefreshTarget::from_json(&json!(null)),
            Ok(RefreshTarget::All)
        ));
        assert!(matches!(
            RefreshTarget::from_json(&json!(42)),
            Ok(RefreshTarget::Key(AggregationKey::Id(42)))
        ));
        assert!(matches!(
            RefreshTarget::from_json(&json!({ "key": "crossfilter-a" })),
            Ok(RefreshTarget::Key(AggregationKey::Name(_)))
        ));
        assert!(matches!(
            RefreshTarget::from_json(&json!([1, 2])),
            Err(ChartError::InvalidRefreshTarget(_))
        ));
        assert!(matches!(
            RefreshTarget::from_json(&json!(-1.5)),
            Err(ChartError::InvalidRefreshTarget(_))
        ));
    }

    #[test]
    fn refresh_single_key_leaves_others_uncomputed() {
        let aggregator = GroupAllAggregator::new();
        aggregator.register_or_get(AggregationKey::Id(1), fixed(1, 10.0));
        aggregator.register_or_get(AggregationKey::Id(2), fixed(2, 20.0));

        block_on(aggregator.refresh_async(AggregationKey::Id(2))).expect("refresh key 2");
        assert_eq!(aggregator.last_value(&AggregationKey::Id(1)), None);
        assert_eq!(aggregator.last_value(&AggregationKey::Id(2)), Some(20.0));
    }
}
