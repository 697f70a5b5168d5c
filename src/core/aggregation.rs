use serde::Serialize;
use std::borrow::Borrow;
use std::collections::BTreeMap;

/// Running count per derived key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AggregationState<K: Ord = String> {
    counts: BTreeMap<K, usize>,
}

impl<K: Ord> AggregationState<K> {
    pub fn new() -> Self {
        Self {
            counts: BTreeMap::new(),
        }
    }

    /// Returns the count after the increment.
    pub fn increment(&mut self, key: K) -> usize {
        let count = self.counts.entry(key).or_insert(0);
        *count += 1;
        *count
    }

    pub fn get<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, usize)> {
        self.counts.iter().map(|(k, c)| (k, *c))
    }

    /// The `n` largest counts; ties keep key order.
    pub fn most_common(&self, n: usize) -> Vec<(&K, usize)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries.truncate(n);
        entries
    }

    pub fn into_inner(self) -> BTreeMap<K, usize> {
        self.counts
    }
}

impl<K: Ord> Default for AggregationState<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_and_get() {
        let mut state = AggregationState::new();
        assert_eq!(state.increment("gmail.com".to_string()), 1);
        assert_eq!(state.increment("gmail.com".to_string()), 2);
        state.increment("example.org".to_string());

        assert_eq!(state.get("gmail.com"), 2);
        assert_eq!(state.get("missing.net"), 0);
        assert_eq!(state.len(), 2);
        assert_eq!(state.total(), 3);
    }

    #[test]
    fn test_most_common_orders_by_count_then_key() {
        let mut state: AggregationState<u32> = AggregationState::default();
        for month in [6, 6, 3, 9, 9, 1] {
            state.increment(month);
        }

        assert_eq!(state.most_common(3), vec![(&6, 2), (&9, 2), (&1, 1)]);
        assert_eq!(state.most_common(10).len(), 4);
    }
}
