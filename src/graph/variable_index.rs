use super::{Factor, Key};
use crate::algebra::FloatT;
use indexmap::IndexMap;

/// Maps each [`Key`] to the positions of the factors touching it, within one
/// specific factor collection.
///
/// Built once from a fixed collection and read-only afterwards; any mutation
/// of the underlying collection invalidates the index and requires a rebuild.
/// Per-key factor positions are recorded in encounter order.
#[derive(Debug, Clone, Default)]
pub struct VariableIndex {
    index: IndexMap<Key, Vec<usize>>,
}

impl VariableIndex {
    /// Index a factor collection.  A factor referencing no keys is permitted
    /// and simply contributes to no key's list.
    pub fn build<T, F>(factors: &[F]) -> Self
    where
        T: FloatT,
        F: Factor<T>,
    {
        let mut index: IndexMap<Key, Vec<usize>> = IndexMap::new();
        for (pos, factor) in factors.iter().enumerate() {
            for &key in factor.keys() {
                index.entry(key).or_default().push(pos);
            }
        }
        Self { index }
    }

    /// The positions of the factors touching `key`, in encounter order.
    /// Empty for a key unknown to this index.
    pub fn lookup(&self, key: Key) -> &[usize] {
        self.index.get(&key).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Indexed keys, in first-encounter order.
    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.index.keys().copied()
    }
}
