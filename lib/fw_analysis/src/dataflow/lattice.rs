use crate::entity::Frame;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// An element of a per-analysis value lattice.
///
/// `merge` must be idempotent, commutative and associative, with
/// [`AbstractValue::bottom`] as identity and [`AbstractValue::unknown`] as
/// absorbing element.
pub trait AbstractValue: Clone + Eq + fmt::Debug + fmt::Display {
    /// The value of what was never reached.
    fn bottom() -> Self;

    /// The value carrying no information.
    fn unknown() -> Self;

    fn merge(&self, other: &Self) -> Self;

    #[inline]
    fn is_bottom(&self) -> bool {
        *self == Self::bottom()
    }

    #[inline]
    fn is_unknown(&self) -> bool {
        *self == Self::unknown()
    }
}

/// The abstract state carried along the control flow graph.
pub trait AbstractState: Clone + Eq + fmt::Display {
    fn join(&mut self, other: &Self);
}

/// Values that have a meaning for keys that were never written.
pub trait KeyedValue<K>: AbstractValue {
    fn absent(key: &K, frame: Frame) -> Self;

    /// The value of keys that were never written once an unknown callee
    /// may have overwritten every global. Must be above [`KeyedValue::absent`].
    fn absent_after_havoc(key: &K, frame: Frame) -> Self {
        Self::absent(key, frame)
    }
}

/// A mapping from keys (locations or entities) to abstract values.
///
/// Keys whose value equals their absent value are not stored, so that two
/// mappings giving the same value to every key are always equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnalysisData<K, V> {
    frame: Frame,
    havocked: bool,
    values: BTreeMap<K, V>,
}

impl<K, V> AnalysisData<K, V>
where
    K: Ord + Clone,
    V: KeyedValue<K>,
{
    #[must_use]
    pub fn new(frame: Frame) -> Self {
        Self {
            frame,
            havocked: false,
            values: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn frame(&self) -> Frame {
        self.frame
    }

    /// Returns `true` once [`AnalysisData::havoc_globals`] was applied on
    /// some path leading here.
    #[inline]
    pub fn is_havocked(&self) -> bool {
        self.havocked
    }

    fn absent(&self, key: &K) -> V {
        if self.havocked {
            V::absent_after_havoc(key, self.frame)
        } else {
            V::absent(key, self.frame)
        }
    }

    pub fn get(&self, key: &K) -> V {
        self.values
            .get(key)
            .cloned()
            .unwrap_or_else(|| self.absent(key))
    }

    /// Forgets every key whose value an unknown callee may have
    /// overwritten, that is every key with a distinct value after havoc.
    /// Keys never written afterwards read [`KeyedValue::absent_after_havoc`].
    pub fn havoc_globals(&mut self) {
        let frame = self.frame;
        self.havocked = true;
        self.values
            .retain(|key, _| V::absent_after_havoc(key, frame) == V::absent(key, frame));
    }

    /// Strong update.
    pub fn set(&mut self, key: K, value: V) {
        if value == self.absent(&key) {
            self.values.remove(&key);
        } else {
            self.values.insert(key, value);
        }
    }

    /// Weak update: the new value is merged with the current one.
    pub fn weak_set(&mut self, key: K, value: V) {
        let merged = self.get(&key).merge(&value);
        self.set(key, merged);
    }

    pub fn remove(&mut self, key: &K) {
        self.values.remove(key);
    }

    /// Iterates over explicitly written keys.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.values.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.values.keys()
    }

    pub fn retain<F: FnMut(&K, &mut V) -> bool>(&mut self, f: F) {
        self.values.retain(f);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K, V> AbstractState for AnalysisData<K, V>
where
    K: Ord + Clone + fmt::Display,
    V: KeyedValue<K>,
{
    fn join(&mut self, other: &Self) {
        let keys: BTreeSet<K> = self
            .values
            .keys()
            .chain(other.values.keys())
            .cloned()
            .collect();
        let merged: Vec<(K, V)> = keys
            .into_iter()
            .map(|key| {
                let value = self.get(&key).merge(&other.get(&key));
                (key, value)
            })
            .collect();
        self.havocked |= other.havocked;
        self.values.clear();
        for (key, value) in merged {
            self.set(key, value);
        }
    }
}

impl<K: fmt::Display, V: fmt::Display> fmt::Display for AnalysisData<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.havocked {
            writeln!(f, "<globals havocked>")?;
        }
        if self.values.is_empty() {
            return write!(f, "{{}}");
        }
        let mut first = true;
        for (key, value) in &self.values {
            if !first {
                writeln!(f)?;
            }
            first = false;
            write!(f, "{key} -> {value}")?;
        }
        Ok(())
    }
}

/// Checks the lattice laws over every combination of the given values.
#[cfg(test)]
pub(crate) fn check_lattice_laws<V: AbstractValue>(values: &[V]) {
    let bottom = V::bottom();
    let unknown = V::unknown();
    for a in values {
        assert_eq!(a.merge(a), *a, "idempotence of {a}");
        assert_eq!(a.merge(&bottom), *a, "bottom identity for {a}");
        assert_eq!(a.merge(&unknown), unknown, "unknown absorption for {a}");
        for b in values {
            assert_eq!(a.merge(b), b.merge(a), "commutativity of {a}, {b}");
            for c in values {
                assert_eq!(
                    a.merge(b).merge(c),
                    a.merge(&b.merge(c)),
                    "associativity of {a}, {b}, {c}"
                );
            }
        }
    }
}
