//! Named output arrays reused across reads of the same shape.

use std::collections::{BTreeMap, BTreeSet};

use ndarray::{Array, Dimension};
use serde::Serialize;

/// Counters describing how often buffers were reused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BufferStats {
    /// Reads that kept the existing allocation.
    pub reuses: u64,
    /// Reads that allocated fresh zeroed arrays.
    pub allocations: u64,
    /// Arrays currently held.
    pub entries: usize,
}

impl BufferStats {
    /// Fraction of reads served from existing buffers (0.0 - 1.0).
    pub fn reuse_rate(&self) -> f64 {
        let total = self.reuses + self.allocations;
        if total == 0 {
            0.0
        } else {
            self.reuses as f64 / total as f64
        }
    }
}

/// Set of named arrays sharing one shape.
///
/// When a read asks for a different shape, or reuse is disabled, every held
/// array is dropped and the requested ones are allocated zeroed. Otherwise
/// requested arrays keep their allocation, arrays not requested are dropped
/// and missing names are allocated. After `prepare` the set holds exactly
/// the requested names.
#[derive(Debug)]
pub struct FieldBuffers<A, D: Dimension> {
    shape: Option<D>,
    arrays: BTreeMap<String, Array<A, D>>,
    reuse: bool,
    stats: BufferStats,
}

impl<A: Clone + Default, D: Dimension> FieldBuffers<A, D> {
    pub fn new(reuse: bool) -> Self {
        Self {
            shape: None,
            arrays: BTreeMap::new(),
            reuse,
            stats: BufferStats::default(),
        }
    }

    /// Make sure an array of `shape` exists for each of `names`.
    ///
    /// Returns `true` when the held arrays were discarded.
    pub fn prepare<'n>(&mut self, shape: D, names: impl IntoIterator<Item = &'n str>) -> bool {
        let names: BTreeSet<&str> = names.into_iter().collect();
        let reset = !self.reuse || self.shape.as_ref() != Some(&shape);
        if reset {
            self.arrays.clear();
            self.shape = Some(shape.clone());
            self.stats.allocations += 1;
        } else {
            // unrequested arrays would still hold the previous read
            self.arrays.retain(|name, _| names.contains(name.as_str()));
            self.stats.reuses += 1;
        }

        for name in names {
            if !self.arrays.contains_key(name) {
                self.arrays
                    .insert(name.to_string(), Array::from_elem(shape.clone(), A::default()));
            }
        }
        self.stats.entries = self.arrays.len();
        reset
    }

    pub fn get(&self, name: &str) -> Option<&Array<A, D>> {
        self.arrays.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Array<A, D>> {
        self.arrays.get_mut(name)
    }

    /// Take an array out of the set, leaving the others in place.
    pub fn take(&mut self, name: &str) -> Option<Array<A, D>> {
        let taken = self.arrays.remove(name);
        self.stats.entries = self.arrays.len();
        taken
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Array<A, D>)> {
        self.arrays.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Array<A, D>)> {
        self.arrays.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.arrays.keys().map(|k| k.as_str())
    }

    pub fn shape(&self) -> Option<&D> {
        self.shape.as_ref()
    }

    pub fn stats(&self) -> BufferStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    pub fn clear(&mut self) {
        self.arrays.clear();
        self.shape = None;
        self.stats.entries = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Ix2, Ix3};

    #[test]
    fn test_reuse_same_shape() {
        let mut buffers: FieldBuffers<f32, Ix3> = FieldBuffers::new(true);
        assert!(buffers.prepare(Ix3(2, 3, 4), ["ro"]));
        buffers.get_mut("ro").unwrap().fill(7.0);

        assert!(!buffers.prepare(Ix3(2, 3, 4), ["ro", "vx"]));
        assert_eq!(buffers.get("ro").unwrap()[[1, 2, 3]], 7.0);
        assert_eq!(buffers.get("vx").unwrap()[[1, 2, 3]], 0.0);

        let stats = buffers.stats();
        assert_eq!(stats.allocations, 1);
        assert_eq!(stats.reuses, 1);
        assert_eq!(stats.entries, 2);
        assert!((stats.reuse_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reuse_drops_unrequested_names() {
        let mut buffers: FieldBuffers<f32, Ix2> = FieldBuffers::new(true);
        buffers.prepare(Ix2(2, 2), ["ro", "vx"]);
        buffers.get_mut("vx").unwrap().fill(3.0);

        assert!(!buffers.prepare(Ix2(2, 2), ["vx", "se"]));
        assert!(buffers.get("ro").is_none());
        assert_eq!(buffers.get("vx").unwrap()[[1, 1]], 3.0);
        assert_eq!(buffers.names().collect::<Vec<_>>(), vec!["se", "vx"]);
        assert_eq!(buffers.stats().entries, 2);
    }

    #[test]
    fn test_shape_change_discards_arrays() {
        let mut buffers: FieldBuffers<f32, Ix2> = FieldBuffers::new(true);
        buffers.prepare(Ix2(2, 2), ["ro", "vx"]);
        buffers.get_mut("ro").unwrap().fill(1.0);

        assert!(buffers.prepare(Ix2(3, 2), ["ro"]));
        assert_eq!(buffers.len(), 1);
        assert!(buffers.get("ro").unwrap().iter().all(|&v| v == 0.0));
        assert_eq!(buffers.shape(), Some(&Ix2(3, 2)));
    }

    #[test]
    fn test_reuse_disabled() {
        let mut buffers: FieldBuffers<f64, Ix2> = FieldBuffers::new(false);
        buffers.prepare(Ix2(2, 2), ["ro"]);
        buffers.get_mut("ro").unwrap().fill(1.0);
        assert!(buffers.prepare(Ix2(2, 2), ["ro"]));
        assert_eq!(buffers.get("ro").unwrap()[[0, 0]], 0.0);
    }

    #[test]
    fn test_take_and_clear() {
        let mut buffers: FieldBuffers<f32, Ix2> = FieldBuffers::new(true);
        buffers.prepare(Ix2(1, 1), ["a", "b"]);
        assert!(buffers.take("a").is_some());
        assert_eq!(buffers.names().collect::<Vec<_>>(), vec!["b"]);
        buffers.clear();
        assert!(buffers.is_empty());
        assert!(buffers.shape().is_none());
    }
}
