//! Memoization of factory results.
//!
//! Two layers: a bounded [`quick_cache`] keyed by the request, which lets only
//! one thread compute a given key while the others wait on it, and an
//! interning pool that hands out one shared instance per distinct operation
//! value regardless of how it was requested.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::trace;

use crate::operation::CoordinateOperation;
use crate::referencing::Crs;

pub(crate) type OperationCache = quick_cache::sync::Cache<OperationKey, Arc<CoordinateOperation>>;

/// A request: source, target and the explicitly asked-for method, if any.
#[derive(Clone, Debug)]
pub(crate) struct OperationKey {
    pub source: Arc<Crs>,
    pub target: Arc<Crs>,
    pub method: Option<String>,
}

impl OperationKey {
    pub fn new(source: &Arc<Crs>, target: &Arc<Crs>, method: Option<&str>) -> Self {
        Self {
            source: Arc::clone(source),
            target: Arc::clone(target),
            method: method.map(str::to_owned),
        }
    }

    /// True for the given pair under any method.
    pub fn is_pair(&self, source: &Crs, target: &Crs) -> bool {
        self.source.as_ref() == source && self.target.as_ref() == target
    }
}

impl PartialEq for OperationKey {
    fn eq(&self, other: &Self) -> bool {
        let same = |a: &Arc<Crs>, b: &Arc<Crs>| Arc::ptr_eq(a, b) || a == b;
        same(&self.source, &other.source)
            && same(&self.target, &other.target)
            && self.method == other.method
    }
}

// CRS values contain floats, but none built by this crate holds a NaN.
impl Eq for OperationKey {}

impl Hash for OperationKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.fingerprint(state);
        self.target.fingerprint(state);
        self.method.hash(state);
    }
}

/// Value-interned operations, bucketed by fingerprint.
#[derive(Debug)]
pub(crate) struct OperationPool {
    buckets: DashMap<u64, Vec<Arc<CoordinateOperation>>>,
    len: AtomicUsize,
    capacity: usize,
}

impl OperationPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            buckets: DashMap::new(),
            len: AtomicUsize::new(0),
            capacity,
        }
    }

    /// The pooled instance equal to `op` ignoring names, inserting `op` when
    /// there is none.
    pub fn intern(&self, op: Arc<CoordinateOperation>) -> Arc<CoordinateOperation> {
        let mut hasher = DefaultHasher::new();
        op.fingerprint(&mut hasher);
        let interned = {
            let mut bucket = self.buckets.entry(hasher.finish()).or_default();
            match bucket.iter().find(|pooled| pooled.equals_ignore_metadata(&op)) {
                Some(pooled) => Arc::clone(pooled),
                None => {
                    bucket.push(Arc::clone(&op));
                    self.len.fetch_add(1, Ordering::Relaxed);
                    op
                }
            }
        };
        if self.len.load(Ordering::Relaxed) > self.capacity {
            self.sweep();
        }
        interned
    }

    /// Drops the operations nothing outside the pool refers to.
    fn sweep(&self) {
        self.buckets.retain(|_, bucket| {
            bucket.retain(|op| Arc::strong_count(op) > 1);
            !bucket.is_empty()
        });
        let len = self.buckets.iter().map(|bucket| bucket.len()).sum();
        self.len.store(len, Ordering::Relaxed);
        trace!(len, capacity = self.capacity, "swept operation pool");
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.buckets.clear();
        self.len.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{OperationKind, AXIS_CHANGES};
    use crate::referencing::{CoordinateSystem, GeodeticDatum, Unit};
    use crate::transform::MathTransformFactory;

    fn swap_operation(name: &str) -> Arc<CoordinateOperation> {
        let transforms = MathTransformFactory::default();
        let lon_lat = Arc::new(Crs::geographic(
            name,
            GeodeticDatum::wgs84(),
            CoordinateSystem::ellipsoidal_2d(Unit::DEGREE),
        ));
        let lat_lon = Arc::new(Crs::geographic(
            name,
            GeodeticDatum::wgs84(),
            CoordinateSystem::ellipsoidal_2d_lat_lon(Unit::DEGREE),
        ));
        let matrix = CoordinateSystem::ellipsoidal_2d(Unit::DEGREE)
            .swap_and_scale(&CoordinateSystem::ellipsoidal_2d_lat_lon(Unit::DEGREE))
            .unwrap();
        Arc::new(
            CoordinateOperation::new(
                AXIS_CHANGES,
                lon_lat,
                lat_lon,
                transforms.affine(matrix),
                OperationKind::Conversion,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_key_equality_follows_crs_values() {
        let a = Arc::new(Crs::wgs84());
        let b = Arc::new(Crs::wgs84());
        let key = OperationKey::new(&a, &b, None);
        assert_eq!(key, OperationKey::new(&b, &a, None));
        assert_ne!(key, OperationKey::new(&a, &b, Some("Molodensky")));
        assert!(key.is_pair(&Crs::wgs84(), &Crs::wgs84()));
    }

    #[test]
    fn test_intern_returns_first_equal_instance() {
        let pool = OperationPool::new(16);
        let first = pool.intern(swap_operation("one"));
        let second = pool.intern(swap_operation("two"));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_intern_keeps_distinct_accuracies() {
        let pool = OperationPool::new(16);
        let coarse = pool.intern(Arc::new((*swap_operation("one")).clone().with_accuracy(25.0)));
        let fine = pool.intern(Arc::new((*swap_operation("two")).clone().with_accuracy(1.0)));
        assert!(!Arc::ptr_eq(&coarse, &fine));
        assert_eq!(fine.accuracy(), Some(1.0));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_sweep_drops_unreferenced() {
        let pool = OperationPool::new(0);
        let kept = pool.intern(swap_operation("kept"));
        assert_eq!(pool.len(), 1);
        drop(kept);
        let transforms = MathTransformFactory::default();
        let crs = Arc::new(Crs::wgs84());
        let other = Arc::new(
            CoordinateOperation::new(
                "other",
                Arc::clone(&crs),
                crs,
                transforms.identity(2),
                OperationKind::Conversion,
            )
            .unwrap(),
        );
        let _held = pool.intern(other);
        assert_eq!(pool.len(), 1);
        pool.clear();
        assert_eq!(pool.len(), 0);
    }
}
