//! The coordinate operation factory.
//!
//! Given a source and a target CRS, finds the operation converting
//! coordinates from one to the other. Requests go through an optional
//! authority first, then through a dispatch on the pair of CRS kinds that
//! builds the operation from simpler steps. Results are cached per request and
//! interned by value.

mod authority;
mod cache;
mod compound;
mod concat;
pub mod config;
mod datum_shift;
mod steps;

use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::OperationError;
use crate::operation::{CoordinateOperation, OperationKind, IDENTITY};
use crate::referencing::Crs;
use crate::transform::MathTransformFactory;

pub use authority::OperationAuthority;
pub use config::{DatumShiftMethod, FactoryConfig, GEOCENTRIC_TRANSLATIONS};

use authority::Context;
use cache::{OperationCache, OperationKey, OperationPool};

/// Finds coordinate operations between CRS. Cheap to share: `Send + Sync`,
/// all mutable state is internal.
pub struct CoordinateOperationFactory {
    config: FactoryConfig,
    transforms: MathTransformFactory,
    authority: Option<Arc<dyn OperationAuthority>>,
    cache: Option<OperationCache>,
    pool: OperationPool,
}

impl Default for CoordinateOperationFactory {
    fn default() -> Self {
        Self::new(FactoryConfig::default())
    }
}

impl std::fmt::Debug for CoordinateOperationFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinateOperationFactory")
            .field("config", &self.config)
            .field("authority", &self.authority.is_some())
            .field("cached", &self.cache.as_ref().map_or(0, |c| c.len()))
            .field("pooled", &self.pool.len())
            .finish()
    }
}

impl CoordinateOperationFactory {
    pub fn new(config: FactoryConfig) -> Self {
        let cache = (config.cache_capacity > 0).then(|| OperationCache::new(config.cache_capacity));
        let pool = OperationPool::new(config.pool_capacity);
        Self {
            config,
            transforms: MathTransformFactory::default(),
            authority: None,
            cache,
            pool,
        }
    }

    #[must_use]
    pub fn with_authority(mut self, authority: Arc<dyn OperationAuthority>) -> Self {
        self.authority = Some(authority);
        self
    }

    /// Replaces the math transform factory, for instance one with extra
    /// providers registered.
    #[must_use]
    pub fn with_transforms(mut self, transforms: MathTransformFactory) -> Self {
        self.transforms = transforms;
        self
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    pub fn transforms(&self) -> &MathTransformFactory {
        &self.transforms
    }

    /// The operation from `source` to `target`.
    ///
    /// Value-equal requests return the same `Arc` while it stays cached.
    ///
    /// # Errors
    /// [`OperationError::OperationNotFound`] when no path exists, with the
    /// failure that ruled out the last candidate as its source.
    pub fn create_operation(
        &self,
        source: &Arc<Crs>,
        target: &Arc<Crs>,
    ) -> Result<Arc<CoordinateOperation>, OperationError> {
        self.cached(OperationKey::new(source, target, None))
    }

    /// Like [`create_operation`](Self::create_operation) with an explicit
    /// method. A datum-shift method name (`Molodensky`, `Abridged_Molodensky`,
    /// `Geocentric_Translations` or their EPSG codes) selects how datums are
    /// shifted for this request; any other name must be the method of one of
    /// the resulting steps.
    pub fn create_operation_with_method(
        &self,
        source: &Arc<Crs>,
        target: &Arc<Crs>,
        method: &str,
    ) -> Result<Arc<CoordinateOperation>, OperationError> {
        self.cached(OperationKey::new(source, target, Some(method)))
    }

    /// Forgets the cached operations from `source` to `target`, whatever
    /// method they were requested with.
    pub fn evict(&self, source: &Crs, target: &Crs) {
        if let Some(cache) = &self.cache {
            cache.retain(|key, _| !key.is_pair(source, target));
        }
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
        self.pool.clear();
    }

    fn cached(&self, key: OperationKey) -> Result<Arc<CoordinateOperation>, OperationError> {
        let Some(cache) = &self.cache else {
            return self.compute(&key);
        };
        cache.get_or_insert_with(&key, || {
            debug!(source = key.source.name(), target = key.target.name(), "operation cache miss");
            self.compute(&key)
        })
    }

    fn compute(&self, key: &OperationKey) -> Result<Arc<CoordinateOperation>, OperationError> {
        let method = key.method.as_deref();
        let shift_method = method.and_then(DatumShiftMethod::from_method_name);
        let mut ctx = Context::new(&self.config, shift_method);
        let op = self.create_in(&mut ctx, &key.source, &key.target)?;
        if let (Some(name), None) = (method, shift_method) {
            let uses_method = op
                .single_operations()
                .iter()
                .any(|step| step.method().is_some_and(|m| m.matches(name)));
            if !uses_method {
                return Err(OperationError::not_found(format!(
                    "no operation from \"{}\" to \"{}\" uses method \"{name}\"",
                    key.source.name(),
                    key.target.name()
                )));
            }
        }
        Ok(self.pool.intern(op))
    }

    /// One step of a request. Recursive steps share `ctx`.
    pub(crate) fn create_in(
        &self,
        ctx: &mut Context,
        source: &Arc<Crs>,
        target: &Arc<Crs>,
    ) -> Result<Arc<CoordinateOperation>, OperationError> {
        if source.equals_ignore_metadata(target) {
            trace!(crs = source.name(), "identity");
            return Ok(Arc::new(CoordinateOperation::new(
                IDENTITY,
                Arc::clone(source),
                Arc::clone(target),
                self.transforms.identity(source.dimension()),
                OperationKind::Conversion,
            )?));
        }
        let op = match self.from_authority(ctx, source, target) {
            Some(op) => op,
            None => self.dispatch(ctx, source, target)?,
        };
        let (source_dim, target_dim) = (op.transform().source_dimensions(), op.transform().target_dimensions());
        if source_dim != source.dimension() {
            return Err(OperationError::DimensionMismatch {
                expected: source.dimension(),
                found: source_dim,
            });
        }
        if target_dim != target.dimension() {
            return Err(OperationError::DimensionMismatch {
                expected: target.dimension(),
                found: target_dim,
            });
        }
        Ok(op)
    }

    fn dispatch(
        &self,
        ctx: &mut Context,
        source: &Arc<Crs>,
        target: &Arc<Crs>,
    ) -> Result<Arc<CoordinateOperation>, OperationError> {
        debug!(source = source.name(), target = target.name(), "searching operation");
        match (source.as_ref(), target.as_ref()) {
            (Crs::Compound(_), _) | (_, Crs::Compound(_)) => self.compound_operation(ctx, source, target),
            (Crs::Geographic(s), Crs::Geographic(t)) => {
                self.geographic_to_geographic(ctx, source, s, target, t)
            }
            (Crs::Geographic(_), Crs::Projected(_)) => self.to_derived(ctx, source, target),
            (Crs::Geographic(s), Crs::Geocentric(t)) => {
                self.geographic_to_geocentric(ctx, source, s, target, t)
            }
            (Crs::Geographic(s), Crs::Vertical(t)) => self.geographic_to_vertical(source, s, target, t),
            (Crs::Projected(_), Crs::Projected(_)) => self.to_derived(ctx, source, target),
            (Crs::Projected(_), Crs::Geographic(_)) => self.from_derived(ctx, source, target),
            (Crs::Geocentric(s), Crs::Geocentric(t)) => {
                self.geocentric_to_geocentric(ctx, source, s, target, t)
            }
            (Crs::Geocentric(s), Crs::Geographic(t)) => {
                self.geocentric_to_geographic(ctx, source, s, target, t)
            }
            (Crs::Vertical(s), Crs::Vertical(t)) => self.vertical_to_vertical(ctx, source, s, target, t),
            (Crs::Temporal(s), Crs::Temporal(t)) => self.temporal_to_temporal(source, s, target, t),
            (_, Crs::Projected(_) | Crs::Derived(_)) => self.to_derived(ctx, source, target),
            (Crs::Projected(_) | Crs::Derived(_), _) => self.from_derived(ctx, source, target),
            (Crs::Engineering(_), _) | (_, Crs::Engineering(_))
                if source.dimension() == target.dimension() =>
            {
                self.engineering(source, target)
            }
            _ => Err(OperationError::not_found(format!(
                "no operation from \"{}\" to \"{}\"",
                source.name(),
                target.name()
            ))),
        }
    }
}
