//! Math transforms: the numeric functions that coordinate operations wrap.

pub mod concat;
pub mod factory;
pub mod geocentric;
pub mod linear;
pub mod molodensky;
pub mod parameters;
pub mod pass_through;
pub mod provider;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::affine::Matrix;
use crate::error::TransformError;

pub use factory::MathTransformFactory;
pub use parameters::{ParameterDescriptor, ParameterValueGroup};

/// A function from `source_dimensions()` ordinates to `target_dimensions()` ordinates.
pub trait MathTransform: fmt::Debug + Send + Sync + Any {
    fn source_dimensions(&self) -> usize;

    fn target_dimensions(&self) -> usize;

    /// Transform one point. Slice lengths must match the dimensions.
    fn transform_point(&self, src: &[f64], dst: &mut [f64]) -> Result<(), TransformError>;

    /// Transform a flat buffer of consecutive points.
    fn transform_points(&self, src: &[f64]) -> Result<Vec<f64>, TransformError> {
        let src_dim = self.source_dimensions();
        let tgt_dim = self.target_dimensions();
        if src_dim == 0 || src.len() % src_dim != 0 {
            return Err(TransformError::DimensionMismatch {
                expected: src_dim,
                found: src.len(),
            });
        }
        let count = src.len() / src_dim;
        let mut out = vec![0.0; count * tgt_dim];
        for (point, dst) in src.chunks_exact(src_dim).zip(out.chunks_exact_mut(tgt_dim)) {
            self.transform_point(point, dst)?;
        }
        Ok(out)
    }

    fn inverse(&self) -> Result<Arc<dyn MathTransform>, TransformError>;

    /// The matrix of a linear transform, `None` for everything else.
    fn matrix(&self) -> Option<Matrix> {
        None
    }

    fn is_identity(&self) -> bool {
        self.matrix().is_some_and(|m| m.is_identity())
    }

    fn as_any(&self) -> &dyn Any;

    /// Value equality with another transform.
    fn equals(&self, other: &dyn MathTransform) -> bool;
}

/// `equals` for transforms that implement `PartialEq`.
pub(crate) fn downcast_eq<T: MathTransform + PartialEq>(this: &T, other: &dyn MathTransform) -> bool {
    other
        .as_any()
        .downcast_ref::<T>()
        .is_some_and(|o| this == o)
}

pub(crate) fn check_dimensions(
    transform: &dyn MathTransform,
    src: &[f64],
    dst: &[f64],
) -> Result<(), TransformError> {
    if src.len() != transform.source_dimensions() {
        return Err(TransformError::DimensionMismatch {
            expected: transform.source_dimensions(),
            found: src.len(),
        });
    }
    if dst.len() != transform.target_dimensions() {
        return Err(TransformError::DimensionMismatch {
            expected: transform.target_dimensions(),
            found: dst.len(),
        });
    }
    Ok(())
}

/// Same allocation, or equal by value.
pub fn transforms_equal(a: &Arc<dyn MathTransform>, b: &Arc<dyn MathTransform>) -> bool {
    Arc::ptr_eq(a, b) || a.equals(b.as_ref())
}
