use std::any::Any;
use std::sync::Arc;

use crate::affine::Matrix;
use crate::error::TransformError;
use crate::transform::{check_dimensions, downcast_eq, MathTransform};

/// A transform backed by an affine matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearTransform {
    matrix: Matrix,
}

impl LinearTransform {
    pub fn new(matrix: Matrix) -> Self {
        Self { matrix }
    }

    pub fn identity(dimension: usize) -> Self {
        Self::new(Matrix::identity(dimension + 1))
    }
}

impl MathTransform for LinearTransform {
    fn source_dimensions(&self) -> usize {
        self.matrix.source_dimensions()
    }

    fn target_dimensions(&self) -> usize {
        self.matrix.target_dimensions()
    }

    fn transform_point(&self, src: &[f64], dst: &mut [f64]) -> Result<(), TransformError> {
        check_dimensions(self, src, dst)?;
        self.matrix.transform_point(src, dst);
        Ok(())
    }

    fn inverse(&self) -> Result<Arc<dyn MathTransform>, TransformError> {
        Ok(Arc::new(Self::new(self.matrix.inverse()?)))
    }

    fn matrix(&self) -> Option<Matrix> {
        Some(self.matrix.clone())
    }

    fn is_identity(&self) -> bool {
        self.matrix.is_identity()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn equals(&self, other: &dyn MathTransform) -> bool {
        downcast_eq(self, other)
    }
}
