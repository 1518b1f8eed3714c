use std::any::Any;
use std::sync::Arc;

use crate::error::TransformError;
use crate::transform::{check_dimensions, downcast_eq, transforms_equal, MathTransform};

/// Applies its steps in order. Built by [`super::MathTransformFactory::concatenate`],
/// which guarantees at least two steps with matching boundaries.
#[derive(Clone, Debug)]
pub struct ConcatenatedTransform {
    steps: Vec<Arc<dyn MathTransform>>,
}

impl ConcatenatedTransform {
    pub(crate) fn new(steps: Vec<Arc<dyn MathTransform>>) -> Result<Self, TransformError> {
        if steps.is_empty() {
            return Err(TransformError::InvalidParameter(
                "a concatenated transform needs at least one step".into(),
            ));
        }
        for pair in steps.windows(2) {
            if pair[0].target_dimensions() != pair[1].source_dimensions() {
                return Err(TransformError::DimensionMismatch {
                    expected: pair[0].target_dimensions(),
                    found: pair[1].source_dimensions(),
                });
            }
        }
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[Arc<dyn MathTransform>] {
        &self.steps
    }
}

impl PartialEq for ConcatenatedTransform {
    fn eq(&self, other: &Self) -> bool {
        self.steps.len() == other.steps.len()
            && self
                .steps
                .iter()
                .zip(&other.steps)
                .all(|(a, b)| transforms_equal(a, b))
    }
}

impl MathTransform for ConcatenatedTransform {
    fn source_dimensions(&self) -> usize {
        self.steps[0].source_dimensions()
    }

    fn target_dimensions(&self) -> usize {
        self.steps[self.steps.len() - 1].target_dimensions()
    }

    fn transform_point(&self, src: &[f64], dst: &mut [f64]) -> Result<(), TransformError> {
        check_dimensions(self, src, dst)?;
        let mut current = src.to_vec();
        for step in &self.steps {
            let mut next = vec![0.0; step.target_dimensions()];
            step.transform_point(&current, &mut next)?;
            current = next;
        }
        dst.copy_from_slice(&current);
        Ok(())
    }

    fn inverse(&self) -> Result<Arc<dyn MathTransform>, TransformError> {
        let steps = self
            .steps
            .iter()
            .rev()
            .map(|s| s.inverse())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Arc::new(Self::new(steps)?))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn equals(&self, other: &dyn MathTransform) -> bool {
        downcast_eq(self, other)
    }
}
