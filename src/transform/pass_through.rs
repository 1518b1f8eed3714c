use std::any::Any;
use std::sync::Arc;

use crate::error::TransformError;
use crate::transform::{check_dimensions, downcast_eq, transforms_equal, MathTransform};

/// Applies `sub` to ordinates `first_affected .. first_affected + sub.source_dimensions()`
/// and copies the leading and trailing ordinates unchanged.
#[derive(Clone, Debug)]
pub struct PassThroughTransform {
    first_affected: usize,
    num_trailing: usize,
    sub: Arc<dyn MathTransform>,
}

impl PassThroughTransform {
    pub(crate) fn new(first_affected: usize, sub: Arc<dyn MathTransform>, num_trailing: usize) -> Self {
        Self {
            first_affected,
            num_trailing,
            sub,
        }
    }

    pub fn first_affected(&self) -> usize {
        self.first_affected
    }

    pub fn num_trailing(&self) -> usize {
        self.num_trailing
    }

    pub fn sub_transform(&self) -> &Arc<dyn MathTransform> {
        &self.sub
    }
}

impl PartialEq for PassThroughTransform {
    fn eq(&self, other: &Self) -> bool {
        self.first_affected == other.first_affected
            && self.num_trailing == other.num_trailing
            && transforms_equal(&self.sub, &other.sub)
    }
}

impl MathTransform for PassThroughTransform {
    fn source_dimensions(&self) -> usize {
        self.first_affected + self.sub.source_dimensions() + self.num_trailing
    }

    fn target_dimensions(&self) -> usize {
        self.first_affected + self.sub.target_dimensions() + self.num_trailing
    }

    fn transform_point(&self, src: &[f64], dst: &mut [f64]) -> Result<(), TransformError> {
        check_dimensions(self, src, dst)?;
        let lead = self.first_affected;
        let sub_src = self.sub.source_dimensions();
        let sub_tgt = self.sub.target_dimensions();
        dst[..lead].copy_from_slice(&src[..lead]);
        self.sub
            .transform_point(&src[lead..lead + sub_src], &mut dst[lead..lead + sub_tgt])?;
        dst[lead + sub_tgt..].copy_from_slice(&src[lead + sub_src..]);
        Ok(())
    }

    fn inverse(&self) -> Result<Arc<dyn MathTransform>, TransformError> {
        Ok(Arc::new(Self::new(
            self.first_affected,
            self.sub.inverse()?,
            self.num_trailing,
        )))
    }

    fn is_identity(&self) -> bool {
        self.sub.is_identity()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn equals(&self, other: &dyn MathTransform) -> bool {
        downcast_eq(self, other)
    }
}
