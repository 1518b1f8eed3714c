use std::sync::Arc;

use tracing::trace;

use crate::affine::Matrix;
use crate::error::TransformError;
use crate::operation::OperationMethod;
use crate::transform::concat::ConcatenatedTransform;
use crate::transform::linear::LinearTransform;
use crate::transform::pass_through::PassThroughTransform;
use crate::transform::provider::{Provider, ProviderRegistry};
use crate::transform::{MathTransform, ParameterValueGroup};

/// Builds and composes math transforms, simplifying where the result stays exact.
#[derive(Clone, Debug)]
pub struct MathTransformFactory {
    providers: ProviderRegistry,
}

impl Default for MathTransformFactory {
    fn default() -> Self {
        Self::new(ProviderRegistry::with_builtins())
    }
}

impl MathTransformFactory {
    pub fn new(providers: ProviderRegistry) -> Self {
        Self { providers }
    }

    pub fn register(&mut self, provider: Provider) {
        self.providers.register(provider);
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub fn affine(&self, matrix: Matrix) -> Arc<dyn MathTransform> {
        Arc::new(LinearTransform::new(matrix))
    }

    pub fn identity(&self, dimension: usize) -> Arc<dyn MathTransform> {
        Arc::new(LinearTransform::identity(dimension))
    }

    /// The transform applying `first` then `second`.
    pub fn concatenate(
        &self,
        first: &Arc<dyn MathTransform>,
        second: &Arc<dyn MathTransform>,
    ) -> Result<Arc<dyn MathTransform>, TransformError> {
        if first.target_dimensions() != second.source_dimensions() {
            return Err(TransformError::DimensionMismatch {
                expected: first.target_dimensions(),
                found: second.source_dimensions(),
            });
        }
        if first.is_identity() {
            return Ok(Arc::clone(second));
        }
        if second.is_identity() {
            return Ok(Arc::clone(first));
        }

        let mut steps: Vec<Arc<dyn MathTransform>> = Vec::new();
        for transform in [first, second] {
            match transform.as_any().downcast_ref::<ConcatenatedTransform>() {
                Some(concat) => steps.extend(concat.steps().iter().cloned()),
                None => steps.push(Arc::clone(transform)),
            }
        }

        let mut merged: Vec<Arc<dyn MathTransform>> = Vec::with_capacity(steps.len());
        for step in steps {
            let product = match (merged.last().and_then(|p| p.matrix()), step.matrix()) {
                (Some(previous), Some(current)) => Some(current.multiply(&previous)?),
                _ => None,
            };
            match product {
                Some(matrix) => {
                    merged.pop();
                    if !matrix.is_identity() {
                        merged.push(self.affine(matrix));
                    }
                }
                None => merged.push(step),
            }
        }
        trace!(steps = merged.len(), "concatenated transform");
        match merged.len() {
            0 => Ok(self.identity(first.source_dimensions())),
            1 => Ok(merged.remove(0)),
            _ => Ok(Arc::new(ConcatenatedTransform::new(merged)?)),
        }
    }

    /// Applies `sub` to the ordinates after the first `first_affected`, keeping
    /// `num_trailing` ordinates after them unchanged.
    pub fn pass_through(
        &self,
        first_affected: usize,
        sub: &Arc<dyn MathTransform>,
        num_trailing: usize,
    ) -> Result<Arc<dyn MathTransform>, TransformError> {
        if first_affected == 0 && num_trailing == 0 {
            return Ok(Arc::clone(sub));
        }
        let sub_src = sub.source_dimensions();
        let sub_tgt = sub.target_dimensions();
        let src_dim = first_affected + sub_src + num_trailing;
        let tgt_dim = first_affected + sub_tgt + num_trailing;

        if let Some(m) = sub.matrix() {
            let mut matrix = Matrix::zeros(tgt_dim, src_dim);
            for i in 0..first_affected {
                matrix.set(i, i, 1.0);
            }
            for r in 0..sub_tgt {
                for c in 0..sub_src {
                    matrix.set(first_affected + r, first_affected + c, m.get(r, c));
                }
                matrix.set(first_affected + r, src_dim, m.get(r, sub_src));
            }
            for k in 0..num_trailing {
                matrix.set(first_affected + sub_tgt + k, first_affected + sub_src + k, 1.0);
            }
            return Ok(self.affine(matrix));
        }
        if let Some(inner) = sub.as_any().downcast_ref::<PassThroughTransform>() {
            return Ok(Arc::new(PassThroughTransform::new(
                first_affected + inner.first_affected(),
                Arc::clone(inner.sub_transform()),
                num_trailing + inner.num_trailing(),
            )));
        }
        Ok(Arc::new(PassThroughTransform::new(
            first_affected,
            Arc::clone(sub),
            num_trailing,
        )))
    }

    pub fn method(&self, name: &str) -> Result<OperationMethod, TransformError> {
        self.providers
            .find(name)
            .map(|p| p.method.clone())
            .ok_or_else(|| TransformError::UnknownMethod(name.to_owned()))
    }

    /// Builds the transform of a registered method, returning it with the
    /// method's canonical description.
    pub fn parameterized(
        &self,
        method: &str,
        params: &ParameterValueGroup,
    ) -> Result<(Arc<dyn MathTransform>, OperationMethod), TransformError> {
        let provider = self
            .providers
            .find(method)
            .ok_or_else(|| TransformError::UnknownMethod(method.to_owned()))?;
        let transform = (provider.build)(params)?;
        trace!(method = %provider.method.name, "parameterized transform");
        Ok((transform, provider.method.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::transforms_equal;
    use approx::assert_relative_eq;

    fn factory() -> MathTransformFactory {
        MathTransformFactory::default()
    }

    fn geocentric(factory: &MathTransformFactory) -> Arc<dyn MathTransform> {
        let params = ParameterValueGroup::new()
            .with("semi_major", 6_378_137.0)
            .with("semi_minor", 6_356_752.314_245_179);
        factory.parameterized("Ellipsoid_To_Geocentric", &params).unwrap().0
    }

    #[test]
    fn test_concatenate_merges_matrices() {
        let f = factory();
        let scale = f.affine(Matrix::from_rows(&[&[2.0, 0.0, 0.0], &[0.0, 2.0, 0.0], &[0.0, 0.0, 1.0]]).unwrap());
        let shift = f.affine(Matrix::translation(&[1.0, -1.0]));
        let t = f.concatenate(&scale, &shift).unwrap();
        assert!(t.matrix().is_some());
        let out = t.transform_points(&[3.0, 4.0]).unwrap();
        assert_relative_eq!(out[0], 7.0);
        assert_relative_eq!(out[1], 7.0);
    }

    #[test]
    fn test_concatenate_elides_identity() {
        let f = factory();
        let geo = geocentric(&f);
        let t = f.concatenate(&f.identity(3), &geo).unwrap();
        assert!(Arc::ptr_eq(&t, &geo));
    }

    #[test]
    fn test_concatenate_cancels_inverse_pair() {
        let f = factory();
        let shift = f.affine(Matrix::translation(&[5.0, 5.0, 5.0]));
        let back = shift.inverse().unwrap();
        let t = f.concatenate(&shift, &back).unwrap();
        assert!(t.is_identity());
    }

    #[test]
    fn test_concatenate_flattens() {
        let f = factory();
        let geo = geocentric(&f);
        let inv = geo.inverse().unwrap();
        let shift = f.affine(Matrix::translation(&[1.0, 2.0, 3.0]));
        let a = f.concatenate(&geo, &shift).unwrap();
        let b = f.concatenate(&a, &inv).unwrap();
        let concat = b.as_any().downcast_ref::<ConcatenatedTransform>().unwrap();
        assert_eq!(concat.steps().len(), 3);
    }

    #[test]
    fn test_concatenate_dimension_mismatch() {
        let f = factory();
        let err = f.concatenate(&f.identity(2), &geocentric(&f)).unwrap_err();
        assert_eq!(err, TransformError::DimensionMismatch { expected: 2, found: 3 });
    }

    #[test]
    fn test_pass_through_expands_matrix() {
        let f = factory();
        let offset = f.affine(Matrix::translation(&[10.0]));
        let t = f.pass_through(2, &offset, 0).unwrap();
        assert_eq!(t.source_dimensions(), 3);
        assert!(t.matrix().is_some());
        let out = t.transform_points(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(out, vec![1.0, 2.0, 13.0]);
    }

    #[test]
    fn test_pass_through_wraps_non_linear() {
        let f = factory();
        let geo = geocentric(&f);
        let t = f.pass_through(0, &geo, 1).unwrap();
        assert_eq!(t.source_dimensions(), 4);
        assert_eq!(t.target_dimensions(), 4);
        let nested = f.pass_through(1, &t, 0).unwrap();
        let pt = nested.as_any().downcast_ref::<PassThroughTransform>().unwrap();
        assert_eq!((pt.first_affected(), pt.num_trailing()), (1, 1));
        assert!(transforms_equal(pt.sub_transform(), &geo));
    }

    #[test]
    fn test_unknown_method() {
        let err = factory()
            .parameterized("Robinson", &ParameterValueGroup::new())
            .unwrap_err();
        assert_eq!(err, TransformError::UnknownMethod("Robinson".into()));
    }
}
