//! Chaining of coordinate operations with the simplifications that keep the
//! result exact: identity steps vanish and axis changes merge into their
//! neighbours.

use std::sync::Arc;

use tracing::trace;

use crate::error::OperationError;
use crate::operation::{CoordinateOperation, OperationKind, AXIS_CHANGES, IDENTITY};
use crate::referencing::Crs;
use crate::transform::{MathTransform, MathTransformFactory};

pub(crate) fn concatenate(
    transforms: &MathTransformFactory,
    first: Arc<CoordinateOperation>,
    second: Arc<CoordinateOperation>,
) -> Result<Arc<CoordinateOperation>, OperationError> {
    concatenate_all(transforms, vec![first, second])
}

pub(crate) fn concatenate3(
    transforms: &MathTransformFactory,
    first: Arc<CoordinateOperation>,
    second: Arc<CoordinateOperation>,
    third: Arc<CoordinateOperation>,
) -> Result<Arc<CoordinateOperation>, OperationError> {
    concatenate_all(transforms, vec![first, second, third])
}

/// Chains `operations` in application order. The result always starts at the
/// first operation's source CRS and ends at the last one's target CRS.
pub(crate) fn concatenate_all(
    transforms: &MathTransformFactory,
    operations: Vec<Arc<CoordinateOperation>>,
) -> Result<Arc<CoordinateOperation>, OperationError> {
    let (Some(first), Some(last)) = (operations.first(), operations.last()) else {
        return Err(OperationError::ConstructionFailure(
            "nothing to concatenate".into(),
        ));
    };
    let source = Arc::clone(first.source_crs());
    let target = Arc::clone(last.target_crs());
    for pair in operations.windows(2) {
        let (expected, found) = (pair[0].target_crs().dimension(), pair[1].source_crs().dimension());
        if expected != found {
            return Err(OperationError::DimensionMismatch { expected, found });
        }
    }

    let mut steps: Vec<Arc<CoordinateOperation>> = Vec::with_capacity(operations.len());
    for op in operations.iter().flat_map(flatten) {
        if is_identity_conversion(&op) {
            continue;
        }
        let folded = match steps.last() {
            Some(previous) => fold(transforms, previous, &op)?,
            None => None,
        };
        match folded {
            Some(merged) => {
                steps.pop();
                if !is_identity_conversion(&merged) {
                    steps.push(merged);
                }
            }
            None => steps.push(op),
        }
    }
    trace!(input = operations.len(), output = steps.len(), "concatenated operations");

    match steps.len() {
        0 => Ok(Arc::new(CoordinateOperation::new(
            IDENTITY,
            Arc::clone(&source),
            target,
            transforms.identity(source.dimension()),
            OperationKind::Conversion,
        )?)),
        1 => rebind(&steps[0], &source, &target),
        n => {
            let head = rebind(&steps[0], &source, steps[0].target_crs())?;
            steps[0] = head;
            let tail = rebind(&steps[n - 1], steps[n - 1].source_crs(), &target)?;
            steps[n - 1] = tail;
            let mut transform = Arc::clone(steps[0].transform());
            for step in &steps[1..] {
                transform = transforms.concatenate(&transform, step.transform())?;
            }
            let name = steps.iter().map(|s| s.name()).collect::<Vec<_>>().join(" + ");
            Ok(Arc::new(CoordinateOperation::concatenated(&name, steps, transform)?))
        }
    }
}

fn flatten(op: &Arc<CoordinateOperation>) -> Vec<Arc<CoordinateOperation>> {
    match op.kind() {
        OperationKind::Concatenated(steps) => steps.iter().flat_map(flatten).collect(),
        _ => vec![Arc::clone(op)],
    }
}

fn is_identity_conversion(op: &CoordinateOperation) -> bool {
    matches!(op.kind(), OperationKind::Conversion)
        && op.transform().source_dimensions() == op.transform().target_dimensions()
        && op.is_identity()
}

fn is_axis_change(op: &CoordinateOperation) -> bool {
    matches!(op.kind(), OperationKind::Conversion) && op.name() == AXIS_CHANGES
}

fn preserves_dimension(op: &CoordinateOperation) -> bool {
    op.transform().source_dimensions() == op.transform().target_dimensions()
}

/// Merges an axis change into the adjacent single operation, or two axis
/// changes into one. The merged step keeps the other operation's metadata.
fn fold(
    transforms: &MathTransformFactory,
    first: &Arc<CoordinateOperation>,
    second: &Arc<CoordinateOperation>,
) -> Result<Option<Arc<CoordinateOperation>>, OperationError> {
    let keeper = if is_axis_change(first) && is_axis_change(second) {
        first
    } else if is_axis_change(first) && preserves_dimension(first) && second.kind().is_single() {
        second
    } else if is_axis_change(second) && preserves_dimension(second) && first.kind().is_single() {
        first
    } else {
        return Ok(None);
    };
    let transform: Arc<dyn MathTransform> =
        transforms.concatenate(first.transform(), second.transform())?;
    let merged = keeper.rebuilt(
        Arc::clone(first.source_crs()),
        Arc::clone(second.target_crs()),
        transform,
    )?;
    Ok(Some(Arc::new(merged)))
}

fn rebind(
    op: &Arc<CoordinateOperation>,
    source: &Arc<Crs>,
    target: &Arc<Crs>,
) -> Result<Arc<CoordinateOperation>, OperationError> {
    if Arc::ptr_eq(op.source_crs(), source) && Arc::ptr_eq(op.target_crs(), target) {
        return Ok(Arc::clone(op));
    }
    Ok(Arc::new(op.rebuilt(
        Arc::clone(source),
        Arc::clone(target),
        Arc::clone(op.transform()),
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affine::Matrix;
    use crate::operation::{DATUM_SHIFT, DATUM_SHIFT_ACCURACY};
    use crate::referencing::{CoordinateSystem, GeodeticDatum, Unit};

    fn crs(name: &str, cs: CoordinateSystem) -> Arc<Crs> {
        Arc::new(Crs::geographic(name, GeodeticDatum::wgs84(), cs))
    }

    fn op(
        transforms: &MathTransformFactory,
        name: &str,
        source: &Arc<Crs>,
        target: &Arc<Crs>,
        matrix: Matrix,
        kind: OperationKind,
    ) -> Arc<CoordinateOperation> {
        Arc::new(
            CoordinateOperation::new(
                name,
                Arc::clone(source),
                Arc::clone(target),
                transforms.affine(matrix),
                kind,
            )
            .unwrap(),
        )
    }

    fn swap() -> Matrix {
        Matrix::from_rows(&[&[0.0, 1.0, 0.0], &[1.0, 0.0, 0.0], &[0.0, 0.0, 1.0]]).unwrap()
    }

    #[test]
    fn test_axis_change_folds_into_single_operation() {
        let transforms = MathTransformFactory::default();
        let lat_lon = crs("lat/lon", CoordinateSystem::ellipsoidal_2d_lat_lon(Unit::DEGREE));
        let lon_lat = crs("lon/lat", CoordinateSystem::ellipsoidal_2d(Unit::DEGREE));
        let shifted = crs("shifted", CoordinateSystem::ellipsoidal_2d(Unit::DEGREE));
        let axes = op(&transforms, AXIS_CHANGES, &lat_lon, &lon_lat, swap(), OperationKind::Conversion);
        let shift = Arc::new(
            CoordinateOperation::clone(&op(
                &transforms,
                DATUM_SHIFT,
                &lon_lat,
                &shifted,
                Matrix::translation(&[1.0, 2.0]),
                OperationKind::Transformation,
            ))
            .with_accuracy(DATUM_SHIFT_ACCURACY),
        );

        let result = concatenate(&transforms, axes, shift).unwrap();
        assert_eq!(result.name(), DATUM_SHIFT);
        assert!(matches!(result.kind(), OperationKind::Transformation));
        assert_eq!(result.accuracy(), Some(DATUM_SHIFT_ACCURACY));
        assert!(Arc::ptr_eq(result.source_crs(), &lat_lon));
        assert!(Arc::ptr_eq(result.target_crs(), &shifted));
        let out = result.transform().transform_points(&[52.0, 15.0]).unwrap();
        assert_eq!(out, vec![16.0, 54.0]);
    }

    #[test]
    fn test_identities_vanish() {
        let transforms = MathTransformFactory::default();
        let a = crs("A", CoordinateSystem::ellipsoidal_2d(Unit::DEGREE));
        let b = crs("B", CoordinateSystem::ellipsoidal_2d(Unit::DEGREE));
        let identity = op(&transforms, IDENTITY, &a, &b, Matrix::identity(3), OperationKind::Conversion);
        let result = concatenate(&transforms, Arc::clone(&identity), identity).unwrap();
        assert!(result.is_identity());
        assert_eq!(result.name(), IDENTITY);
        assert!(Arc::ptr_eq(result.source_crs(), &a));
        assert!(Arc::ptr_eq(result.target_crs(), &b));
    }

    #[test]
    fn test_chain_is_flat_and_sums_accuracy() {
        let transforms = MathTransformFactory::default();
        let a = crs("A", CoordinateSystem::ellipsoidal_2d(Unit::DEGREE));
        let shift = |x: f64| {
            Arc::new(
                CoordinateOperation::clone(&op(
                    &transforms,
                    DATUM_SHIFT,
                    &a,
                    &a,
                    Matrix::translation(&[x, 0.0]),
                    OperationKind::Transformation,
                ))
                .with_accuracy(DATUM_SHIFT_ACCURACY),
            )
        };
        let inner = concatenate(&transforms, shift(1.0), shift(2.0)).unwrap();
        let outer = concatenate3(&transforms, inner, shift(3.0), shift(4.0)).unwrap();
        let OperationKind::Concatenated(steps) = outer.kind() else {
            panic!("expected a concatenated operation");
        };
        assert_eq!(steps.len(), 4);
        assert_eq!(outer.accuracy(), Some(4.0 * DATUM_SHIFT_ACCURACY));
        let out = outer.transform().transform_points(&[0.0, 0.0]).unwrap();
        assert_eq!(out, vec![10.0, 0.0]);
    }

    #[test]
    fn test_dimension_mismatch() {
        let transforms = MathTransformFactory::default();
        let a = crs("A", CoordinateSystem::ellipsoidal_2d(Unit::DEGREE));
        let b = crs("B", CoordinateSystem::ellipsoidal_3d(Unit::DEGREE, Unit::METRE));
        let x = op(&transforms, "x", &a, &a, Matrix::translation(&[1.0, 0.0]), OperationKind::Conversion);
        let y = op(&transforms, "y", &b, &b, Matrix::translation(&[1.0, 0.0, 0.0]), OperationKind::Conversion);
        let err = concatenate(&transforms, x, y).unwrap_err();
        assert_eq!(err, OperationError::DimensionMismatch { expected: 2, found: 3 });
    }
}
