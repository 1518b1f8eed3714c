//! Coordinate operations: a math transform tied to its source and target CRS.

pub mod method;

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::OperationError;
use crate::referencing::Crs;
use crate::transform::{transforms_equal, MathTransform};

pub use method::{OperationMethod, ProjectionKind};

pub const IDENTITY: &str = "Identity";
pub const AXIS_CHANGES: &str = "Axis changes";
pub const DATUM_SHIFT: &str = "Datum shift";
pub const ELLIPSOID_SHIFT: &str = "Ellipsoid shift";
pub const GEOCENTRIC_CONVERSION: &str = "Geocentric conversion";
pub const VERTICAL_OFFSET: &str = "Vertical offset";
pub const TEMPORAL_CONVERSION: &str = "Temporal conversion";

/// Positional accuracy (metres) reported for an applied datum shift.
pub const DATUM_SHIFT_ACCURACY: f64 = 25.0;
/// Positional accuracy (metres) reported when a datum shift was omitted.
pub const DATUM_SHIFT_OMITTED_ACCURACY: f64 = 3000.0;

#[derive(Clone, Debug)]
pub enum OperationKind {
    /// Exact change of coordinates on the same datum.
    Conversion,
    /// A conversion through a map projection.
    Projection(ProjectionKind),
    /// Change of datum, with an accuracy.
    Transformation,
    Concatenated(Vec<Arc<CoordinateOperation>>),
    PassThrough {
        operation: Arc<CoordinateOperation>,
        first_affected: usize,
        num_trailing: usize,
    },
}

impl OperationKind {
    fn tag(&self) -> u8 {
        match self {
            Self::Conversion => 0,
            Self::Projection(_) => 1,
            Self::Transformation => 2,
            Self::Concatenated(_) => 3,
            Self::PassThrough { .. } => 4,
        }
    }

    /// True for the kinds built from one method.
    pub fn is_single(&self) -> bool {
        !matches!(self, Self::Concatenated(_) | Self::PassThrough { .. })
    }
}

#[derive(Clone, Debug)]
pub struct CoordinateOperation {
    name: String,
    source_crs: Arc<Crs>,
    target_crs: Arc<Crs>,
    transform: Arc<dyn MathTransform>,
    method: Option<OperationMethod>,
    accuracy: Option<f64>,
    kind: OperationKind,
}

impl CoordinateOperation {
    /// A single operation. The transform dimensions must match the CRS.
    pub fn new(
        name: &str,
        source_crs: Arc<Crs>,
        target_crs: Arc<Crs>,
        transform: Arc<dyn MathTransform>,
        kind: OperationKind,
    ) -> Result<Self, OperationError> {
        check_dimension(source_crs.dimension(), transform.source_dimensions())?;
        check_dimension(target_crs.dimension(), transform.target_dimensions())?;
        Ok(Self {
            name: name.to_owned(),
            source_crs,
            target_crs,
            transform,
            method: None,
            accuracy: None,
            kind,
        })
    }

    /// Chains `steps`, which must meet at matching dimensions. `transform`
    /// is the composition of the step transforms.
    pub fn concatenated(
        name: &str,
        steps: Vec<Arc<CoordinateOperation>>,
        transform: Arc<dyn MathTransform>,
    ) -> Result<Self, OperationError> {
        let (Some(first), Some(last)) = (steps.first(), steps.last()) else {
            return Err(OperationError::ConstructionFailure(
                "a concatenated operation needs at least one step".into(),
            ));
        };
        for pair in steps.windows(2) {
            check_dimension(pair[0].target_crs.dimension(), pair[1].source_crs.dimension())?;
        }
        let source_crs = Arc::clone(&first.source_crs);
        let target_crs = Arc::clone(&last.target_crs);
        Self::new(name, source_crs, target_crs, transform, OperationKind::Concatenated(steps))
    }

    /// Wraps `operation` so it applies to ordinates
    /// `first_affected .. first_affected + operation dimension` of a larger CRS.
    pub fn pass_through(
        source_crs: Arc<Crs>,
        target_crs: Arc<Crs>,
        operation: Arc<CoordinateOperation>,
        first_affected: usize,
        num_trailing: usize,
        transform: Arc<dyn MathTransform>,
    ) -> Result<Self, OperationError> {
        let name = operation.name.clone();
        let method = operation.method.clone();
        let mut op = Self::new(
            &name,
            source_crs,
            target_crs,
            transform,
            OperationKind::PassThrough {
                operation,
                first_affected,
                num_trailing,
            },
        )?;
        op.method = method;
        Ok(op)
    }

    /// A copy between other CRS through another transform, keeping the name,
    /// method, accuracy and kind.
    pub(crate) fn rebuilt(
        &self,
        source_crs: Arc<Crs>,
        target_crs: Arc<Crs>,
        transform: Arc<dyn MathTransform>,
    ) -> Result<Self, OperationError> {
        check_dimension(source_crs.dimension(), transform.source_dimensions())?;
        check_dimension(target_crs.dimension(), transform.target_dimensions())?;
        Ok(Self {
            source_crs,
            target_crs,
            transform,
            ..self.clone()
        })
    }

    #[must_use]
    pub fn with_method(mut self, method: OperationMethod) -> Self {
        self.method = Some(method);
        self
    }

    #[must_use]
    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_crs(&self) -> &Arc<Crs> {
        &self.source_crs
    }

    pub fn target_crs(&self) -> &Arc<Crs> {
        &self.target_crs
    }

    pub fn transform(&self) -> &Arc<dyn MathTransform> {
        &self.transform
    }

    pub fn method(&self) -> Option<&OperationMethod> {
        self.method.as_ref()
    }

    pub fn kind(&self) -> &OperationKind {
        &self.kind
    }

    pub fn is_identity(&self) -> bool {
        self.transform.is_identity()
    }

    /// Positional accuracy in metres. A chain reports the sum over its
    /// transformations; `None` when no transformation is involved.
    pub fn accuracy(&self) -> Option<f64> {
        match &self.kind {
            OperationKind::Transformation | OperationKind::Conversion | OperationKind::Projection(_) => {
                self.accuracy
            }
            OperationKind::Concatenated(steps) => steps
                .iter()
                .filter_map(|s| s.transformation_accuracy())
                .reduce(|a, b| a + b),
            OperationKind::PassThrough { operation, .. } => operation.accuracy(),
        }
    }

    /// This operation's share of a chain's accuracy; conversions contribute nothing.
    fn transformation_accuracy(&self) -> Option<f64> {
        match &self.kind {
            OperationKind::Transformation => Some(self.accuracy.unwrap_or(0.0)),
            OperationKind::Conversion | OperationKind::Projection(_) => None,
            OperationKind::Concatenated(_) => self.accuracy(),
            OperationKind::PassThrough { operation, .. } => operation.transformation_accuracy(),
        }
    }

    /// Single operations in application order, looking through chains and
    /// pass-through wrappers.
    pub fn single_operations(&self) -> Vec<&CoordinateOperation> {
        match &self.kind {
            OperationKind::Concatenated(steps) => {
                steps.iter().flat_map(|s| s.single_operations()).collect()
            }
            OperationKind::PassThrough { operation, .. } => operation.single_operations(),
            _ => vec![self],
        }
    }

    /// The operation from target to source.
    pub fn inverse(&self) -> Result<CoordinateOperation, OperationError> {
        let transform = self.transform.inverse()?;
        let kind = match &self.kind {
            OperationKind::Concatenated(steps) => OperationKind::Concatenated(
                steps
                    .iter()
                    .rev()
                    .map(|s| s.inverse().map(Arc::new))
                    .collect::<Result<_, _>>()?,
            ),
            OperationKind::PassThrough {
                operation,
                first_affected,
                num_trailing,
            } => OperationKind::PassThrough {
                operation: Arc::new(operation.inverse()?),
                first_affected: *first_affected,
                num_trailing: *num_trailing,
            },
            other => other.clone(),
        };
        Ok(Self {
            name: self.name.clone(),
            source_crs: Arc::clone(&self.target_crs),
            target_crs: Arc::clone(&self.source_crs),
            transform,
            method: self.method.clone(),
            accuracy: self.accuracy,
            kind,
        })
    }

    /// Value equality ignoring names: same CRS values, same kind, method and
    /// accuracy, equal transforms.
    pub fn equals_ignore_metadata(&self, other: &CoordinateOperation) -> bool {
        if self.kind.tag() != other.kind.tag()
            || self.accuracy != other.accuracy
            || self.method_name() != other.method_name()
            || !self.source_crs.equals_ignore_metadata(&other.source_crs)
            || !self.target_crs.equals_ignore_metadata(&other.target_crs)
            || !transforms_equal(&self.transform, &other.transform)
        {
            return false;
        }
        match (&self.kind, &other.kind) {
            (OperationKind::Concatenated(a), OperationKind::Concatenated(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equals_ignore_metadata(y))
            }
            _ => true,
        }
    }

    /// Hash consistent with [`CoordinateOperation::equals_ignore_metadata`].
    pub fn fingerprint<H: Hasher>(&self, state: &mut H) {
        self.kind.tag().hash(state);
        self.accuracy.map(f64::to_bits).hash(state);
        self.method_name().hash(state);
        self.source_crs.fingerprint(state);
        self.target_crs.fingerprint(state);
    }

    fn method_name(&self) -> Option<&str> {
        self.method.as_ref().map(|m| m.name.as_str())
    }
}

fn check_dimension(expected: usize, found: usize) -> Result<(), OperationError> {
    if expected != found {
        return Err(OperationError::DimensionMismatch { expected, found });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affine::Matrix;
    use crate::referencing::{CoordinateSystem, GeodeticDatum, Unit};
    use crate::transform::MathTransformFactory;

    fn geographic(name: &str, cs: CoordinateSystem) -> Arc<Crs> {
        Arc::new(Crs::geographic(name, GeodeticDatum::wgs84(), cs))
    }

    fn shift(factory: &MathTransformFactory, crs: &Arc<Crs>, accuracy: Option<f64>) -> Arc<CoordinateOperation> {
        let kind = if accuracy.is_some() {
            OperationKind::Transformation
        } else {
            OperationKind::Conversion
        };
        let mut op = CoordinateOperation::new(
            "shift",
            Arc::clone(crs),
            Arc::clone(crs),
            factory.affine(Matrix::translation(&[1.0, 1.0])),
            kind,
        )
        .unwrap();
        if let Some(a) = accuracy {
            op = op.with_accuracy(a);
        }
        Arc::new(op)
    }

    #[test]
    fn test_dimension_checked() {
        let factory = MathTransformFactory::default();
        let crs = geographic("WGS 84", CoordinateSystem::ellipsoidal_2d(Unit::DEGREE));
        let err = CoordinateOperation::new(
            "bad",
            Arc::clone(&crs),
            crs,
            factory.identity(3),
            OperationKind::Conversion,
        )
        .unwrap_err();
        assert_eq!(err, OperationError::DimensionMismatch { expected: 2, found: 3 });
    }

    #[test]
    fn test_concatenated_accuracy_sums_transformations() {
        let factory = MathTransformFactory::default();
        let crs = geographic("WGS 84", CoordinateSystem::ellipsoidal_2d(Unit::DEGREE));
        let steps = vec![
            shift(&factory, &crs, Some(DATUM_SHIFT_ACCURACY)),
            shift(&factory, &crs, None),
            shift(&factory, &crs, Some(DATUM_SHIFT_OMITTED_ACCURACY)),
        ];
        let op = CoordinateOperation::concatenated("chain", steps, factory.identity(2)).unwrap();
        assert_eq!(op.accuracy(), Some(3025.0));
        assert_eq!(op.single_operations().len(), 3);

        let conversions = vec![shift(&factory, &crs, None), shift(&factory, &crs, None)];
        let op = CoordinateOperation::concatenated("chain", conversions, factory.identity(2)).unwrap();
        assert_eq!(op.accuracy(), None);
    }

    #[test]
    fn test_inverse_swaps_crs() {
        let factory = MathTransformFactory::default();
        let lon_lat = geographic("lon/lat", CoordinateSystem::ellipsoidal_2d(Unit::DEGREE));
        let lat_lon = geographic("lat/lon", CoordinateSystem::ellipsoidal_2d_lat_lon(Unit::DEGREE));
        let matrix = lon_lat
            .coordinate_system()
            .unwrap()
            .swap_and_scale(lat_lon.coordinate_system().unwrap())
            .unwrap();
        let op = CoordinateOperation::new(
            AXIS_CHANGES,
            Arc::clone(&lon_lat),
            Arc::clone(&lat_lon),
            factory.affine(matrix),
            OperationKind::Conversion,
        )
        .unwrap();
        let inv = op.inverse().unwrap();
        assert_eq!(inv.name(), AXIS_CHANGES);
        assert!(Arc::ptr_eq(inv.source_crs(), &lat_lon));
        let out = inv.transform().transform_points(&[52.0, 15.0]).unwrap();
        assert_eq!(out, vec![15.0, 52.0]);
    }

    #[test]
    fn test_equality_ignores_names() {
        let factory = MathTransformFactory::default();
        let a = geographic("A", CoordinateSystem::ellipsoidal_2d(Unit::DEGREE));
        let b = geographic("B", CoordinateSystem::ellipsoidal_2d(Unit::DEGREE));
        let x = shift(&factory, &a, Some(25.0));
        let y = shift(&factory, &b, Some(25.0));
        assert!(x.equals_ignore_metadata(&y));
        let z = shift(&factory, &b, None);
        assert!(!x.equals_ignore_metadata(&z));
        let finer = shift(&factory, &b, Some(1.0));
        assert!(!x.equals_ignore_metadata(&finer));
        let with_method = (*x).clone().with_method(OperationMethod::new("Vertical_Offset", 2, 2));
        assert!(!x.equals_ignore_metadata(&with_method));
    }
}
