//! Coordinate reference systems.
//!
//! A [`Crs`] is immutable once built and shared behind `Arc`. Names and
//! authority identifiers are metadata: [`Crs::equals_ignore_metadata`] skips
//! them, the derived `PartialEq` does not.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::affine::Matrix;
use crate::error::TransformError;
use crate::operation::OperationMethod;
use crate::referencing::cs::{Axis, AxisDirection, CoordinateSystem};
use crate::referencing::datum::{
    DatumRef, EngineeringDatum, GeodeticDatum, TemporalDatum, VerticalDatum, VerticalDatumType,
};
use crate::referencing::units::Unit;
use crate::transform::{transforms_equal, MathTransform, MathTransformFactory, ParameterValueGroup};

#[derive(Clone, Debug, PartialEq)]
pub struct GeographicCrs {
    pub name: String,
    pub identifier: Option<String>,
    pub datum: GeodeticDatum,
    pub cs: CoordinateSystem,
}

impl GeographicCrs {
    /// Longitude east and latitude north in degrees on `datum` moved to
    /// Greenwich, plus height up in metres when 3D.
    pub fn normalized(datum: &GeodeticDatum, dimension: usize) -> Self {
        Self {
            name: "Normalized".to_owned(),
            identifier: None,
            datum: datum.on_greenwich(),
            cs: CoordinateSystem::normalized_geographic(dimension),
        }
    }

    /// Matrix from this CRS to the normalized geographic CRS of the same
    /// dimension: longitude east and latitude north in degrees relative to
    /// Greenwich, height up in metres.
    pub fn normalization(&self) -> Result<Matrix, TransformError> {
        let dim = self.cs.dimension();
        let swap = self
            .cs
            .swap_and_scale(&CoordinateSystem::normalized_geographic(dim))?;
        let mut offsets = vec![0.0; dim];
        offsets[0] = self.datum.prime_meridian.greenwich_longitude;
        Matrix::translation(&offsets).multiply(&swap)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GeocentricCrs {
    pub name: String,
    pub identifier: Option<String>,
    pub datum: GeodeticDatum,
    pub cs: CoordinateSystem,
}

impl GeocentricCrs {
    pub fn normalized(datum: &GeodeticDatum) -> Self {
        Self {
            name: "Normalized".to_owned(),
            identifier: None,
            datum: datum.on_greenwich(),
            cs: CoordinateSystem::geocentric(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VerticalCrs {
    pub name: String,
    pub identifier: Option<String>,
    pub datum: VerticalDatum,
    pub cs: CoordinateSystem,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TemporalCrs {
    pub name: String,
    pub identifier: Option<String>,
    pub datum: TemporalDatum,
    pub cs: CoordinateSystem,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EngineeringCrs {
    pub name: String,
    pub identifier: Option<String>,
    pub datum: EngineeringDatum,
    pub cs: CoordinateSystem,
}

/// The conversion from a derived CRS's base to the derived CRS, stored at
/// construction.
#[derive(Clone, Debug)]
pub struct BaseConversion {
    pub name: String,
    pub method: OperationMethod,
    pub parameters: ParameterValueGroup,
    pub transform: Arc<dyn MathTransform>,
}

impl PartialEq for BaseConversion {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.equals_ignore_metadata(other)
    }
}

impl BaseConversion {
    pub fn equals_ignore_metadata(&self, other: &BaseConversion) -> bool {
        transforms_equal(&self.transform, &other.transform)
    }
}

/// A map projection applied to a geographic base.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectedCrs {
    pub name: String,
    pub identifier: Option<String>,
    pub base: Arc<Crs>,
    pub conversion: BaseConversion,
    pub cs: CoordinateSystem,
}

impl ProjectedCrs {
    /// Builds the conversion from `base` coordinates to `cs` coordinates:
    /// normalization of the base axes (height dropped), the projection named
    /// by `method`, then easting/northing in metres to `cs`. The ellipsoid
    /// axes default to the base datum's.
    pub fn create(
        name: &str,
        base: Arc<Crs>,
        method: &str,
        parameters: &ParameterValueGroup,
        cs: CoordinateSystem,
        factory: &MathTransformFactory,
    ) -> Result<Self, TransformError> {
        let Crs::Geographic(geographic) = base.as_ref() else {
            return Err(TransformError::InvalidParameter(format!(
                "base of projected CRS \"{name}\" must be geographic"
            )));
        };
        if cs.dimension() != 2 {
            return Err(TransformError::DimensionMismatch {
                expected: 2,
                found: cs.dimension(),
            });
        }
        let mut parameters = parameters.clone();
        parameters.set_if_absent("semi_major", geographic.datum.ellipsoid.a);
        parameters.set_if_absent("semi_minor", geographic.datum.ellipsoid.b);
        let (projection, method) = factory.parameterized(method, &parameters)?;
        if projection.source_dimensions() != 2 || projection.target_dimensions() != 2 {
            return Err(TransformError::DimensionMismatch {
                expected: 2,
                found: projection.source_dimensions(),
            });
        }

        let normalize = geographic
            .cs
            .swap_and_scale(&CoordinateSystem::normalized_geographic(2))?;
        let denormalize = CoordinateSystem::projected(Unit::METRE).swap_and_scale(&cs)?;
        let transform = factory.concatenate(&factory.affine(normalize), &projection)?;
        let transform = factory.concatenate(&transform, &factory.affine(denormalize))?;
        Ok(Self {
            name: name.to_owned(),
            identifier: None,
            base,
            conversion: BaseConversion {
                name: name.to_owned(),
                method,
                parameters,
                transform,
            },
            cs,
        })
    }
}

/// Any CRS defined by a conversion from another CRS, other than a projection.
#[derive(Clone, Debug, PartialEq)]
pub struct DerivedCrs {
    pub name: String,
    pub identifier: Option<String>,
    pub base: Arc<Crs>,
    pub conversion: BaseConversion,
    pub cs: CoordinateSystem,
}

impl DerivedCrs {
    pub fn new(
        name: &str,
        base: Arc<Crs>,
        conversion: BaseConversion,
        cs: CoordinateSystem,
    ) -> Result<Self, TransformError> {
        if conversion.transform.source_dimensions() != base.dimension() {
            return Err(TransformError::DimensionMismatch {
                expected: base.dimension(),
                found: conversion.transform.source_dimensions(),
            });
        }
        if conversion.transform.target_dimensions() != cs.dimension() {
            return Err(TransformError::DimensionMismatch {
                expected: cs.dimension(),
                found: conversion.transform.target_dimensions(),
            });
        }
        Ok(Self {
            name: name.to_owned(),
            identifier: None,
            base,
            conversion,
            cs,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompoundCrs {
    pub name: String,
    pub identifier: Option<String>,
    pub components: Vec<Arc<Crs>>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Crs {
    Geographic(GeographicCrs),
    Projected(ProjectedCrs),
    Geocentric(GeocentricCrs),
    Vertical(VerticalCrs),
    Temporal(TemporalCrs),
    Compound(CompoundCrs),
    Derived(DerivedCrs),
    Engineering(EngineeringCrs),
}

impl Crs {
    pub fn geographic(name: &str, datum: GeodeticDatum, cs: CoordinateSystem) -> Self {
        Self::Geographic(GeographicCrs {
            name: name.to_owned(),
            identifier: None,
            datum,
            cs,
        })
    }

    pub fn geocentric(name: &str, datum: GeodeticDatum, cs: CoordinateSystem) -> Self {
        Self::Geocentric(GeocentricCrs {
            name: name.to_owned(),
            identifier: None,
            datum,
            cs,
        })
    }

    pub fn vertical(name: &str, datum: VerticalDatum, cs: CoordinateSystem) -> Self {
        Self::Vertical(VerticalCrs {
            name: name.to_owned(),
            identifier: None,
            datum,
            cs,
        })
    }

    pub fn temporal(name: &str, datum: TemporalDatum, cs: CoordinateSystem) -> Self {
        Self::Temporal(TemporalCrs {
            name: name.to_owned(),
            identifier: None,
            datum,
            cs,
        })
    }

    pub fn engineering(name: &str, datum: EngineeringDatum, cs: CoordinateSystem) -> Self {
        Self::Engineering(EngineeringCrs {
            name: name.to_owned(),
            identifier: None,
            datum,
            cs,
        })
    }

    pub fn compound(name: &str, components: Vec<Arc<Crs>>) -> Self {
        Self::Compound(CompoundCrs {
            name: name.to_owned(),
            identifier: None,
            components,
        })
    }

    /// WGS 84 with longitude east, latitude north in degrees.
    pub fn wgs84() -> Self {
        Self::geographic(
            "WGS 84",
            GeodeticDatum::wgs84(),
            CoordinateSystem::ellipsoidal_2d(Unit::DEGREE),
        )
        .with_identifier("CRS:84")
    }

    /// Geographic CRS with normalized axes on `datum` moved to Greenwich.
    pub fn normalized_geographic(datum: &GeodeticDatum, dimension: usize) -> Self {
        Self::Geographic(GeographicCrs::normalized(datum, dimension))
    }

    pub fn normalized_geocentric(datum: &GeodeticDatum) -> Self {
        Self::Geocentric(GeocentricCrs::normalized(datum))
    }

    #[must_use]
    pub fn with_identifier(mut self, code: &str) -> Self {
        let slot = match &mut self {
            Self::Geographic(c) => &mut c.identifier,
            Self::Projected(c) => &mut c.identifier,
            Self::Geocentric(c) => &mut c.identifier,
            Self::Vertical(c) => &mut c.identifier,
            Self::Temporal(c) => &mut c.identifier,
            Self::Compound(c) => &mut c.identifier,
            Self::Derived(c) => &mut c.identifier,
            Self::Engineering(c) => &mut c.identifier,
        };
        *slot = Some(code.to_owned());
        self
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Geographic(c) => &c.name,
            Self::Projected(c) => &c.name,
            Self::Geocentric(c) => &c.name,
            Self::Vertical(c) => &c.name,
            Self::Temporal(c) => &c.name,
            Self::Compound(c) => &c.name,
            Self::Derived(c) => &c.name,
            Self::Engineering(c) => &c.name,
        }
    }

    /// Authority code such as `EPSG:4326`.
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Self::Geographic(c) => c.identifier.as_deref(),
            Self::Projected(c) => c.identifier.as_deref(),
            Self::Geocentric(c) => c.identifier.as_deref(),
            Self::Vertical(c) => c.identifier.as_deref(),
            Self::Temporal(c) => c.identifier.as_deref(),
            Self::Compound(c) => c.identifier.as_deref(),
            Self::Derived(c) => c.identifier.as_deref(),
            Self::Engineering(c) => c.identifier.as_deref(),
        }
    }

    /// The coordinate system; `None` for compound CRS.
    pub fn coordinate_system(&self) -> Option<&CoordinateSystem> {
        match self {
            Self::Geographic(c) => Some(&c.cs),
            Self::Projected(c) => Some(&c.cs),
            Self::Geocentric(c) => Some(&c.cs),
            Self::Vertical(c) => Some(&c.cs),
            Self::Temporal(c) => Some(&c.cs),
            Self::Derived(c) => Some(&c.cs),
            Self::Engineering(c) => Some(&c.cs),
            Self::Compound(_) => None,
        }
    }

    pub fn dimension(&self) -> usize {
        match self {
            Self::Compound(c) => c.components.iter().map(|c| c.dimension()).sum(),
            other => other.coordinate_system().map_or(0, CoordinateSystem::dimension),
        }
    }

    /// The datum; a derived CRS reports its base's. `None` for compound CRS.
    pub fn datum(&self) -> Option<DatumRef<'_>> {
        match self {
            Self::Geographic(c) => Some(DatumRef::Geodetic(&c.datum)),
            Self::Geocentric(c) => Some(DatumRef::Geodetic(&c.datum)),
            Self::Vertical(c) => Some(DatumRef::Vertical(&c.datum)),
            Self::Temporal(c) => Some(DatumRef::Temporal(&c.datum)),
            Self::Engineering(c) => Some(DatumRef::Engineering(&c.datum)),
            Self::Projected(c) => c.base.datum(),
            Self::Derived(c) => c.base.datum(),
            Self::Compound(_) => None,
        }
    }

    /// Base CRS and stored conversion of a projected or derived CRS.
    pub fn as_derived(&self) -> Option<(&Arc<Crs>, &BaseConversion)> {
        match self {
            Self::Projected(c) => Some((&c.base, &c.conversion)),
            Self::Derived(c) => Some((&c.base, &c.conversion)),
            _ => None,
        }
    }

    pub fn equals_ignore_metadata(&self, other: &Crs) -> bool {
        match (self, other) {
            (Self::Geographic(a), Self::Geographic(b)) => {
                a.datum.equals_ignore_metadata(&b.datum) && a.cs.equals_ignore_metadata(&b.cs)
            }
            (Self::Geocentric(a), Self::Geocentric(b)) => {
                a.datum.equals_ignore_metadata(&b.datum) && a.cs.equals_ignore_metadata(&b.cs)
            }
            (Self::Vertical(a), Self::Vertical(b)) => {
                a.datum.equals_ignore_metadata(&b.datum) && a.cs.equals_ignore_metadata(&b.cs)
            }
            (Self::Temporal(a), Self::Temporal(b)) => {
                a.datum.equals_ignore_metadata(&b.datum) && a.cs.equals_ignore_metadata(&b.cs)
            }
            (Self::Engineering(a), Self::Engineering(b)) => {
                a.datum.equals_ignore_metadata(&b.datum) && a.cs.equals_ignore_metadata(&b.cs)
            }
            (Self::Projected(a), Self::Projected(b)) => {
                a.base.equals_ignore_metadata(&b.base)
                    && a.conversion.equals_ignore_metadata(&b.conversion)
                    && a.cs.equals_ignore_metadata(&b.cs)
            }
            (Self::Derived(a), Self::Derived(b)) => {
                a.base.equals_ignore_metadata(&b.base)
                    && a.conversion.equals_ignore_metadata(&b.conversion)
                    && a.cs.equals_ignore_metadata(&b.cs)
            }
            (Self::Compound(a), Self::Compound(b)) => {
                a.components.len() == b.components.len()
                    && a.components
                        .iter()
                        .zip(&b.components)
                        .all(|(x, y)| x.equals_ignore_metadata(y))
            }
            _ => false,
        }
    }

    /// Feeds the kind and axis directions of this CRS to `state`. Consistent
    /// with [`Crs::equals_ignore_metadata`] and therefore with `PartialEq`.
    pub fn fingerprint<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Compound(c) => {
                c.components.len().hash(state);
                for component in &c.components {
                    component.fingerprint(state);
                }
            }
            other => {
                if let Some(cs) = other.coordinate_system() {
                    for axis in cs.axes() {
                        axis.direction.hash(state);
                    }
                }
                if let Some((base, _)) = other.as_derived() {
                    base.fingerprint(state);
                }
            }
        }
    }

    /// Promotes `Compound[Geographic 2D, Vertical(ellipsoidal)]` into a
    /// geographic 3D CRS on the same datum. `None` for any other shape.
    pub fn to_geodetic_3d(&self) -> Option<Crs> {
        let Self::Compound(compound) = self else {
            return None;
        };
        let components = flatten(&compound.components);
        let [horizontal, vertical] = components.as_slice() else {
            return None;
        };
        match (horizontal.as_ref(), vertical.as_ref()) {
            (Self::Geographic(geo), Self::Vertical(v))
                if geo.cs.dimension() == 2
                    && v.datum.datum_type == VerticalDatumType::Ellipsoidal =>
            {
                let mut axes: Vec<Axis> = geo.cs.axes().to_vec();
                axes.extend(v.cs.axes().iter().cloned());
                Some(Self::Geographic(GeographicCrs {
                    name: compound.name.clone(),
                    identifier: None,
                    datum: geo.datum.clone(),
                    cs: CoordinateSystem::new(axes),
                }))
            }
            _ => None,
        }
    }

    /// Index of the axis along `direction` (or its opposite), if any.
    pub fn axis_index(&self, direction: AxisDirection) -> Option<usize> {
        self.coordinate_system().and_then(|cs| cs.index_of(direction))
    }
}

/// Single components in order, with nested compounds expanded.
pub fn single_components(crs: &Arc<Crs>) -> Vec<Arc<Crs>> {
    match crs.as_ref() {
        Crs::Compound(compound) => flatten(&compound.components),
        _ => vec![Arc::clone(crs)],
    }
}

fn flatten(components: &[Arc<Crs>]) -> Vec<Arc<Crs>> {
    components.iter().flat_map(single_components).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::referencing::ellipsoid::{Ellipsoid, PrimeMeridian};
    use approx::assert_relative_eq;
    use std::collections::hash_map::DefaultHasher;

    fn fingerprint(crs: &Crs) -> u64 {
        let mut hasher = DefaultHasher::new();
        crs.fingerprint(&mut hasher);
        hasher.finish()
    }

    fn ellipsoidal_height() -> Arc<Crs> {
        Arc::new(Crs::vertical(
            "Ellipsoidal height",
            VerticalDatum::ellipsoidal(),
            CoordinateSystem::vertical(AxisDirection::Up, Unit::METRE),
        ))
    }

    #[test]
    fn test_metadata_ignored() {
        let a = Crs::wgs84();
        let b = Crs::geographic(
            "WGS84 (lon, lat)",
            GeodeticDatum::wgs84(),
            CoordinateSystem::ellipsoidal_2d(Unit::DEGREE),
        );
        assert!(a.equals_ignore_metadata(&b));
        assert_ne!(a, b);
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_axis_order_matters() {
        let lat_lon = Crs::geographic(
            "WGS 84",
            GeodeticDatum::wgs84(),
            CoordinateSystem::ellipsoidal_2d_lat_lon(Unit::DEGREE),
        );
        assert!(!Crs::wgs84().equals_ignore_metadata(&lat_lon));
    }

    #[test]
    fn test_compound_dimension_and_flatten() {
        let inner = Arc::new(Crs::compound("inner", vec![Arc::new(Crs::wgs84()), ellipsoidal_height()]));
        let time = Arc::new(Crs::temporal(
            "Time",
            TemporalDatum::unix(),
            CoordinateSystem::temporal(AxisDirection::Future, Unit::DAY),
        ));
        let outer = Arc::new(Crs::compound("outer", vec![inner, time]));
        assert_eq!(outer.dimension(), 4);
        assert_eq!(single_components(&outer).len(), 3);
        assert!(outer.datum().is_none());
    }

    #[test]
    fn test_to_geodetic_3d() {
        let compound = Crs::compound("WGS 84 + h", vec![Arc::new(Crs::wgs84()), ellipsoidal_height()]);
        let promoted = compound.to_geodetic_3d().unwrap();
        assert_eq!(promoted.dimension(), 3);
        assert!(matches!(promoted.datum(), Some(DatumRef::Geodetic(d)) if d.name_matches("WGS84")));

        let gravity = Arc::new(Crs::vertical(
            "MSL height",
            VerticalDatum::new("Mean Sea Level", VerticalDatumType::GravityRelated),
            CoordinateSystem::vertical(AxisDirection::Up, Unit::METRE),
        ));
        let compound = Crs::compound("WGS 84 + MSL", vec![Arc::new(Crs::wgs84()), gravity]);
        assert!(compound.to_geodetic_3d().is_none());
    }

    #[test]
    fn test_normalization_with_prime_meridian() {
        let datum = GeodeticDatum::new("Nouvelle Triangulation Francaise (Paris)", Ellipsoid::CLARKE_1866)
            .with_prime_meridian(PrimeMeridian::paris());
        let ntf = GeographicCrs {
            name: "NTF (Paris)".into(),
            identifier: None,
            datum,
            cs: CoordinateSystem::ellipsoidal_2d_lat_lon(Unit::GRAD),
        };
        let m = ntf.normalization().unwrap();
        let mut out = [0.0; 2];
        m.transform_point(&[50.0, 0.0], &mut out);
        assert_relative_eq!(out[0], 2.337_229_166_666_667, epsilon = 1e-12);
        assert_relative_eq!(out[1], 45.0, epsilon = 1e-12);
    }

    #[test]
    fn test_projected_create() {
        let factory = MathTransformFactory::default();
        let params = ParameterValueGroup::new()
            .with("central_meridian", 15.0)
            .with("scale_factor", 0.9996)
            .with("false_easting", 500_000.0);
        let utm = ProjectedCrs::create(
            "WGS 84 / UTM zone 33N",
            Arc::new(Crs::wgs84()),
            "Transverse_Mercator",
            &params,
            CoordinateSystem::projected(Unit::METRE),
            &factory,
        )
        .unwrap();
        assert_eq!(utm.conversion.parameters.get("semi_major"), Some(6_378_137.0));
        let en = utm.conversion.transform.transform_points(&[15.0, 52.0]).unwrap();
        assert_relative_eq!(en[0], 500_000.0, epsilon = 1e-6);

        let engineering = Arc::new(Crs::engineering(
            "Local",
            EngineeringDatum::new("Site"),
            CoordinateSystem::projected(Unit::METRE),
        ));
        assert!(ProjectedCrs::create(
            "bad",
            engineering,
            "Transverse_Mercator",
            &params,
            CoordinateSystem::projected(Unit::METRE),
            &factory,
        )
        .is_err());
    }

    #[test]
    fn test_derived_checks_dimensions() {
        let factory = MathTransformFactory::default();
        let conversion = BaseConversion {
            name: "shift".into(),
            method: factory.method("Affine").unwrap(),
            parameters: ParameterValueGroup::new(),
            transform: factory.identity(3),
        };
        let result = DerivedCrs::new(
            "derived",
            Arc::new(Crs::wgs84()),
            conversion,
            CoordinateSystem::ellipsoidal_2d(Unit::DEGREE),
        );
        assert!(matches!(result, Err(TransformError::DimensionMismatch { .. })));
    }
}
