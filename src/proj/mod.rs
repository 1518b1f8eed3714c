//! Map projections exposed as parameterized math transforms.
//!
//! A [`Projection`] works in radians on the ellipsoid; [`ProjectionTransform`]
//! adapts it to normalized geographic input (longitude, latitude in degrees)
//! and easting/northing output in metres.

pub mod common;
pub mod lambert_conformal;
pub mod mercator;
pub mod transverse_mercator;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::TransformError;
use crate::referencing::ellipsoid::Ellipsoid;
use crate::transform::provider::Provider;
use crate::transform::{check_dimensions, downcast_eq, MathTransform, ParameterDescriptor, ParameterValueGroup};

/// Trait for map projections supporting forward and inverse transforms.
pub trait Projection: fmt::Debug + Send + Sync {
    /// Forward: (lon_rad, lat_rad) -> (easting, northing)
    fn forward(&self, lon: f64, lat: f64) -> Result<(f64, f64), TransformError>;

    /// Inverse: (easting, northing) -> (lon_rad, lat_rad)
    fn inverse(&self, x: f64, y: f64) -> Result<(f64, f64), TransformError>;
}

/// Parameters shared by every projection, read with OGC names. Angles are
/// given in degrees and stored in radians.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ProjectionParameters {
    pub ellipsoid: Ellipsoid,
    pub lon0: f64,
    pub lat0: f64,
    pub k0: f64,
    pub false_easting: f64,
    pub false_northing: f64,
}

impl ProjectionParameters {
    pub fn read(params: &ParameterValueGroup) -> Result<Self, TransformError> {
        let a = params.require("semi_major")?;
        let b = params.require("semi_minor")?;
        if !(a > 0.0 && b > 0.0 && b <= a) {
            return Err(TransformError::InvalidParameter(format!(
                "invalid ellipsoid axes a={a}, b={b}"
            )));
        }
        let k0 = params.get_or("scale_factor", 1.0);
        if !(k0 > 0.0 && k0.is_finite()) {
            return Err(TransformError::InvalidParameter(format!("scale_factor = {k0}")));
        }
        Ok(Self {
            ellipsoid: Ellipsoid::from_axes("Parameterized", a, b),
            lon0: params.get_or("central_meridian", 0.0).to_radians(),
            lat0: latitude(params, "latitude_of_origin", 0.0)?,
            k0,
            false_easting: params.get_or("false_easting", 0.0),
            false_northing: params.get_or("false_northing", 0.0),
        })
    }
}

/// Reads a latitude in degrees, returning radians.
pub(crate) fn latitude(params: &ParameterValueGroup, name: &str, default: f64) -> Result<f64, TransformError> {
    let value = params.get_or(name, default);
    if !(-90.0..=90.0).contains(&value) {
        return Err(TransformError::InvalidParameter(format!("{name} = {value}")));
    }
    Ok(value.to_radians())
}

/// Descriptors common to all projections, followed by `extra`.
pub(crate) fn descriptors(extra: &[ParameterDescriptor]) -> Vec<ParameterDescriptor> {
    let mut all = vec![
        ParameterDescriptor::required("semi_major"),
        ParameterDescriptor::required("semi_minor"),
        ParameterDescriptor::optional("central_meridian", 0.0),
        ParameterDescriptor::optional("latitude_of_origin", 0.0),
        ParameterDescriptor::optional("scale_factor", 1.0),
        ParameterDescriptor::optional("false_easting", 0.0),
        ParameterDescriptor::optional("false_northing", 0.0),
    ];
    all.extend_from_slice(extra);
    all
}

pub(crate) fn providers() -> Vec<Provider> {
    let mut all = transverse_mercator::providers();
    all.extend(mercator::providers());
    all.extend(lambert_conformal::providers());
    all
}

/// A projection as a 2D math transform, forward or inverse.
#[derive(Clone, Debug)]
pub struct ProjectionTransform {
    method: &'static str,
    parameters: ParameterValueGroup,
    projection: Arc<dyn Projection>,
    inverse: bool,
}

impl ProjectionTransform {
    pub(crate) fn new(
        method: &'static str,
        parameters: &ParameterValueGroup,
        projection: Arc<dyn Projection>,
    ) -> Arc<dyn MathTransform> {
        Arc::new(Self {
            method,
            parameters: parameters.clone(),
            projection,
            inverse: false,
        })
    }

    pub fn method(&self) -> &str {
        self.method
    }

    pub fn parameters(&self) -> &ParameterValueGroup {
        &self.parameters
    }
}

impl PartialEq for ProjectionTransform {
    fn eq(&self, other: &Self) -> bool {
        self.method == other.method
            && self.inverse == other.inverse
            && self.parameters.equals_ignore_order(&other.parameters)
    }
}

impl MathTransform for ProjectionTransform {
    fn source_dimensions(&self) -> usize {
        2
    }

    fn target_dimensions(&self) -> usize {
        2
    }

    fn transform_point(&self, src: &[f64], dst: &mut [f64]) -> Result<(), TransformError> {
        check_dimensions(self, src, dst)?;
        let (x, y) = if self.inverse {
            let (lon, lat) = self.projection.inverse(src[0], src[1])?;
            (lon.to_degrees(), lat.to_degrees())
        } else {
            self.projection.forward(src[0].to_radians(), src[1].to_radians())?
        };
        dst[0] = x;
        dst[1] = y;
        Ok(())
    }

    fn inverse(&self) -> Result<Arc<dyn MathTransform>, TransformError> {
        Ok(Arc::new(Self {
            inverse: !self.inverse,
            ..self.clone()
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn equals(&self, other: &dyn MathTransform) -> bool {
        downcast_eq(self, other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::MathTransformFactory;
    use approx::assert_relative_eq;

    fn utm33() -> ParameterValueGroup {
        ParameterValueGroup::new()
            .with("semi_major", 6_378_137.0)
            .with("semi_minor", 6_356_752.314_245_179)
            .with("central_meridian", 15.0)
            .with("scale_factor", 0.9996)
            .with("false_easting", 500_000.0)
    }

    #[test]
    fn test_transform_takes_degrees() {
        let factory = MathTransformFactory::default();
        let (t, method) = factory.parameterized("Transverse_Mercator", &utm33()).unwrap();
        assert_eq!(method.name, "Transverse_Mercator");
        let en = t.transform_points(&[15.0, 52.0]).unwrap();
        assert_relative_eq!(en[0], 500_000.0, epsilon = 1e-6);
        let back = t.inverse().unwrap().transform_points(&en).unwrap();
        assert_relative_eq!(back[0], 15.0, epsilon = 1e-9);
        assert_relative_eq!(back[1], 52.0, epsilon = 1e-9);
    }

    #[test]
    fn test_equality_by_parameters() {
        let factory = MathTransformFactory::default();
        let (a, _) = factory.parameterized("Transverse_Mercator", &utm33()).unwrap();
        let (b, _) = factory.parameterized("EPSG:9807", &utm33()).unwrap();
        assert!(a.equals(b.as_ref()));
        assert!(!a.equals(a.inverse().unwrap().as_ref()));
        let shifted = utm33().with("false_northing", 10_000_000.0);
        let (c, _) = factory.parameterized("Transverse_Mercator", &shifted).unwrap();
        assert!(!a.equals(c.as_ref()));
    }

    #[test]
    fn test_rejects_bad_latitude() {
        let params = utm33().with("latitude_of_origin", 95.0);
        assert!(ProjectionParameters::read(&params).is_err());
    }
}
