//! Mercator projection: ellipsoidal 1SP/2SP and the spherical pseudo-Mercator.
//!
//! Ellipsoidal:
//!   forward: x = a·k₀·(λ - λ₀), y = -a·k₀·ln(tsfn(φ, e))
//!   inverse: λ = λ₀ + x/(a·k₀), φ = phi_from_ts(exp(-y/(a·k₀)), e)
//!
//! Pseudo-Mercator (EPSG:3857), spherical formulas on the semi-major axis:
//!   forward: x = a·(λ - λ₀), y = a·ln(tan(π/4 + φ/2))
//!   inverse: λ = λ₀ + x/a, φ = 2·atan(exp(y/a)) - π/2

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};
use std::sync::Arc;

use crate::error::TransformError;
use crate::operation::{OperationMethod, ProjectionKind};
use crate::proj::common::{msfn, phi_from_ts, tsfn};
use crate::proj::{descriptors, latitude, Projection, ProjectionParameters, ProjectionTransform};
use crate::transform::provider::Provider;
use crate::transform::{MathTransform, ParameterDescriptor, ParameterValueGroup};

pub const MERCATOR_1SP: &str = "Mercator_1SP";
pub const MERCATOR_2SP: &str = "Mercator_2SP";
pub const PSEUDO_MERCATOR: &str = "Popular_Visualisation_Pseudo_Mercator";

/// Latitudes closer than this to a pole have no finite northing.
const POLE_EPSILON: f64 = 1e-10;

#[derive(Debug)]
pub struct Mercator {
    e: f64,
    /// a · k₀
    radius: f64,
    lon0: f64,
    false_easting: f64,
    false_northing: f64,
    spherical: bool,
}

impl Mercator {
    /// Scale given directly by `scale_factor`.
    pub(crate) fn one_standard_parallel(p: &ProjectionParameters) -> Self {
        Self::with_scale(p, p.k0, false)
    }

    /// Scale implied by the latitude of true scale.
    pub(crate) fn two_standard_parallels(p: &ProjectionParameters, lat_ts: f64) -> Self {
        Self::with_scale(p, msfn(lat_ts, p.ellipsoid.e2), false)
    }

    pub(crate) fn pseudo(p: &ProjectionParameters) -> Self {
        Self::with_scale(p, 1.0, true)
    }

    fn with_scale(p: &ProjectionParameters, k0: f64, spherical: bool) -> Self {
        Self {
            e: if spherical { 0.0 } else { p.ellipsoid.eccentricity() },
            radius: p.ellipsoid.a * k0,
            lon0: p.lon0,
            false_easting: p.false_easting,
            false_northing: p.false_northing,
            spherical,
        }
    }
}

impl Projection for Mercator {
    fn forward(&self, lon: f64, lat: f64) -> Result<(f64, f64), TransformError> {
        if FRAC_PI_2 - lat.abs() <= POLE_EPSILON {
            return Err(TransformError::TransformFailed(format!(
                "latitude {}° is outside the Mercator domain",
                lat.to_degrees()
            )));
        }
        let x = self.radius * (lon - self.lon0) + self.false_easting;
        let y = if self.spherical {
            self.radius * (FRAC_PI_4 + lat / 2.0).tan().ln()
        } else {
            -self.radius * tsfn(lat, self.e).ln()
        };
        Ok((x, y + self.false_northing))
    }

    fn inverse(&self, x: f64, y: f64) -> Result<(f64, f64), TransformError> {
        let lon = self.lon0 + (x - self.false_easting) / self.radius;
        let ts = (-(y - self.false_northing) / self.radius).exp();
        let lat = if self.spherical {
            FRAC_PI_2 - 2.0 * ts.atan()
        } else {
            phi_from_ts(ts, self.e)
        };
        Ok((lon, lat))
    }
}

fn build_1sp(params: &ParameterValueGroup) -> Result<Arc<dyn MathTransform>, TransformError> {
    let p = ProjectionParameters::read(params)?;
    Ok(ProjectionTransform::new(
        MERCATOR_1SP,
        params,
        Arc::new(Mercator::one_standard_parallel(&p)),
    ))
}

fn build_2sp(params: &ParameterValueGroup) -> Result<Arc<dyn MathTransform>, TransformError> {
    let p = ProjectionParameters::read(params)?;
    let lat_ts = latitude(params, "standard_parallel_1", 0.0)?;
    if FRAC_PI_2 - lat_ts.abs() <= POLE_EPSILON {
        return Err(TransformError::InvalidParameter(
            "standard_parallel_1 must not be a pole".into(),
        ));
    }
    Ok(ProjectionTransform::new(
        MERCATOR_2SP,
        params,
        Arc::new(Mercator::two_standard_parallels(&p, lat_ts)),
    ))
}

fn build_pseudo(params: &ParameterValueGroup) -> Result<Arc<dyn MathTransform>, TransformError> {
    let p = ProjectionParameters::read(params)?;
    Ok(ProjectionTransform::new(
        PSEUDO_MERCATOR,
        params,
        Arc::new(Mercator::pseudo(&p)),
    ))
}

pub(crate) fn providers() -> Vec<Provider> {
    let method = |name: &str, aliases: &[&str], extra: &[ParameterDescriptor]| {
        OperationMethod::new(name, 2, 2)
            .with_aliases(aliases)
            .with_parameters(descriptors(extra))
            .with_projection(ProjectionKind::Cylindrical)
    };
    vec![
        Provider {
            method: method(MERCATOR_1SP, &["EPSG:9804", "Mercator (variant A)"], &[]),
            build: build_1sp,
        },
        Provider {
            method: method(
                MERCATOR_2SP,
                &["EPSG:9805", "Mercator (variant B)"],
                &[ParameterDescriptor::optional("standard_parallel_1", 0.0)],
            ),
            build: build_2sp,
        },
        Provider {
            method: method(PSEUDO_MERCATOR, &["EPSG:1024", "Web Mercator"], &[]),
            build: build_pseudo,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::referencing::ellipsoid::Ellipsoid;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn wgs84() -> ParameterValueGroup {
        ParameterValueGroup::new()
            .with("semi_major", Ellipsoid::WGS84.a)
            .with("semi_minor", Ellipsoid::WGS84.b)
    }

    fn read(params: &ParameterValueGroup) -> ProjectionParameters {
        ProjectionParameters::read(params).unwrap()
    }

    #[test]
    fn test_pseudo_mercator_reference() {
        let proj = Mercator::pseudo(&read(&wgs84()));
        let (x, y) = proj.forward(PI, 0.0).unwrap();
        assert_relative_eq!(x, 20_037_508.342_789_244, epsilon = 0.01);
        assert_relative_eq!(y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_roundtrips() {
        let p = read(&wgs84().with("central_meridian", 110.0));
        let projections = [
            Mercator::one_standard_parallel(&p),
            Mercator::two_standard_parallels(&p, 20.0_f64.to_radians()),
            Mercator::pseudo(&p),
        ];
        for proj in &projections {
            for &(lon_deg, lat_deg) in &[(110.0_f64, 0.0_f64), (120.0, 45.0), (-73.9857, 40.7484), (139.6917, -35.6895)] {
                let (lon, lat) = (lon_deg.to_radians(), lat_deg.to_radians());
                let (x, y) = proj.forward(lon, lat).unwrap();
                let (lon2, lat2) = proj.inverse(x, y).unwrap();
                assert_relative_eq!(lon2, lon, epsilon = 1e-10);
                assert_relative_eq!(lat2, lat, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_2sp_scales_by_parallel() {
        let p = read(&wgs84());
        let lat_ts = 40.0_f64.to_radians();
        let (x1, _) = Mercator::one_standard_parallel(&p).forward(0.1, 0.0).unwrap();
        let (x2, _) = Mercator::two_standard_parallels(&p, lat_ts).forward(0.1, 0.0).unwrap();
        assert_relative_eq!(x2 / x1, msfn(lat_ts, Ellipsoid::WGS84.e2), epsilon = 1e-12);
    }

    #[test]
    fn test_pole_is_rejected() {
        let proj = Mercator::one_standard_parallel(&read(&wgs84()));
        assert!(proj.forward(0.0, FRAC_PI_2).is_err());
        assert!(build_2sp(&wgs84().with("standard_parallel_1", 90.0)).is_err());
    }
}
