//! Lambert Conformal Conic projection, 1SP and 2SP variants.

use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;

use crate::error::TransformError;
use crate::operation::{OperationMethod, ProjectionKind};
use crate::proj::common::{msfn, phi_from_ts, tsfn};
use crate::proj::{descriptors, latitude, Projection, ProjectionParameters, ProjectionTransform};
use crate::transform::provider::Provider;
use crate::transform::{MathTransform, ParameterDescriptor, ParameterValueGroup};

pub const LAMBERT_CONFORMAL_CONIC_1SP: &str = "Lambert_Conformal_Conic_1SP";
pub const LAMBERT_CONFORMAL_CONIC_2SP: &str = "Lambert_Conformal_Conic_2SP";

const PARALLEL_EPSILON: f64 = 1e-10;

#[derive(Debug)]
pub struct LambertConformalConic {
    e: f64,
    a: f64,
    lon0: f64,
    /// Cone constant
    n: f64,
    /// F = m₁ / (n·t₁ⁿ), times k₀ for 1SP
    f_val: f64,
    /// ρ₀ = a·F·t₀ⁿ
    rho0: f64,
    false_easting: f64,
    false_northing: f64,
}

impl LambertConformalConic {
    pub(crate) fn two_standard_parallels(p: &ProjectionParameters, lat1: f64, lat2: f64) -> Self {
        let e = p.ellipsoid.eccentricity();
        let e2 = p.ellipsoid.e2;
        let (m1, t1) = (msfn(lat1, e2), tsfn(lat1, e));
        let n = if (lat1 - lat2).abs() > PARALLEL_EPSILON {
            (m1.ln() - msfn(lat2, e2).ln()) / (t1.ln() - tsfn(lat2, e).ln())
        } else {
            lat1.sin()
        };
        Self::with_cone(p, n, m1 / (n * t1.powf(n)))
    }

    pub(crate) fn one_standard_parallel(p: &ProjectionParameters) -> Self {
        let e = p.ellipsoid.eccentricity();
        let n = p.lat0.sin();
        let f_val = msfn(p.lat0, p.ellipsoid.e2) / (n * tsfn(p.lat0, e).powf(n)) * p.k0;
        Self::with_cone(p, n, f_val)
    }

    fn with_cone(p: &ProjectionParameters, n: f64, f_val: f64) -> Self {
        let e = p.ellipsoid.eccentricity();
        Self {
            e,
            a: p.ellipsoid.a,
            lon0: p.lon0,
            n,
            f_val,
            rho0: p.ellipsoid.a * f_val * tsfn(p.lat0, e).powf(n),
            false_easting: p.false_easting,
            false_northing: p.false_northing,
        }
    }
}

impl Projection for LambertConformalConic {
    fn forward(&self, lon: f64, lat: f64) -> Result<(f64, f64), TransformError> {
        let rho = self.a * self.f_val * tsfn(lat, self.e).powf(self.n);
        if !rho.is_finite() {
            return Err(TransformError::TransformFailed(format!(
                "latitude {}° is the apex of the opposite cone",
                lat.to_degrees()
            )));
        }
        let theta = self.n * (lon - self.lon0);
        Ok((
            rho * theta.sin() + self.false_easting,
            self.rho0 - rho * theta.cos() + self.false_northing,
        ))
    }

    fn inverse(&self, x: f64, y: f64) -> Result<(f64, f64), TransformError> {
        let mut dx = x - self.false_easting;
        let mut dy = self.rho0 - (y - self.false_northing);
        // ρ carries the sign of n, so a southern cone flips both axes
        if self.n < 0.0 {
            dx = -dx;
            dy = -dy;
        }
        let rho = dx.hypot(dy).copysign(self.n);
        let theta = dx.atan2(dy);
        let lat = if rho == 0.0 {
            FRAC_PI_2.copysign(self.n)
        } else {
            phi_from_ts((rho / (self.a * self.f_val)).powf(1.0 / self.n), self.e)
        };
        Ok((self.lon0 + theta / self.n, lat))
    }
}

fn build_1sp(params: &ParameterValueGroup) -> Result<Arc<dyn MathTransform>, TransformError> {
    let p = ProjectionParameters::read(params)?;
    if p.lat0.abs() <= PARALLEL_EPSILON {
        return Err(TransformError::InvalidParameter(
            "latitude_of_origin must not be the equator".into(),
        ));
    }
    Ok(ProjectionTransform::new(
        LAMBERT_CONFORMAL_CONIC_1SP,
        params,
        Arc::new(LambertConformalConic::one_standard_parallel(&p)),
    ))
}

fn build_2sp(params: &ParameterValueGroup) -> Result<Arc<dyn MathTransform>, TransformError> {
    let p = ProjectionParameters::read(params)?;
    let lat1 = latitude(params, "standard_parallel_1", 0.0)?;
    let lat2 = latitude(params, "standard_parallel_2", lat1.to_degrees())?;
    if (lat1 + lat2).abs() <= PARALLEL_EPSILON {
        return Err(TransformError::InvalidParameter(
            "standard parallels must not be symmetric about the equator".into(),
        ));
    }
    Ok(ProjectionTransform::new(
        LAMBERT_CONFORMAL_CONIC_2SP,
        params,
        Arc::new(LambertConformalConic::two_standard_parallels(&p, lat1, lat2)),
    ))
}

pub(crate) fn providers() -> Vec<Provider> {
    vec![
        Provider {
            method: OperationMethod::new(LAMBERT_CONFORMAL_CONIC_1SP, 2, 2)
                .with_aliases(&["EPSG:9801", "Lambert Conic Conformal (1SP)"])
                .with_parameters(descriptors(&[]))
                .with_projection(ProjectionKind::Conic),
            build: build_1sp,
        },
        Provider {
            method: OperationMethod::new(LAMBERT_CONFORMAL_CONIC_2SP, 2, 2)
                .with_aliases(&["EPSG:9802", "Lambert Conic Conformal (2SP)"])
                .with_parameters(descriptors(&[
                    ParameterDescriptor::required("standard_parallel_1"),
                    ParameterDescriptor::optional("standard_parallel_2", 0.0),
                ]))
                .with_projection(ProjectionKind::Conic),
            build: build_2sp,
        },
    ]
}
