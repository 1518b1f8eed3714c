//! Transverse Mercator projection, Krüger n-series to 6th order.
//!
//! Follows Karney (2011) with 6th-order α/β coefficients. This is the
//! projection underlying all UTM zones.

use std::sync::Arc;

use crate::error::TransformError;
use crate::operation::{OperationMethod, ProjectionKind};
use crate::proj::{descriptors, Projection, ProjectionParameters, ProjectionTransform};
use crate::referencing::ellipsoid::Ellipsoid;
use crate::transform::provider::Provider;
use crate::transform::{MathTransform, ParameterValueGroup};

pub const TRANSVERSE_MERCATOR: &str = "Transverse_Mercator";

const TAU_TOLERANCE: f64 = 1e-12;
const TAU_MAX_ITERATIONS: usize = 15;

#[derive(Debug)]
pub struct TransverseMercator {
    e: f64,
    e2: f64,
    lon0: f64,
    false_easting: f64,
    false_northing: f64,
    /// k₀ · A, with A = a/(1+n) · (1 + n²/4 + n⁴/64)
    scaled_radius: f64,
    alpha: [f64; 6],
    beta: [f64; 6],
    /// Normalized meridional arc at the latitude of origin
    xi0: f64,
}

impl TransverseMercator {
    pub(crate) fn new(p: &ProjectionParameters) -> Self {
        let n = p.ellipsoid.n;
        let powers = [n, n * n, n.powi(3), n.powi(4), n.powi(5), n.powi(6)];
        let a_hat = p.ellipsoid.a / (1.0 + n) * (1.0 + powers[1] / 4.0 + powers[3] / 64.0);
        Self {
            e: p.ellipsoid.eccentricity(),
            e2: p.ellipsoid.e2,
            lon0: p.lon0,
            false_easting: p.false_easting,
            false_northing: p.false_northing,
            scaled_radius: p.k0 * a_hat,
            alpha: alpha_coefficients(&powers),
            beta: beta_coefficients(&powers),
            xi0: normalized_meridional_arc(p.lat0, &powers),
        }
    }

    /// Geodetic tangent τ to conformal tangent τ'.
    fn conformal_tangent(&self, tau: f64) -> f64 {
        let sec = tau.hypot(1.0);
        let sigma = (self.e * (self.e * tau / sec).atanh()).sinh();
        tau * sigma.hypot(1.0) - sigma * sec
    }

    /// Conformal tangent τ' back to geodetic tangent τ, by Newton iteration.
    fn geodetic_tangent(&self, tau_prime: f64) -> f64 {
        let mut tau = tau_prime;
        for _ in 0..TAU_MAX_ITERATIONS {
            let sec = tau.hypot(1.0);
            let estimate = self.conformal_tangent(tau);
            let step = (tau_prime - estimate) * (1.0 + (1.0 - self.e2) * tau * tau)
                / ((1.0 - self.e2) * sec * estimate.hypot(1.0));
            tau += step;
            if step.abs() < TAU_TOLERANCE * (1.0 + tau.abs()) {
                break;
            }
        }
        tau
    }
}

/// Forward series α₁..α₆, indexed by powers of n (`p[0]` = n).
fn alpha_coefficients(p: &[f64; 6]) -> [f64; 6] {
    let [n, n2, n3, n4, n5, n6] = *p;
    [
        n / 2.0 - 2.0 / 3.0 * n2 + 5.0 / 16.0 * n3 + 41.0 / 180.0 * n4 - 127.0 / 288.0 * n5
            + 7891.0 / 37800.0 * n6,
        13.0 / 48.0 * n2 - 3.0 / 5.0 * n3 + 557.0 / 1440.0 * n4 + 281.0 / 630.0 * n5
            - 1983433.0 / 1935360.0 * n6,
        61.0 / 240.0 * n3 - 103.0 / 140.0 * n4 + 15061.0 / 26880.0 * n5 + 167603.0 / 181440.0 * n6,
        49561.0 / 161280.0 * n4 - 179.0 / 168.0 * n5 + 6601661.0 / 7257600.0 * n6,
        34729.0 / 80640.0 * n5 - 3418889.0 / 1995840.0 * n6,
        212378941.0 / 319334400.0 * n6,
    ]
}

/// Inverse series β₁..β₆.
fn beta_coefficients(p: &[f64; 6]) -> [f64; 6] {
    let [n, n2, n3, n4, n5, n6] = *p;
    [
        n / 2.0 - 2.0 / 3.0 * n2 + 37.0 / 96.0 * n3 - 1.0 / 360.0 * n4 - 81.0 / 512.0 * n5
            + 96199.0 / 604800.0 * n6,
        1.0 / 48.0 * n2 + 1.0 / 15.0 * n3 - 437.0 / 1440.0 * n4 + 46.0 / 105.0 * n5
            - 1118711.0 / 3870720.0 * n6,
        17.0 / 480.0 * n3 - 37.0 / 840.0 * n4 - 209.0 / 4480.0 * n5 + 5569.0 / 90720.0 * n6,
        4397.0 / 161280.0 * n4 - 11.0 / 504.0 * n5 - 830251.0 / 7257600.0 * n6,
        4583.0 / 161280.0 * n5 - 108847.0 / 3991680.0 * n6,
        20648693.0 / 638668800.0 * n6,
    ]
}

/// Meridional arc to `phi` divided by A.
fn normalized_meridional_arc(phi: f64, p: &[f64; 6]) -> f64 {
    let [n, n2, n3, n4, _, _] = *p;
    phi + (-1.5 * n + 9.0 / 16.0 * n3) * (2.0 * phi).sin()
        + (15.0 / 16.0 * n2 - 15.0 / 32.0 * n4) * (4.0 * phi).sin()
        - 35.0 / 48.0 * n3 * (6.0 * phi).sin()
        + 315.0 / 512.0 * n4 * (8.0 * phi).sin()
}

impl Projection for TransverseMercator {
    fn forward(&self, lon: f64, lat: f64) -> Result<(f64, f64), TransformError> {
        let dlam = lon - self.lon0;
        let (sin_dlam, cos_dlam) = dlam.sin_cos();
        let tau_prime = self.conformal_tangent(lat.tan());

        let xi_prime = tau_prime.atan2(cos_dlam);
        let eta_prime = (sin_dlam / tau_prime.hypot(cos_dlam)).asinh();

        let (mut xi, mut eta) = (xi_prime, eta_prime);
        for (j, &a) in self.alpha.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            xi += a * (k * xi_prime).sin() * (k * eta_prime).cosh();
            eta += a * (k * xi_prime).cos() * (k * eta_prime).sinh();
        }

        Ok((
            self.scaled_radius * eta + self.false_easting,
            self.scaled_radius * (xi - self.xi0) + self.false_northing,
        ))
    }

    fn inverse(&self, x: f64, y: f64) -> Result<(f64, f64), TransformError> {
        let eta = (x - self.false_easting) / self.scaled_radius;
        let xi = (y - self.false_northing) / self.scaled_radius + self.xi0;

        let (mut xi_prime, mut eta_prime) = (xi, eta);
        for (j, &b) in self.beta.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            xi_prime -= b * (k * xi).sin() * (k * eta).cosh();
            eta_prime -= b * (k * xi).cos() * (k * eta).sinh();
        }

        let sinh_eta = eta_prime.sinh();
        let (sin_xi, cos_xi) = xi_prime.sin_cos();
        let tau_prime = sin_xi / sinh_eta.hypot(cos_xi);
        let lat = self.geodetic_tangent(tau_prime).atan();
        let lon = self.lon0 + sinh_eta.atan2(cos_xi);
        Ok((lon, lat))
    }
}

/// Parameters of a UTM zone on the given ellipsoid.
pub fn utm_parameters(zone: u8, north: bool, ellipsoid: &Ellipsoid) -> ParameterValueGroup {
    let central_meridian = f64::from(zone) * 6.0 - 183.0;
    ParameterValueGroup::new()
        .with("semi_major", ellipsoid.a)
        .with("semi_minor", ellipsoid.b)
        .with("central_meridian", central_meridian)
        .with("latitude_of_origin", 0.0)
        .with("scale_factor", 0.9996)
        .with("false_easting", 500_000.0)
        .with("false_northing", if north { 0.0 } else { 10_000_000.0 })
}

fn build(params: &ParameterValueGroup) -> Result<Arc<dyn MathTransform>, TransformError> {
    let p = ProjectionParameters::read(params)?;
    Ok(ProjectionTransform::new(
        TRANSVERSE_MERCATOR,
        params,
        Arc::new(TransverseMercator::new(&p)),
    ))
}

pub(crate) fn providers() -> Vec<Provider> {
    vec![Provider {
        method: OperationMethod::new(TRANSVERSE_MERCATOR, 2, 2)
            .with_aliases(&["EPSG:9807", "Gauss-Kruger"])
            .with_parameters(descriptors(&[]))
            .with_projection(ProjectionKind::Cylindrical),
        build,
    }]
}
