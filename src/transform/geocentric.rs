//! Conversions between geographic (λ, φ, h) and geocentric (X, Y, Z) coordinates.
//!
//! Geographic ordinates are normalized: longitude and latitude in degrees
//! (Greenwich), ellipsoidal height in metres. The geographic side is 2D or 3D;
//! a 2D input gets a zero height and a 2D output drops it.

use std::any::Any;
use std::sync::Arc;

use crate::error::TransformError;
use crate::referencing::ellipsoid::Ellipsoid;
use crate::transform::{check_dimensions, downcast_eq, MathTransform};

const MAX_ITERATIONS: usize = 10;
const LATITUDE_TOLERANCE: f64 = 1e-13;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeocentricDirection {
    EllipsoidToGeocentric,
    GeocentricToEllipsoid,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GeocentricTransform {
    ellipsoid: Ellipsoid,
    geographic_dim: usize,
    direction: GeocentricDirection,
}

impl GeocentricTransform {
    pub fn new(
        ellipsoid: Ellipsoid,
        geographic_dim: usize,
        direction: GeocentricDirection,
    ) -> Result<Self, TransformError> {
        if !(2..=3).contains(&geographic_dim) {
            return Err(TransformError::InvalidParameter(format!(
                "geographic dimension {geographic_dim}, expected 2 or 3"
            )));
        }
        if !(ellipsoid.a > 0.0 && ellipsoid.b > 0.0 && ellipsoid.b <= ellipsoid.a) {
            return Err(TransformError::InvalidParameter(format!(
                "invalid ellipsoid axes a={}, b={}",
                ellipsoid.a, ellipsoid.b
            )));
        }
        Ok(Self {
            ellipsoid,
            geographic_dim,
            direction,
        })
    }

    /// (λ°, φ°, h) → (X, Y, Z)
    pub fn to_geocentric(&self, lon: f64, lat: f64, h: f64) -> (f64, f64, f64) {
        let (lambda, phi) = (lon.to_radians(), lat.to_radians());
        let (sin_phi, cos_phi) = phi.sin_cos();
        let e2 = self.ellipsoid.e2;
        let n = self.ellipsoid.a / (1.0 - e2 * sin_phi * sin_phi).sqrt();
        let x = (n + h) * cos_phi * lambda.cos();
        let y = (n + h) * cos_phi * lambda.sin();
        let z = (n * (1.0 - e2) + h) * sin_phi;
        (x, y, z)
    }

    /// (X, Y, Z) → (λ°, φ°, h), by fixed-point iteration on latitude.
    pub fn to_ellipsoid(&self, x: f64, y: f64, z: f64) -> Result<(f64, f64, f64), TransformError> {
        let a = self.ellipsoid.a;
        let e2 = self.ellipsoid.e2;
        let p = x.hypot(y);
        let lambda = y.atan2(x);
        if p == 0.0 {
            // On the polar axis
            let phi = std::f64::consts::FRAC_PI_2.copysign(z);
            let h = z.abs() - self.ellipsoid.b;
            return Ok((lambda.to_degrees(), phi.to_degrees(), h));
        }
        let mut phi = z.atan2(p * (1.0 - e2));
        let mut converged = false;
        for _ in 0..MAX_ITERATIONS {
            let sin_phi = phi.sin();
            let n = a / (1.0 - e2 * sin_phi * sin_phi).sqrt();
            let next = (z + e2 * n * sin_phi).atan2(p);
            let delta = (next - phi).abs();
            phi = next;
            if delta < LATITUDE_TOLERANCE {
                converged = true;
                break;
            }
        }
        if !converged {
            return Err(TransformError::TransformFailed(format!(
                "geocentric to ellipsoid did not converge for ({x}, {y}, {z})"
            )));
        }
        let (sin_phi, cos_phi) = phi.sin_cos();
        let n = a / (1.0 - e2 * sin_phi * sin_phi).sqrt();
        // Stable at all latitudes, unlike p / cos φ - N
        let h = p * cos_phi + z * sin_phi - a * a / n;
        Ok((lambda.to_degrees(), phi.to_degrees(), h))
    }
}

impl MathTransform for GeocentricTransform {
    fn source_dimensions(&self) -> usize {
        match self.direction {
            GeocentricDirection::EllipsoidToGeocentric => self.geographic_dim,
            GeocentricDirection::GeocentricToEllipsoid => 3,
        }
    }

    fn target_dimensions(&self) -> usize {
        match self.direction {
            GeocentricDirection::EllipsoidToGeocentric => 3,
            GeocentricDirection::GeocentricToEllipsoid => self.geographic_dim,
        }
    }

    fn transform_point(&self, src: &[f64], dst: &mut [f64]) -> Result<(), TransformError> {
        check_dimensions(self, src, dst)?;
        match self.direction {
            GeocentricDirection::EllipsoidToGeocentric => {
                let h = src.get(2).copied().unwrap_or(0.0);
                let (x, y, z) = self.to_geocentric(src[0], src[1], h);
                dst.copy_from_slice(&[x, y, z]);
            }
            GeocentricDirection::GeocentricToEllipsoid => {
                let (lon, lat, h) = self.to_ellipsoid(src[0], src[1], src[2])?;
                dst[0] = lon;
                dst[1] = lat;
                if self.geographic_dim == 3 {
                    dst[2] = h;
                }
            }
        }
        Ok(())
    }

    fn inverse(&self) -> Result<Arc<dyn MathTransform>, TransformError> {
        let direction = match self.direction {
            GeocentricDirection::EllipsoidToGeocentric => GeocentricDirection::GeocentricToEllipsoid,
            GeocentricDirection::GeocentricToEllipsoid => GeocentricDirection::EllipsoidToGeocentric,
        };
        Ok(Arc::new(Self {
            direction,
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
    use approx::assert_relative_eq;

    fn forward(dim: usize) -> GeocentricTransform {
        GeocentricTransform::new(Ellipsoid::WGS84, dim, GeocentricDirection::EllipsoidToGeocentric)
            .unwrap()
    }

    #[test]
    fn test_equator_prime_meridian() {
        let (x, y, z) = forward(3).to_geocentric(0.0, 0.0, 0.0);
        assert_relative_eq!(x, 6_378_137.0, epsilon = 1e-6);
        assert_relative_eq!(y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(z, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_north_pole() {
        let (x, _, z) = forward(3).to_geocentric(0.0, 90.0, 0.0);
        assert_relative_eq!(x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(z, Ellipsoid::WGS84.b, epsilon = 1e-6);
        let (_, lat, h) = forward(3).to_ellipsoid(0.0, 0.0, Ellipsoid::WGS84.b + 10.0).unwrap();
        assert_relative_eq!(lat, 90.0);
        assert_relative_eq!(h, 10.0, epsilon = 1e-6);
    }

    #[test]
    fn test_roundtrip_3d() {
        let fwd = forward(3);
        let inv = fwd.inverse().unwrap();
        let cases: &[[f64; 3]] = &[
            [15.0, 52.0, 100.0],
            [-73.98, 40.75, -30.0],
            [139.69, -35.68, 2500.0],
            [179.9, 89.5, 0.0],
        ];
        for p in cases {
            let mut xyz = [0.0; 3];
            fwd.transform_point(p, &mut xyz).unwrap();
            let mut back = [0.0; 3];
            inv.transform_point(&xyz, &mut back).unwrap();
            assert_relative_eq!(back[0], p[0], epsilon = 1e-9);
            assert_relative_eq!(back[1], p[1], epsilon = 1e-9);
            assert_relative_eq!(back[2], p[2], epsilon = 1e-4);
        }
    }

    #[test]
    fn test_2d_geographic_side() {
        let fwd = forward(2);
        assert_eq!(fwd.source_dimensions(), 2);
        assert_eq!(fwd.target_dimensions(), 3);
        let inv = fwd.inverse().unwrap();
        assert_eq!(inv.target_dimensions(), 2);
        let xyz = fwd.transform_points(&[10.0, 20.0]).unwrap();
        let back = inv.transform_points(&xyz).unwrap();
        assert_relative_eq!(back[0], 10.0, epsilon = 1e-9);
        assert_relative_eq!(back[1], 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_invalid_ellipsoid() {
        let bad = Ellipsoid::from_axes("bad", -1.0, 1.0);
        assert!(GeocentricTransform::new(bad, 3, GeocentricDirection::EllipsoidToGeocentric).is_err());
    }
}
