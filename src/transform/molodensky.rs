//! Molodensky datum shift applied directly to geographic coordinates.
//!
//! Standard form (per EPSG guidance note 7-2, method 9604):
//!   Δφ = (-ΔX sinφ cosλ - ΔY sinφ sinλ + ΔZ cosφ
//!         + Δa (Rn e² sinφ cosφ)/a + Δf (Rm a/b + Rn b/a) sinφ cosφ) / (Rm + h)
//!   Δλ = (-ΔX sinλ + ΔY cosλ) / ((Rn + h) cosφ)
//!   Δh = ΔX cosφ cosλ + ΔY cosφ sinλ + ΔZ sinφ - Δa a/Rn + Δf (b/a) Rn sin²φ
//!
//! Abridged form (method 9605) drops the height terms and the Rn/Rm ratios.

use std::any::Any;
use std::sync::Arc;

use crate::error::TransformError;
use crate::referencing::ellipsoid::Ellipsoid;
use crate::transform::{check_dimensions, downcast_eq, MathTransform};

#[derive(Clone, Debug, PartialEq)]
pub struct MolodenskyTransform {
    abridged: bool,
    source_dim: usize,
    target_dim: usize,
    source: Ellipsoid,
    target: Ellipsoid,
    dx: f64,
    dy: f64,
    dz: f64,
}

impl MolodenskyTransform {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        abridged: bool,
        source_dim: usize,
        target_dim: usize,
        source: Ellipsoid,
        target: Ellipsoid,
        dx: f64,
        dy: f64,
        dz: f64,
    ) -> Result<Self, TransformError> {
        for dim in [source_dim, target_dim] {
            if !(2..=3).contains(&dim) {
                return Err(TransformError::InvalidParameter(format!(
                    "Molodensky dimension {dim}, expected 2 or 3"
                )));
            }
        }
        for e in [&source, &target] {
            if !(e.a > 0.0 && e.b > 0.0) {
                return Err(TransformError::InvalidParameter(format!(
                    "invalid ellipsoid axes a={}, b={}",
                    e.a, e.b
                )));
            }
        }
        Ok(Self {
            abridged,
            source_dim,
            target_dim,
            source,
            target,
            dx,
            dy,
            dz,
        })
    }

    /// Returns (Δλ, Δφ) in radians and Δh in metres at the given point.
    fn shift(&self, lambda: f64, phi: f64, h: f64) -> (f64, f64, f64) {
        let a = self.source.a;
        let b = self.source.b;
        let f = self.source.f;
        let e2 = self.source.e2;
        let da = self.target.a - a;
        let df = self.target.f - f;

        let (sin_phi, cos_phi) = phi.sin_cos();
        let (sin_lambda, cos_lambda) = lambda.sin_cos();
        let w2 = 1.0 - e2 * sin_phi * sin_phi;
        let rn = a / w2.sqrt();
        let rm = a * (1.0 - e2) / (w2 * w2.sqrt());

        let dlambda_num = -self.dx * sin_lambda + self.dy * cos_lambda;
        let common = -self.dx * sin_phi * cos_lambda - self.dy * sin_phi * sin_lambda + self.dz * cos_phi;
        let radial = self.dx * cos_phi * cos_lambda + self.dy * cos_phi * sin_lambda + self.dz * sin_phi;

        if self.abridged {
            let adf_fda = a * df + f * da;
            let dphi = (common + adf_fda * (2.0 * phi).sin()) / rm;
            let dlambda = dlambda_num / (rn * cos_phi);
            let dh = radial + adf_fda * sin_phi * sin_phi - da;
            (dlambda, dphi, dh)
        } else {
            let dphi = (common
                + da * (rn * e2 * sin_phi * cos_phi) / a
                + df * (rm * a / b + rn * b / a) * sin_phi * cos_phi)
                / (rm + h);
            let dlambda = dlambda_num / ((rn + h) * cos_phi);
            let dh = radial - da * a / rn + df * (b / a) * rn * sin_phi * sin_phi;
            (dlambda, dphi, dh)
        }
    }
}

impl MathTransform for MolodenskyTransform {
    fn source_dimensions(&self) -> usize {
        self.source_dim
    }

    fn target_dimensions(&self) -> usize {
        self.target_dim
    }

    fn transform_point(&self, src: &[f64], dst: &mut [f64]) -> Result<(), TransformError> {
        check_dimensions(self, src, dst)?;
        let lambda = src[0].to_radians();
        let phi = src[1].to_radians();
        let h = if self.source_dim == 3 { src[2] } else { 0.0 };
        let (dlambda, dphi, dh) = self.shift(lambda, phi, h);
        dst[0] = (lambda + dlambda).to_degrees();
        dst[1] = (phi + dphi).to_degrees();
        if self.target_dim == 3 {
            dst[2] = h + dh;
        }
        Ok(())
    }

    /// The inverse swaps the ellipsoids and negates the translation; it is an
    /// approximation of the same order as the forward formulas.
    fn inverse(&self) -> Result<Arc<dyn MathTransform>, TransformError> {
        Ok(Arc::new(Self::new(
            self.abridged,
            self.target_dim,
            self.source_dim,
            self.target,
            self.source,
            -self.dx,
            -self.dy,
            -self.dz,
        )?))
    }

    fn is_identity(&self) -> bool {
        self.source_dim == self.target_dim
            && self.dx == 0.0
            && self.dy == 0.0
            && self.dz == 0.0
            && self.source.a == self.target.a
            && self.source.b == self.target.b
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn equals(&self, other: &dyn MathTransform) -> bool {
        downcast_eq(self, other)
    }
}
