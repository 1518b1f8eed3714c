//! Common helpers for conformal projection math (Snyder's m, t and their inverse).

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

const PHI_TOLERANCE: f64 = 1e-12;
const PHI_MAX_ITERATIONS: usize = 15;

/// m(φ) = cos φ / sqrt(1 - e² sin² φ)
pub fn msfn(phi: f64, e2: f64) -> f64 {
    let (sin_phi, cos_phi) = phi.sin_cos();
    cos_phi / (1.0 - e2 * sin_phi * sin_phi).sqrt()
}

/// t(φ) = tan(π/4 - φ/2) / ((1 - e sin φ) / (1 + e sin φ))^(e/2)
pub fn tsfn(phi: f64, e: f64) -> f64 {
    let e_sin = e * phi.sin();
    (FRAC_PI_4 - phi / 2.0).tan() / ((1.0 - e_sin) / (1.0 + e_sin)).powf(e / 2.0)
}

/// Latitude whose [`tsfn`] is `ts`, by fixed-point iteration.
pub fn phi_from_ts(ts: f64, e: f64) -> f64 {
    let half_e = e / 2.0;
    let mut phi = FRAC_PI_2 - 2.0 * ts.atan();
    for _ in 0..PHI_MAX_ITERATIONS {
        let e_sin = e * phi.sin();
        let next = FRAC_PI_2 - 2.0 * (ts * ((1.0 - e_sin) / (1.0 + e_sin)).powf(half_e)).atan();
        let delta = (next - phi).abs();
        phi = next;
        if delta < PHI_TOLERANCE {
            break;
        }
    }
    phi
}
