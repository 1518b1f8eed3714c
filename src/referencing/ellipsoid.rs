/// Reference ellipsoid parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ellipsoid {
    pub name: &'static str,
    /// Semi-major axis (metres)
    pub a: f64,
    /// Semi-minor axis (metres)
    pub b: f64,
    /// Flattening: (a - b) / a
    pub f: f64,
    /// First eccentricity squared
    pub e2: f64,
    /// Second eccentricity squared: e^2 / (1 - e^2)
    pub ep2: f64,
    /// Third flattening: f / (2 - f)
    pub n: f64,
}

impl Ellipsoid {
    /// Build from the semi-major axis and the inverse flattening.
    /// An infinite inverse flattening gives a sphere.
    pub const fn from_inverse_flattening(name: &'static str, a: f64, inverse_flattening: f64) -> Self {
        let f = if inverse_flattening == f64::INFINITY {
            0.0
        } else {
            1.0 / inverse_flattening
        };
        Self::with_flattening(name, a, f)
    }

    /// Build from both semi-axes.
    pub const fn from_axes(name: &'static str, a: f64, b: f64) -> Self {
        Self::with_flattening(name, a, (a - b) / a)
    }

    const fn with_flattening(name: &'static str, a: f64, f: f64) -> Self {
        let b = a * (1.0 - f);
        let e2 = 2.0 * f - f * f;
        let ep2 = e2 / (1.0 - e2);
        let n = f / (2.0 - f);
        Self {
            name,
            a,
            b,
            f,
            e2,
            ep2,
            n,
        }
    }

    /// First eccentricity (`sqrt` is not const, so it is computed on demand).
    pub fn eccentricity(&self) -> f64 {
        self.e2.sqrt()
    }

    pub fn is_sphere(&self) -> bool {
        self.f == 0.0
    }

    /// Same semi-axes within `tolerance` metres. Names are ignored.
    pub fn approx_eq(&self, other: &Ellipsoid, tolerance: f64) -> bool {
        (self.a - other.a).abs() <= tolerance && (self.b - other.b).abs() <= tolerance
    }

    pub const WGS84: Ellipsoid = Ellipsoid::from_inverse_flattening("WGS 84", 6_378_137.0, 298.257_223_563);
    pub const GRS80: Ellipsoid = Ellipsoid::from_inverse_flattening("GRS 1980", 6_378_137.0, 298.257_222_101);
    pub const INTERNATIONAL_1924: Ellipsoid =
        Ellipsoid::from_inverse_flattening("International 1924", 6_378_388.0, 297.0);
    pub const CLARKE_1866: Ellipsoid = Ellipsoid::from_axes("Clarke 1866", 6_378_206.4, 6_356_583.8);
    pub const BESSEL_1841: Ellipsoid =
        Ellipsoid::from_inverse_flattening("Bessel 1841", 6_377_397.155, 299.152_812_8);
}

/// Tolerance (metres) below which two ellipsoids are treated as the same figure.
pub const ELLIPSOID_TOLERANCE: f64 = 1e-3;

/// Longitude origin of a geographic CRS.
#[derive(Clone, Debug, PartialEq)]
pub struct PrimeMeridian {
    pub name: String,
    /// Longitude of this meridian east of Greenwich, in degrees.
    pub greenwich_longitude: f64,
}

impl PrimeMeridian {
    pub fn new(name: impl Into<String>, greenwich_longitude: f64) -> Self {
        Self {
            name: name.into(),
            greenwich_longitude,
        }
    }

    pub fn greenwich() -> Self {
        Self::new("Greenwich", 0.0)
    }

    pub fn paris() -> Self {
        Self::new("Paris", 2.337_229_166_666_667)
    }

    pub fn is_greenwich(&self) -> bool {
        self.greenwich_longitude == 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_wgs84_constants() {
        let wgs84 = Ellipsoid::WGS84;
        assert_relative_eq!(wgs84.a, 6_378_137.0);
        assert_relative_eq!(wgs84.b, 6_356_752.314_245_179, epsilon = 0.001);
        assert_relative_eq!(wgs84.eccentricity(), 0.081_819_190_842_622, epsilon = 1e-12);
        assert_relative_eq!(wgs84.n, 0.001_679_220_386_383_705, epsilon = 1e-12);
    }

    #[test]
    fn test_grs80_close_to_wgs84() {
        // WGS84 and GRS80 differ only slightly
        assert!(Ellipsoid::WGS84.approx_eq(&Ellipsoid::GRS80, ELLIPSOID_TOLERANCE));
        assert!(!Ellipsoid::WGS84.approx_eq(&Ellipsoid::INTERNATIONAL_1924, 3.0));
    }

    #[test]
    fn test_from_axes_matches_flattening() {
        let e = Ellipsoid::from_axes("test", 6_378_137.0, 6_356_752.314);
        assert_relative_eq!(e.f, Ellipsoid::WGS84.f, epsilon = 1e-10);
    }
}
