//! Datums anchoring coordinate systems to the Earth (or to time).

use std::f64::consts::PI;

use chrono::{DateTime, Utc};

use crate::affine::Matrix;
use crate::error::TransformError;
use crate::referencing::ellipsoid::{Ellipsoid, PrimeMeridian, ELLIPSOID_TOLERANCE};

/// Compare names the way authorities spell them: case-insensitive, ignoring
/// spaces, underscores and hyphens.
pub fn names_equal(a: &str, b: &str) -> bool {
    let norm = |s: &str| {
        s.chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect::<String>()
    };
    norm(a) == norm(b)
}

/// Arc-seconds to radians.
const ARC_SECOND: f64 = PI / 648_000.0;

/// Seven-parameter (Bursa-Wolf) shift towards another geodetic datum, in the
/// position-vector convention.
#[derive(Clone, Debug, PartialEq)]
pub struct BursaWolfParameters {
    /// Name of the datum these parameters convert into.
    pub target_datum: String,
    /// Translations in metres.
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
    /// Rotations in arc-seconds.
    pub ex: f64,
    pub ey: f64,
    pub ez: f64,
    /// Scale correction in parts per million.
    pub ppm: f64,
}

impl BursaWolfParameters {
    pub fn translation(target_datum: impl Into<String>, dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            target_datum: target_datum.into(),
            dx,
            dy,
            dz,
            ex: 0.0,
            ey: 0.0,
            ez: 0.0,
            ppm: 0.0,
        }
    }

    pub fn identity(target_datum: impl Into<String>) -> Self {
        Self::translation(target_datum, 0.0, 0.0, 0.0)
    }

    #[must_use]
    pub fn with_rotation(mut self, ex: f64, ey: f64, ez: f64, ppm: f64) -> Self {
        self.ex = ex;
        self.ey = ey;
        self.ez = ez;
        self.ppm = ppm;
        self
    }

    pub fn is_translation(&self) -> bool {
        self.ex == 0.0 && self.ey == 0.0 && self.ez == 0.0 && self.ppm == 0.0
    }

    pub fn is_identity(&self) -> bool {
        self.is_translation() && self.dx == 0.0 && self.dy == 0.0 && self.dz == 0.0
    }

    /// The 4×4 geocentric affine matrix.
    pub fn to_matrix(&self) -> Matrix {
        let s = 1.0 + self.ppm / 1e6;
        let rs = ARC_SECOND * s;
        let mut m = Matrix::identity(4);
        m.set(0, 0, s);
        m.set(0, 1, -self.ez * rs);
        m.set(0, 2, self.ey * rs);
        m.set(0, 3, self.dx);
        m.set(1, 0, self.ez * rs);
        m.set(1, 1, s);
        m.set(1, 2, -self.ex * rs);
        m.set(1, 3, self.dy);
        m.set(2, 0, -self.ey * rs);
        m.set(2, 1, self.ex * rs);
        m.set(2, 2, s);
        m.set(2, 3, self.dz);
        m
    }

    /// Retrofit a geocentric affine matrix into Bursa-Wolf form.
    ///
    /// Fails when the matrix is not 4×4 affine, when its diagonal is not a
    /// uniform scale, or when its off-diagonal terms are not antisymmetric,
    /// all within `tolerance` (arc-seconds for rotations, unitless for scale).
    pub fn from_matrix(
        target_datum: impl Into<String>,
        matrix: &Matrix,
        tolerance: f64,
    ) -> Result<Self, TransformError> {
        if matrix.num_row() != 4 || matrix.num_col() != 4 || !matrix.is_affine() {
            return Err(TransformError::InvalidParameter(
                "Bursa-Wolf parameters require a 4×4 affine matrix".into(),
            ));
        }
        let s = (matrix.get(0, 0) + matrix.get(1, 1) + matrix.get(2, 2)) / 3.0;
        for j in 0..3 {
            if (matrix.get(j, j) - s).abs() > tolerance {
                return Err(TransformError::InvalidParameter(
                    "matrix scale is not uniform".into(),
                ));
            }
        }
        let rs = ARC_SECOND * s;
        let ex = matrix.get(2, 1) / rs;
        let ey = matrix.get(0, 2) / rs;
        let ez = matrix.get(1, 0) / rs;
        let antisymmetric = (matrix.get(1, 2) / rs + ex).abs() <= tolerance
            && (matrix.get(2, 0) / rs + ey).abs() <= tolerance
            && (matrix.get(0, 1) / rs + ez).abs() <= tolerance;
        if !antisymmetric {
            return Err(TransformError::InvalidParameter(
                "matrix rotation part is not a small-angle rotation".into(),
            ));
        }
        Ok(Self {
            target_datum: target_datum.into(),
            dx: matrix.get(0, 3),
            dy: matrix.get(1, 3),
            dz: matrix.get(2, 3),
            ex,
            ey,
            ez,
            ppm: (s - 1.0) * 1e6,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GeodeticDatum {
    pub name: String,
    pub aliases: Vec<String>,
    pub ellipsoid: Ellipsoid,
    pub prime_meridian: PrimeMeridian,
    pub bursa_wolf: Vec<BursaWolfParameters>,
}

impl GeodeticDatum {
    pub fn new(name: impl Into<String>, ellipsoid: Ellipsoid) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            ellipsoid,
            prime_meridian: PrimeMeridian::greenwich(),
            bursa_wolf: Vec::new(),
        }
    }

    pub fn wgs84() -> Self {
        Self::new("World Geodetic System 1984", Ellipsoid::WGS84).with_alias("WGS84")
    }

    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    #[must_use]
    pub fn with_prime_meridian(mut self, prime_meridian: PrimeMeridian) -> Self {
        self.prime_meridian = prime_meridian;
        self
    }

    #[must_use]
    pub fn with_bursa_wolf(mut self, params: BursaWolfParameters) -> Self {
        self.bursa_wolf.push(params);
        self
    }

    /// True if `name` is this datum's name or one of its aliases.
    pub fn name_matches(&self, name: &str) -> bool {
        names_equal(&self.name, name) || self.aliases.iter().any(|a| names_equal(a, name))
    }

    /// Name match in either direction.
    pub fn same_name(&self, other: &GeodeticDatum) -> bool {
        self.name_matches(&other.name) || other.name_matches(&self.name)
    }

    /// Same datum for the purpose of deciding whether a shift is needed:
    /// names match and the ellipsoids are the same figure.
    pub fn is_same_datum(&self, other: &GeodeticDatum) -> bool {
        self.same_name(other) && self.ellipsoid.approx_eq(&other.ellipsoid, ELLIPSOID_TOLERANCE)
    }

    /// Same datum within a few metres; names are not compared.
    pub fn is_loosely_same(&self, other: &GeodeticDatum) -> bool {
        self.ellipsoid.approx_eq(&other.ellipsoid, LOOSE_TOLERANCE)
            && (self.prime_meridian.greenwich_longitude - other.prime_meridian.greenwich_longitude)
                .abs()
                <= 1e-9
    }

    /// Value equality ignoring aliases and declared shift parameters.
    pub fn equals_ignore_metadata(&self, other: &GeodeticDatum) -> bool {
        self.is_same_datum(other)
            && self.prime_meridian.greenwich_longitude == other.prime_meridian.greenwich_longitude
    }

    /// Declared parameters towards `target`, if any.
    pub fn bursa_wolf_to(&self, target: &GeodeticDatum) -> Option<&BursaWolfParameters> {
        self.bursa_wolf
            .iter()
            .find(|bw| target.name_matches(&bw.target_datum))
    }

    /// A copy on the Greenwich meridian, used for normalized intermediate CRS.
    pub fn on_greenwich(&self) -> Self {
        let mut datum = self.clone();
        datum.prime_meridian = PrimeMeridian::greenwich();
        datum
    }
}

/// Ellipsoid tolerance, in metres, of the loose datum comparison.
pub const LOOSE_TOLERANCE: f64 = 3.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VerticalDatumType {
    /// Heights above the ellipsoid; the only type convertible to and from
    /// geographic 3D coordinates without a geoid model.
    Ellipsoidal,
    GravityRelated,
    Depth,
    Barometric,
    Other,
}

/// Constant offset from one vertical datum to another (EPSG method 9616).
#[derive(Clone, Debug, PartialEq)]
pub struct VerticalOffset {
    pub target_datum: String,
    /// Metres added to a height in the source datum.
    pub offset: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VerticalDatum {
    pub name: String,
    pub datum_type: VerticalDatumType,
    pub offsets: Vec<VerticalOffset>,
}

impl VerticalDatum {
    pub fn new(name: impl Into<String>, datum_type: VerticalDatumType) -> Self {
        Self {
            name: name.into(),
            datum_type,
            offsets: Vec::new(),
        }
    }

    pub fn ellipsoidal() -> Self {
        Self::new("Ellipsoid", VerticalDatumType::Ellipsoidal)
    }

    #[must_use]
    pub fn with_offset(mut self, target_datum: impl Into<String>, offset: f64) -> Self {
        self.offsets.push(VerticalOffset {
            target_datum: target_datum.into(),
            offset,
        });
        self
    }

    pub fn equals_ignore_metadata(&self, other: &VerticalDatum) -> bool {
        self.datum_type == other.datum_type && names_equal(&self.name, &other.name)
    }

    pub fn is_loosely_same(&self, other: &VerticalDatum) -> bool {
        self.datum_type == other.datum_type
    }

    /// Height offset (metres) from `self` to `target`, either declared here or
    /// derived by negating the one declared on `target`.
    pub fn offset_to(&self, target: &VerticalDatum) -> Option<f64> {
        self.offsets
            .iter()
            .find(|o| names_equal(&o.target_datum, &target.name))
            .map(|o| o.offset)
            .or_else(|| {
                target
                    .offsets
                    .iter()
                    .find(|o| names_equal(&o.target_datum, &self.name))
                    .map(|o| -o.offset)
            })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TemporalDatum {
    pub name: String,
    pub origin: DateTime<Utc>,
}

impl TemporalDatum {
    pub fn new(name: impl Into<String>, origin: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            origin,
        }
    }

    pub fn unix() -> Self {
        Self::new("Unix epoch", DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn equals_ignore_metadata(&self, other: &TemporalDatum) -> bool {
        self.origin == other.origin
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EngineeringDatum {
    pub name: String,
}

impl EngineeringDatum {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn equals_ignore_metadata(&self, other: &EngineeringDatum) -> bool {
        names_equal(&self.name, &other.name)
    }
}

/// Borrowed view of any datum, as returned by [`crate::referencing::Crs::datum`].
#[derive(Clone, Copy, Debug)]
pub enum DatumRef<'a> {
    Geodetic(&'a GeodeticDatum),
    Vertical(&'a VerticalDatum),
    Temporal(&'a TemporalDatum),
    Engineering(&'a EngineeringDatum),
}

impl DatumRef<'_> {
    pub fn name(&self) -> &str {
        match self {
            Self::Geodetic(d) => &d.name,
            Self::Vertical(d) => &d.name,
            Self::Temporal(d) => &d.name,
            Self::Engineering(d) => &d.name,
        }
    }

    /// `strict` compares names and ellipsoids; otherwise only the figure
    /// within [`LOOSE_TOLERANCE`] (or the vertical datum type).
    pub fn matches(&self, other: &DatumRef<'_>, strict: bool) -> bool {
        match (self, other) {
            (Self::Geodetic(a), DatumRef::Geodetic(b)) => {
                if strict {
                    a.is_same_datum(b)
                } else {
                    a.is_loosely_same(b)
                }
            }
            (Self::Vertical(a), DatumRef::Vertical(b)) => {
                if strict {
                    a.equals_ignore_metadata(b)
                } else {
                    a.is_loosely_same(b)
                }
            }
            (Self::Temporal(a), DatumRef::Temporal(b)) => a.equals_ignore_metadata(b),
            (Self::Engineering(a), DatumRef::Engineering(b)) => a.equals_ignore_metadata(b),
            _ => false,
        }
    }
}
