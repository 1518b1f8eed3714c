//! Coordinate systems: ordered axes with a direction and a unit.

use std::fmt;

use crate::affine::Matrix;
use crate::error::TransformError;
use crate::referencing::units::Unit;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AxisDirection {
    North,
    South,
    East,
    West,
    Up,
    Down,
    GeocentricX,
    GeocentricY,
    GeocentricZ,
    Future,
    Past,
    ColumnPositive,
    ColumnNegative,
    RowPositive,
    RowNegative,
    Other,
}

impl AxisDirection {
    /// The direction with the sign removed (`South` → `North`, `Past` → `Future`, ...).
    pub fn absolute(self) -> Self {
        match self {
            Self::South => Self::North,
            Self::West => Self::East,
            Self::Down => Self::Up,
            Self::Past => Self::Future,
            Self::ColumnNegative => Self::ColumnPositive,
            Self::RowNegative => Self::RowPositive,
            other => other,
        }
    }

    /// `+1` when the direction equals its absolute direction, `-1` otherwise.
    pub fn sign(self) -> f64 {
        if self.absolute() == self {
            1.0
        } else {
            -1.0
        }
    }
}

impl fmt::Display for AxisDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Clone, Debug)]
pub struct Axis {
    pub name: String,
    pub direction: AxisDirection,
    pub unit: Unit,
}

impl Axis {
    pub fn new(name: impl Into<String>, direction: AxisDirection, unit: Unit) -> Self {
        Self {
            name: name.into(),
            direction,
            unit,
        }
    }

    pub fn equals_ignore_metadata(&self, other: &Axis) -> bool {
        self.direction == other.direction && self.unit == other.unit
    }
}

impl PartialEq for Axis {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.equals_ignore_metadata(other)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CoordinateSystem {
    axes: Vec<Axis>,
}

impl CoordinateSystem {
    pub fn new(axes: Vec<Axis>) -> Self {
        Self { axes }
    }

    /// Longitude east, latitude north, in `unit`.
    pub fn ellipsoidal_2d(unit: Unit) -> Self {
        Self::new(vec![
            Axis::new("Geodetic longitude", AxisDirection::East, unit),
            Axis::new("Geodetic latitude", AxisDirection::North, unit),
        ])
    }

    /// Latitude north, longitude east (the EPSG axis order), in `unit`.
    pub fn ellipsoidal_2d_lat_lon(unit: Unit) -> Self {
        Self::new(vec![
            Axis::new("Geodetic latitude", AxisDirection::North, unit),
            Axis::new("Geodetic longitude", AxisDirection::East, unit),
        ])
    }

    /// Longitude east, latitude north in `angular`, ellipsoidal height up in `linear`.
    pub fn ellipsoidal_3d(angular: Unit, linear: Unit) -> Self {
        Self::new(vec![
            Axis::new("Geodetic longitude", AxisDirection::East, angular),
            Axis::new("Geodetic latitude", AxisDirection::North, angular),
            Axis::new("Ellipsoidal height", AxisDirection::Up, linear),
        ])
    }

    /// Normalized geographic axes: degrees east/north, plus metres up when 3D.
    pub fn normalized_geographic(dimension: usize) -> Self {
        if dimension >= 3 {
            Self::ellipsoidal_3d(Unit::DEGREE, Unit::METRE)
        } else {
            Self::ellipsoidal_2d(Unit::DEGREE)
        }
    }

    pub fn geocentric() -> Self {
        Self::new(vec![
            Axis::new("Geocentric X", AxisDirection::GeocentricX, Unit::METRE),
            Axis::new("Geocentric Y", AxisDirection::GeocentricY, Unit::METRE),
            Axis::new("Geocentric Z", AxisDirection::GeocentricZ, Unit::METRE),
        ])
    }

    /// Easting, northing.
    pub fn projected(unit: Unit) -> Self {
        Self::new(vec![
            Axis::new("Easting", AxisDirection::East, unit),
            Axis::new("Northing", AxisDirection::North, unit),
        ])
    }

    pub fn vertical(direction: AxisDirection, unit: Unit) -> Self {
        let name = if direction == AxisDirection::Down {
            "Depth"
        } else {
            "Height"
        };
        Self::new(vec![Axis::new(name, direction, unit)])
    }

    pub fn temporal(direction: AxisDirection, unit: Unit) -> Self {
        Self::new(vec![Axis::new("Time", direction, unit)])
    }

    pub fn dimension(&self) -> usize {
        self.axes.len()
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn axis(&self, index: usize) -> Option<&Axis> {
        self.axes.get(index)
    }

    pub fn index_of(&self, direction: AxisDirection) -> Option<usize> {
        let abs = direction.absolute();
        self.axes.iter().position(|a| a.direction.absolute() == abs)
    }

    pub fn equals_ignore_metadata(&self, other: &CoordinateSystem) -> bool {
        self.axes.len() == other.axes.len()
            && self
                .axes
                .iter()
                .zip(&other.axes)
                .all(|(a, b)| a.equals_ignore_metadata(b))
    }

    /// Affine matrix converting coordinates in `self` into coordinates in `target`.
    ///
    /// Every target axis takes its value from the source axis with the same
    /// absolute direction, negated when the directions are opposite and scaled
    /// by the unit conversion factor. Source axes without a target counterpart
    /// are dropped; a target axis without a source counterpart is an error.
    pub fn swap_and_scale(&self, target: &CoordinateSystem) -> Result<Matrix, TransformError> {
        let src_dim = self.dimension();
        let tgt_dim = target.dimension();
        let mut matrix = Matrix::zeros(tgt_dim, src_dim);
        let mut used = vec![false; src_dim];
        for (j, t_axis) in target.axes.iter().enumerate() {
            let abs = t_axis.direction.absolute();
            let i = self
                .axes
                .iter()
                .enumerate()
                .position(|(i, s)| !used[i] && s.direction.absolute() == abs)
                .ok_or_else(|| {
                    TransformError::AxisMismatch(format!(
                        "no source axis matches target axis \"{}\" ({})",
                        t_axis.name, t_axis.direction
                    ))
                })?;
            used[i] = true;
            let s_axis = &self.axes[i];
            let sign = s_axis.direction.sign() * t_axis.direction.sign();
            let scale = s_axis.unit.factor_to(&t_axis.unit)?;
            matrix.set(j, i, sign * scale);
        }
        Ok(matrix)
    }
}
