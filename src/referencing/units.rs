//! Units of measure for coordinate system axes.

use std::f64::consts::PI;

use crate::error::TransformError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnitKind {
    Length,
    Angle,
    Time,
    Scale,
}

/// A unit defined by its kind and the factor converting it to the base unit
/// of that kind (metre, radian, second, unity).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Unit {
    pub name: &'static str,
    pub kind: UnitKind,
    pub factor: f64,
}

impl Unit {
    pub const METRE: Unit = Unit::new("metre", UnitKind::Length, 1.0);
    pub const KILOMETRE: Unit = Unit::new("kilometre", UnitKind::Length, 1000.0);
    pub const FOOT: Unit = Unit::new("foot", UnitKind::Length, 0.3048);
    pub const US_SURVEY_FOOT: Unit = Unit::new("US survey foot", UnitKind::Length, 1200.0 / 3937.0);
    pub const RADIAN: Unit = Unit::new("radian", UnitKind::Angle, 1.0);
    pub const DEGREE: Unit = Unit::new("degree", UnitKind::Angle, PI / 180.0);
    pub const GRAD: Unit = Unit::new("grad", UnitKind::Angle, PI / 200.0);
    pub const ARC_SECOND: Unit = Unit::new("arc-second", UnitKind::Angle, PI / 648_000.0);
    pub const SECOND: Unit = Unit::new("second", UnitKind::Time, 1.0);
    pub const MINUTE: Unit = Unit::new("minute", UnitKind::Time, 60.0);
    pub const HOUR: Unit = Unit::new("hour", UnitKind::Time, 3600.0);
    pub const DAY: Unit = Unit::new("day", UnitKind::Time, 86_400.0);
    pub const UNITY: Unit = Unit::new("unity", UnitKind::Scale, 1.0);

    pub const fn new(name: &'static str, kind: UnitKind, factor: f64) -> Self {
        Self { name, kind, factor }
    }

    /// Multiplier converting a value in `self` into a value in `target`.
    pub fn factor_to(&self, target: &Unit) -> Result<f64, TransformError> {
        if self.kind != target.kind {
            return Err(TransformError::IncompatibleUnits(format!(
                "cannot convert {} to {}",
                self.name, target.name
            )));
        }
        Ok(self.factor / target.factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_degree_to_radian() {
        assert_relative_eq!(Unit::DEGREE.factor_to(&Unit::RADIAN).unwrap(), PI / 180.0);
        assert_relative_eq!(Unit::GRAD.factor_to(&Unit::DEGREE).unwrap(), 0.9);
    }

    #[test]
    fn test_feet() {
        assert_relative_eq!(Unit::FOOT.factor_to(&Unit::METRE).unwrap(), 0.3048);
        assert_relative_eq!(Unit::METRE.factor_to(&Unit::FOOT).unwrap(), 1.0 / 0.3048);
    }

    #[test]
    fn test_incompatible_kinds() {
        assert!(matches!(
            Unit::METRE.factor_to(&Unit::DEGREE),
            Err(TransformError::IncompatibleUnits(_))
        ));
    }
}
