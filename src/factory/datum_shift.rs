//! Finding the Bursa-Wolf parameters between two geodetic datums.

use tracing::debug;

use crate::error::OperationError;
use crate::operation::{
    OperationMethod, DATUM_SHIFT, DATUM_SHIFT_ACCURACY, DATUM_SHIFT_OMITTED_ACCURACY, ELLIPSOID_SHIFT,
};
use crate::referencing::datum::names_equal;
use crate::referencing::{BursaWolfParameters, GeodeticDatum};

use super::config::GEOCENTRIC_TRANSLATIONS;

/// Tolerance (arc-seconds, ppm) when a derived matrix is retrofitted into
/// Bursa-Wolf form.
pub(crate) const RETROFIT_TOLERANCE: f64 = 1e-4;

pub(crate) const POSITION_VECTOR: &str = "Position_Vector_Transformation";

/// Resolved shift from one datum to another.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct DatumShift {
    pub parameters: BursaWolfParameters,
    /// [`DATUM_SHIFT`], or [`ELLIPSOID_SHIFT`] when the shift was omitted.
    pub name: &'static str,
    pub accuracy: f64,
}

impl DatumShift {
    /// Method reported by a geocentric step applying this shift.
    pub fn method(&self) -> OperationMethod {
        if self.parameters.is_translation() {
            OperationMethod::new(GEOCENTRIC_TRANSLATIONS, 3, 3).with_aliases(&["EPSG:9603"])
        } else {
            OperationMethod::new(POSITION_VECTOR, 3, 3).with_aliases(&["EPSG:9606"])
        }
    }
}

pub(crate) fn resolve(
    source: &GeodeticDatum,
    target: &GeodeticDatum,
    lenient: bool,
) -> Result<DatumShift, OperationError> {
    if let Some(params) = source.bursa_wolf_to(target) {
        debug!(source = %source.name, target = %target.name, "declared Bursa-Wolf parameters");
        return Ok(applied(params.clone()));
    }
    if let Some(params) = derived(source, target) {
        debug!(source = %source.name, target = %target.name, "derived Bursa-Wolf parameters");
        return Ok(applied(params));
    }
    if lenient {
        debug!(source = %source.name, target = %target.name, "datum shift omitted");
        return Ok(DatumShift {
            parameters: BursaWolfParameters::identity(target.name.clone()),
            name: ELLIPSOID_SHIFT,
            accuracy: DATUM_SHIFT_OMITTED_ACCURACY,
        });
    }
    Err(OperationError::not_found(format!(
        "Bursa-Wolf parameters required from \"{}\" to \"{}\"",
        source.name, target.name
    )))
}

fn applied(parameters: BursaWolfParameters) -> DatumShift {
    DatumShift {
        parameters,
        name: DATUM_SHIFT,
        accuracy: DATUM_SHIFT_ACCURACY,
    }
}

/// Inverse of the parameters declared on `target` towards `source`, or the
/// path through a datum both declare parameters to.
fn derived(source: &GeodeticDatum, target: &GeodeticDatum) -> Option<BursaWolfParameters> {
    if let Some(reverse) = target.bursa_wolf_to(source) {
        let retrofitted = reverse
            .to_matrix()
            .inverse()
            .and_then(|m| BursaWolfParameters::from_matrix(target.name.clone(), &m, RETROFIT_TOLERANCE));
        if let Ok(params) = retrofitted {
            return Some(params);
        }
    }
    for to_common in &source.bursa_wolf {
        let Some(target_to_common) = target
            .bursa_wolf
            .iter()
            .find(|bw| names_equal(&bw.target_datum, &to_common.target_datum))
        else {
            continue;
        };
        let composed = target_to_common
            .to_matrix()
            .inverse()
            .and_then(|inverse| inverse.multiply(&to_common.to_matrix()))
            .and_then(|m| BursaWolfParameters::from_matrix(target.name.clone(), &m, RETROFIT_TOLERANCE));
        match composed {
            Ok(params) => return Some(params),
            Err(err) => {
                debug!(common = %to_common.target_datum, error = %err, "composition not retrofittable");
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::referencing::Ellipsoid;
    use approx::assert_relative_eq;

    fn ed50() -> GeodeticDatum {
        GeodeticDatum::new("European Datum 1950", Ellipsoid::INTERNATIONAL_1924).with_alias("ED50")
    }

    #[test]
    fn test_declared_parameters_win() {
        let source = ed50().with_bursa_wolf(BursaWolfParameters::translation("WGS84", -87.0, -98.0, -121.0));
        let shift = resolve(&source, &GeodeticDatum::wgs84(), false).unwrap();
        assert_eq!(shift.name, DATUM_SHIFT);
        assert_eq!(shift.accuracy, DATUM_SHIFT_ACCURACY);
        assert_eq!(shift.parameters.dx, -87.0);
        assert_eq!(shift.method().name, GEOCENTRIC_TRANSLATIONS);
    }

    #[test]
    fn test_reverse_parameters_are_inverted() {
        let wgs84 = GeodeticDatum::wgs84().with_bursa_wolf(
            BursaWolfParameters::translation("ED50", 87.0, 98.0, 121.0).with_rotation(0.1, -0.2, 0.3, 1.5),
        );
        let shift = resolve(&ed50(), &wgs84, false).unwrap();
        let p = &shift.parameters;
        assert_eq!(p.target_datum, wgs84.name);
        assert_relative_eq!(p.ex, -0.1, epsilon = 1e-4);
        assert_relative_eq!(p.ey, 0.2, epsilon = 1e-4);
        assert_relative_eq!(p.ez, -0.3, epsilon = 1e-4);
        assert_relative_eq!(p.ppm, -1.5, epsilon = 1e-3);
        assert_relative_eq!(p.dx, -87.0, epsilon = 0.01);
        assert_eq!(shift.method().name, POSITION_VECTOR);

        let forward = wgs84.bursa_wolf_to(&ed50()).unwrap().to_matrix();
        let product = p.to_matrix().multiply(&forward).unwrap();
        assert!(product.is_identity_within(1e-6));
    }

    #[test]
    fn test_common_datum_composition() {
        let source = ed50().with_bursa_wolf(BursaWolfParameters::translation("WGS84", -87.0, -98.0, -121.0));
        let target = GeodeticDatum::new("North American Datum 1927", Ellipsoid::CLARKE_1866)
            .with_bursa_wolf(BursaWolfParameters::translation("WGS84", -8.0, 160.0, 176.0));
        let shift = resolve(&source, &target, false).unwrap();
        assert_relative_eq!(shift.parameters.dx, -79.0, epsilon = 1e-9);
        assert_relative_eq!(shift.parameters.dy, -258.0, epsilon = 1e-9);
        assert_relative_eq!(shift.parameters.dz, -297.0, epsilon = 1e-9);
        assert!(shift.parameters.is_translation());
    }

    #[test]
    fn test_missing_parameters() {
        let err = resolve(&ed50(), &GeodeticDatum::wgs84(), false).unwrap_err();
        assert!(err.is_not_found());

        let shift = resolve(&ed50(), &GeodeticDatum::wgs84(), true).unwrap();
        assert_eq!(shift.name, ELLIPSOID_SHIFT);
        assert_eq!(shift.accuracy, DATUM_SHIFT_OMITTED_ACCURACY);
        assert!(shift.parameters.is_identity());
    }
}
