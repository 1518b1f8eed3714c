use serde::{Deserialize, Serialize};

use crate::transform::provider::{ABRIDGED_MOLODENSKY, MOLODENSKY};

/// Name of the geocentric translation method (EPSG:9603).
pub const GEOCENTRIC_TRANSLATIONS: &str = "Geocentric_Translations";

/// How a geographic-to-geographic datum shift is carried out when the
/// Bursa-Wolf parameters are a pure translation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatumShiftMethod {
    #[default]
    Molodensky,
    AbridgedMolodensky,
    /// Always go through geocentric coordinates.
    Geocentric,
}

impl DatumShiftMethod {
    /// Recognizes the datum-shift method names and their EPSG codes.
    pub fn from_method_name(name: &str) -> Option<Self> {
        let candidates = [
            (Self::Molodensky, [MOLODENSKY, "EPSG:9604"]),
            (Self::AbridgedMolodensky, [ABRIDGED_MOLODENSKY, "EPSG:9605"]),
            (Self::Geocentric, [GEOCENTRIC_TRANSLATIONS, "EPSG:9603"]),
        ];
        candidates
            .into_iter()
            .find(|(_, names)| names.iter().any(|n| crate::referencing::datum::names_equal(n, name)))
            .map(|(method, _)| method)
    }

    /// Provider name of the geographic transform, `None` for the geocentric pivot.
    pub(crate) fn provider_name(self) -> Option<&'static str> {
        match self {
            Self::Molodensky => Some(MOLODENSKY),
            Self::AbridgedMolodensky => Some(ABRIDGED_MOLODENSKY),
            Self::Geocentric => None,
        }
    }
}

/// Factory settings, fixed at construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
    pub datum_shift_method: DatumShiftMethod,
    /// Replace a missing datum shift by an identity with a large accuracy
    /// figure instead of failing.
    pub lenient_datum_shift: bool,
    /// Operations kept in the cache; 0 disables it.
    pub cache_capacity: usize,
    /// Interned operations kept before unreferenced ones are swept.
    pub pool_capacity: usize,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            datum_shift_method: DatumShiftMethod::default(),
            lenient_datum_shift: false,
            cache_capacity: 512,
            pool_capacity: 1024,
        }
    }
}

impl FactoryConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn lenient(mut self) -> Self {
        self.lenient_datum_shift = true;
        self
    }

    #[must_use]
    pub fn with_datum_shift_method(mut self, method: DatumShiftMethod) -> Self {
        self.datum_shift_method = method;
        self
    }

    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = FactoryConfig::from_json_str(r#"{"lenient_datum_shift": true}"#).unwrap();
        assert!(config.lenient_datum_shift);
        assert_eq!(config.datum_shift_method, DatumShiftMethod::Molodensky);
        assert_eq!(config.cache_capacity, 512);
        assert_eq!(config.pool_capacity, 1024);
    }

    #[test]
    fn test_method_names() {
        let config =
            FactoryConfig::from_json_str(r#"{"datum_shift_method": "abridged_molodensky"}"#).unwrap();
        assert_eq!(config.datum_shift_method, DatumShiftMethod::AbridgedMolodensky);
        assert!(FactoryConfig::from_json_str(r#"{"datum_shift_method": "nadcon"}"#).is_err());

        assert_eq!(
            DatumShiftMethod::from_method_name("geocentric translations"),
            Some(DatumShiftMethod::Geocentric)
        );
        assert_eq!(
            DatumShiftMethod::from_method_name("EPSG:9605"),
            Some(DatumShiftMethod::AbridgedMolodensky)
        );
        assert_eq!(DatumShiftMethod::from_method_name("Transverse_Mercator"), None);
    }
}
