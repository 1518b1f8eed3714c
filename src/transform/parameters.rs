//! Named numeric parameters for parameterized transforms.

use crate::error::TransformError;
use crate::referencing::datum::names_equal;

/// Describes one parameter accepted by an operation method.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterDescriptor {
    pub name: String,
    /// `None` marks a mandatory parameter.
    pub default: Option<f64>,
}

impl ParameterDescriptor {
    pub fn required(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            default: None,
        }
    }

    pub fn optional(name: &str, default: f64) -> Self {
        Self {
            name: name.to_owned(),
            default: Some(default),
        }
    }
}

/// Ordered list of `(name, value)` pairs. Lookups ignore case and separators.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterValueGroup {
    values: Vec<(String, f64)>,
}

impl ParameterValueGroup {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: f64) {
        match self.values.iter_mut().find(|(n, _)| names_equal(n, name)) {
            Some(entry) => entry.1 = value,
            None => self.values.push((name.to_owned(), value)),
        }
    }

    pub fn set_if_absent(&mut self, name: &str, value: f64) {
        if self.get(name).is_none() {
            self.values.push((name.to_owned(), value));
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(n, _)| names_equal(n, name))
            .map(|(_, v)| *v)
    }

    pub fn get_or(&self, name: &str, default: f64) -> f64 {
        self.get(name).unwrap_or(default)
    }

    pub fn require(&self, name: &str) -> Result<f64, TransformError> {
        let value = self
            .get(name)
            .ok_or_else(|| TransformError::MissingParameter(name.to_owned()))?;
        if !value.is_finite() {
            return Err(TransformError::InvalidParameter(format!(
                "{name} = {value} is not finite"
            )));
        }
        Ok(value)
    }

    /// Reads an integer-valued dimension parameter.
    pub fn dimension(&self, name: &str, default: usize) -> Result<usize, TransformError> {
        match self.get(name) {
            None => Ok(default),
            Some(v) if v == 2.0 => Ok(2),
            Some(v) if v == 3.0 => Ok(3),
            Some(v) => Err(TransformError::InvalidParameter(format!(
                "{name} = {v}, expected 2 or 3"
            ))),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Same names and values, in any order.
    pub fn equals_ignore_order(&self, other: &ParameterValueGroup) -> bool {
        self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .all(|(n, v)| other.get(n).is_some_and(|o| o == *v))
    }
}
