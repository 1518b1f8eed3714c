//! Registry of parameterized transform builders, keyed by method name or alias.

use std::fmt;
use std::sync::Arc;

use crate::affine::Matrix;
use crate::error::TransformError;
use crate::operation::OperationMethod;
use crate::referencing::ellipsoid::Ellipsoid;
use crate::transform::geocentric::{GeocentricDirection, GeocentricTransform};
use crate::transform::linear::LinearTransform;
use crate::transform::molodensky::MolodenskyTransform;
use crate::transform::{MathTransform, ParameterDescriptor, ParameterValueGroup};

pub type BuildFn = fn(&ParameterValueGroup) -> Result<Arc<dyn MathTransform>, TransformError>;

pub const AFFINE: &str = "Affine";
pub const ELLIPSOID_TO_GEOCENTRIC: &str = "Ellipsoid_To_Geocentric";
pub const GEOCENTRIC_TO_ELLIPSOID: &str = "Geocentric_To_Ellipsoid";
pub const MOLODENSKY: &str = "Molodensky";
pub const ABRIDGED_MOLODENSKY: &str = "Abridged_Molodensky";

/// Largest matrix the `Affine` method accepts through parameters.
const MAX_AFFINE_SIZE: usize = 16;

/// A method description plus the function building its transform.
#[derive(Clone)]
pub struct Provider {
    pub method: OperationMethod,
    pub build: BuildFn,
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("method", &self.method.name)
            .finish()
    }
}

#[derive(Clone, Debug, Default)]
pub struct ProviderRegistry {
    providers: Vec<Provider>,
}

impl ProviderRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding the affine, geocentric, Molodensky and projection methods.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        for provider in builtin_providers()
            .into_iter()
            .chain(crate::proj::providers())
        {
            registry.register(provider);
        }
        registry
    }

    /// Adds a provider. A provider with the same method name replaces the old one.
    pub fn register(&mut self, provider: Provider) {
        match self
            .providers
            .iter_mut()
            .find(|p| p.method.matches(&provider.method.name))
        {
            Some(existing) => *existing = provider,
            None => self.providers.push(provider),
        }
    }

    pub fn find(&self, name: &str) -> Option<&Provider> {
        self.providers.iter().find(|p| p.method.matches(name))
    }

    pub fn methods(&self) -> impl Iterator<Item = &OperationMethod> {
        self.providers.iter().map(|p| &p.method)
    }
}

fn builtin_providers() -> Vec<Provider> {
    let ellipsoid_params = || {
        vec![
            ParameterDescriptor::required("semi_major"),
            ParameterDescriptor::required("semi_minor"),
            ParameterDescriptor::optional("dim", 3.0),
        ]
    };
    let molodensky_params = || {
        vec![
            ParameterDescriptor::optional("dim", 3.0),
            ParameterDescriptor::optional("src_dim", 3.0),
            ParameterDescriptor::optional("tgt_dim", 3.0),
            ParameterDescriptor::optional("dx", 0.0),
            ParameterDescriptor::optional("dy", 0.0),
            ParameterDescriptor::optional("dz", 0.0),
            ParameterDescriptor::required("src_semi_major"),
            ParameterDescriptor::required("src_semi_minor"),
            ParameterDescriptor::required("tgt_semi_major"),
            ParameterDescriptor::required("tgt_semi_minor"),
        ]
    };
    vec![
        Provider {
            method: OperationMethod::new(AFFINE, 2, 2)
                .with_aliases(&["EPSG:9624", "Affine general parametric transformation"])
                .with_parameters(vec![
                    ParameterDescriptor::optional("num_row", 3.0),
                    ParameterDescriptor::optional("num_col", 3.0),
                ]),
            build: build_affine,
        },
        Provider {
            method: OperationMethod::new(ELLIPSOID_TO_GEOCENTRIC, 3, 3)
                .with_aliases(&["EPSG:9602", "Geographic/geocentric conversions"])
                .with_parameters(ellipsoid_params()),
            build: build_to_geocentric,
        },
        Provider {
            method: OperationMethod::new(GEOCENTRIC_TO_ELLIPSOID, 3, 3)
                .with_parameters(ellipsoid_params()),
            build: build_from_geocentric,
        },
        Provider {
            method: OperationMethod::new(MOLODENSKY, 3, 3)
                .with_aliases(&["EPSG:9604"])
                .with_parameters(molodensky_params()),
            build: build_molodensky,
        },
        Provider {
            method: OperationMethod::new(ABRIDGED_MOLODENSKY, 3, 3)
                .with_aliases(&["EPSG:9605"])
                .with_parameters(molodensky_params()),
            build: build_abridged_molodensky,
        },
    ]
}

/// Reads `num_row`, `num_col` and `elt_<r>_<c>`; unset elements take identity values.
fn build_affine(params: &ParameterValueGroup) -> Result<Arc<dyn MathTransform>, TransformError> {
    let size = |name: &str| -> Result<usize, TransformError> {
        let value = params.get_or(name, 3.0);
        if value.fract() != 0.0 || !(1.0..=MAX_AFFINE_SIZE as f64).contains(&value) {
            return Err(TransformError::InvalidParameter(format!("{name} = {value}")));
        }
        Ok(value as usize)
    };
    let rows = size("num_row")?;
    let cols = size("num_col")?;
    let mut matrix = Matrix::zeros(rows - 1, cols - 1);
    for i in 0..rows.min(cols) {
        matrix.set(i, i, 1.0);
    }
    for r in 0..rows {
        for c in 0..cols {
            if let Some(v) = params.get(&format!("elt_{r}_{c}")) {
                matrix.set(r, c, v);
            }
        }
    }
    Ok(Arc::new(LinearTransform::new(matrix)))
}

fn ellipsoid_from(params: &ParameterValueGroup, prefix: &str) -> Result<Ellipsoid, TransformError> {
    let a = params.require(&format!("{prefix}semi_major"))?;
    let b = params.require(&format!("{prefix}semi_minor"))?;
    Ok(Ellipsoid::from_axes("Parameterized", a, b))
}

fn build_geocentric(
    params: &ParameterValueGroup,
    direction: GeocentricDirection,
) -> Result<Arc<dyn MathTransform>, TransformError> {
    let ellipsoid = ellipsoid_from(params, "")?;
    let dim = params.dimension("dim", 3)?;
    Ok(Arc::new(GeocentricTransform::new(ellipsoid, dim, direction)?))
}

fn build_to_geocentric(params: &ParameterValueGroup) -> Result<Arc<dyn MathTransform>, TransformError> {
    build_geocentric(params, GeocentricDirection::EllipsoidToGeocentric)
}

fn build_from_geocentric(params: &ParameterValueGroup) -> Result<Arc<dyn MathTransform>, TransformError> {
    build_geocentric(params, GeocentricDirection::GeocentricToEllipsoid)
}

fn molodensky(params: &ParameterValueGroup, abridged: bool) -> Result<Arc<dyn MathTransform>, TransformError> {
    let dim = params.dimension("dim", 3)?;
    let source_dim = params.dimension("src_dim", dim)?;
    let target_dim = params.dimension("tgt_dim", dim)?;
    Ok(Arc::new(MolodenskyTransform::new(
        abridged,
        source_dim,
        target_dim,
        ellipsoid_from(params, "src_")?,
        ellipsoid_from(params, "tgt_")?,
        params.get_or("dx", 0.0),
        params.get_or("dy", 0.0),
        params.get_or("dz", 0.0),
    )?))
}

fn build_molodensky(params: &ParameterValueGroup) -> Result<Arc<dyn MathTransform>, TransformError> {
    molodensky(params, false)
}

fn build_abridged_molodensky(params: &ParameterValueGroup) -> Result<Arc<dyn MathTransform>, TransformError> {
    molodensky(params, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_builtins_resolve_by_alias() {
        let registry = ProviderRegistry::with_builtins();
        assert!(registry.find("EPSG:9604").is_some());
        assert!(registry.find("ellipsoid to geocentric").is_some());
        assert!(registry.find("Transverse Mercator").is_some());
        assert!(registry.find("Robinson").is_none());
    }

    #[test]
    fn test_affine_elements() {
        let params = ParameterValueGroup::new()
            .with("elt_0_2", 10.0)
            .with("elt_1_1", -1.0);
        let t = build_affine(&params).unwrap();
        let out = t.transform_points(&[1.0, 2.0]).unwrap();
        assert_relative_eq!(out[0], 11.0);
        assert_relative_eq!(out[1], -2.0);
    }

    #[test]
    fn test_affine_rejects_fractional_size() {
        let params = ParameterValueGroup::new().with("num_row", 2.5);
        assert!(build_affine(&params).is_err());
    }

    #[test]
    fn test_geocentric_requires_axes() {
        let err = build_to_geocentric(&ParameterValueGroup::new()).unwrap_err();
        assert_eq!(err, TransformError::MissingParameter("semi_major".into()));
    }

    #[test]
    fn test_molodensky_dimensions() {
        let params = ParameterValueGroup::new()
            .with("src_dim", 2.0)
            .with("src_semi_major", 6_378_137.0)
            .with("src_semi_minor", 6_356_752.314_245)
            .with("tgt_semi_major", 6_378_388.0)
            .with("tgt_semi_minor", 6_356_911.946);
        let t = build_molodensky(&params).unwrap();
        assert_eq!(t.source_dimensions(), 2);
        assert_eq!(t.target_dimensions(), 3);
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut registry = ProviderRegistry::empty();
        registry.register(Provider {
            method: OperationMethod::new(AFFINE, 2, 2),
            build: build_affine,
        });
        registry.register(Provider {
            method: OperationMethod::new("affine", 3, 3),
            build: build_affine,
        });
        assert_eq!(registry.methods().count(), 1);
        assert_eq!(registry.find(AFFINE).map(|p| p.method.source_dimensions), Some(3));
    }
}
