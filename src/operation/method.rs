use crate::referencing::datum::names_equal;
use crate::transform::ParameterDescriptor;

/// Shape of the developable surface of a map projection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProjectionKind {
    Conic,
    Cylindrical,
    Planar,
}

/// Describes an algorithm: its name, aliases, dimensions and parameters.
/// Operations compare their methods by name only.
#[derive(Clone, Debug, PartialEq)]
pub struct OperationMethod {
    pub name: String,
    pub aliases: Vec<String>,
    pub source_dimensions: usize,
    pub target_dimensions: usize,
    pub parameters: Vec<ParameterDescriptor>,
    pub projection: Option<ProjectionKind>,
}

impl OperationMethod {
    pub fn new(name: &str, source_dimensions: usize, target_dimensions: usize) -> Self {
        Self {
            name: name.to_owned(),
            aliases: Vec::new(),
            source_dimensions,
            target_dimensions,
            parameters: Vec::new(),
            projection: None,
        }
    }

    #[must_use]
    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases.extend(aliases.iter().map(|a| (*a).to_owned()));
        self
    }

    #[must_use]
    pub fn with_parameters(mut self, parameters: Vec<ParameterDescriptor>) -> Self {
        self.parameters = parameters;
        self
    }

    #[must_use]
    pub fn with_projection(mut self, kind: ProjectionKind) -> Self {
        self.projection = Some(kind);
        self
    }

    /// Name or alias match, ignoring case and separators.
    pub fn matches(&self, name: &str) -> bool {
        self.names().any(|n| names_equal(n, name))
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}
