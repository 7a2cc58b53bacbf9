use crate::ontology::OntologyError;
use crate::parameter::ParameterError;
use crate::registry::{NotFoundError, TemplateRegistryError};
use crate::skolemizer::SkolemizationError;
use crate::validator::ConstraintViolationError;
use thiserror::Error;

/// Any failure the engine reports to its caller.
///
/// None of these are retried internally. They describe either a client
/// mistake (`NotFound`, `Parameter`, `Skolemization`, `ConstraintViolation`)
/// or a deployment defect in the ontology (`Registry`, `Ontology`), and the
/// caller decides how to surface them.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LdtError {
    /// No template matches the request path.
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    /// A bound value failed type or cardinality validation.
    #[error(transparent)]
    Parameter(#[from] ParameterError),
    /// The template declarations are structurally invalid.
    #[error(transparent)]
    Registry(#[from] TemplateRegistryError),
    /// The class hierarchy or its constructors are inconsistent.
    #[error(transparent)]
    Ontology(#[from] OntologyError),
    /// A blank node's template cannot be satisfied.
    #[error(transparent)]
    Skolemization(#[from] SkolemizationError),
    /// A payload failed constraint validation.
    #[error(transparent)]
    ConstraintViolation(#[from] ConstraintViolationError),
}
