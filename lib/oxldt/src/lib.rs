#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![doc(test(attr(deny(warnings))))]

mod builder;
mod call;
mod constructor;
mod error;
mod ontology;
mod parameter;
mod registry;
mod skolemizer;
mod substitution;
mod template;
mod validator;
pub mod vocab;

pub use crate::builder::{QueryBuilder, UpdateBuilder};
pub use crate::call::{BoundCall, TemplateCall};
pub use crate::constructor::Constructor;
pub use crate::error::LdtError;
pub use crate::ontology::{Ontology, OntologyError, SuperClass};
pub use crate::parameter::{Parameter, ParameterError};
pub use crate::registry::{
    NotFoundError, RegistryHandle, TemplateMatch, TemplateRegistry, TemplateRegistryError,
};
pub use crate::skolemizer::{SkolemizationError, Skolemizer};
pub use crate::template::{Template, TemplateKind};
pub use crate::validator::{
    ConstraintOracle, ConstraintViolation, ConstraintViolationError, Validator,
};
