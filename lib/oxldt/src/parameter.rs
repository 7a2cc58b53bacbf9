use crate::registry::TemplateRegistryError;
use crate::vocab::ldt;
use oxrdf::vocab::{rdfs, xsd};
use oxrdf::{
    Graph, Literal, NamedNode, NamedNodeRef, NamedOrBlankNodeRef, Term, TermRef, Variable,
};
use oxsdatatypes::{Boolean, Date, DateTime, Decimal, Double, Float, Integer, Time};
use std::str::FromStr;
use thiserror::Error;

/// A declared template parameter.
///
/// A parameter binds one SPARQL variable of the template's stored queries.
/// Its variable name is the local name of the declared predicate, and the same
/// name is used as query string key when arguments arrive over HTTP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub(crate) variable: Variable,
    pub(crate) predicate: NamedNode,
    pub(crate) value_type: Option<NamedNode>,
    pub(crate) default_value: Option<Term>,
    pub(crate) required: bool,
    pub(crate) multi_valued: bool,
}

impl Parameter {
    pub(crate) fn from_graph(
        graph: &Graph,
        node: NamedOrBlankNodeRef<'_>,
    ) -> Result<Self, TemplateRegistryError> {
        let predicate = match graph.object_for_subject_predicate(node, ldt::PREDICATE) {
            Some(TermRef::NamedNode(predicate)) => predicate.into_owned(),
            Some(_) => {
                return Err(TemplateRegistryError::UnexpectedValue {
                    subject: node.into_owned(),
                    property: ldt::PREDICATE.into_owned(),
                    expected: "an IRI",
                })
            }
            None => {
                return Err(TemplateRegistryError::MissingParameterPredicate(
                    node.into_owned(),
                ))
            }
        };
        let variable = Variable::new(local_name(predicate.as_str())).map_err(|e| {
            TemplateRegistryError::InvalidParameterVariable {
                predicate: predicate.clone(),
                source: e,
            }
        })?;
        let value_type = match graph.object_for_subject_predicate(node, ldt::VALUE_TYPE) {
            Some(TermRef::NamedNode(datatype)) => Some(datatype.into_owned()),
            Some(_) => {
                return Err(TemplateRegistryError::UnexpectedValue {
                    subject: node.into_owned(),
                    property: ldt::VALUE_TYPE.into_owned(),
                    expected: "an IRI",
                })
            }
            None => None,
        };
        let default_value = graph
            .object_for_subject_predicate(node, ldt::DEFAULT_VALUE)
            .map(TermRef::into_owned);
        let optional = boolean_object(graph, node, ldt::OPTIONAL)?.unwrap_or(false);
        let multi_valued = boolean_object(graph, node, ldt::MULTI_VALUED)?.unwrap_or(false);
        Ok(Self {
            variable,
            predicate,
            value_type,
            default_value,
            required: !optional,
            multi_valued,
        })
    }

    /// The SPARQL variable this parameter binds.
    pub fn variable(&self) -> &Variable {
        &self.variable
    }

    /// The predicate declared with `ldt:predicate`.
    pub fn predicate(&self) -> NamedNodeRef<'_> {
        self.predicate.as_ref()
    }

    /// The expected datatype of values, or `rdfs:Resource` for IRI values.
    pub fn value_type(&self) -> Option<NamedNodeRef<'_>> {
        self.value_type.as_ref().map(NamedNode::as_ref)
    }

    /// The value bound when the request leaves the parameter unbound.
    pub fn default_value(&self) -> Option<&Term> {
        self.default_value.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_multi_valued(&self) -> bool {
        self.multi_valued
    }

    /// Converts a raw request value into an RDF term.
    ///
    /// The lexical form is kept as received. Values typed with a known XSD
    /// datatype are validated against it, `rdfs:Resource` values must be
    /// absolute IRIs, and parameters without a declared type become plain
    /// string literals.
    pub fn parse_value(&self, raw: &str) -> Result<Term, ParameterError> {
        let Some(value_type) = &self.value_type else {
            return Ok(Literal::new_simple_literal(raw).into());
        };
        let datatype = value_type.as_ref();
        if datatype == rdfs::RESOURCE {
            return NamedNode::new(raw)
                .map(Term::from)
                .map_err(|e| self.invalid_value(raw, e.to_string()));
        }
        let reason = if datatype == xsd::BOOLEAN {
            Boolean::from_str(raw).err().map(|e| e.to_string())
        } else if is_integer_datatype(datatype) {
            Integer::from_str(raw).err().map(|e| e.to_string())
        } else if datatype == xsd::DECIMAL {
            Decimal::from_str(raw).err().map(|e| e.to_string())
        } else if datatype == xsd::DOUBLE {
            Double::from_str(raw).err().map(|e| e.to_string())
        } else if datatype == xsd::FLOAT {
            Float::from_str(raw).err().map(|e| e.to_string())
        } else if datatype == xsd::DATE_TIME {
            DateTime::from_str(raw).err().map(|e| e.to_string())
        } else if datatype == xsd::DATE {
            Date::from_str(raw).err().map(|e| e.to_string())
        } else if datatype == xsd::TIME {
            Time::from_str(raw).err().map(|e| e.to_string())
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(self.invalid_value(raw, reason));
        }
        Ok(if datatype == xsd::STRING {
            Literal::new_simple_literal(raw).into()
        } else {
            Literal::new_typed_literal(raw, datatype).into()
        })
    }

    fn invalid_value(&self, raw: &str, reason: String) -> ParameterError {
        ParameterError::InvalidValue {
            variable: self.variable.as_str().to_owned(),
            value: raw.to_owned(),
            reason,
        }
    }
}

/// An argument binding or validation failure.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ParameterError {
    /// A value does not conform to the parameter's declared type.
    #[error("invalid value {value:?} for parameter {variable}: {reason}")]
    InvalidValue {
        variable: String,
        value: String,
        reason: String,
    },
    /// A required parameter has no binding and no default.
    #[error("no value for required parameter {0}")]
    MissingValue(String),
    /// A single-valued parameter was bound more than once.
    #[error("{count} values for single-valued parameter {variable}")]
    TooManyValues { variable: String, count: usize },
    /// No declared parameter matches the given name or predicate.
    #[error("no parameter {0} is declared on the template")]
    UnknownParameter(String),
}

/// The name after the last `#` or `/` of an IRI.
pub(crate) fn local_name(iri: &str) -> &str {
    iri.rsplit_once(['#', '/']).map_or(iri, |(_, local)| local)
}

fn is_integer_datatype(datatype: NamedNodeRef<'_>) -> bool {
    [
        xsd::INTEGER,
        xsd::LONG,
        xsd::INT,
        xsd::SHORT,
        xsd::BYTE,
        xsd::NON_NEGATIVE_INTEGER,
        xsd::POSITIVE_INTEGER,
        xsd::NON_POSITIVE_INTEGER,
        xsd::NEGATIVE_INTEGER,
        xsd::UNSIGNED_LONG,
        xsd::UNSIGNED_INT,
        xsd::UNSIGNED_SHORT,
        xsd::UNSIGNED_BYTE,
    ]
    .contains(&datatype)
}

fn boolean_object(
    graph: &Graph,
    node: NamedOrBlankNodeRef<'_>,
    property: NamedNodeRef<'_>,
) -> Result<Option<bool>, TemplateRegistryError> {
    let Some(term) = graph.object_for_subject_predicate(node, property) else {
        return Ok(None);
    };
    if let TermRef::Literal(literal) = term {
        if literal.datatype() == xsd::BOOLEAN {
            if let Ok(value) = Boolean::from_str(literal.value()) {
                return Ok(Some(value.into()));
            }
        }
    }
    Err(TemplateRegistryError::UnexpectedValue {
        subject: node.into_owned(),
        property: property.into_owned(),
        expected: "a boolean literal",
    })
}
