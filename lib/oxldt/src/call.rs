use crate::error::LdtError;
use crate::parameter::ParameterError;
use crate::registry::{TemplateRegistry, TemplateRegistryError};
use crate::template::{Template, TemplateKind};
use oxiri::Iri;
use oxrdf::{Literal, NamedNode, NamedNodeRef, Term};
use oxuritemplate::PathMatch;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use url::form_urlencoded;

pub(crate) const THIS: &str = "this";
pub(crate) const LIMIT: &str = "limit";
pub(crate) const OFFSET: &str = "offset";
pub(crate) const ORDER_BY: &str = "orderBy";
pub(crate) const DESC: &str = "desc";

/// A template invocation being assembled.
///
/// Starts from the values captured out of the request path, takes further
/// arguments from the query string or from code, and turns into a
/// [`BoundCall`] once [`build`](Self::build) has validated it against the
/// template's parameter declarations.
#[derive(Debug, Clone)]
pub struct TemplateCall {
    registry: Arc<TemplateRegistry>,
    template_index: usize,
    base: Iri<String>,
    captures: PathMatch,
    bindings: BTreeMap<String, Vec<Term>>,
}

impl TemplateCall {
    /// Starts an invocation of the given template.
    ///
    /// Captured path values that correspond to declared parameters are parsed
    /// into typed bindings right away, so a path that does not fit the
    /// parameter types fails here rather than at build time.
    pub fn new(
        registry: Arc<TemplateRegistry>,
        template: NamedNodeRef<'_>,
        base: Iri<String>,
        captures: PathMatch,
    ) -> Result<Self, LdtError> {
        let Some(template_index) = registry.index_of(template) else {
            return Err(TemplateRegistryError::UnknownTemplate(template.into_owned()).into());
        };
        let mut bindings = BTreeMap::new();
        {
            let declared = registry.template_at(template_index);
            for (name, value) in captures.iter() {
                if let Some(parameter) = declared.parameter(name) {
                    bindings.insert(name.to_owned(), vec![parameter.parse_value(value)?]);
                }
            }
        }
        Ok(Self {
            registry,
            template_index,
            base,
            captures,
            bindings,
        })
    }

    /// The template being invoked.
    pub fn template(&self) -> &Template {
        self.registry.template_at(self.template_index)
    }

    /// Adds string arguments, typically the request's query string pairs.
    ///
    /// Keys that do not name a declared parameter are ignored. Values are
    /// parsed against the parameter's value type.
    pub fn apply_arguments<I, K, V>(mut self, pairs: I) -> Result<Self, LdtError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in pairs {
            let parsed = match self.template().parameter(key.as_ref()) {
                Some(parameter) => (
                    parameter.variable().as_str().to_owned(),
                    parameter.parse_value(value.as_ref())?,
                ),
                None => continue,
            };
            self.bindings.entry(parsed.0).or_default().push(parsed.1);
        }
        Ok(self)
    }

    /// Fills every still unbound parameter that declares a default value.
    pub fn apply_defaults(mut self) -> Self {
        let defaults: Vec<(String, Term)> = self
            .template()
            .parameters()
            .filter(|parameter| !self.bindings.contains_key(parameter.variable().as_str()))
            .filter_map(|parameter| {
                parameter
                    .default_value()
                    .map(|value| (parameter.variable().as_str().to_owned(), value.clone()))
            })
            .collect();
        for (name, value) in defaults {
            self.bindings.insert(name, vec![value]);
        }
        self
    }

    /// Binds an already typed value to the parameter declared for the given
    /// predicate.
    pub fn arg(mut self, predicate: NamedNodeRef<'_>, value: Term) -> Result<Self, ParameterError> {
        let Some(parameter) = self.template().parameter_by_predicate(predicate) else {
            return Err(ParameterError::UnknownParameter(predicate.as_str().to_owned()));
        };
        let name = parameter.variable().as_str().to_owned();
        self.bindings.entry(name).or_default().push(value);
        Ok(self)
    }

    /// Binds an already typed value to the named parameter.
    pub fn arg_by_name(mut self, name: &str, value: Term) -> Result<Self, ParameterError> {
        if self.template().parameter(name).is_none() {
            return Err(ParameterError::UnknownParameter(name.to_owned()));
        }
        self.bindings.entry(name.to_owned()).or_default().push(value);
        Ok(self)
    }

    /// Checks the bindings against the parameter declarations.
    pub fn validate(&self) -> Result<(), ParameterError> {
        for parameter in self.template().parameters() {
            let count = self
                .bindings
                .get(parameter.variable().as_str())
                .map_or(0, Vec::len);
            if parameter.is_required() && count == 0 {
                return Err(ParameterError::MissingValue(
                    parameter.variable().as_str().to_owned(),
                ));
            }
            if !parameter.is_multi_valued() && count > 1 {
                return Err(ParameterError::TooManyValues {
                    variable: parameter.variable().as_str().to_owned(),
                    count,
                });
            }
        }
        Ok(())
    }

    /// Validates the invocation and mints its state URI.
    pub fn build(self) -> Result<BoundCall, LdtError> {
        self.validate()?;
        let state = self.state_uri()?;
        Ok(BoundCall {
            registry: self.registry,
            template_index: self.template_index,
            base: self.base,
            captures: self.captures,
            bindings: self.bindings,
            state,
        })
    }

    /// The URI naming this application state.
    ///
    /// The path comes from expanding the match template, bound parameters
    /// that do not feed the path are appended as a canonically ordered query
    /// string, and the fragment template, if any, ends the URI.
    fn state_uri(&self) -> Result<NamedNode, LdtError> {
        let template = self.template();
        let path = template
            .match_template()
            .expand(|name| self.lookup(name))
            .map_err(|source| TemplateRegistryError::StateExpansion {
                template: template.class().into_owned(),
                source,
            })?;
        let mut uri = self
            .base
            .resolve(&path)
            .map_err(|source| TemplateRegistryError::InvalidStateUri {
                template: template.class().into_owned(),
                source,
            })?
            .into_inner();
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        let mut has_query = false;
        for (name, values) in &self.bindings {
            if template.match_template().variables().any(|v| v == name) {
                continue;
            }
            let mut lexicals: Vec<&str> = values.iter().map(term_lexical).collect();
            lexicals.sort_unstable();
            for value in lexicals {
                serializer.append_pair(name, value);
                has_query = true;
            }
        }
        if has_query {
            uri.push('?');
            uri.push_str(&serializer.finish());
        }
        if let Some(fragment) = template.fragment_template() {
            let fragment = fragment.expand(|name| self.lookup(name)).map_err(|source| {
                TemplateRegistryError::StateExpansion {
                    template: template.class().into_owned(),
                    source,
                }
            })?;
            uri.push('#');
            uri.push_str(&fragment);
        }
        NamedNode::new(uri).map_err(|source| {
            TemplateRegistryError::InvalidStateUri {
                template: template.class().into_owned(),
                source,
            }
            .into()
        })
    }

    fn lookup(&self, name: &str) -> Option<String> {
        if let Some(values) = self.bindings.get(name) {
            return if let [value] = values.as_slice() {
                Some(term_lexical(value).to_owned())
            } else {
                None
            };
        }
        self.captures.get(name).map(str::to_owned)
    }
}

/// A validated template invocation, named by its state URI.
///
/// Two bound calls are equal when they name the same state, whatever route
/// the arguments took to get there.
#[derive(Debug, Clone)]
pub struct BoundCall {
    registry: Arc<TemplateRegistry>,
    template_index: usize,
    base: Iri<String>,
    captures: PathMatch,
    bindings: BTreeMap<String, Vec<Term>>,
    state: NamedNode,
}

impl BoundCall {
    /// The template this call invokes.
    pub fn template(&self) -> &Template {
        self.registry.template_at(self.template_index)
    }

    /// The URI of this application state, query string and all.
    pub fn state(&self) -> NamedNodeRef<'_> {
        self.state.as_ref()
    }

    /// The resource the state describes: the state URI without its query
    /// component.
    pub fn subject_resource(&self) -> NamedNode {
        let uri = self.state.as_str();
        match uri.split_once('?') {
            Some((head, tail)) => match tail.split_once('#') {
                Some((_, fragment)) => NamedNode::new_unchecked(format!("{head}#{fragment}")),
                None => NamedNode::new_unchecked(head),
            },
            None => self.state.clone(),
        }
    }

    /// The first value bound to the named parameter.
    pub fn value(&self, name: &str) -> Option<&Term> {
        self.bindings.get(name).and_then(|values| values.first())
    }

    /// All values bound to the named parameter.
    pub fn values(&self, name: &str) -> &[Term] {
        self.bindings.get(name).map_or(&[], Vec::as_slice)
    }

    /// All bindings in parameter name order.
    pub fn bindings(&self) -> impl Iterator<Item = (&str, &[Term])> {
        self.bindings
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Rebuilds this call with the named parameter bound to exactly the
    /// given value.
    pub fn with_replaced_value(&self, name: &str, value: Term) -> Result<Self, LdtError> {
        if self.template().parameter(name).is_none() {
            return Err(ParameterError::UnknownParameter(name.to_owned()).into());
        }
        self.replace_value(name, value)
    }

    /// The previous page of a paginated container, if there is one.
    ///
    /// `None` when the call is not a paginated container view or the current
    /// offset is already within the first page.
    pub fn previous_page(&self) -> Result<Option<Self>, LdtError> {
        if self.template().kind() != TemplateKind::Container {
            return Ok(None);
        }
        let Some(limit) = self.integer_binding(LIMIT)? else {
            return Ok(None);
        };
        let offset = self.integer_binding(OFFSET)?.unwrap_or(0);
        if offset < limit {
            return Ok(None);
        }
        self.replace_value(OFFSET, integer_literal(offset - limit))
            .map(Some)
    }

    /// The next page of a paginated container, if the call is one.
    pub fn next_page(&self) -> Result<Option<Self>, LdtError> {
        if self.template().kind() != TemplateKind::Container {
            return Ok(None);
        }
        let Some(limit) = self.integer_binding(LIMIT)? else {
            return Ok(None);
        };
        let offset = self.integer_binding(OFFSET)?.unwrap_or(0);
        self.replace_value(OFFSET, integer_literal(offset + limit))
            .map(Some)
    }

    pub(crate) fn integer_binding(&self, name: &str) -> Result<Option<i64>, ParameterError> {
        let Some(term) = self.value(name) else {
            return Ok(None);
        };
        let lexical = term_lexical(term);
        lexical
            .parse::<i64>()
            .map(Some)
            .map_err(|_| ParameterError::InvalidValue {
                variable: name.to_owned(),
                value: lexical.to_owned(),
                reason: "an integer is required".to_owned(),
            })
    }

    // Pagination rebinds offset even when the template leaves it undeclared,
    // so the parameter existence check stays out of this path.
    fn replace_value(&self, name: &str, value: Term) -> Result<Self, LdtError> {
        let mut call = TemplateCall {
            registry: Arc::clone(&self.registry),
            template_index: self.template_index,
            base: self.base.clone(),
            captures: self.captures.clone(),
            bindings: self.bindings.clone(),
        };
        call.bindings.insert(name.to_owned(), vec![value]);
        call.build()
    }
}

impl PartialEq for BoundCall {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state
    }
}

impl Eq for BoundCall {}

impl Hash for BoundCall {
    fn hash<H: Hasher>(&self, hasher: &mut H) {
        self.state.hash(hasher);
    }
}

fn term_lexical(term: &Term) -> &str {
    match term {
        Term::NamedNode(node) => node.as_str(),
        Term::BlankNode(node) => node.as_str(),
        Term::Literal(literal) => literal.value(),
    }
}

fn integer_literal(value: i64) -> Term {
    Literal::from(value).into()
}
