use crate::parameter::Parameter;
use crate::template::{Template, TemplateKind};
use crate::vocab::{ldt, sp};
use oxrdf::vocab::{rdf, xsd};
use oxrdf::{
    BlankNode, Graph, IriParseError, LanguageTagParseError, NamedNode, NamedNodeRef,
    NamedOrBlankNode, NamedOrBlankNodeRef, SubjectRef, TermRef, VariableNameParseError,
};
use oxilangtag::LanguageTag;
use oxuritemplate::{PathMatch, UriTemplate, UriTemplateExpansionError, UriTemplateParseError};
use rustc_hash::FxHashMap;
use spargebra::{Query, SparqlSyntaxError, Update};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::mem;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

/// An immutable snapshot of the application's template declarations.
///
/// The registry is loaded once from an ontology graph and never mutated, so a
/// request can hold on to it behind an [`Arc`] for its whole lifetime.
/// Templates are kept in a deterministic match order: descending path
/// precedence, then descending `ldt:priority`, then template structure, then
/// class IRI. Matching tries templates in that order and returns the first
/// whose path template matches.
#[derive(Debug)]
pub struct TemplateRegistry {
    templates: Vec<Template>,
    by_class: FxHashMap<String, usize>,
    match_order: Vec<usize>,
}

impl TemplateRegistry {
    /// Loads all template declarations from an ontology graph.
    ///
    /// Any structural defect in the declarations fails the whole load, so a
    /// registry that exists is known to be fully usable.
    pub fn from_graph(graph: &Graph, base_iri: &str) -> Result<Self, TemplateRegistryError> {
        let mut kinds: BTreeMap<String, (NamedNode, TemplateKind)> = BTreeMap::new();
        for (class_type, kind) in [
            (ldt::TEMPLATE, TemplateKind::Document),
            (ldt::CONTAINER_TEMPLATE, TemplateKind::Container),
        ] {
            for subject in graph.subjects_for_predicate_object(rdf::TYPE, class_type) {
                let class = match subject {
                    SubjectRef::NamedNode(class) => class.into_owned(),
                    SubjectRef::BlankNode(node) => {
                        return Err(TemplateRegistryError::AnonymousTemplate(node.into_owned()))
                    }
                };
                if let Some((_, existing)) = kinds.get(class.as_str()) {
                    if *existing != kind {
                        return Err(TemplateRegistryError::AmbiguousTemplateKind(class));
                    }
                } else {
                    kinds.insert(class.as_str().to_owned(), (class, kind));
                }
            }
        }
        let mut templates = Vec::with_capacity(kinds.len());
        let mut by_class = FxHashMap::default();
        for (key, (class, kind)) in kinds {
            by_class.insert(key, templates.len());
            templates.push(Self::extract_template(graph, base_iri, class, kind)?);
        }
        Self::resolve_parameters(&mut templates, &by_class)?;
        let mut match_order: Vec<usize> = (0..templates.len()).collect();
        match_order.sort_unstable_by(|&a, &b| Self::match_ordering(&templates[a], &templates[b]));
        Ok(Self {
            templates,
            by_class,
            match_order,
        })
    }

    /// The template selected for the given request path.
    pub fn match_path(&self, path: &str) -> Result<TemplateMatch<'_>, NotFoundError> {
        for &index in &self.match_order {
            let template = &self.templates[index];
            if let Some(captures) = template.match_template.match_path(path) {
                return Ok(TemplateMatch { template, captures });
            }
        }
        Err(NotFoundError {
            path: path.to_owned(),
        })
    }

    /// The template declared by the given class, if any.
    pub fn template(&self, class: NamedNodeRef<'_>) -> Option<&Template> {
        self.by_class
            .get(class.as_str())
            .map(|&index| &self.templates[index])
    }

    /// All templates in match order.
    pub fn templates(&self) -> impl Iterator<Item = &Template> {
        self.match_order
            .iter()
            .map(move |&index| &self.templates[index])
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub(crate) fn index_of(&self, class: NamedNodeRef<'_>) -> Option<usize> {
        self.by_class.get(class.as_str()).copied()
    }

    pub(crate) fn template_at(&self, index: usize) -> &Template {
        &self.templates[index]
    }

    fn extract_template(
        graph: &Graph,
        base_iri: &str,
        class: NamedNode,
        kind: TemplateKind,
    ) -> Result<Template, TemplateRegistryError> {
        let match_template = match graph.object_for_subject_predicate(class.as_ref(), ldt::MATCH) {
            Some(TermRef::Literal(literal)) => {
                UriTemplate::new(literal.value()).map_err(|e| TemplateRegistryError::InvalidMatch {
                    template: class.clone(),
                    source: e,
                })?
            }
            Some(_) => {
                return Err(TemplateRegistryError::UnexpectedValue {
                    subject: class.clone().into(),
                    property: ldt::MATCH.into_owned(),
                    expected: "a string literal",
                })
            }
            None => return Err(TemplateRegistryError::MissingMatch(class.clone())),
        };
        let fragment_template =
            match graph.object_for_subject_predicate(class.as_ref(), ldt::FRAGMENT) {
                Some(TermRef::Literal(literal)) => Some(UriTemplate::new(literal.value()).map_err(
                    |e| TemplateRegistryError::InvalidFragment {
                        template: class.clone(),
                        source: e,
                    },
                )?),
                Some(_) => {
                    return Err(TemplateRegistryError::UnexpectedValue {
                        subject: class.clone().into(),
                        property: ldt::FRAGMENT.into_owned(),
                        expected: "a string literal",
                    })
                }
                None => None,
            };
        let query = match Self::stored_body(graph, class.as_ref(), ldt::QUERY)? {
            Some(text) => Some(Query::parse(&text, Some(base_iri)).map_err(|e| {
                TemplateRegistryError::InvalidQuery {
                    template: class.clone(),
                    source: e,
                }
            })?),
            None => None,
        };
        if kind == TemplateKind::Container {
            // Pagination rewrites the query's nested sub-select, so a
            // container query without one can never serve a page.
            if let Some(query) = &query {
                if !crate::builder::query_has_nested_sub_select(query) {
                    return Err(TemplateRegistryError::MissingSubSelect(class));
                }
            }
        }
        let update = match Self::stored_body(graph, class.as_ref(), ldt::UPDATE)? {
            Some(text) => Some(Update::parse(&text, Some(base_iri)).map_err(|e| {
                TemplateRegistryError::InvalidUpdate {
                    template: class.clone(),
                    source: e,
                }
            })?),
            None => None,
        };
        let priority = match graph.object_for_subject_predicate(class.as_ref(), ldt::PRIORITY) {
            Some(TermRef::Literal(literal)) if literal.datatype() == xsd::INTEGER => literal
                .value()
                .parse::<i64>()
                .map_err(|_| TemplateRegistryError::InvalidPriority {
                    template: class.clone(),
                    value: literal.value().to_owned(),
                })?,
            Some(_) => {
                return Err(TemplateRegistryError::UnexpectedValue {
                    subject: class.clone().into(),
                    property: ldt::PRIORITY.into_owned(),
                    expected: "an integer literal",
                })
            }
            None => 0,
        };
        let mut languages = Vec::new();
        for term in graph.objects_for_subject_predicate(class.as_ref(), ldt::LANG) {
            match term {
                TermRef::Literal(literal) => {
                    languages.push(LanguageTag::parse(literal.value().to_owned()).map_err(
                        |e| TemplateRegistryError::InvalidLanguage {
                            template: class.clone(),
                            source: e,
                        },
                    )?);
                }
                _ => {
                    return Err(TemplateRegistryError::UnexpectedValue {
                        subject: class.clone().into(),
                        property: ldt::LANG.into_owned(),
                        expected: "a string literal",
                    })
                }
            }
        }
        languages.sort_unstable_by(|a, b| a.as_str().cmp(b.as_str()));
        let cache_control =
            match graph.object_for_subject_predicate(class.as_ref(), ldt::CACHE_CONTROL) {
                Some(TermRef::Literal(literal)) => Some(literal.value().to_owned()),
                Some(_) => {
                    return Err(TemplateRegistryError::UnexpectedValue {
                        subject: class.clone().into(),
                        property: ldt::CACHE_CONTROL.into_owned(),
                        expected: "a string literal",
                    })
                }
                None => None,
            };
        let mut super_templates = Vec::new();
        for term in graph.objects_for_subject_predicate(class.as_ref(), ldt::EXTENDS) {
            match term {
                TermRef::NamedNode(super_template) => {
                    super_templates.push(super_template.into_owned());
                }
                _ => {
                    return Err(TemplateRegistryError::UnexpectedValue {
                        subject: class.clone().into(),
                        property: ldt::EXTENDS.into_owned(),
                        expected: "an IRI",
                    })
                }
            }
        }
        super_templates.sort_unstable_by(|a, b| a.as_str().cmp(b.as_str()));
        let mut local_params = BTreeMap::new();
        for term in graph.objects_for_subject_predicate(class.as_ref(), ldt::PARAM) {
            let node = match term {
                TermRef::NamedNode(node) => NamedOrBlankNodeRef::from(node),
                TermRef::BlankNode(node) => NamedOrBlankNodeRef::from(node),
                TermRef::Literal(_) => {
                    return Err(TemplateRegistryError::UnexpectedValue {
                        subject: class.clone().into(),
                        property: ldt::PARAM.into_owned(),
                        expected: "a resource",
                    })
                }
            };
            let parameter = Parameter::from_graph(graph, node)?;
            let name = parameter.variable().as_str().to_owned();
            if local_params.insert(name.clone(), parameter).is_some() {
                return Err(TemplateRegistryError::DuplicateParameter {
                    template: class.clone(),
                    variable: name,
                });
            }
        }
        Ok(Template {
            class,
            kind,
            match_template,
            fragment_template,
            query,
            update,
            priority,
            languages,
            cache_control,
            super_templates,
            local_params,
            params: BTreeMap::new(),
        })
    }

    fn stored_body(
        graph: &Graph,
        template: NamedNodeRef<'_>,
        property: NamedNodeRef<'_>,
    ) -> Result<Option<String>, TemplateRegistryError> {
        let Some(resource) = graph.object_for_subject_predicate(template, property) else {
            return Ok(None);
        };
        let body: SubjectRef<'_> = match resource {
            TermRef::NamedNode(node) => node.into(),
            TermRef::BlankNode(node) => node.into(),
            TermRef::Literal(_) => {
                return Err(TemplateRegistryError::UnexpectedValue {
                    subject: template.into_owned().into(),
                    property: property.into_owned(),
                    expected: "a resource",
                })
            }
        };
        match graph.object_for_subject_predicate(body, sp::TEXT) {
            Some(TermRef::Literal(text)) => Ok(Some(text.value().to_owned())),
            Some(_) => Err(TemplateRegistryError::UnexpectedValue {
                subject: template.into_owned().into(),
                property: sp::TEXT.into_owned(),
                expected: "a string literal",
            }),
            None => Err(TemplateRegistryError::MissingQueryText {
                template: template.into_owned(),
                property: property.into_owned(),
            }),
        }
    }

    /// Computes each template's effective parameters.
    ///
    /// Super-templates are merged in lexicographic IRI order, later ones
    /// overriding earlier ones on a shared variable name, and the template's
    /// own declarations override everything inherited.
    fn resolve_parameters(
        templates: &mut [Template],
        by_class: &FxHashMap<String, usize>,
    ) -> Result<(), TemplateRegistryError> {
        #[derive(Clone, Copy, PartialEq)]
        enum State {
            Unvisited,
            InProgress,
            Done,
        }
        let mut states = vec![State::Unvisited; templates.len()];
        let mut resolved: Vec<Option<BTreeMap<String, Parameter>>> = vec![None; templates.len()];
        for root in 0..templates.len() {
            if states[root] == State::Done {
                continue;
            }
            states[root] = State::InProgress;
            let mut stack = vec![(root, 0)];
            while let Some((index, next_super)) = stack.pop() {
                let template = &templates[index];
                if let Some(super_template) = template.super_templates.get(next_super) {
                    let Some(&target) = by_class.get(super_template.as_str()) else {
                        return Err(TemplateRegistryError::UnknownSuperTemplate {
                            template: template.class.clone(),
                            super_template: super_template.clone(),
                        });
                    };
                    stack.push((index, next_super + 1));
                    match states[target] {
                        State::Unvisited => {
                            states[target] = State::InProgress;
                            stack.push((target, 0));
                        }
                        State::InProgress => {
                            return Err(TemplateRegistryError::CyclicExtends(
                                templates[target].class.clone(),
                            ))
                        }
                        State::Done => {}
                    }
                } else {
                    let mut params = BTreeMap::new();
                    for super_template in &template.super_templates {
                        if let Some(&target) = by_class.get(super_template.as_str()) {
                            if let Some(inherited) = &resolved[target] {
                                params.extend(
                                    inherited
                                        .iter()
                                        .map(|(name, parameter)| (name.clone(), parameter.clone())),
                                );
                            }
                        }
                    }
                    params.extend(
                        template
                            .local_params
                            .iter()
                            .map(|(name, parameter)| (name.clone(), parameter.clone())),
                    );
                    resolved[index] = Some(params);
                    states[index] = State::Done;
                }
            }
        }
        for (template, params) in templates.iter_mut().zip(resolved) {
            template.params = params.unwrap_or_default();
        }
        Ok(())
    }

    fn match_ordering(a: &Template, b: &Template) -> Ordering {
        b.precedence()
            .cmp(&a.precedence())
            .then_with(|| b.priority.cmp(&a.priority))
            .then_with(|| a.match_template.cmp_structure(&b.match_template))
            .then_with(|| a.class.as_str().cmp(b.class.as_str()))
    }
}

/// A successful path match: the selected template and its captured variables.
#[derive(Debug, Clone)]
pub struct TemplateMatch<'a> {
    template: &'a Template,
    captures: PathMatch,
}

impl<'a> TemplateMatch<'a> {
    pub fn template(&self) -> &'a Template {
        self.template
    }

    /// The variable values captured from the request path.
    pub fn captures(&self) -> &PathMatch {
        &self.captures
    }
}

/// Shares the current registry between requests and allows hot reloads.
///
/// Replacing the registry only swaps the [`Arc`], so in-flight requests keep
/// the snapshot they started with.
#[derive(Debug)]
pub struct RegistryHandle {
    inner: RwLock<Arc<TemplateRegistry>>,
}

impl RegistryHandle {
    pub fn new(registry: Arc<TemplateRegistry>) -> Self {
        Self {
            inner: RwLock::new(registry),
        }
    }

    /// The current registry snapshot.
    pub fn snapshot(&self) -> Arc<TemplateRegistry> {
        Arc::clone(&self.inner.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Atomically replaces the registry used by subsequent requests and
    /// returns the previous one.
    pub fn replace(&self, registry: Arc<TemplateRegistry>) -> Arc<TemplateRegistry> {
        mem::replace(
            &mut *self.inner.write().unwrap_or_else(PoisonError::into_inner),
            registry,
        )
    }
}

/// No template matches the request path.
#[derive(Error, Debug)]
#[error("no template matches path {path}")]
pub struct NotFoundError {
    path: String,
}

impl NotFoundError {
    /// The path that failed to match.
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// A structural defect in the application's template declarations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TemplateRegistryError {
    /// Template declarations must be named so they can be addressed.
    #[error("template declarations must be named by an IRI, found blank node {0}")]
    AnonymousTemplate(BlankNode),
    /// A class is typed both `ldt:Template` and `ldt:ContainerTemplate`.
    #[error("{0} is declared both as a document and as a container template")]
    AmbiguousTemplateKind(NamedNode),
    /// Every template needs an `ldt:match` path template.
    #[error("template {0} has no ldt:match path template")]
    MissingMatch(NamedNode),
    /// The `ldt:match` value does not parse as a URI template.
    #[error("invalid ldt:match on template {template}")]
    InvalidMatch {
        template: NamedNode,
        #[source]
        source: UriTemplateParseError,
    },
    /// The `ldt:fragment` value does not parse as a URI template.
    #[error("invalid ldt:fragment on template {template}")]
    InvalidFragment {
        template: NamedNode,
        #[source]
        source: UriTemplateParseError,
    },
    /// A stored query or update resource without an `sp:text` body.
    #[error("the {property} of template {template} does not carry an sp:text body")]
    MissingQueryText {
        template: NamedNode,
        property: NamedNode,
    },
    /// The stored query text does not parse.
    #[error("invalid stored query on template {template}")]
    InvalidQuery {
        template: NamedNode,
        #[source]
        source: SparqlSyntaxError,
    },
    /// The stored update text does not parse.
    #[error("invalid stored update on template {template}")]
    InvalidUpdate {
        template: NamedNode,
        #[source]
        source: SparqlSyntaxError,
    },
    /// The `ldt:priority` value does not fit a 64 bit integer.
    #[error("invalid ldt:priority {value:?} on template {template}")]
    InvalidPriority { template: NamedNode, value: String },
    /// An `ldt:lang` value is not a well-formed language tag.
    #[error("invalid ldt:lang on template {template}")]
    InvalidLanguage {
        template: NamedNode,
        #[source]
        source: LanguageTagParseError,
    },
    /// An `ldt:extends` target that is not itself a declared template.
    #[error("template {template} extends {super_template} which is not a declared template")]
    UnknownSuperTemplate {
        template: NamedNode,
        super_template: NamedNode,
    },
    /// The `ldt:extends` hierarchy loops back on itself.
    #[error("cyclic ldt:extends hierarchy through template {0}")]
    CyclicExtends(NamedNode),
    /// A schema property carries a value of the wrong shape.
    #[error("the value of {property} on {subject} must be {expected}")]
    UnexpectedValue {
        subject: NamedOrBlankNode,
        property: NamedNode,
        expected: &'static str,
    },
    /// A parameter declaration without `ldt:predicate`.
    #[error("parameter {0} has no ldt:predicate")]
    MissingParameterPredicate(NamedOrBlankNode),
    /// The predicate's local name cannot serve as a SPARQL variable name.
    #[error("the local name of {predicate} is not usable as a variable name")]
    InvalidParameterVariable {
        predicate: NamedNode,
        #[source]
        source: VariableNameParseError,
    },
    /// Two parameters of one template bind the same variable.
    #[error("template {template} declares parameter variable {variable} more than once")]
    DuplicateParameter {
        template: NamedNode,
        variable: String,
    },
    /// A class that is not in the registry.
    #[error("{0} is not a declared template")]
    UnknownTemplate(NamedNode),
    /// The template declares no `ldt:query`.
    #[error("template {0} has no stored query")]
    MissingQuery(NamedNode),
    /// The template declares no `ldt:update`.
    #[error("template {0} has no stored update")]
    MissingUpdate(NamedNode),
    /// A container query must nest a sub-select for pagination to rewrite.
    #[error("the query of container template {0} has no nested sub-select")]
    MissingSubSelect(NamedNode),
    /// The path or fragment template cannot be expanded with the bound
    /// values.
    #[error("cannot expand the path template of {template}")]
    StateExpansion {
        template: NamedNode,
        #[source]
        source: UriTemplateExpansionError,
    },
    /// Expanding the template produced text that is not an IRI.
    #[error("cannot mint a state URI for template {template}")]
    InvalidStateUri {
        template: NamedNode,
        #[source]
        source: IriParseError,
    },
}
