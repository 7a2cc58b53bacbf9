use crate::parameter::Parameter;
use oxilangtag::LanguageTag;
use oxrdf::{NamedNode, NamedNodeRef};
use oxuritemplate::{Precedence, UriTemplate};
use spargebra::{Query, Update};
use std::collections::BTreeMap;

/// How a template's resource is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    /// A single document resource.
    Document,
    /// A paginated container of child resources.
    Container,
}

/// A loaded template declaration.
///
/// A template is an ontology class typed `ldt:Template` or
/// `ldt:ContainerTemplate`. It ties a URI path template to the stored SPARQL
/// serving the matched resource, and declares the parameters that requests can
/// bind. Its effective parameters include those inherited over `ldt:extends`.
#[derive(Debug)]
pub struct Template {
    pub(crate) class: NamedNode,
    pub(crate) kind: TemplateKind,
    pub(crate) match_template: UriTemplate,
    pub(crate) fragment_template: Option<UriTemplate>,
    pub(crate) query: Option<Query>,
    pub(crate) update: Option<Update>,
    pub(crate) priority: i64,
    pub(crate) languages: Vec<LanguageTag<String>>,
    pub(crate) cache_control: Option<String>,
    pub(crate) super_templates: Vec<NamedNode>,
    pub(crate) local_params: BTreeMap<String, Parameter>,
    pub(crate) params: BTreeMap<String, Parameter>,
}

impl Template {
    /// The ontology class naming this template.
    pub fn class(&self) -> NamedNodeRef<'_> {
        self.class.as_ref()
    }

    pub fn kind(&self) -> TemplateKind {
        self.kind
    }

    /// The URI path template declared with `ldt:match`.
    pub fn match_template(&self) -> &UriTemplate {
        &self.match_template
    }

    /// The fragment template declared with `ldt:fragment`, if any.
    pub fn fragment_template(&self) -> Option<&UriTemplate> {
        self.fragment_template.as_ref()
    }

    /// The structural specificity of the match template.
    pub fn precedence(&self) -> Precedence {
        self.match_template.precedence()
    }

    /// The stored read query, if the template declares one.
    pub fn query(&self) -> Option<&Query> {
        self.query.as_ref()
    }

    /// The stored update, if the template declares one.
    pub fn update(&self) -> Option<&Update> {
        self.update.as_ref()
    }

    /// The declared `ldt:priority`, defaulting to zero.
    pub fn priority(&self) -> i64 {
        self.priority
    }

    /// The language tags the template can serve, in lexicographic order.
    pub fn languages(&self) -> &[LanguageTag<String>] {
        &self.languages
    }

    /// The `Cache-Control` value served with this template's responses.
    pub fn cache_control(&self) -> Option<&str> {
        self.cache_control.as_deref()
    }

    /// The classes this template extends, in lexicographic order.
    pub fn super_templates(&self) -> &[NamedNode] {
        &self.super_templates
    }

    /// The effective parameters, own and inherited, by variable name.
    pub fn parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.params.values()
    }

    /// The effective parameter binding the given variable name.
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.params.get(name)
    }

    /// The effective parameter declared for the given predicate.
    pub fn parameter_by_predicate(&self, predicate: NamedNodeRef<'_>) -> Option<&Parameter> {
        self.params
            .values()
            .find(|parameter| parameter.predicate() == predicate)
    }
}
