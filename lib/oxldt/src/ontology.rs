use crate::registry::{TemplateRegistry, TemplateRegistryError};
use crate::vocab::{owl, sp, spin};
use oxiri::Iri;
use oxrdf::vocab::{rdf, rdfs};
use oxrdf::{Graph, NamedNode, NamedNodeRef, SubjectRef, TermRef};
use rustc_hash::FxHashSet;
use spargebra::{Query, SparqlSyntaxError};
use thiserror::Error;

/// The application ontology: template declarations plus the class hierarchy
/// and the `spin:constructor` queries attached to it.
///
/// The graph is read-only once loaded. Everything derived from it, the
/// [`TemplateRegistry`] included, is a pure function of the graph, so a
/// reloaded ontology simply produces fresh derived values.
#[derive(Debug)]
pub struct Ontology {
    graph: Graph,
    base: Iri<String>,
}

impl Ontology {
    pub fn new(graph: Graph, base: Iri<String>) -> Self {
        Self { graph, base }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// The base IRI stored query bodies are parsed against.
    pub fn base(&self) -> &str {
        self.base.as_str()
    }

    /// Loads the template declarations contained in this ontology.
    pub fn registry(&self) -> Result<TemplateRegistry, TemplateRegistryError> {
        TemplateRegistry::from_graph(&self.graph, self.base.as_str())
    }

    /// The `spin:constructor` query of the given class, if it declares one.
    ///
    /// The stored text must parse as a `CONSTRUCT` query. Constructors of
    /// super-classes are not folded in here, [`Constructor`](crate::Constructor)
    /// walks the hierarchy itself.
    pub fn constructor_query(
        &self,
        class: NamedNodeRef<'_>,
    ) -> Result<Option<Query>, OntologyError> {
        let Some(resource) = self.graph.object_for_subject_predicate(class, spin::CONSTRUCTOR)
        else {
            return Ok(None);
        };
        let body: SubjectRef<'_> = match resource {
            TermRef::NamedNode(node) => node.into(),
            TermRef::BlankNode(node) => node.into(),
            TermRef::Literal(_) => {
                return Err(OntologyError::MissingConstructorText(class.into_owned()))
            }
        };
        let Some(TermRef::Literal(text)) = self.graph.object_for_subject_predicate(body, sp::TEXT)
        else {
            return Err(OntologyError::MissingConstructorText(class.into_owned()));
        };
        let query = Query::parse(text.value(), Some(self.base.as_str())).map_err(|e| {
            OntologyError::InvalidConstructor {
                class: class.into_owned(),
                source: e,
            }
        })?;
        if matches!(query, Query::Construct { .. }) {
            Ok(Some(query))
        } else {
            Err(OntologyError::NotAConstructQuery(class.into_owned()))
        }
    }

    /// The direct super-classes of the given class.
    ///
    /// `owl:intersectionOf` values are flattened into their members, and
    /// `owl:Restriction` nodes carrying both `owl:onProperty` and
    /// `owl:allValuesFrom` are surfaced as [`SuperClass::Restriction`].
    /// Values of any other shape are skipped. The result is sorted and
    /// deduplicated so hierarchy walks are deterministic.
    pub fn super_classes(&self, class: NamedNodeRef<'_>) -> Vec<SuperClass> {
        let mut found = Vec::new();
        let mut seen = FxHashSet::default();
        let mut queue: Vec<TermRef<'_>> = self
            .graph
            .objects_for_subject_predicate(class, rdfs::SUB_CLASS_OF)
            .collect();
        while let Some(term) = queue.pop() {
            let node: SubjectRef<'_> = match term {
                TermRef::NamedNode(node) => node.into(),
                TermRef::BlankNode(node) => node.into(),
                TermRef::Literal(_) => continue,
            };
            if !seen.insert(node) {
                continue;
            }
            if let Some(restriction) = self.restriction(node) {
                found.push(restriction);
            } else if let TermRef::NamedNode(named) = term {
                found.push(SuperClass::Class(named.into_owned()));
            } else if let Some(head) = self
                .graph
                .object_for_subject_predicate(node, owl::INTERSECTION_OF)
            {
                let head: SubjectRef<'_> = match head {
                    TermRef::NamedNode(node) => node.into(),
                    TermRef::BlankNode(node) => node.into(),
                    TermRef::Literal(_) => continue,
                };
                queue.extend(self.list_members(head));
            }
        }
        found.sort_unstable_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        found.dedup();
        found
    }

    /// The declared inverse of a property, looked up in both directions.
    pub fn inverse_of(&self, property: NamedNodeRef<'_>) -> Option<NamedNode> {
        if let Some(TermRef::NamedNode(inverse)) = self
            .graph
            .object_for_subject_predicate(property, owl::INVERSE_OF)
        {
            return Some(inverse.into_owned());
        }
        self.graph
            .subjects_for_predicate_object(owl::INVERSE_OF, property)
            .find_map(|subject| match subject {
                SubjectRef::NamedNode(inverse) => Some(inverse.into_owned()),
                SubjectRef::BlankNode(_) => None,
            })
    }

    fn restriction(&self, node: SubjectRef<'_>) -> Option<SuperClass> {
        let Some(TermRef::NamedNode(property)) = self
            .graph
            .object_for_subject_predicate(node, owl::ON_PROPERTY)
        else {
            return None;
        };
        let Some(TermRef::NamedNode(values)) = self
            .graph
            .object_for_subject_predicate(node, owl::ALL_VALUES_FROM)
        else {
            return None;
        };
        Some(SuperClass::Restriction {
            property: property.into_owned(),
            all_values_from: values.into_owned(),
        })
    }

    fn list_members<'a>(&'a self, head: SubjectRef<'a>) -> Vec<TermRef<'a>> {
        let mut members = Vec::new();
        let mut visited = FxHashSet::default();
        let mut current = head;
        while current != SubjectRef::from(rdf::NIL) {
            if !visited.insert(current) {
                break;
            }
            if let Some(first) = self.graph.object_for_subject_predicate(current, rdf::FIRST) {
                members.push(first);
            }
            match self.graph.object_for_subject_predicate(current, rdf::REST) {
                Some(TermRef::NamedNode(node)) => current = node.into(),
                Some(TermRef::BlankNode(node)) => current = node.into(),
                _ => break,
            }
        }
        members
    }
}

/// One edge of the class hierarchy above a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuperClass {
    /// A plain named super-class.
    Class(NamedNode),
    /// An `owl:allValuesFrom` restriction on a property.
    Restriction {
        property: NamedNode,
        all_values_from: NamedNode,
    },
}

impl SuperClass {
    fn sort_key(&self) -> (u8, &str, &str) {
        match self {
            Self::Class(class) => (0, class.as_str(), ""),
            Self::Restriction {
                property,
                all_values_from,
            } => (1, property.as_str(), all_values_from.as_str()),
        }
    }
}

/// A defect in the class hierarchy or its constructors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum OntologyError {
    /// The `spin:constructor` value does not carry an `sp:text` body.
    #[error("the spin:constructor of {0} does not carry an sp:text body")]
    MissingConstructorText(NamedNode),
    /// The constructor text does not parse.
    #[error("invalid spin:constructor on {class}")]
    InvalidConstructor {
        class: NamedNode,
        #[source]
        source: SparqlSyntaxError,
    },
    /// Constructors must be `CONSTRUCT` queries.
    #[error("the spin:constructor of {0} is not a CONSTRUCT query")]
    NotAConstructQuery(NamedNode),
    /// Following `owl:allValuesFrom` restrictions returned to an already
    /// instantiated class.
    #[error("instantiating {class} recurses through {via}")]
    RestrictionCycle { class: NamedNode, via: NamedNode },
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIXES: &str = r#"
        @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
        @prefix owl: <http://www.w3.org/2002/07/owl#> .
        @prefix spin: <http://spinrdf.org/spin#> .
        @prefix sp: <http://spinrdf.org/sp#> .
        @prefix ex: <https://example.com/ns#> .
    "#;

    fn ontology(turtle: &str) -> Ontology {
        let mut graph = Graph::new();
        for triple in oxttl::TurtleParser::new().for_reader(format!("{PREFIXES}{turtle}").as_bytes())
        {
            graph.insert(&triple.unwrap());
        }
        Ontology::new(graph, Iri::parse("https://example.com/".to_owned()).unwrap())
    }

    fn ex(local: &str) -> NamedNode {
        NamedNode::new(format!("https://example.com/ns#{local}")).unwrap()
    }

    #[test]
    fn constructor_text_parses_as_construct() {
        let ontology = ontology(
            r#"ex:Item spin:constructor [
                sp:text "CONSTRUCT { ?this a <https://example.com/ns#Item> } WHERE {}"
            ] ."#,
        );
        let query = ontology.constructor_query(ex("Item").as_ref()).unwrap();
        assert!(matches!(query, Some(Query::Construct { .. })));
        assert!(ontology
            .constructor_query(ex("Other").as_ref())
            .unwrap()
            .is_none());
    }

    #[test]
    fn a_select_constructor_is_rejected() {
        let ontology =
            ontology(r#"ex:Item spin:constructor [ sp:text "SELECT ?this WHERE {}" ] ."#);
        assert!(matches!(
            ontology.constructor_query(ex("Item").as_ref()),
            Err(OntologyError::NotAConstructQuery(_))
        ));
    }

    #[test]
    fn a_constructor_without_text_is_rejected() {
        let ontology = ontology(r#"ex:Item spin:constructor [] ."#);
        assert!(matches!(
            ontology.constructor_query(ex("Item").as_ref()),
            Err(OntologyError::MissingConstructorText(_))
        ));
    }

    #[test]
    fn named_super_classes_are_listed() {
        let ontology = ontology(r#"ex:C rdfs:subClassOf ex:B , ex:A ."#);
        assert_eq!(
            ontology.super_classes(ex("C").as_ref()),
            [SuperClass::Class(ex("A")), SuperClass::Class(ex("B"))]
        );
    }

    #[test]
    fn restrictions_are_recognized() {
        let ontology = ontology(
            r#"ex:C rdfs:subClassOf ex:Base , [
                a owl:Restriction ;
                owl:onProperty ex:item ;
                owl:allValuesFrom ex:Item
            ] ."#,
        );
        assert_eq!(
            ontology.super_classes(ex("C").as_ref()),
            [
                SuperClass::Class(ex("Base")),
                SuperClass::Restriction {
                    property: ex("item"),
                    all_values_from: ex("Item"),
                },
            ]
        );
    }

    #[test]
    fn intersections_are_flattened() {
        let ontology = ontology(
            r#"ex:C rdfs:subClassOf [ owl:intersectionOf (
                ex:A
                [ owl:onProperty ex:p ; owl:allValuesFrom ex:B ]
            ) ] ."#,
        );
        assert_eq!(
            ontology.super_classes(ex("C").as_ref()),
            [
                SuperClass::Class(ex("A")),
                SuperClass::Restriction {
                    property: ex("p"),
                    all_values_from: ex("B"),
                },
            ]
        );
    }

    #[test]
    fn duplicate_super_classes_collapse() {
        let ontology = ontology(
            r#"ex:C rdfs:subClassOf ex:A , [ owl:intersectionOf ( ex:A ) ] ."#,
        );
        assert_eq!(
            ontology.super_classes(ex("C").as_ref()),
            [SuperClass::Class(ex("A"))]
        );
    }

    #[test]
    fn inverse_properties_resolve_in_both_directions() {
        let ontology = ontology(r#"ex:parent owl:inverseOf ex:child ."#);
        assert_eq!(ontology.inverse_of(ex("parent").as_ref()), Some(ex("child")));
        assert_eq!(ontology.inverse_of(ex("child").as_ref()), Some(ex("parent")));
        assert_eq!(ontology.inverse_of(ex("other").as_ref()), None);
    }
}
