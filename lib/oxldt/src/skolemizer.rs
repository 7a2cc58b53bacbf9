use crate::parameter::local_name;
use crate::registry::TemplateRegistry;
use crate::template::Template;
use oxiri::{Iri, IriParseError};
use oxrdf::vocab::rdf;
use oxrdf::{BlankNode, BlankNodeRef, Graph, NamedNode, NamedNodeRef, SubjectRef, TermRef, TripleRef};
use oxuritemplate::UriTemplateExpansionError;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

/// Replaces blank node subjects with URIs minted from their template.
///
/// A blank node qualifies when one of its `rdf:type` classes declares a
/// template; the first such template in registry match order wins. The
/// template's path is expanded from the node's own property values, the
/// declared parameter predicates first and matching property local names as a
/// fallback, and resolved against the base URI. Blank nodes without a
/// qualifying type are left alone, so the rewrite is idempotent: a second run
/// sees no remaining blank subjects to mint.
pub struct Skolemizer<'a> {
    registry: &'a TemplateRegistry,
    base: Iri<String>,
}

impl<'a> Skolemizer<'a> {
    pub fn new(registry: &'a TemplateRegistry, base: Iri<String>) -> Self {
        Self { registry, base }
    }

    /// Returns the graph with every mintable blank node replaced.
    pub fn skolemize(&self, graph: &Graph) -> Result<Graph, SkolemizationError> {
        let mut subjects: Vec<BlankNodeRef<'_>> = Vec::new();
        let mut seen = FxHashSet::default();
        for triple in graph.iter() {
            if let SubjectRef::BlankNode(node) = triple.subject {
                if seen.insert(node) {
                    subjects.push(node);
                }
            }
        }
        subjects.sort_unstable_by_key(|node| node.as_str());
        let mut replacements: FxHashMap<String, NamedNode> = FxHashMap::default();
        for node in subjects {
            if let Some(uri) = self.mint(node, graph)? {
                replacements.insert(node.as_str().to_owned(), uri);
            }
        }
        let mut result = Graph::new();
        for triple in graph.iter() {
            let subject = match triple.subject {
                SubjectRef::BlankNode(node) => match replacements.get(node.as_str()) {
                    Some(uri) => uri.as_ref().into(),
                    None => triple.subject,
                },
                subject => subject,
            };
            let object = match triple.object {
                TermRef::BlankNode(node) => match replacements.get(node.as_str()) {
                    Some(uri) => uri.as_ref().into(),
                    None => triple.object,
                },
                object => object,
            };
            result.insert(TripleRef::new(subject, triple.predicate, object));
        }
        Ok(result)
    }

    fn mint(
        &self,
        node: BlankNodeRef<'_>,
        graph: &Graph,
    ) -> Result<Option<NamedNode>, SkolemizationError> {
        let types: FxHashSet<NamedNodeRef<'_>> = graph
            .objects_for_subject_predicate(node, rdf::TYPE)
            .filter_map(|term| match term {
                TermRef::NamedNode(class) => Some(class),
                _ => None,
            })
            .collect();
        if types.is_empty() {
            return Ok(None);
        }
        let Some(template) = self
            .registry
            .templates()
            .find(|template| types.contains(&template.class()))
        else {
            return Ok(None);
        };
        let path = template
            .match_template()
            .expand(|name| property_value(template, node, name, graph))
            .map_err(|source| SkolemizationError::UnsatisfiedTemplate {
                node: node.into_owned(),
                source,
            })?;
        let mut uri = self
            .base
            .resolve(&path)
            .map_err(|source| SkolemizationError::InvalidUri {
                node: node.into_owned(),
                source,
            })?
            .into_inner();
        if let Some(fragment) = template.fragment_template() {
            let fragment = fragment
                .expand(|name| property_value(template, node, name, graph))
                .map_err(|source| SkolemizationError::UnsatisfiedTemplate {
                    node: node.into_owned(),
                    source,
                })?;
            uri.push('#');
            uri.push_str(&fragment);
        }
        NamedNode::new(uri)
            .map(Some)
            .map_err(|source| SkolemizationError::InvalidUri {
                node: node.into_owned(),
                source,
            })
    }
}

/// The value a template variable takes from the node's properties.
///
/// The variable's declared parameter predicate is consulted first, then any
/// property whose local name matches the variable. Multiple candidate values
/// collapse to the lexically smallest so minting is deterministic.
fn property_value(
    template: &Template,
    node: BlankNodeRef<'_>,
    name: &str,
    graph: &Graph,
) -> Option<String> {
    if let Some(parameter) = template.parameter(name) {
        let value =
            smallest_literal(graph.objects_for_subject_predicate(node, parameter.predicate()));
        if value.is_some() {
            return value;
        }
    }
    smallest_literal(graph.triples_for_subject(node).filter_map(|triple| {
        if local_name(triple.predicate.as_str()) == name {
            Some(triple.object)
        } else {
            None
        }
    }))
}

fn smallest_literal<'a>(objects: impl Iterator<Item = TermRef<'a>>) -> Option<String> {
    objects
        .filter_map(|term| match term {
            TermRef::Literal(literal) => Some(literal.value()),
            _ => None,
        })
        .min()
        .map(ToOwned::to_owned)
}

/// A blank node whose template cannot be satisfied from its properties.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SkolemizationError {
    /// The match template needs a variable the node's properties do not
    /// supply.
    #[error("cannot mint a URI for blank node {node}")]
    UnsatisfiedTemplate {
        node: BlankNode,
        #[source]
        source: UriTemplateExpansionError,
    },
    /// Expansion produced text that is not an IRI.
    #[error("the URI minted for blank node {node} is invalid")]
    InvalidUri {
        node: BlankNode,
        #[source]
        source: IriParseError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdf::{Literal, LiteralRef, Triple};

    const ONTOLOGY: &str = r#"
        @prefix ldt: <https://www.w3.org/ns/ldt#> .
        @prefix ex: <https://example.com/ns#> .

        ex:Item a ldt:Template ;
            ldt:match "/items/{id}" ;
            ldt:param [ ldt:predicate ex:id ] .

        ex:Topic a ldt:Template ;
            ldt:match "/topics/{name}" ;
            ldt:fragment "this" .
    "#;

    fn registry() -> TemplateRegistry {
        let mut graph = Graph::new();
        for triple in oxttl::TurtleParser::new().for_reader(ONTOLOGY.as_bytes()) {
            graph.insert(&triple.unwrap());
        }
        TemplateRegistry::from_graph(&graph, "https://example.com/").unwrap()
    }

    fn skolemizer(registry: &TemplateRegistry) -> Skolemizer<'_> {
        Skolemizer::new(
            registry,
            Iri::parse("https://example.com/".to_owned()).unwrap(),
        )
    }

    fn load(turtle: &str) -> Graph {
        let data = format!("@prefix ex: <https://example.com/ns#> . {turtle}");
        let mut graph = Graph::new();
        for triple in oxttl::TurtleParser::new().for_reader(data.as_bytes()) {
            graph.insert(&triple.unwrap());
        }
        graph
    }

    fn ex(local: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("https://example.com/ns#{local}"))
    }

    #[test]
    fn typed_blank_nodes_are_minted_from_their_properties() {
        let registry = registry();
        let graph = load(r#"_:b a ex:Item ; ex:id "42" ; ex:title "minted" ."#);
        let result = skolemizer(&registry).skolemize(&graph).unwrap();
        let subject = NamedNode::new_unchecked("https://example.com/items/42");
        assert_eq!(
            result.object_for_subject_predicate(subject.as_ref(), ex("title").as_ref()),
            Some(TermRef::Literal(LiteralRef::new_simple_literal("minted")))
        );
        assert!(result
            .iter()
            .all(|triple| !matches!(triple.subject, SubjectRef::BlankNode(_))));
    }

    #[test]
    fn references_to_a_minted_node_are_rewritten() {
        let registry = registry();
        let graph = load(
            r#"
            _:b a ex:Item ; ex:id "42" .
            ex:catalog ex:entry _:b .
            "#,
        );
        let result = skolemizer(&registry).skolemize(&graph).unwrap();
        assert_eq!(
            result.object_for_subject_predicate(ex("catalog").as_ref(), ex("entry").as_ref()),
            Some(TermRef::NamedNode(NamedNodeRef::new_unchecked(
                "https://example.com/items/42"
            )))
        );
    }

    #[test]
    fn nodes_without_a_template_are_left_alone() {
        let registry = registry();
        let graph = load(r#"_:b a ex:Unknown ; ex:id "42" ."#);
        let result = skolemizer(&registry).skolemize(&graph).unwrap();
        assert_eq!(result, graph);
    }

    #[test]
    fn a_missing_template_variable_is_an_error() {
        let registry = registry();
        let graph = load(r#"_:b a ex:Item ; ex:title "no id" ."#);
        assert!(matches!(
            skolemizer(&registry).skolemize(&graph),
            Err(SkolemizationError::UnsatisfiedTemplate { .. })
        ));
    }

    #[test]
    fn fragment_templates_join_the_minted_uri() {
        let registry = registry();
        let graph = load(r#"_:b a ex:Topic ; ex:name "rust" ."#);
        let result = skolemizer(&registry).skolemize(&graph).unwrap();
        let subject = NamedNode::new_unchecked("https://example.com/topics/rust#this");
        assert!(result.contains(TripleRef::new(
            subject.as_ref(),
            rdf::TYPE,
            ex("Topic").as_ref()
        )));
    }

    #[test]
    fn competing_values_collapse_to_the_smallest() {
        let registry = registry();
        let graph = load(r#"_:b a ex:Item ; ex:id "b" ; ex:id "a" ."#);
        let result = skolemizer(&registry).skolemize(&graph).unwrap();
        let subject = NamedNode::new_unchecked("https://example.com/items/a");
        assert!(result.contains(TripleRef::new(
            subject.as_ref(),
            rdf::TYPE,
            ex("Item").as_ref()
        )));
    }

    #[test]
    fn skolemization_is_idempotent() {
        let registry = registry();
        let graph = load(
            r#"
            _:b a ex:Item ; ex:id "42" .
            _:c ex:untyped "stays" .
            "#,
        );
        let once = skolemizer(&registry).skolemize(&graph).unwrap();
        let twice = skolemizer(&registry).skolemize(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn already_minted_subjects_survive_unchanged() {
        let registry = registry();
        let subject = NamedNode::new_unchecked("https://example.com/items/42");
        let mut graph = Graph::new();
        graph.insert(&Triple::new(
            subject.clone(),
            ex("id"),
            Literal::new_simple_literal("42"),
        ));
        let result = skolemizer(&registry).skolemize(&graph).unwrap();
        assert_eq!(result, graph);
    }
}
