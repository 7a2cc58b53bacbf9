use crate::call::THIS;
use crate::ontology::{Ontology, OntologyError, SuperClass};
use oxrdf::vocab::rdf;
use oxrdf::{
    BlankNode, Graph, NamedNode, NamedNodeRef, Subject, SubjectRef, Term, TermRef, Triple,
    TripleRef,
};
use rustc_hash::{FxHashMap, FxHashSet};
use spargebra::term::{NamedNodePattern, TermPattern, TriplePattern};
use spargebra::Query;

/// Instantiates ontology classes into a target graph.
///
/// Constructing a class runs its declared constructor with `?this` bound to
/// the new instance, asserts the instance's `rdf:type`, and walks its
/// super-classes: plain super-classes are applied to the same instance, while
/// `owl:allValuesFrom` restrictions each produce a fresh related instance of
/// the restricted class, linked through the restriction's property and its
/// declared inverse. The walk tracks the classes on the current recursion
/// path, so a restriction hierarchy that loops back into itself fails instead
/// of recursing forever.
pub struct Constructor<'a> {
    ontology: &'a Ontology,
}

impl<'a> Constructor<'a> {
    pub fn new(ontology: &'a Ontology) -> Self {
        Self { ontology }
    }

    /// Creates a fresh instance of the class in the target graph.
    pub fn construct(
        &self,
        class: NamedNodeRef<'_>,
        target: &mut Graph,
    ) -> Result<BlankNode, OntologyError> {
        let instance = BlankNode::default();
        self.construct_instance(class, instance.as_ref().into(), target)?;
        Ok(instance)
    }

    /// Instantiates the class onto an existing resource.
    pub fn construct_instance(
        &self,
        class: NamedNodeRef<'_>,
        instance: SubjectRef<'_>,
        target: &mut Graph,
    ) -> Result<(), OntologyError> {
        let mut path = FxHashSet::default();
        self.construct_into(class, instance, target, &mut path)
    }

    fn construct_into(
        &self,
        class: NamedNodeRef<'_>,
        instance: SubjectRef<'_>,
        target: &mut Graph,
        path: &mut FxHashSet<NamedNode>,
    ) -> Result<(), OntologyError> {
        let entered = class.into_owned();
        path.insert(entered.clone());
        if let Some(query) = self.ontology.constructor_query(class)? {
            instantiate(&query, instance, target);
        }
        target.insert(TripleRef::new(instance, rdf::TYPE, class));
        for super_class in self.ontology.super_classes(class) {
            match super_class {
                SuperClass::Class(super_class) => {
                    if path.contains(&super_class) {
                        continue;
                    }
                    self.construct_into(super_class.as_ref(), instance, target, path)?;
                }
                SuperClass::Restriction {
                    property,
                    all_values_from,
                } => {
                    if path.contains(&all_values_from) {
                        return Err(OntologyError::RestrictionCycle {
                            class: all_values_from,
                            via: entered,
                        });
                    }
                    let related = BlankNode::default();
                    target.insert(TripleRef::new(instance, property.as_ref(), related.as_ref()));
                    if let Some(inverse) = self.ontology.inverse_of(property.as_ref()) {
                        target.insert(TripleRef::new(
                            related.as_ref(),
                            inverse.as_ref(),
                            subject_term(instance),
                        ));
                    }
                    self.construct_into(
                        all_values_from.as_ref(),
                        related.as_ref().into(),
                        target,
                        path,
                    )?;
                }
            }
        }
        path.remove(&entered);
        Ok(())
    }
}

/// Writes a constructor's `CONSTRUCT` template into the target graph.
///
/// `?this` stands for the instance. Triples mentioning any other variable are
/// dropped, the way `CONSTRUCT` drops triples with unbound variables, and
/// blank node labels map to fresh blank nodes shared across the template.
fn instantiate(query: &Query, instance: SubjectRef<'_>, target: &mut Graph) {
    let Query::Construct { template, .. } = query else {
        return;
    };
    let mut labels = FxHashMap::default();
    for pattern in template {
        let Some(triple) = instantiate_triple(pattern, instance, &mut labels) else {
            continue;
        };
        target.insert(&triple);
    }
}

fn instantiate_triple(
    pattern: &TriplePattern,
    instance: SubjectRef<'_>,
    labels: &mut FxHashMap<String, BlankNode>,
) -> Option<Triple> {
    let subject = match &pattern.subject {
        TermPattern::NamedNode(node) => Subject::from(node.clone()),
        TermPattern::BlankNode(node) => labelled_blank(labels, node.as_str()).into(),
        TermPattern::Literal(_) => return None,
        TermPattern::Variable(variable) if variable.as_str() == THIS => instance.into_owned(),
        TermPattern::Variable(_) => return None,
    };
    let NamedNodePattern::NamedNode(predicate) = &pattern.predicate else {
        return None;
    };
    let object = match &pattern.object {
        TermPattern::NamedNode(node) => Term::from(node.clone()),
        TermPattern::BlankNode(node) => labelled_blank(labels, node.as_str()).into(),
        TermPattern::Literal(literal) => literal.clone().into(),
        TermPattern::Variable(variable) if variable.as_str() == THIS => {
            subject_term(instance).into_owned()
        }
        TermPattern::Variable(_) => return None,
    };
    Some(Triple::new(subject, predicate.clone(), object))
}

fn labelled_blank(labels: &mut FxHashMap<String, BlankNode>, label: &str) -> BlankNode {
    labels.entry(label.to_owned()).or_default().clone()
}

fn subject_term(subject: SubjectRef<'_>) -> TermRef<'_> {
    match subject {
        SubjectRef::NamedNode(node) => TermRef::NamedNode(node),
        SubjectRef::BlankNode(node) => TermRef::BlankNode(node),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxiri::Iri;
    use oxrdf::LiteralRef;

    const PREFIXES: &str = r#"
        @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
        @prefix owl: <http://www.w3.org/2002/07/owl#> .
        @prefix spin: <http://spinrdf.org/spin#> .
        @prefix sp: <http://spinrdf.org/sp#> .
        @prefix ex: <https://example.com/ns#> .
    "#;

    fn ontology(turtle: &str) -> Ontology {
        let data = format!("{PREFIXES}{turtle}");
        let mut graph = Graph::new();
        for triple in oxttl::TurtleParser::new().for_reader(data.as_bytes()) {
            graph.insert(&triple.unwrap());
        }
        Ontology::new(graph, Iri::parse("https://example.com/".to_owned()).unwrap())
    }

    fn ex(local: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("https://example.com/ns#{local}"))
    }

    #[test]
    fn construct_runs_the_declared_constructor() {
        let ontology = ontology(
            r#"
            ex:Issue a owl:Class ;
                spin:constructor [ sp:text "CONSTRUCT { ?this <https://example.com/ns#status> \"open\" } WHERE {}" ] .
            "#,
        );
        let mut target = Graph::new();
        let instance = Constructor::new(&ontology)
            .construct(ex("Issue").as_ref(), &mut target)
            .unwrap();
        assert!(target.contains(TripleRef::new(
            instance.as_ref(),
            rdf::TYPE,
            ex("Issue").as_ref()
        )));
        assert_eq!(
            target.object_for_subject_predicate(instance.as_ref(), ex("status").as_ref()),
            Some(TermRef::Literal(LiteralRef::new_simple_literal("open")))
        );
    }

    #[test]
    fn a_class_without_a_constructor_still_gets_its_type() {
        let ontology = ontology(r#"ex:Note a owl:Class ."#);
        let mut target = Graph::new();
        let instance = Constructor::new(&ontology)
            .construct(ex("Note").as_ref(), &mut target)
            .unwrap();
        assert_eq!(target.len(), 1);
        assert!(target.contains(TripleRef::new(
            instance.as_ref(),
            rdf::TYPE,
            ex("Note").as_ref()
        )));
    }

    #[test]
    fn superclasses_and_restrictions_are_walked() {
        let ontology = ontology(
            r#"
            ex:Record a owl:Class ;
                spin:constructor [ sp:text "CONSTRUCT { ?this <https://example.com/ns#archived> false } WHERE {}" ] .
            ex:Person a owl:Class .
            ex:Issue a owl:Class ;
                rdfs:subClassOf ex:Record ;
                rdfs:subClassOf [ a owl:Restriction ; owl:onProperty ex:reporter ; owl:allValuesFrom ex:Person ] .
            "#,
        );
        let mut target = Graph::new();
        let instance = Constructor::new(&ontology)
            .construct(ex("Issue").as_ref(), &mut target)
            .unwrap();
        assert!(target.contains(TripleRef::new(
            instance.as_ref(),
            rdf::TYPE,
            ex("Record").as_ref()
        )));
        assert!(target
            .object_for_subject_predicate(instance.as_ref(), ex("archived").as_ref())
            .is_some());
        let reporter = match target
            .object_for_subject_predicate(instance.as_ref(), ex("reporter").as_ref())
        {
            Some(TermRef::BlankNode(node)) => node,
            other => unreachable!("unexpected reporter value {other:?}"),
        };
        assert!(target.contains(TripleRef::new(reporter, rdf::TYPE, ex("Person").as_ref())));
    }

    #[test]
    fn inverse_properties_link_back() {
        let ontology = ontology(
            r#"
            ex:Person a owl:Class .
            ex:reported owl:inverseOf ex:reporter .
            ex:Issue a owl:Class ;
                rdfs:subClassOf [ a owl:Restriction ; owl:onProperty ex:reporter ; owl:allValuesFrom ex:Person ] .
            "#,
        );
        let mut target = Graph::new();
        let instance = Constructor::new(&ontology)
            .construct(ex("Issue").as_ref(), &mut target)
            .unwrap();
        let reporter = match target
            .object_for_subject_predicate(instance.as_ref(), ex("reporter").as_ref())
        {
            Some(TermRef::BlankNode(node)) => node,
            other => unreachable!("unexpected reporter value {other:?}"),
        };
        assert!(target.contains(TripleRef::new(
            reporter,
            ex("reported").as_ref(),
            instance.as_ref()
        )));
    }

    #[test]
    fn restriction_cycles_are_detected() {
        let ontology = ontology(
            r#"
            ex:A a owl:Class ;
                rdfs:subClassOf [ a owl:Restriction ; owl:onProperty ex:b ; owl:allValuesFrom ex:B ] .
            ex:B a owl:Class ;
                rdfs:subClassOf [ a owl:Restriction ; owl:onProperty ex:a ; owl:allValuesFrom ex:A ] .
            "#,
        );
        let mut target = Graph::new();
        let result = Constructor::new(&ontology).construct(ex("A").as_ref(), &mut target);
        assert!(matches!(
            result,
            Err(OntologyError::RestrictionCycle { class, via })
                if class == ex("A") && via == ex("B")
        ));
    }

    #[test]
    fn a_shared_superclass_is_not_a_cycle() {
        let ontology = ontology(
            r#"
            ex:A a owl:Class ; rdfs:subClassOf ex:B , ex:C .
            ex:B a owl:Class ; rdfs:subClassOf ex:D .
            ex:C a owl:Class ; rdfs:subClassOf ex:D .
            ex:D a owl:Class .
            "#,
        );
        let mut target = Graph::new();
        let instance = Constructor::new(&ontology)
            .construct(ex("A").as_ref(), &mut target)
            .unwrap();
        for class in ["A", "B", "C", "D"] {
            assert!(target.contains(TripleRef::new(
                instance.as_ref(),
                rdf::TYPE,
                ex(class).as_ref()
            )));
        }
    }

    #[test]
    fn template_blank_nodes_become_fresh_resources() {
        let ontology = ontology(
            r#"
            ex:Issue a owl:Class ;
                spin:constructor [ sp:text "CONSTRUCT { ?this <https://example.com/ns#address> _:a . _:a <https://example.com/ns#city> \"X\" } WHERE {}" ] .
            "#,
        );
        let mut target = Graph::new();
        let instance = Constructor::new(&ontology)
            .construct(ex("Issue").as_ref(), &mut target)
            .unwrap();
        let address = match target
            .object_for_subject_predicate(instance.as_ref(), ex("address").as_ref())
        {
            Some(TermRef::BlankNode(node)) => node,
            other => unreachable!("unexpected address value {other:?}"),
        };
        assert_ne!(address, instance.as_ref());
        assert_eq!(
            target.object_for_subject_predicate(address, ex("city").as_ref()),
            Some(TermRef::Literal(LiteralRef::new_simple_literal("X")))
        );
    }

    #[test]
    fn triples_with_unbound_variables_are_dropped() {
        let ontology = ontology(
            r#"
            ex:Issue a owl:Class ;
                spin:constructor [ sp:text "CONSTRUCT { ?this <https://example.com/ns#now> ?now } WHERE {}" ] .
            "#,
        );
        let mut target = Graph::new();
        let instance = Constructor::new(&ontology)
            .construct(ex("Issue").as_ref(), &mut target)
            .unwrap();
        assert!(target
            .object_for_subject_predicate(instance.as_ref(), ex("now").as_ref())
            .is_none());
        assert_eq!(target.len(), 1);
    }

    #[test]
    fn an_existing_resource_can_be_instantiated() {
        let ontology = ontology(r#"ex:Issue a owl:Class ."#);
        let subject = NamedNode::new_unchecked("https://example.com/issues/1");
        let mut target = Graph::new();
        Constructor::new(&ontology)
            .construct_instance(ex("Issue").as_ref(), subject.as_ref().into(), &mut target)
            .unwrap();
        assert!(target.contains(TripleRef::new(
            subject.as_ref(),
            rdf::TYPE,
            ex("Issue").as_ref()
        )));
    }
}
