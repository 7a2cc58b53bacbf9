use oxrdf::dataset::GraphView;
use oxrdf::{Dataset, GraphName, GraphNameRef, NamedNode, NamedOrBlankNode, Term};
use thiserror::Error;

/// The external rule engine constraint checking delegates to.
pub trait ConstraintOracle {
    /// Checks one graph of the dataset and reports its violations.
    fn check(&self, graph_name: GraphNameRef<'_>, graph: GraphView<'_>) -> Vec<ConstraintViolation>;
}

/// One constraint failure reported by the oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintViolation {
    /// The resource that failed the constraint.
    pub focus: NamedOrBlankNode,
    /// The constraint that failed.
    pub source: NamedNode,
    /// The offending value, when one exists.
    pub value: Option<Term>,
    /// A human readable description.
    pub message: String,
}

/// Runs an oracle over every graph of a dataset.
///
/// The validator contributes no rules of its own. It hands the oracle the
/// default graph first and then each named graph in lexicographic order, and
/// keeps each violation paired with the graph it came from so the caller can
/// name the failing graph.
pub struct Validator<O> {
    oracle: O,
}

impl<O: ConstraintOracle> Validator<O> {
    pub fn new(oracle: O) -> Self {
        Self { oracle }
    }

    /// Every violation in the dataset, paired with its graph.
    pub fn report(&self, dataset: &Dataset) -> Vec<(GraphName, ConstraintViolation)> {
        let mut found = Vec::new();
        for name in graph_names(dataset) {
            let graph = dataset.graph(name.as_ref());
            for violation in self.oracle.check(name.as_ref(), graph) {
                found.push((name.clone(), violation));
            }
        }
        found
    }

    /// Fails when any graph carries a violation.
    pub fn validate(&self, dataset: &Dataset) -> Result<(), ConstraintViolationError> {
        let violations = self.report(dataset);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ConstraintViolationError { violations })
        }
    }
}

fn graph_names(dataset: &Dataset) -> Vec<GraphName> {
    let mut names: Vec<GraphName> = dataset
        .iter()
        .filter(|quad| quad.graph_name != GraphNameRef::DefaultGraph)
        .map(|quad| quad.graph_name.into_owned())
        .collect();
    names.sort_unstable_by(|a, b| name_key(a).cmp(&name_key(b)));
    names.dedup();
    names.insert(0, GraphName::DefaultGraph);
    names
}

fn name_key(name: &GraphName) -> (u8, &str) {
    match name {
        GraphName::DefaultGraph => (0, ""),
        GraphName::NamedNode(node) => (1, node.as_str()),
        GraphName::BlankNode(node) => (2, node.as_str()),
    }
}

/// A payload was rejected because the oracle found violations.
#[derive(Error, Debug)]
#[error("{} constraint violation(s)", .violations.len())]
pub struct ConstraintViolationError {
    violations: Vec<(GraphName, ConstraintViolation)>,
}

impl ConstraintViolationError {
    /// Every violation with the graph it occurred in.
    pub fn violations(&self) -> &[(GraphName, ConstraintViolation)] {
        &self.violations
    }
}
