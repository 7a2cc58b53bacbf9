//! Writes argument bindings into stored SPARQL trees.

use oxrdf::Variable;
use rustc_hash::FxHashMap;
use spargebra::algebra::{AggregateExpression, Expression, GraphPattern, OrderExpression};
use spargebra::term::{
    GraphNamePattern, GroundQuadPattern, GroundTerm, GroundTermPattern, NamedNodePattern,
    QuadPattern, TermPattern, TriplePattern,
};
use spargebra::{GraphUpdateOperation, Query, Update};
use thiserror::Error;

pub(crate) type Bindings = FxHashMap<Variable, GroundTerm>;

/// A binding that cannot be written into the stored tree.
#[derive(Error, Debug)]
pub(crate) enum SubstitutionError {
    #[error("the literal bound to {0} cannot replace a variable in an IRI position")]
    LiteralInIriPosition(Variable),
}

/// Replaces bound variables in a query with their values.
///
/// Variables projected by a sub-select or used as group keys cannot simply
/// disappear, they are rebound with a `BIND` inside the projection instead.
pub(crate) fn substitute_query(
    query: Query,
    bindings: &Bindings,
) -> Result<Query, SubstitutionError> {
    Ok(match query {
        Query::Select {
            dataset,
            pattern,
            base_iri,
        } => Query::Select {
            dataset,
            pattern: graph_pattern(pattern, bindings)?,
            base_iri,
        },
        Query::Construct {
            template,
            dataset,
            pattern,
            base_iri,
        } => Query::Construct {
            template: template
                .into_iter()
                .map(|triple| triple_pattern(triple, bindings))
                .collect::<Result<_, _>>()?,
            dataset,
            pattern: graph_pattern(pattern, bindings)?,
            base_iri,
        },
        Query::Describe {
            dataset,
            pattern,
            base_iri,
        } => Query::Describe {
            dataset,
            pattern: graph_pattern(pattern, bindings)?,
            base_iri,
        },
        Query::Ask {
            dataset,
            pattern,
            base_iri,
        } => Query::Ask {
            dataset,
            pattern: graph_pattern(pattern, bindings)?,
            base_iri,
        },
    })
}

/// Replaces bound variables in an update with their values.
pub(crate) fn substitute_update(
    update: Update,
    bindings: &Bindings,
) -> Result<Update, SubstitutionError> {
    Ok(Update {
        base_iri: update.base_iri,
        operations: update
            .operations
            .into_iter()
            .map(|operation| update_operation(operation, bindings))
            .collect::<Result<_, _>>()?,
    })
}

/// Joins a `VALUES` block binding the variable to the given terms in front of
/// the pattern, descending below solution modifiers so the block lands in the
/// matched group.
pub(crate) fn inject_values(
    pattern: GraphPattern,
    variable: &Variable,
    values: &[GroundTerm],
) -> GraphPattern {
    match pattern {
        GraphPattern::Slice {
            inner,
            start,
            length,
        } => GraphPattern::Slice {
            inner: Box::new(inject_values(*inner, variable, values)),
            start,
            length,
        },
        GraphPattern::Distinct { inner } => GraphPattern::Distinct {
            inner: Box::new(inject_values(*inner, variable, values)),
        },
        GraphPattern::Reduced { inner } => GraphPattern::Reduced {
            inner: Box::new(inject_values(*inner, variable, values)),
        },
        GraphPattern::Project { inner, variables } => GraphPattern::Project {
            inner: Box::new(inject_values(*inner, variable, values)),
            variables,
        },
        GraphPattern::OrderBy { inner, expression } => GraphPattern::OrderBy {
            inner: Box::new(inject_values(*inner, variable, values)),
            expression,
        },
        pattern => GraphPattern::Join {
            left: Box::new(GraphPattern::Values {
                variables: vec![variable.clone()],
                bindings: values.iter().map(|term| vec![Some(term.clone())]).collect(),
            }),
            right: Box::new(pattern),
        },
    }
}

fn update_operation(
    operation: GraphUpdateOperation,
    bindings: &Bindings,
) -> Result<GraphUpdateOperation, SubstitutionError> {
    Ok(match operation {
        GraphUpdateOperation::DeleteInsert {
            delete,
            insert,
            using,
            pattern,
        } => GraphUpdateOperation::DeleteInsert {
            delete: delete
                .into_iter()
                .map(|quad| ground_quad_pattern(quad, bindings))
                .collect::<Result<_, _>>()?,
            insert: insert
                .into_iter()
                .map(|quad| quad_pattern(quad, bindings))
                .collect::<Result<_, _>>()?,
            using,
            pattern: Box::new(graph_pattern(*pattern, bindings)?),
        },
        operation => operation,
    })
}

fn graph_pattern(
    pattern: GraphPattern,
    bindings: &Bindings,
) -> Result<GraphPattern, SubstitutionError> {
    Ok(match pattern {
        GraphPattern::Bgp { patterns } => GraphPattern::Bgp {
            patterns: patterns
                .into_iter()
                .map(|triple| triple_pattern(triple, bindings))
                .collect::<Result<_, _>>()?,
        },
        GraphPattern::Path {
            subject,
            path,
            object,
        } => GraphPattern::Path {
            subject: subject_pattern(subject, bindings)?,
            path,
            object: term_pattern(object, bindings),
        },
        GraphPattern::Join { left, right } => GraphPattern::Join {
            left: Box::new(graph_pattern(*left, bindings)?),
            right: Box::new(graph_pattern(*right, bindings)?),
        },
        GraphPattern::LeftJoin {
            left,
            right,
            expression: expr,
        } => GraphPattern::LeftJoin {
            left: Box::new(graph_pattern(*left, bindings)?),
            right: Box::new(graph_pattern(*right, bindings)?),
            expression: expr.map(|e| expression(e, bindings)).transpose()?,
        },
        GraphPattern::Filter { expr, inner } => GraphPattern::Filter {
            expr: expression(expr, bindings)?,
            inner: Box::new(graph_pattern(*inner, bindings)?),
        },
        GraphPattern::Union { left, right } => GraphPattern::Union {
            left: Box::new(graph_pattern(*left, bindings)?),
            right: Box::new(graph_pattern(*right, bindings)?),
        },
        GraphPattern::Graph { name, inner } => GraphPattern::Graph {
            name: named_node_pattern(name, bindings)?,
            inner: Box::new(graph_pattern(*inner, bindings)?),
        },
        GraphPattern::Extend {
            inner,
            variable,
            expression: expr,
        } => GraphPattern::Extend {
            inner: Box::new(graph_pattern(*inner, bindings)?),
            variable,
            expression: expression(expr, bindings)?,
        },
        GraphPattern::Minus { left, right } => GraphPattern::Minus {
            left: Box::new(graph_pattern(*left, bindings)?),
            right: Box::new(graph_pattern(*right, bindings)?),
        },
        GraphPattern::Values {
            variables,
            bindings: rows,
        } => GraphPattern::Values {
            variables,
            bindings: rows,
        },
        GraphPattern::OrderBy {
            inner,
            expression: exprs,
        } => GraphPattern::OrderBy {
            inner: Box::new(graph_pattern(*inner, bindings)?),
            expression: exprs
                .into_iter()
                .map(|e| order_expression(e, bindings))
                .collect::<Result<_, _>>()?,
        },
        GraphPattern::Project { inner, variables } => {
            let inner = graph_pattern(*inner, bindings)?;
            GraphPattern::Project {
                inner: Box::new(bind_projected(inner, &variables, bindings)),
                variables,
            }
        }
        GraphPattern::Distinct { inner } => GraphPattern::Distinct {
            inner: Box::new(graph_pattern(*inner, bindings)?),
        },
        GraphPattern::Reduced { inner } => GraphPattern::Reduced {
            inner: Box::new(graph_pattern(*inner, bindings)?),
        },
        GraphPattern::Slice {
            inner,
            start,
            length,
        } => GraphPattern::Slice {
            inner: Box::new(graph_pattern(*inner, bindings)?),
            start,
            length,
        },
        GraphPattern::Group {
            inner,
            variables,
            aggregates,
        } => {
            let inner = graph_pattern(*inner, bindings)?;
            GraphPattern::Group {
                inner: Box::new(bind_projected(inner, &variables, bindings)),
                variables,
                aggregates: aggregates
                    .into_iter()
                    .map(|(variable, aggregate)| {
                        Ok((variable, aggregate_expression(aggregate, bindings)?))
                    })
                    .collect::<Result<_, SubstitutionError>>()?,
            }
        }
        GraphPattern::Service {
            name,
            inner,
            silent,
        } => GraphPattern::Service {
            name: named_node_pattern(name, bindings)?,
            inner: Box::new(graph_pattern(*inner, bindings)?),
            silent,
        },
    })
}

fn bind_projected(
    mut inner: GraphPattern,
    variables: &[Variable],
    bindings: &Bindings,
) -> GraphPattern {
    for variable in variables {
        if let Some(term) = bindings.get(variable) {
            inner = GraphPattern::Extend {
                inner: Box::new(inner),
                variable: variable.clone(),
                expression: ground_term_expression(term),
            };
        }
    }
    inner
}

fn triple_pattern(
    pattern: TriplePattern,
    bindings: &Bindings,
) -> Result<TriplePattern, SubstitutionError> {
    Ok(TriplePattern {
        subject: subject_pattern(pattern.subject, bindings)?,
        predicate: named_node_pattern(pattern.predicate, bindings)?,
        object: term_pattern(pattern.object, bindings),
    })
}

fn quad_pattern(
    pattern: QuadPattern,
    bindings: &Bindings,
) -> Result<QuadPattern, SubstitutionError> {
    Ok(QuadPattern {
        subject: subject_pattern(pattern.subject, bindings)?,
        predicate: named_node_pattern(pattern.predicate, bindings)?,
        object: term_pattern(pattern.object, bindings),
        graph_name: graph_name_pattern(pattern.graph_name, bindings)?,
    })
}

fn ground_quad_pattern(
    pattern: GroundQuadPattern,
    bindings: &Bindings,
) -> Result<GroundQuadPattern, SubstitutionError> {
    Ok(GroundQuadPattern {
        subject: ground_subject_pattern(pattern.subject, bindings)?,
        predicate: named_node_pattern(pattern.predicate, bindings)?,
        object: ground_term_pattern(pattern.object, bindings),
        graph_name: graph_name_pattern(pattern.graph_name, bindings)?,
    })
}

fn term_pattern(pattern: TermPattern, bindings: &Bindings) -> TermPattern {
    match pattern {
        TermPattern::Variable(variable) => match bindings.get(&variable) {
            Some(GroundTerm::NamedNode(node)) => node.clone().into(),
            Some(GroundTerm::Literal(literal)) => literal.clone().into(),
            None => TermPattern::Variable(variable),
        },
        pattern => pattern,
    }
}

fn subject_pattern(
    pattern: TermPattern,
    bindings: &Bindings,
) -> Result<TermPattern, SubstitutionError> {
    if let TermPattern::Variable(variable) = &pattern {
        if let Some(term) = bindings.get(variable) {
            return match term {
                GroundTerm::NamedNode(node) => Ok(node.clone().into()),
                GroundTerm::Literal(_) => {
                    Err(SubstitutionError::LiteralInIriPosition(variable.clone()))
                }
            };
        }
    }
    Ok(pattern)
}

fn ground_term_pattern(pattern: GroundTermPattern, bindings: &Bindings) -> GroundTermPattern {
    match pattern {
        GroundTermPattern::Variable(variable) => match bindings.get(&variable) {
            Some(term) => term.clone().into(),
            None => GroundTermPattern::Variable(variable),
        },
        pattern => pattern,
    }
}

fn ground_subject_pattern(
    pattern: GroundTermPattern,
    bindings: &Bindings,
) -> Result<GroundTermPattern, SubstitutionError> {
    if let GroundTermPattern::Variable(variable) = &pattern {
        if let Some(term) = bindings.get(variable) {
            return match term {
                GroundTerm::NamedNode(node) => Ok(node.clone().into()),
                GroundTerm::Literal(_) => {
                    Err(SubstitutionError::LiteralInIriPosition(variable.clone()))
                }
            };
        }
    }
    Ok(pattern)
}

fn named_node_pattern(
    pattern: NamedNodePattern,
    bindings: &Bindings,
) -> Result<NamedNodePattern, SubstitutionError> {
    match pattern {
        NamedNodePattern::Variable(variable) => match bindings.get(&variable) {
            Some(GroundTerm::NamedNode(node)) => Ok(NamedNodePattern::NamedNode(node.clone())),
            Some(GroundTerm::Literal(_)) => {
                Err(SubstitutionError::LiteralInIriPosition(variable))
            }
            None => Ok(NamedNodePattern::Variable(variable)),
        },
        pattern => Ok(pattern),
    }
}

fn graph_name_pattern(
    pattern: GraphNamePattern,
    bindings: &Bindings,
) -> Result<GraphNamePattern, SubstitutionError> {
    match pattern {
        GraphNamePattern::Variable(variable) => match bindings.get(&variable) {
            Some(GroundTerm::NamedNode(node)) => Ok(GraphNamePattern::NamedNode(node.clone())),
            Some(GroundTerm::Literal(_)) => {
                Err(SubstitutionError::LiteralInIriPosition(variable))
            }
            None => Ok(GraphNamePattern::Variable(variable)),
        },
        pattern => Ok(pattern),
    }
}

fn expression(expr: Expression, bindings: &Bindings) -> Result<Expression, SubstitutionError> {
    Ok(match expr {
        Expression::NamedNode(node) => Expression::NamedNode(node),
        Expression::Literal(literal) => Expression::Literal(literal),
        Expression::Variable(variable) => match bindings.get(&variable) {
            Some(term) => ground_term_expression(term),
            None => Expression::Variable(variable),
        },
        Expression::Or(left, right) => Expression::Or(
            Box::new(expression(*left, bindings)?),
            Box::new(expression(*right, bindings)?),
        ),
        Expression::And(left, right) => Expression::And(
            Box::new(expression(*left, bindings)?),
            Box::new(expression(*right, bindings)?),
        ),
        Expression::Equal(left, right) => Expression::Equal(
            Box::new(expression(*left, bindings)?),
            Box::new(expression(*right, bindings)?),
        ),
        Expression::SameTerm(left, right) => Expression::SameTerm(
            Box::new(expression(*left, bindings)?),
            Box::new(expression(*right, bindings)?),
        ),
        Expression::Greater(left, right) => Expression::Greater(
            Box::new(expression(*left, bindings)?),
            Box::new(expression(*right, bindings)?),
        ),
        Expression::GreaterOrEqual(left, right) => Expression::GreaterOrEqual(
            Box::new(expression(*left, bindings)?),
            Box::new(expression(*right, bindings)?),
        ),
        Expression::Less(left, right) => Expression::Less(
            Box::new(expression(*left, bindings)?),
            Box::new(expression(*right, bindings)?),
        ),
        Expression::LessOrEqual(left, right) => Expression::LessOrEqual(
            Box::new(expression(*left, bindings)?),
            Box::new(expression(*right, bindings)?),
        ),
        Expression::In(value, values) => Expression::In(
            Box::new(expression(*value, bindings)?),
            values
                .into_iter()
                .map(|e| expression(e, bindings))
                .collect::<Result<_, _>>()?,
        ),
        Expression::Add(left, right) => Expression::Add(
            Box::new(expression(*left, bindings)?),
            Box::new(expression(*right, bindings)?),
        ),
        Expression::Subtract(left, right) => Expression::Subtract(
            Box::new(expression(*left, bindings)?),
            Box::new(expression(*right, bindings)?),
        ),
        Expression::Multiply(left, right) => Expression::Multiply(
            Box::new(expression(*left, bindings)?),
            Box::new(expression(*right, bindings)?),
        ),
        Expression::Divide(left, right) => Expression::Divide(
            Box::new(expression(*left, bindings)?),
            Box::new(expression(*right, bindings)?),
        ),
        Expression::UnaryPlus(inner) => {
            Expression::UnaryPlus(Box::new(expression(*inner, bindings)?))
        }
        Expression::UnaryMinus(inner) => {
            Expression::UnaryMinus(Box::new(expression(*inner, bindings)?))
        }
        Expression::Not(inner) => Expression::Not(Box::new(expression(*inner, bindings)?)),
        Expression::Exists(pattern) => {
            Expression::Exists(Box::new(graph_pattern(*pattern, bindings)?))
        }
        Expression::Bound(variable) => {
            if bindings.contains_key(&variable) {
                Expression::Literal(true.into())
            } else {
                Expression::Bound(variable)
            }
        }
        Expression::If(condition, then, otherwise) => Expression::If(
            Box::new(expression(*condition, bindings)?),
            Box::new(expression(*then, bindings)?),
            Box::new(expression(*otherwise, bindings)?),
        ),
        Expression::Coalesce(exprs) => Expression::Coalesce(
            exprs
                .into_iter()
                .map(|e| expression(e, bindings))
                .collect::<Result<_, _>>()?,
        ),
        Expression::FunctionCall(function, args) => Expression::FunctionCall(
            function,
            args.into_iter()
                .map(|e| expression(e, bindings))
                .collect::<Result<_, _>>()?,
        ),
    })
}

fn order_expression(
    expr: OrderExpression,
    bindings: &Bindings,
) -> Result<OrderExpression, SubstitutionError> {
    Ok(match expr {
        OrderExpression::Asc(e) => OrderExpression::Asc(expression(e, bindings)?),
        OrderExpression::Desc(e) => OrderExpression::Desc(expression(e, bindings)?),
    })
}

fn aggregate_expression(
    aggregate: AggregateExpression,
    bindings: &Bindings,
) -> Result<AggregateExpression, SubstitutionError> {
    Ok(match aggregate {
        AggregateExpression::CountSolutions { distinct } => {
            AggregateExpression::CountSolutions { distinct }
        }
        AggregateExpression::FunctionCall {
            name,
            expr,
            distinct,
        } => AggregateExpression::FunctionCall {
            name,
            expr: expression(expr, bindings)?,
            distinct,
        },
    })
}

fn ground_term_expression(term: &GroundTerm) -> Expression {
    match term {
        GroundTerm::NamedNode(node) => Expression::NamedNode(node.clone()),
        GroundTerm::Literal(literal) => Expression::Literal(literal.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdf::{Literal, NamedNode};

    fn this_binding() -> Bindings {
        [(
            Variable::new_unchecked("this"),
            GroundTerm::NamedNode(NamedNode::new_unchecked("https://example.com/items/42")),
        )]
        .into_iter()
        .collect()
    }

    #[test]
    fn variables_in_triple_patterns_are_replaced() {
        let query = Query::parse("SELECT ?p WHERE { ?this ?p ?o }", None).unwrap();
        let substituted = substitute_query(query, &this_binding()).unwrap();
        let text = substituted.to_string();
        assert!(text.contains("<https://example.com/items/42> ?p ?o"), "{text}");
    }

    #[test]
    fn projected_bound_variables_stay_visible() {
        let query = Query::parse("SELECT ?this WHERE { ?this a ?t }", None).unwrap();
        let text = substitute_query(query, &this_binding()).unwrap().to_string();
        assert!(
            text.contains("BIND(<https://example.com/items/42> AS ?this)"),
            "{text}"
        );
    }

    #[test]
    fn a_literal_cannot_replace_a_predicate_variable() {
        let query = Query::parse("SELECT ?s WHERE { ?s ?p ?o }", None).unwrap();
        let bindings: Bindings = [(
            Variable::new_unchecked("p"),
            GroundTerm::Literal(Literal::new_simple_literal("nope")),
        )]
        .into_iter()
        .collect();
        assert!(matches!(
            substitute_query(query, &bindings),
            Err(SubstitutionError::LiteralInIriPosition(variable)) if variable.as_str() == "p"
        ));
    }

    #[test]
    fn bound_checks_collapse_for_bound_variables() {
        let query =
            Query::parse("SELECT ?s WHERE { ?s ?p ?o FILTER(BOUND(?this)) }", None).unwrap();
        let text = substitute_query(query, &this_binding()).unwrap().to_string();
        assert!(!text.contains("BOUND"), "{text}");
    }

    #[test]
    fn exists_patterns_are_walked() {
        let query = Query::parse(
            "SELECT ?s WHERE { ?s ?p ?o FILTER EXISTS { ?this ?q ?v } }",
            None,
        )
        .unwrap();
        let text = substitute_query(query, &this_binding()).unwrap().to_string();
        assert!(text.contains("EXISTS { <https://example.com/items/42>"), "{text}");
    }

    #[test]
    fn updates_substitute_inside_delete_insert() {
        let update = Update::parse("DELETE { ?this ?p ?o } WHERE { ?this ?p ?o }", None).unwrap();
        let text = substitute_update(update, &this_binding()).unwrap().to_string();
        assert_eq!(text.matches("<https://example.com/items/42>").count(), 2);
    }

    #[test]
    fn values_injection_lands_inside_solution_modifiers() {
        let Query::Select { pattern, .. } =
            Query::parse("SELECT DISTINCT ?s WHERE { ?s ?p ?o } LIMIT 3", None).unwrap()
        else {
            unreachable!()
        };
        let injected = inject_values(
            pattern,
            &Variable::new_unchecked("p"),
            &[
                GroundTerm::NamedNode(NamedNode::new_unchecked("https://example.com/ns#a")),
                GroundTerm::NamedNode(NamedNode::new_unchecked("https://example.com/ns#b")),
            ],
        );
        let text = Query::Select {
            dataset: None,
            pattern: injected,
            base_iri: None,
        }
        .to_string();
        assert!(text.contains("VALUES"), "{text}");
        assert!(text.contains("LIMIT 3"), "{text}");
    }
}
