use crate::call::{BoundCall, DESC, LIMIT, OFFSET, ORDER_BY, THIS};
use crate::error::LdtError;
use crate::parameter::ParameterError;
use crate::registry::TemplateRegistryError;
use crate::substitution::{
    inject_values, substitute_query, substitute_update, Bindings, SubstitutionError,
};
use crate::template::TemplateKind;
use oxrdf::{Term, Variable};
use oxsdatatypes::Boolean;
use spargebra::algebra::{Expression, GraphPattern, OrderExpression};
use spargebra::term::GroundTerm;
use spargebra::{GraphUpdateOperation, Query, Update};
use std::str::FromStr;

/// Synthesizes the SPARQL query answering a bound call.
///
/// The template's stored query gets `?this` replaced by the call's subject
/// resource and every bound parameter written in. Container calls
/// additionally have their pagination arguments rewritten into the query's
/// nested sub-select. Building is pure: the same call always yields the same
/// query.
pub struct QueryBuilder<'a> {
    call: &'a BoundCall,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(call: &'a BoundCall) -> Self {
        Self { call }
    }

    pub fn build(&self) -> Result<Query, LdtError> {
        let template = self.call.template();
        let Some(query) = template.query().cloned() else {
            return Err(TemplateRegistryError::MissingQuery(template.class().into_owned()).into());
        };
        let container = template.kind() == TemplateKind::Container;
        let (bindings, multi) = collect_bindings(self.call, container)?;
        let mut query =
            substitute_query(query, &bindings).map_err(|e| substitution_error(e, &bindings))?;
        for (variable, values) in multi {
            query = map_pattern(query, |pattern| inject_values(pattern, &variable, &values));
        }
        if container {
            query = paginate(query, self.call)?;
        }
        Ok(query)
    }
}

/// Synthesizes the SPARQL update applying a bound call.
///
/// Bindings are written into the update's `DELETE`/`INSERT` templates and
/// `WHERE` pattern the same way [`QueryBuilder`] treats queries. Updates are
/// never paginated.
pub struct UpdateBuilder<'a> {
    call: &'a BoundCall,
}

impl<'a> UpdateBuilder<'a> {
    pub fn new(call: &'a BoundCall) -> Self {
        Self { call }
    }

    pub fn build(&self) -> Result<Update, LdtError> {
        let template = self.call.template();
        let Some(update) = template.update().cloned() else {
            return Err(TemplateRegistryError::MissingUpdate(template.class().into_owned()).into());
        };
        let container = template.kind() == TemplateKind::Container;
        let (bindings, multi) = collect_bindings(self.call, container)?;
        let mut update =
            substitute_update(update, &bindings).map_err(|e| substitution_error(e, &bindings))?;
        for (variable, values) in multi {
            update.operations = update
                .operations
                .into_iter()
                .map(|operation| match operation {
                    GraphUpdateOperation::DeleteInsert {
                        delete,
                        insert,
                        using,
                        pattern,
                    } => GraphUpdateOperation::DeleteInsert {
                        delete,
                        insert,
                        using,
                        pattern: Box::new(inject_values(*pattern, &variable, &values)),
                    },
                    operation => operation,
                })
                .collect();
        }
        Ok(update)
    }
}

/// Whether a stored query carries a nested sub-select below its own
/// projection, the structure container pagination rewrites.
pub(crate) fn query_has_nested_sub_select(query: &Query) -> bool {
    match query {
        Query::Select { pattern, .. } | Query::Describe { pattern, .. } => {
            contains_project(below_root_projection(pattern))
        }
        Query::Construct { pattern, .. } | Query::Ask { pattern, .. } => contains_project(pattern),
    }
}

fn collect_bindings(
    call: &BoundCall,
    exclude_pagination: bool,
) -> Result<(Bindings, Vec<(Variable, Vec<GroundTerm>)>), LdtError> {
    let mut bindings = Bindings::default();
    let mut multi = Vec::new();
    for (name, values) in call.bindings() {
        if exclude_pagination && [LIMIT, OFFSET, ORDER_BY, DESC].contains(&name) {
            continue;
        }
        let variable = Variable::new_unchecked(name);
        let mut terms = Vec::with_capacity(values.len());
        for value in values {
            terms.push(ground_term(name, value)?);
        }
        if terms.len() == 1 {
            if let Some(term) = terms.pop() {
                bindings.insert(variable, term);
            }
        } else {
            multi.push((variable, terms));
        }
    }
    bindings.insert(
        Variable::new_unchecked(THIS),
        GroundTerm::NamedNode(call.subject_resource()),
    );
    Ok((bindings, multi))
}

fn ground_term(name: &str, term: &Term) -> Result<GroundTerm, ParameterError> {
    match term {
        Term::NamedNode(node) => Ok(GroundTerm::NamedNode(node.clone())),
        Term::Literal(literal) => Ok(GroundTerm::Literal(literal.clone())),
        Term::BlankNode(node) => Err(ParameterError::InvalidValue {
            variable: name.to_owned(),
            value: node.to_string(),
            reason: "blank nodes cannot be bound into a query".to_owned(),
        }),
    }
}

fn substitution_error(error: SubstitutionError, bindings: &Bindings) -> LdtError {
    match error {
        SubstitutionError::LiteralInIriPosition(variable) => {
            let value = bindings
                .get(&variable)
                .map(ToString::to_string)
                .unwrap_or_default();
            ParameterError::InvalidValue {
                variable: variable.as_str().to_owned(),
                value,
                reason: "a literal cannot replace a variable used in an IRI position".to_owned(),
            }
            .into()
        }
    }
}

fn map_pattern(query: Query, f: impl FnOnce(GraphPattern) -> GraphPattern) -> Query {
    match query {
        Query::Select {
            dataset,
            pattern,
            base_iri,
        } => Query::Select {
            dataset,
            pattern: f(pattern),
            base_iri,
        },
        Query::Construct {
            template,
            dataset,
            pattern,
            base_iri,
        } => Query::Construct {
            template,
            dataset,
            pattern: f(pattern),
            base_iri,
        },
        Query::Describe {
            dataset,
            pattern,
            base_iri,
        } => Query::Describe {
            dataset,
            pattern: f(pattern),
            base_iri,
        },
        Query::Ask {
            dataset,
            pattern,
            base_iri,
        } => Query::Ask {
            dataset,
            pattern: f(pattern),
            base_iri,
        },
    }
}

struct PageSpec {
    limit: Option<i64>,
    offset: Option<i64>,
    order_by: Option<Variable>,
    descending: bool,
}

fn page_spec(call: &BoundCall) -> Result<Option<PageSpec>, ParameterError> {
    let limit = call.integer_binding(LIMIT)?;
    let offset = call.integer_binding(OFFSET)?;
    let order_by = call.value(ORDER_BY).map(order_variable).transpose()?;
    let descending = call
        .value(DESC)
        .map(|term| boolean_value(DESC, term))
        .transpose()?
        .unwrap_or(false);
    if limit.is_none() && offset.is_none() && order_by.is_none() && call.value(DESC).is_none() {
        return Ok(None);
    }
    for (name, value) in [(LIMIT, limit), (OFFSET, offset)] {
        if value.is_some_and(|value| value < 0) {
            return Err(ParameterError::InvalidValue {
                variable: name.to_owned(),
                value: value.unwrap_or_default().to_string(),
                reason: "a page bound cannot be negative".to_owned(),
            });
        }
    }
    Ok(Some(PageSpec {
        limit,
        offset,
        order_by,
        descending,
    }))
}

fn order_variable(term: &Term) -> Result<Variable, ParameterError> {
    let Term::Literal(literal) = term else {
        return Err(ParameterError::InvalidValue {
            variable: ORDER_BY.to_owned(),
            value: term.to_string(),
            reason: "a literal naming a query variable is required".to_owned(),
        });
    };
    Variable::new(literal.value()).map_err(|_| ParameterError::InvalidValue {
        variable: ORDER_BY.to_owned(),
        value: literal.value().to_owned(),
        reason: "not a usable variable name".to_owned(),
    })
}

fn boolean_value(name: &str, term: &Term) -> Result<bool, ParameterError> {
    let Term::Literal(literal) = term else {
        return Err(ParameterError::InvalidValue {
            variable: name.to_owned(),
            value: term.to_string(),
            reason: "a boolean literal is required".to_owned(),
        });
    };
    Boolean::from_str(literal.value())
        .map(bool::from)
        .map_err(|e| ParameterError::InvalidValue {
            variable: name.to_owned(),
            value: literal.value().to_owned(),
            reason: e.to_string(),
        })
}

fn paginate(query: Query, call: &BoundCall) -> Result<Query, LdtError> {
    let Some(page) = page_spec(call)? else {
        return Ok(query);
    };
    let skip_root = matches!(query, Query::Select { .. } | Query::Describe { .. });
    let mut found = false;
    let query = map_pattern(query, |pattern| {
        if skip_root {
            rewrite_below_root(pattern, &page, &mut found)
        } else {
            rewrite_first_sub_select(pattern, &page, &mut found)
        }
    });
    if found {
        Ok(query)
    } else {
        Err(
            TemplateRegistryError::MissingSubSelect(call.template().class().into_owned())
                .into(),
        )
    }
}

// SELECT and DESCRIBE queries carry their own projection at the root of the
// pattern. The nested sub-select starts below it.
fn rewrite_below_root(pattern: GraphPattern, page: &PageSpec, found: &mut bool) -> GraphPattern {
    match pattern {
        GraphPattern::Slice {
            inner,
            start,
            length,
        } => GraphPattern::Slice {
            inner: Box::new(rewrite_below_root(*inner, page, found)),
            start,
            length,
        },
        GraphPattern::Distinct { inner } => GraphPattern::Distinct {
            inner: Box::new(rewrite_below_root(*inner, page, found)),
        },
        GraphPattern::Reduced { inner } => GraphPattern::Reduced {
            inner: Box::new(rewrite_below_root(*inner, page, found)),
        },
        GraphPattern::OrderBy { inner, expression } => GraphPattern::OrderBy {
            inner: Box::new(rewrite_below_root(*inner, page, found)),
            expression,
        },
        GraphPattern::Project { inner, variables } => GraphPattern::Project {
            inner: Box::new(rewrite_first_sub_select(*inner, page, found)),
            variables,
        },
        pattern => rewrite_first_sub_select(pattern, page, found),
    }
}

fn rewrite_first_sub_select(
    pattern: GraphPattern,
    page: &PageSpec,
    found: &mut bool,
) -> GraphPattern {
    if *found {
        return pattern;
    }
    if is_sub_select(&pattern) {
        *found = true;
        return rewrite_modifiers(pattern, page);
    }
    match pattern {
        GraphPattern::Join { left, right } => GraphPattern::Join {
            left: Box::new(rewrite_first_sub_select(*left, page, found)),
            right: Box::new(rewrite_first_sub_select(*right, page, found)),
        },
        GraphPattern::LeftJoin {
            left,
            right,
            expression,
        } => GraphPattern::LeftJoin {
            left: Box::new(rewrite_first_sub_select(*left, page, found)),
            right: Box::new(rewrite_first_sub_select(*right, page, found)),
            expression,
        },
        GraphPattern::Filter { expr, inner } => GraphPattern::Filter {
            expr,
            inner: Box::new(rewrite_first_sub_select(*inner, page, found)),
        },
        GraphPattern::Union { left, right } => GraphPattern::Union {
            left: Box::new(rewrite_first_sub_select(*left, page, found)),
            right: Box::new(rewrite_first_sub_select(*right, page, found)),
        },
        GraphPattern::Graph { name, inner } => GraphPattern::Graph {
            name,
            inner: Box::new(rewrite_first_sub_select(*inner, page, found)),
        },
        GraphPattern::Extend {
            inner,
            variable,
            expression,
        } => GraphPattern::Extend {
            inner: Box::new(rewrite_first_sub_select(*inner, page, found)),
            variable,
            expression,
        },
        GraphPattern::Minus { left, right } => GraphPattern::Minus {
            left: Box::new(rewrite_first_sub_select(*left, page, found)),
            right: Box::new(rewrite_first_sub_select(*right, page, found)),
        },
        GraphPattern::OrderBy { inner, expression } => GraphPattern::OrderBy {
            inner: Box::new(rewrite_first_sub_select(*inner, page, found)),
            expression,
        },
        GraphPattern::Distinct { inner } => GraphPattern::Distinct {
            inner: Box::new(rewrite_first_sub_select(*inner, page, found)),
        },
        GraphPattern::Reduced { inner } => GraphPattern::Reduced {
            inner: Box::new(rewrite_first_sub_select(*inner, page, found)),
        },
        GraphPattern::Slice {
            inner,
            start,
            length,
        } => GraphPattern::Slice {
            inner: Box::new(rewrite_first_sub_select(*inner, page, found)),
            start,
            length,
        },
        GraphPattern::Group {
            inner,
            variables,
            aggregates,
        } => GraphPattern::Group {
            inner: Box::new(rewrite_first_sub_select(*inner, page, found)),
            variables,
            aggregates,
        },
        GraphPattern::Service {
            name,
            inner,
            silent,
        } => GraphPattern::Service {
            name,
            inner: Box::new(rewrite_first_sub_select(*inner, page, found)),
            silent,
        },
        pattern => pattern,
    }
}

fn is_sub_select(pattern: &GraphPattern) -> bool {
    let pattern = if let GraphPattern::Slice { inner, .. } = pattern {
        inner.as_ref()
    } else {
        pattern
    };
    let pattern = match pattern {
        GraphPattern::Distinct { inner } | GraphPattern::Reduced { inner } => inner.as_ref(),
        pattern => pattern,
    };
    matches!(pattern, GraphPattern::Project { .. })
}

/// Rewrites the solution modifiers of a sub-select shell.
///
/// A bound `limit` or `offset` replaces the whole `LIMIT`/`OFFSET` pair, a
/// missing `offset` meaning 0. A bound `orderBy` replaces any `ORDER BY`,
/// ascending unless `desc` is true. Modifiers with nothing bound against them
/// keep what the template declared.
fn rewrite_modifiers(shell: GraphPattern, page: &PageSpec) -> GraphPattern {
    let (shell, original_slice) = match shell {
        GraphPattern::Slice {
            inner,
            start,
            length,
        } => (*inner, Some((start, length))),
        shell => (shell, None),
    };
    let (shell, distinct) = match shell {
        GraphPattern::Distinct { inner } => (*inner, Some(true)),
        GraphPattern::Reduced { inner } => (*inner, Some(false)),
        shell => (shell, None),
    };
    let shell = if let GraphPattern::Project { inner, variables } = shell {
        let inner = if let Some(variable) = &page.order_by {
            let inner = match *inner {
                GraphPattern::OrderBy { inner, .. } => inner,
                inner => Box::new(inner),
            };
            let key = Expression::Variable(variable.clone());
            GraphPattern::OrderBy {
                inner,
                expression: vec![if page.descending {
                    OrderExpression::Desc(key)
                } else {
                    OrderExpression::Asc(key)
                }],
            }
        } else {
            *inner
        };
        GraphPattern::Project {
            inner: Box::new(inner),
            variables,
        }
    } else {
        shell
    };
    let shell = match distinct {
        Some(true) => GraphPattern::Distinct {
            inner: Box::new(shell),
        },
        Some(false) => GraphPattern::Reduced {
            inner: Box::new(shell),
        },
        None => shell,
    };
    let slice = if page.limit.is_some() || page.offset.is_some() {
        Some((
            usize::try_from(page.offset.unwrap_or(0)).unwrap_or(0),
            page.limit.map(|limit| usize::try_from(limit).unwrap_or(0)),
        ))
    } else {
        original_slice
    };
    match slice {
        Some((start, length)) => GraphPattern::Slice {
            inner: Box::new(shell),
            start,
            length,
        },
        None => shell,
    }
}

fn below_root_projection(pattern: &GraphPattern) -> &GraphPattern {
    match pattern {
        GraphPattern::Slice { inner, .. }
        | GraphPattern::Distinct { inner }
        | GraphPattern::Reduced { inner }
        | GraphPattern::OrderBy { inner, .. } => below_root_projection(inner),
        GraphPattern::Project { inner, .. } => inner,
        pattern => pattern,
    }
}

fn contains_project(pattern: &GraphPattern) -> bool {
    match pattern {
        GraphPattern::Project { .. } => true,
        GraphPattern::Bgp { .. } | GraphPattern::Path { .. } | GraphPattern::Values { .. } => false,
        GraphPattern::Join { left, right }
        | GraphPattern::LeftJoin { left, right, .. }
        | GraphPattern::Union { left, right }
        | GraphPattern::Minus { left, right } => contains_project(left) || contains_project(right),
        GraphPattern::Filter { inner, .. }
        | GraphPattern::Graph { inner, .. }
        | GraphPattern::Extend { inner, .. }
        | GraphPattern::OrderBy { inner, .. }
        | GraphPattern::Distinct { inner }
        | GraphPattern::Reduced { inner }
        | GraphPattern::Slice { inner, .. }
        | GraphPattern::Group { inner, .. }
        | GraphPattern::Service { inner, .. } => contains_project(inner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::TemplateCall;
    use crate::registry::TemplateRegistry;
    use oxiri::Iri;
    use oxrdf::{BlankNode, Graph, Literal, NamedNodeRef};
    use std::sync::Arc;

    const ONTOLOGY: &str = r#"
        @prefix ldt: <https://www.w3.org/ns/ldt#> .
        @prefix sp: <http://spinrdf.org/sp#> .
        @prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
        @prefix ex: <https://example.com/ns#> .

        ex:Item a ldt:Template ;
            ldt:match "/items/{id}" ;
            ldt:query [ sp:text "DESCRIBE ?this" ] ;
            ldt:update [ sp:text "DELETE { ?this ?p ?o } WHERE { ?this ?p ?o }" ] ;
            ldt:param [ ldt:predicate ex:id ] ,
                      [ ldt:predicate ex:author ; ldt:optional true ; ldt:multiValued true ] .

        ex:Titled a ldt:Template ;
            ldt:match "/titled/{id}" ;
            ldt:query [ sp:text "SELECT ?name WHERE { ?this <https://example.com/ns#author> ?author . ?this <https://example.com/ns#name> ?name }" ] ;
            ldt:param [ ldt:predicate ex:id ] ,
                      [ ldt:predicate ex:author ; ldt:optional true ] .

        ex:Typo a ldt:Template ;
            ldt:match "/typo/{id}" ;
            ldt:query [ sp:text "SELECT ?o WHERE { ?s ?author ?o }" ] ;
            ldt:param [ ldt:predicate ex:id ] ,
                      [ ldt:predicate ex:author ; ldt:optional true ] .

        ex:NoQuery a ldt:Template ;
            ldt:match "/noquery" .

        ex:ItemContainer a ldt:ContainerTemplate ;
            ldt:match "/items" ;
            ldt:query [ sp:text "DESCRIBE ?this ?item WHERE { { SELECT ?item WHERE { ?item <https://example.com/ns#inContainer> ?this } ORDER BY ?item LIMIT 20 } }" ] ;
            ldt:param [ ldt:predicate ex:limit ; ldt:valueType xsd:integer ; ldt:optional true ] ,
                      [ ldt:predicate ex:offset ; ldt:valueType xsd:integer ; ldt:optional true ] ,
                      [ ldt:predicate ex:orderBy ; ldt:optional true ] ,
                      [ ldt:predicate ex:desc ; ldt:valueType xsd:boolean ; ldt:optional true ] .
    "#;

    fn registry() -> Arc<TemplateRegistry> {
        let mut graph = Graph::new();
        for triple in oxttl::TurtleParser::new().for_reader(ONTOLOGY.as_bytes()) {
            graph.insert(&triple.unwrap());
        }
        Arc::new(TemplateRegistry::from_graph(&graph, "https://example.com/").unwrap())
    }

    fn call(registry: &Arc<TemplateRegistry>, path: &str) -> TemplateCall {
        let matched = registry.match_path(path).unwrap();
        let class = matched.template().class().into_owned();
        let captures = matched.captures().clone();
        TemplateCall::new(
            Arc::clone(registry),
            class.as_ref(),
            Iri::parse("https://example.com/".to_owned()).unwrap(),
            captures,
        )
        .unwrap()
    }

    #[test]
    fn the_subject_resource_replaces_this() {
        let registry = registry();
        let bound = call(&registry, "/items/42").build().unwrap();
        let text = QueryBuilder::new(&bound).build().unwrap().to_string();
        assert!(
            text.contains("BIND(<https://example.com/items/42> AS ?this)"),
            "{text}"
        );
    }

    #[test]
    fn bound_arguments_are_written_into_the_query() {
        let registry = registry();
        let bound = call(&registry, "/titled/42")
            .apply_arguments([("author", "alice")])
            .unwrap()
            .build()
            .unwrap();
        let text = QueryBuilder::new(&bound).build().unwrap().to_string();
        assert!(text.contains("\"alice\""), "{text}");
        assert!(!text.contains("?author"), "{text}");
    }

    #[test]
    fn containers_page_the_nested_sub_select() {
        let registry = registry();
        let bound = call(&registry, "/items")
            .apply_arguments([
                ("limit", "10"),
                ("offset", "20"),
                ("orderBy", "item"),
                ("desc", "true"),
            ])
            .unwrap()
            .build()
            .unwrap();
        let text = QueryBuilder::new(&bound).build().unwrap().to_string();
        assert!(text.contains("LIMIT 10"), "{text}");
        assert!(text.contains("OFFSET 20"), "{text}");
        assert!(text.contains("DESC(?item)"), "{text}");
        assert!(!text.contains("LIMIT 20"), "{text}");
    }

    #[test]
    fn a_limit_alone_prints_no_offset() {
        let registry = registry();
        let bound = call(&registry, "/items")
            .apply_arguments([("limit", "10")])
            .unwrap()
            .build()
            .unwrap();
        let text = QueryBuilder::new(&bound).build().unwrap().to_string();
        assert!(text.contains("LIMIT 10"), "{text}");
        assert!(!text.contains("OFFSET"), "{text}");
    }

    #[test]
    fn unbound_pagination_keeps_the_declared_modifiers() {
        let registry = registry();
        let bound = call(&registry, "/items").build().unwrap();
        let text = QueryBuilder::new(&bound).build().unwrap().to_string();
        assert!(text.contains("LIMIT 20"), "{text}");
        assert!(!text.contains("OFFSET"), "{text}");
    }

    #[test]
    fn multi_valued_bindings_join_a_values_block() {
        let registry = registry();
        let bound = call(&registry, "/items/42")
            .apply_arguments([("author", "a"), ("author", "b")])
            .unwrap()
            .build()
            .unwrap();
        let text = QueryBuilder::new(&bound).build().unwrap().to_string();
        assert!(text.contains("VALUES"), "{text}");
        assert!(text.contains("\"a\""), "{text}");
        assert!(text.contains("\"b\""), "{text}");
    }

    #[test]
    fn blank_node_arguments_are_rejected() {
        let registry = registry();
        let author = NamedNodeRef::new_unchecked("https://example.com/ns#author");
        let bound = call(&registry, "/items/42")
            .arg(author, BlankNode::default().into())
            .unwrap()
            .build()
            .unwrap();
        assert!(matches!(
            QueryBuilder::new(&bound).build(),
            Err(LdtError::Parameter(ParameterError::InvalidValue { variable, .. }))
                if variable == "author"
        ));
    }

    #[test]
    fn a_literal_cannot_feed_an_iri_position() {
        let registry = registry();
        let bound = call(&registry, "/typo/42")
            .apply_arguments([("author", "alice")])
            .unwrap()
            .build()
            .unwrap();
        assert!(matches!(
            QueryBuilder::new(&bound).build(),
            Err(LdtError::Parameter(ParameterError::InvalidValue { variable, .. }))
                if variable == "author"
        ));
    }

    #[test]
    fn a_template_without_a_query_cannot_answer_one() {
        let registry = registry();
        let bound = call(&registry, "/noquery").build().unwrap();
        assert!(matches!(
            QueryBuilder::new(&bound).build(),
            Err(LdtError::Registry(TemplateRegistryError::MissingQuery(_)))
        ));
        assert!(matches!(
            UpdateBuilder::new(&bound).build(),
            Err(LdtError::Registry(TemplateRegistryError::MissingUpdate(_)))
        ));
    }

    #[test]
    fn updates_substitute_the_subject_resource() {
        let registry = registry();
        let bound = call(&registry, "/items/42").build().unwrap();
        let text = UpdateBuilder::new(&bound).build().unwrap().to_string();
        assert_eq!(text.matches("<https://example.com/items/42>").count(), 2);
    }

    #[test]
    fn builds_are_pure() {
        let registry = registry();
        let bound = call(&registry, "/items")
            .apply_arguments([("limit", "5"), ("offset", "10")])
            .unwrap()
            .build()
            .unwrap();
        let first = QueryBuilder::new(&bound).build().unwrap().to_string();
        let second = QueryBuilder::new(&bound).build().unwrap().to_string();
        assert_eq!(first, second);
    }
}
