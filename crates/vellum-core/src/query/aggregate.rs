//! Aggregate and group-by statement builders.
//!
//! Aggregate and group projections never consume parameters; only the
//! delegated filter compilation does.

use vellum_proto::aggregate::{alias, AggregateOp, AggregateSpec, CountSpec, GroupBySpec};
use vellum_proto::filter::Filter;

use super::builder::{render_offset_limit, CompiledQuery};
use super::predicate::{self, field_accessor};
use crate::error::Error;

/// Builder for count, aggregate, and group-by statements.
pub struct AggregateBuilder;

impl AggregateBuilder {
    /// Build a single-scalar count statement.
    ///
    /// The executed result is a bare scalar, not a row object.
    pub fn count(filter: Option<&Filter>) -> CompiledQuery {
        let compiled = compile_filter(filter);
        let mut text = String::from("SELECT VALUE COUNT(1) FROM root");
        if let Some(clause) = compiled.where_clause() {
            text.push_str(" WHERE ");
            text.push_str(&clause);
        }
        CompiledQuery {
            text,
            parameters: compiled.parameters,
        }
    }

    /// Build an aggregate statement projecting one aliased expression per
    /// requested operation/field pair.
    ///
    /// Fails before any compilation when the specification holds no
    /// operation.
    pub fn aggregate(
        spec: &AggregateSpec,
        filter: Option<&Filter>,
    ) -> Result<CompiledQuery, Error> {
        spec.validate()?;

        let compiled = compile_filter(filter);
        let mut text = String::from("SELECT ");
        text.push_str(&aggregate_projection(spec).join(", "));
        text.push_str(" FROM root");
        if let Some(clause) = compiled.where_clause() {
            text.push_str(" WHERE ");
            text.push_str(&clause);
        }
        Ok(CompiledQuery {
            text,
            parameters: compiled.parameters,
        })
    }

    /// Build a group-by statement: group keys first, then aggregates,
    /// then GROUP BY over the same field list, then optional ordering and
    /// pagination.
    pub fn group_by(group: &GroupBySpec, filter: Option<&Filter>) -> Result<CompiledQuery, Error> {
        group.aggregate.validate()?;

        let compiled = compile_filter(filter);

        let mut projection: Vec<String> = group
            .by
            .iter()
            .map(|f| format!("{} AS {}", field_accessor(f), f))
            .collect();
        projection.extend(aggregate_projection(&group.aggregate));

        let mut text = String::from("SELECT ");
        if let (Some(take), None) = (group.take, group.skip) {
            text.push_str(&format!("TOP {take} "));
        }
        text.push_str(&projection.join(", "));
        text.push_str(" FROM root");

        if let Some(clause) = compiled.where_clause() {
            text.push_str(" WHERE ");
            text.push_str(&clause);
        }

        text.push_str(" GROUP BY ");
        text.push_str(
            &group
                .by
                .iter()
                .map(|f| field_accessor(f))
                .collect::<Vec<_>>()
                .join(", "),
        );

        if !group.order_by.is_empty() {
            let aliases = group.aggregate.aliases();
            let rendered: Vec<String> = group
                .order_by
                .iter()
                .map(|o| {
                    // Aggregate aliases render bare; anything else is a
                    // field and goes through the bracket accessor.
                    let target = if aliases.iter().any(|a| a == &o.target) {
                        o.target.clone()
                    } else {
                        field_accessor(&o.target)
                    };
                    format!("{} {}", target, o.direction.as_str())
                })
                .collect();
            text.push_str(" ORDER BY ");
            text.push_str(&rendered.join(", "));
        }

        text.push_str(&render_offset_limit(group.take, group.skip));

        Ok(CompiledQuery {
            text,
            parameters: compiled.parameters,
        })
    }
}

fn compile_filter(filter: Option<&Filter>) -> predicate::CompiledPredicate {
    match filter {
        Some(filter) => predicate::compile(filter),
        None => predicate::compile(&Filter::new()),
    }
}

/// Aliased aggregate expressions in the fixed operation order: count,
/// sum, avg, min, max; fields within each in descriptor order.
fn aggregate_projection(spec: &AggregateSpec) -> Vec<String> {
    let mut expressions = Vec::new();
    match &spec.count {
        Some(CountSpec::Total) => {
            expressions.push(format!("COUNT(1) AS {}", alias(AggregateOp::Count, None)));
        }
        Some(CountSpec::Fields(fields)) => {
            for field in fields {
                expressions.push(format!(
                    "COUNT({}) AS {}",
                    field_accessor(field),
                    alias(AggregateOp::Count, Some(field))
                ));
            }
        }
        None => {}
    }
    for (op, keyword, fields) in [
        (AggregateOp::Sum, "SUM", &spec.sum),
        (AggregateOp::Avg, "AVG", &spec.avg),
        (AggregateOp::Min, "MIN", &spec.min),
        (AggregateOp::Max, "MAX", &spec.max),
    ] {
        for field in fields {
            expressions.push(format!(
                "{keyword}({}) AS {}",
                field_accessor(field),
                alias(op, Some(field))
            ));
        }
    }
    expressions
}
