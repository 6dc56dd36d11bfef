//! Aggregate result mapper: flat aliased rows back to nested shapes.
//!
//! The mapper reverses the alias rule the builders use. It never
//! partially fails: either the whole row reshapes or an error is raised
//! before any partial result is returned.

use serde_json::{Map, Value};

use vellum_proto::aggregate::{alias, AggregateOp, AggregateSpec, CountSpec, GroupBySpec};
use vellum_proto::result::{AggregateResult, CountResult, GroupRow};

use crate::error::Error;

/// Reshape one flat aggregate row into the nested result the caller
/// requested.
///
/// Missing or null sum/avg/min/max values map to JSON `null` — never to
/// zero, never omitted; a missing count maps to `0`.
pub fn parse_aggregate_result(row: &Value, spec: &AggregateSpec) -> Result<AggregateResult, Error> {
    let row = row
        .as_object()
        .ok_or_else(|| Error::Mapping("aggregate row must be a JSON object".to_string()))?;

    let count = match &spec.count {
        Some(CountSpec::Total) => {
            let value = row.get(&alias(AggregateOp::Count, None));
            Some(CountResult::Total(count_value(value)?))
        }
        Some(CountSpec::Fields(fields)) => {
            let mut counts = Vec::with_capacity(fields.len());
            for field in fields {
                let value = row.get(&alias(AggregateOp::Count, Some(field)));
                counts.push((field.clone(), count_value(value)?));
            }
            Some(CountResult::PerField(counts))
        }
        None => None,
    };

    Ok(AggregateResult {
        count,
        sum: numeric_section(row, AggregateOp::Sum, &spec.sum),
        avg: numeric_section(row, AggregateOp::Avg, &spec.avg),
        min: numeric_section(row, AggregateOp::Min, &spec.min),
        max: numeric_section(row, AggregateOp::Max, &spec.max),
    })
}

/// Reshape group-by rows, injecting the grouped field values into each
/// entry and preserving row order exactly as returned.
pub fn parse_group_by_results(
    rows: &[Value],
    group: &GroupBySpec,
) -> Result<Vec<GroupRow>, Error> {
    let mut results = Vec::with_capacity(rows.len());
    for row in rows {
        let object = row
            .as_object()
            .ok_or_else(|| Error::Mapping("group-by row must be a JSON object".to_string()))?;

        let mut keys = Map::new();
        for field in &group.by {
            keys.insert(
                field.clone(),
                object.get(field).cloned().unwrap_or(Value::Null),
            );
        }

        results.push(GroupRow {
            group: keys,
            aggregates: parse_aggregate_result(row, &group.aggregate)?,
        });
    }
    Ok(results)
}

/// Interpret a count column. Absent means zero; anything non-integral is
/// a mapping error.
fn count_value(value: Option<&Value>) -> Result<i64, Error> {
    match value {
        None | Some(Value::Null) => Ok(0),
        Some(value) => value
            .as_i64()
            .or_else(|| value.as_u64().map(|n| n as i64))
            .or_else(|| {
                // Stores occasionally hand counts back as floats.
                value
                    .as_f64()
                    .filter(|f| f.fract() == 0.0)
                    .map(|f| f as i64)
            })
            .ok_or_else(|| Error::Mapping(format!("count column holds a non-integer: {value}"))),
    }
}

/// One `{field: value-or-null}` section for sum/avg/min/max.
fn numeric_section(
    row: &Map<String, Value>,
    op: AggregateOp,
    fields: &[String],
) -> Option<Map<String, Value>> {
    if fields.is_empty() {
        return None;
    }
    let mut section = Map::new();
    for field in fields {
        let value = row
            .get(&alias(op, Some(field)))
            .cloned()
            .unwrap_or(Value::Null);
        section.insert(field.clone(), value);
    }
    Some(section)
}
