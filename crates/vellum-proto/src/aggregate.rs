//! Aggregate and group-by specifications.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::query::OrderSpec;

/// Aggregate operation kinds, in their fixed projection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateOp {
    /// Count of documents or non-null field values.
    Count,
    /// Sum of numeric values.
    Sum,
    /// Average of numeric values.
    Avg,
    /// Minimum value.
    Min,
    /// Maximum value.
    Max,
}

impl AggregateOp {
    /// Lower-case operation name used in aliases.
    pub fn as_str(self) -> &'static str {
        match self {
            AggregateOp::Count => "count",
            AggregateOp::Sum => "sum",
            AggregateOp::Avg => "avg",
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
        }
    }
}

/// Deterministic projection alias for an operation/field pair.
///
/// `_count` for the plain row count, `_{op}_{field}` otherwise.
pub fn alias(op: AggregateOp, field: Option<&str>) -> String {
    match field {
        Some(field) => format!("_{}_{}", op.as_str(), field),
        None => format!("_{}", op.as_str()),
    }
}

/// What a count operation counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CountSpec {
    /// Count every matching document.
    Total,
    /// Count non-null values per field.
    Fields(Vec<String>),
}

/// An aggregate operation set.
///
/// At least one operation must be present before compilation; see
/// [`AggregateSpec::validate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateSpec {
    /// Optional count operation.
    pub count: Option<CountSpec>,
    /// Fields to sum.
    pub sum: Vec<String>,
    /// Fields to average.
    pub avg: Vec<String>,
    /// Fields to take the minimum of.
    pub min: Vec<String>,
    /// Fields to take the maximum of.
    pub max: Vec<String>,
}

impl AggregateSpec {
    /// Create an empty specification.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a total row count.
    pub fn count(mut self) -> Self {
        self.count = Some(CountSpec::Total);
        self
    }

    /// Request a non-null count per field.
    pub fn count_fields(mut self, fields: Vec<String>) -> Self {
        self.count = Some(CountSpec::Fields(fields));
        self
    }

    /// Add a SUM over a field.
    pub fn sum(mut self, field: impl Into<String>) -> Self {
        self.sum.push(field.into());
        self
    }

    /// Add an AVG over a field.
    pub fn avg(mut self, field: impl Into<String>) -> Self {
        self.avg.push(field.into());
        self
    }

    /// Add a MIN over a field.
    pub fn min(mut self, field: impl Into<String>) -> Self {
        self.min.push(field.into());
        self
    }

    /// Add a MAX over a field.
    pub fn max(mut self, field: impl Into<String>) -> Self {
        self.max.push(field.into());
        self
    }

    /// True when no operation has been requested.
    pub fn is_empty(&self) -> bool {
        self.count.is_none()
            && self.sum.is_empty()
            && self.avg.is_empty()
            && self.min.is_empty()
            && self.max.is_empty()
    }

    /// Reject an empty operation set before any compilation or network
    /// call.
    pub fn validate(&self) -> Result<(), Error> {
        if self.is_empty() {
            return Err(Error::EmptyAggregateSpec);
        }
        Ok(())
    }

    /// Every alias this specification projects, in projection order
    /// (count, then sum, avg, min, max; fields in descriptor order).
    pub fn aliases(&self) -> Vec<String> {
        let mut aliases = Vec::new();
        match &self.count {
            Some(CountSpec::Total) => aliases.push(alias(AggregateOp::Count, None)),
            Some(CountSpec::Fields(fields)) => {
                for field in fields {
                    aliases.push(alias(AggregateOp::Count, Some(field)));
                }
            }
            None => {}
        }
        for (op, fields) in [
            (AggregateOp::Sum, &self.sum),
            (AggregateOp::Avg, &self.avg),
            (AggregateOp::Min, &self.min),
            (AggregateOp::Max, &self.max),
        ] {
            for field in fields {
                aliases.push(alias(op, Some(field)));
            }
        }
        aliases
    }
}

/// A group-by specification: group fields, an aggregate operation set,
/// and optional ordering/pagination over the grouped rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupBySpec {
    /// Fields to group by, in projection order.
    pub by: Vec<String>,
    /// Aggregates computed per group.
    pub aggregate: AggregateSpec,
    /// Ordering over grouped fields or aggregate aliases.
    pub order_by: Vec<OrderSpec>,
    /// Maximum number of grouped rows to return.
    pub take: Option<u32>,
    /// Number of grouped rows to skip.
    pub skip: Option<u32>,
}

impl GroupBySpec {
    /// Group by a single field.
    pub fn by(field: impl Into<String>) -> Self {
        Self::by_fields(vec![field.into()])
    }

    /// Group by an ordered list of fields.
    pub fn by_fields(fields: Vec<String>) -> Self {
        Self {
            by: fields,
            aggregate: AggregateSpec::new(),
            order_by: vec![],
            take: None,
            skip: None,
        }
    }

    /// Set the aggregate operation set.
    pub fn with_aggregate(mut self, aggregate: AggregateSpec) -> Self {
        self.aggregate = aggregate;
        self
    }

    /// Add an ordering entry.
    pub fn with_order(mut self, order: OrderSpec) -> Self {
        self.order_by.push(order);
        self
    }

    /// Limit the number of grouped rows.
    pub fn take(mut self, n: u32) -> Self {
        self.take = Some(n);
        self
    }

    /// Skip a number of grouped rows.
    pub fn skip(mut self, n: u32) -> Self {
        self.skip = Some(n);
        self
    }
}
