//! Query builder: projection, predicate, ordering, and pagination.

use vellum_proto::filter::Filter;
use vellum_proto::query::{OrderDirection, OrderSpec};

use super::predicate::{self, field_accessor, Parameter};

/// A compiled statement: dialect text plus its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    /// The statement text.
    pub text: String,
    /// Parameters in placeholder order.
    pub parameters: Vec<Parameter>,
}

/// Accumulates query clauses and compiles them into one statement.
///
/// `build` is idempotent and side-effect-free on the accumulated state;
/// callers may invoke it any number of times.
///
/// # Example
///
/// ```
/// use vellum_core::query::QueryBuilder;
/// use vellum_proto::{Filter, OrderSpec};
///
/// let query = QueryBuilder::new()
///     .with_filter(Filter::new().field("status", "active"))
///     .with_order(OrderSpec::asc("name"))
///     .take(10)
///     .build();
/// assert_eq!(
///     query.text,
///     r#"SELECT TOP 10 * FROM root WHERE root["status"] = @param0 ORDER BY root["name"] ASC"#
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    fields: Vec<String>,
    distinct: bool,
    filter: Option<Filter>,
    order_by: Vec<OrderSpec>,
    take: Option<u32>,
    skip: Option<u32>,
}

impl QueryBuilder {
    /// Create a builder with the default select-all projection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fields to project. An empty list is a no-op and keeps the
    /// select-all projection.
    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    /// Project distinct rows.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Set the filter descriptor.
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Add an ordering entry; entries render in insertion order.
    pub fn with_order(mut self, order: OrderSpec) -> Self {
        self.order_by.push(order);
        self
    }

    /// Add an ordering entry from a field and direction.
    pub fn order_by(self, field: impl Into<String>, direction: OrderDirection) -> Self {
        self.with_order(OrderSpec {
            target: field.into(),
            direction,
        })
    }

    /// Limit the number of rows. Zero is a real value.
    pub fn take(mut self, n: u32) -> Self {
        self.take = Some(n);
        self
    }

    /// Skip a number of rows. Zero is a real value.
    pub fn skip(mut self, n: u32) -> Self {
        self.skip = Some(n);
        self
    }

    /// Compile the accumulated state into a statement.
    pub fn build(&self) -> CompiledQuery {
        let compiled = match &self.filter {
            Some(filter) => predicate::compile(filter),
            None => predicate::compile(&Filter::new()),
        };

        let mut text = String::from("SELECT ");
        if self.distinct {
            text.push_str("DISTINCT ");
        }
        // TOP is only valid while no offset is in play.
        if let (Some(take), None) = (self.take, self.skip) {
            text.push_str(&format!("TOP {take} "));
        }
        text.push_str(&render_projection(&self.fields));
        text.push_str(" FROM root");

        if let Some(clause) = compiled.where_clause() {
            text.push_str(" WHERE ");
            text.push_str(&clause);
        }

        if !self.order_by.is_empty() {
            text.push_str(" ORDER BY ");
            text.push_str(&render_order_by(&self.order_by));
        }

        text.push_str(&render_offset_limit(self.take, self.skip));

        CompiledQuery {
            text,
            parameters: compiled.parameters,
        }
    }
}

/// Render the projection list, defaulting to select-all.
fn render_projection(fields: &[String]) -> String {
    if fields.is_empty() {
        "*".to_string()
    } else {
        fields
            .iter()
            .map(|f| format!("{} AS {}", field_accessor(f), f))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Render ORDER BY entries over plain fields.
fn render_order_by(entries: &[OrderSpec]) -> String {
    entries
        .iter()
        .map(|o| format!("{} {}", field_accessor(&o.target), o.direction.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render the pagination tail. TOP handles the take-only form, so this
/// emits nothing for it; zero renders literally.
pub(crate) fn render_offset_limit(take: Option<u32>, skip: Option<u32>) -> String {
    match (take, skip) {
        (Some(take), Some(skip)) => format!(" OFFSET {skip} LIMIT {take}"),
        (None, Some(skip)) => format!(" OFFSET {skip}"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vellum_proto::filter::Op;

    #[test]
    fn test_select_all_by_default() {
        let query = QueryBuilder::new().build();
        assert_eq!(query.text, "SELECT * FROM root");
        assert!(query.parameters.is_empty());
    }

    #[test]
    fn test_explicit_empty_projection_is_select_all() {
        let query = QueryBuilder::new().with_fields(vec![]).build();
        assert_eq!(query.text, "SELECT * FROM root");
    }

    #[test]
    fn test_projection_renders_accessors_with_aliases() {
        let query = QueryBuilder::new()
            .with_fields(vec!["id".into(), "name".into()])
            .build();
        assert_eq!(
            query.text,
            r#"SELECT root["id"] AS id, root["name"] AS name FROM root"#
        );
    }

    #[test]
    fn test_distinct_projection() {
        let query = QueryBuilder::new()
            .distinct()
            .with_fields(vec!["region".into()])
            .build();
        assert_eq!(
            query.text,
            r#"SELECT DISTINCT root["region"] AS region FROM root"#
        );
    }

    #[test]
    fn test_no_where_clause_for_empty_filter() {
        let query = QueryBuilder::new().with_filter(Filter::new()).build();
        assert_eq!(query.text, "SELECT * FROM root");
        assert!(!query.text.contains("WHERE"));
    }

    #[test]
    fn test_where_and_parameters() {
        let query = QueryBuilder::new()
            .with_filter(
                Filter::new()
                    .field("status", "active")
                    .field_ops("age", vec![Op::gte(18)]),
            )
            .build();
        assert_eq!(
            query.text,
            r#"SELECT * FROM root WHERE root["status"] = @param0 AND root["age"] >= @param1"#
        );
        assert_eq!(query.parameters.len(), 2);
        assert_eq!(query.parameters[1].value, json!(18));
    }

    #[test]
    fn test_order_by_preserves_insertion_order() {
        let query = QueryBuilder::new()
            .order_by("name", OrderDirection::Asc)
            .order_by("age", OrderDirection::Desc)
            .build();
        assert_eq!(
            query.text,
            r#"SELECT * FROM root ORDER BY root["name"] ASC, root["age"] DESC"#
        );
    }

    #[test]
    fn test_take_alone_uses_top() {
        let query = QueryBuilder::new().take(10).build();
        assert_eq!(query.text, "SELECT TOP 10 * FROM root");
        assert!(!query.text.contains("OFFSET"));
        assert!(!query.text.contains("LIMIT"));
    }

    #[test]
    fn test_take_and_skip_use_offset_limit() {
        let query = QueryBuilder::new().take(10).skip(5).build();
        assert_eq!(query.text, "SELECT * FROM root OFFSET 5 LIMIT 10");
        assert!(!query.text.contains("TOP"));
    }

    #[test]
    fn test_skip_alone_renders_offset() {
        let query = QueryBuilder::new().skip(20).build();
        assert_eq!(query.text, "SELECT * FROM root OFFSET 20");
    }

    #[test]
    fn test_zero_is_a_real_value() {
        assert_eq!(
            QueryBuilder::new().take(0).build().text,
            "SELECT TOP 0 * FROM root"
        );
        assert_eq!(
            QueryBuilder::new().skip(0).build().text,
            "SELECT * FROM root OFFSET 0"
        );
    }

    #[test]
    fn test_clause_order_is_fixed() {
        let query = QueryBuilder::new()
            .with_filter(Filter::new().field("a", 1))
            .order_by("a", OrderDirection::Asc)
            .take(5)
            .skip(10)
            .build();
        assert_eq!(
            query.text,
            r#"SELECT * FROM root WHERE root["a"] = @param0 ORDER BY root["a"] ASC OFFSET 10 LIMIT 5"#
        );
    }

    #[test]
    fn test_build_is_idempotent() {
        let builder = QueryBuilder::new()
            .with_filter(Filter::new().field("a", 1))
            .take(3);
        let first = builder.build();
        let second = builder.build();
        assert_eq!(first, second);
    }
}
