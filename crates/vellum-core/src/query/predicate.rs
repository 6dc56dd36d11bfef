//! Predicate compiler: filter descriptors to dialect clauses.
//!
//! Compiles an ordered [`Filter`] into a conjunction of clause fragments
//! plus the positional parameter list that accompanies them. Parameter
//! numbering is local to a single compile call, so compilation is
//! referentially transparent and safe to run concurrently.

use serde::Serialize;
use serde_json::Value;

use vellum_proto::filter::{Condition, Filter, Op};

/// A positional query parameter.
///
/// Names are generated sequentially (`@param0`, `@param1`, …) in the
/// exact order clauses are emitted and match placeholders 1:1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    /// Positional parameter name, including the `@` sigil.
    pub name: String,
    /// Literal value bound to the placeholder.
    pub value: Value,
}

impl Parameter {
    fn new(index: usize, value: Value) -> Self {
        Self {
            name: format!("@param{index}"),
            value,
        }
    }
}

/// The output of one predicate compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPredicate {
    /// Clause fragments in emission order.
    pub clauses: Vec<String>,
    /// Parameters in emission order, one per placeholder.
    pub parameters: Vec<Parameter>,
}

impl CompiledPredicate {
    /// The fragments joined into a WHERE conjunction, or `None` when no
    /// fragment was emitted (callers must then omit WHERE entirely).
    pub fn where_clause(&self) -> Option<String> {
        if self.clauses.is_empty() {
            None
        } else {
            Some(self.clauses.join(" AND "))
        }
    }
}

/// Render a field name through the bracket accessor.
///
/// Field names are user-controlled strings; they are never rendered with
/// dot access.
pub fn field_accessor(name: &str) -> String {
    format!("root[{}]", Value::String(name.to_string()))
}

/// Compile a filter descriptor into clause fragments and parameters.
///
/// Entries (and individual operators) whose value is JSON `null` are
/// omitted entirely; `false`, `0`, and `""` are present values and
/// compile normally.
pub fn compile(filter: &Filter) -> CompiledPredicate {
    let mut clauses = Vec::new();
    let mut parameters: Vec<Parameter> = Vec::new();

    for (field, condition) in filter.entries() {
        match condition {
            Condition::Value(Value::Null) => {}
            Condition::Value(value) => {
                let param = Parameter::new(parameters.len(), value.clone());
                clauses.push(format!("{} = {}", field_accessor(field), param.name));
                parameters.push(param);
            }
            Condition::Ops(ops) => {
                for op in ops {
                    if op.value().is_null() {
                        continue;
                    }
                    let param = Parameter::new(parameters.len(), op.value().clone());
                    clauses.push(render_op(field, op, &param.name));
                    parameters.push(param);
                }
            }
        }
    }

    CompiledPredicate {
        clauses,
        parameters,
    }
}

fn render_op(field: &str, op: &Op, placeholder: &str) -> String {
    let accessor = field_accessor(field);
    match op {
        Op::Equals(_) => format!("{accessor} = {placeholder}"),
        Op::Gt(_) => format!("{accessor} > {placeholder}"),
        Op::Gte(_) => format!("{accessor} >= {placeholder}"),
        Op::Lt(_) => format!("{accessor} < {placeholder}"),
        Op::Lte(_) => format!("{accessor} <= {placeholder}"),
        Op::Contains(_) => format!("CONTAINS({accessor}, {placeholder})"),
        Op::StartsWith(_) => format!("STARTSWITH({accessor}, {placeholder})"),
        Op::EndsWith(_) => format!("ENDSWITH({accessor}, {placeholder})"),
        Op::ArrayContains(_) => format!("ARRAY_CONTAINS({accessor}, {placeholder})"),
        Op::ContainsAny(_) => format!("ARRAY_CONTAINS_ANY({accessor}, {placeholder})"),
        Op::ContainsAll(_) => format!("ARRAY_CONTAINS_ALL({accessor}, {placeholder})"),
    }
}
