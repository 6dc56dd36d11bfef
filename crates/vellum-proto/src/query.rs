//! Ordering descriptors shared by queries and group-by specifications.

use serde::{Deserialize, Serialize};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

impl OrderDirection {
    /// Dialect keyword for this direction.
    pub fn as_str(self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

/// Order specification for sorting results.
///
/// The target is a plain field name; in group-by queries it may also be
/// an aggregate alias such as `_count` or `_sum_amount`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSpec {
    /// Field name or aggregate alias to order by.
    pub target: String,
    /// Sort direction.
    pub direction: OrderDirection,
}

impl OrderSpec {
    /// Create an ascending order spec.
    pub fn asc(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            direction: OrderDirection::Asc,
        }
    }

    /// Create a descending order spec.
    pub fn desc(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            direction: OrderDirection::Desc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_keywords() {
        assert_eq!(OrderDirection::Asc.as_str(), "ASC");
        assert_eq!(OrderDirection::Desc.as_str(), "DESC");
    }

    #[test]
    fn test_order_spec_constructors() {
        let spec = OrderSpec::desc("_count");
        assert_eq!(spec.target, "_count");
        assert_eq!(spec.direction, OrderDirection::Desc);
    }
}
