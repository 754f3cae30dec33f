use crate::common::Value;
use crate::filter::{Operator, WhereClause};

/// Starts a [WhereClause] on `field_name`.
///
/// ```rust
/// use memdocs::filter::field;
///
/// let clauses = vec![field("tag").eq("x"), field("rank").is_in(vec![1, 2])];
/// assert_eq!(clauses.len(), 2);
/// ```
pub fn field(field_name: &str) -> FluentClause {
    FluentClause {
        field_name: field_name.to_string(),
    }
}

pub struct FluentClause {
    field_name: String,
}

impl FluentClause {
    /// Matches documents whose field equals `value`.
    #[inline]
    pub fn eq<T: Into<Value>>(self, value: T) -> WhereClause {
        self.clause(Operator::Equals, value.into())
    }

    /// Matches documents whose field is an array containing `value`.
    #[inline]
    pub fn array_contains<T: Into<Value>>(self, value: T) -> WhereClause {
        self.clause(Operator::ArrayContains, value.into())
    }

    /// Matches documents whose field equals one of `values`.
    #[inline]
    pub fn is_in<T: Into<Value>>(self, values: Vec<T>) -> WhereClause {
        self.clause(Operator::In, Value::from_vec(values))
    }

    fn clause(self, operator: Operator, operand: Value) -> WhereClause {
        WhereClause::from_parts(self.field_name, operator, operand)
    }
}
