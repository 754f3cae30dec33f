use crate::collection::Document;
use crate::common::Value;
use crate::errors::{DocsError, DocsResult, ErrorKind};
use std::fmt::Display;
use std::str::FromStr;

/// Comparison a [WhereClause] applies to one field.
///
/// # Variants
/// - `Equals` (`"=="`): the field equals the operand
/// - `ArrayContains` (`"array-contains"`): the field is an array holding the operand
/// - `In` (`"in"`): the field equals one of the operand's items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operator {
    #[cfg_attr(feature = "serde", serde(rename = "=="))]
    Equals,
    #[cfg_attr(feature = "serde", serde(rename = "array-contains"))]
    ArrayContains,
    #[cfg_attr(feature = "serde", serde(rename = "in"))]
    In,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equals => "==",
            Operator::ArrayContains => "array-contains",
            Operator::In => "in",
        }
    }
}

impl FromStr for Operator {
    type Err = DocsError;

    fn from_str(s: &str) -> DocsResult<Self> {
        match s {
            "==" => Ok(Operator::Equals),
            "array-contains" => Ok(Operator::ArrayContains),
            "in" => Ok(Operator::In),
            other => {
                log::error!("Operator '{}' is not supported", other);
                Err(DocsError::new(
                    &format!("Operator '{}' is not supported", other),
                    ErrorKind::UnsupportedOperator,
                ))
            }
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single field predicate. A list of clauses is an implicit AND.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WhereClause {
    field: String,
    #[cfg_attr(feature = "serde", serde(rename = "op"))]
    operator: Operator,
    #[cfg_attr(feature = "serde", serde(rename = "value"))]
    operand: Value,
}

impl WhereClause {
    /// # Errors
    ///
    /// Returns [ErrorKind::InvalidOperand] when `operator` is `In` and
    /// `operand` is not an array.
    pub fn new(field: &str, operator: Operator, operand: Value) -> DocsResult<WhereClause> {
        let clause = WhereClause {
            field: field.to_string(),
            operator,
            operand,
        };
        clause.validate()?;
        Ok(clause)
    }

    /// Builds a clause from a raw `(field, operator, operand)` triple such as
    /// `("tag", "==", "x")`.
    ///
    /// # Errors
    ///
    /// * [ErrorKind::UnsupportedOperator] for an operator other than `==`,
    ///   `array-contains` or `in`
    /// * [ErrorKind::InvalidOperand] for an `in` without a list
    pub fn parse<T: Into<Value>>(field: &str, operator: &str, operand: T) -> DocsResult<WhereClause> {
        let operator = operator.parse::<Operator>()?;
        Self::new(field, operator, operand.into())
    }

    pub(crate) fn from_parts(field: String, operator: Operator, operand: Value) -> WhereClause {
        WhereClause {
            field,
            operator,
            operand,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn operand(&self) -> &Value {
        &self.operand
    }

    /// Tests `document` against this clause. A missing field reads as null.
    pub fn matches(&self, document: &Document) -> DocsResult<bool> {
        let value = document.get(&self.field).unwrap_or(&Value::Null);
        match self.operator {
            Operator::Equals => Ok(value == &self.operand),
            Operator::ArrayContains => Ok(value
                .as_array()
                .map(|items| items.contains(&self.operand))
                .unwrap_or(false)),
            Operator::In => {
                let candidates = self.operand_list()?;
                Ok(candidates.contains(value))
            }
        }
    }

    fn validate(&self) -> DocsResult<()> {
        if self.operator == Operator::In {
            self.operand_list()?;
        }
        Ok(())
    }

    fn operand_list(&self) -> DocsResult<&Vec<Value>> {
        self.operand.as_array().ok_or_else(|| {
            log::error!("Operator 'in' on '{}' needs a list operand, found {}", self.field, self.operand);
            DocsError::new(
                &format!("Operator 'in' on '{}' needs a list operand, found {}", self.field, self.operand),
                ErrorKind::InvalidOperand,
            )
        })
    }
}

impl Display for WhereClause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} {} {})", self.field, self.operator, self.operand)
    }
}
