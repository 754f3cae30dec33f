use crate::errors::{DocsError, DocsResult, ErrorKind};
use std::fmt::Display;
use std::str::FromStr;

/// Specifies the direction for ordering documents by one field.
///
/// # Variants
/// - `Ascending`: smallest value first (`"asc"`)
/// - `Descending`: largest value first (`"desc"`)
/// - `Unspecified`: no direction given (`""`), ordered as ascending
///
/// # Usage
/// ```text
/// let query = DocsQuery::new("/items").sort_by("name", SortOrder::Descending);
/// let order: SortOrder = "desc".parse()?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SortOrder {
    #[cfg_attr(feature = "serde", serde(rename = "asc"))]
    Ascending,
    #[cfg_attr(feature = "serde", serde(rename = "desc"))]
    Descending,
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = ""))]
    Unspecified,
}

impl SortOrder {
    /// `true` only for [SortOrder::Descending].
    #[inline]
    pub fn is_descending(&self) -> bool {
        matches!(self, SortOrder::Descending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
            SortOrder::Unspecified => "",
        }
    }
}

impl FromStr for SortOrder {
    type Err = DocsError;

    fn from_str(s: &str) -> DocsResult<Self> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Ascending),
            "desc" => Ok(SortOrder::Descending),
            "" => Ok(SortOrder::Unspecified),
            other => {
                log::error!("Unknown sort direction '{}'", other);
                Err(DocsError::new(
                    &format!("Unknown sort direction '{}', expected 'asc', 'desc' or ''", other),
                    ErrorKind::InvalidOperation,
                ))
            }
        }
    }
}

impl Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
