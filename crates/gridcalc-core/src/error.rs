//! Spreadsheet error codes and core error types

use std::fmt;
use thiserror::Error;

/// Result type alias using [`CoreError`]
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by the core data model itself (address parsing, store misuse).
///
/// User-formula conditions never surface here; those travel in-band as
/// [`crate::FormulaArgument::Error`] values.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid cell address format
    #[error("Invalid cell address: {0}")]
    InvalidAddress(String),

    /// Invalid cell range format
    #[error("Invalid cell range: {0}")]
    InvalidRange(String),

    /// Sheet not found by name
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    /// Column letters overflow the sheet width
    #[error("Column out of bounds: {0}")]
    ColumnOutOfBounds(String),
}

/// Spreadsheet error codes
///
/// These are the error values a formula can produce and a cell can hold,
/// rendered with the standard spreadsheet vocabulary (`#DIV/0!`, `#NAME?`,
/// ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// #NULL! - Incorrect range operator
    Null,
    /// #DIV/0! - Division by zero
    Div0,
    /// #VALUE! - Wrong type of argument or operand
    Value,
    /// #REF! - Invalid cell reference
    Ref,
    /// #NAME? - Unrecognized formula or defined name
    Name,
    /// #NUM! - Out-of-domain numeric argument or non-convergence
    Num,
    /// #N/A - No matching result available
    Na,
    /// #SPILL! - Dynamic array cannot spill
    Spill,
    /// #CALC! - Calculation error
    Calc,
}

impl ErrorKind {
    /// Get the display code for this error
    pub fn as_code(&self) -> &'static str {
        match self {
            ErrorKind::Null => "#NULL!",
            ErrorKind::Div0 => "#DIV/0!",
            ErrorKind::Value => "#VALUE!",
            ErrorKind::Ref => "#REF!",
            ErrorKind::Name => "#NAME?",
            ErrorKind::Num => "#NUM!",
            ErrorKind::Na => "#N/A",
            ErrorKind::Spill => "#SPILL!",
            ErrorKind::Calc => "#CALC!",
        }
    }

    /// Parse an error code string
    pub fn from_code(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "#NULL!" => Some(ErrorKind::Null),
            "#DIV/0!" => Some(ErrorKind::Div0),
            "#VALUE!" => Some(ErrorKind::Value),
            "#REF!" => Some(ErrorKind::Ref),
            "#NAME?" => Some(ErrorKind::Name),
            "#NUM!" => Some(ErrorKind::Num),
            "#N/A" => Some(ErrorKind::Na),
            "#SPILL!" => Some(ErrorKind::Spill),
            "#CALC!" => Some(ErrorKind::Calc),
            _ => None,
        }
    }

    /// Numeric code used by ERROR.TYPE
    pub fn type_number(&self) -> u8 {
        match self {
            ErrorKind::Null => 1,
            ErrorKind::Div0 => 2,
            ErrorKind::Value => 3,
            ErrorKind::Ref => 4,
            ErrorKind::Name => 5,
            ErrorKind::Num => 6,
            ErrorKind::Na => 7,
            ErrorKind::Spill => 9,
            ErrorKind::Calc => 14,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip() {
        for kind in [
            ErrorKind::Null,
            ErrorKind::Div0,
            ErrorKind::Value,
            ErrorKind::Ref,
            ErrorKind::Name,
            ErrorKind::Num,
            ErrorKind::Na,
            ErrorKind::Spill,
            ErrorKind::Calc,
        ] {
            assert_eq!(ErrorKind::from_code(kind.as_code()), Some(kind));
        }
    }

    #[test]
    fn test_from_code_case_insensitive() {
        assert_eq!(ErrorKind::from_code("#value!"), Some(ErrorKind::Value));
        assert_eq!(ErrorKind::from_code("#n/a"), Some(ErrorKind::Na));
        assert_eq!(ErrorKind::from_code("nonsense"), None);
    }
}
