//! The tagged formula-argument data model
//!
//! [`FormulaArgument`] is the universal value/error carrier flowing through
//! every evaluation stage. Booleans are represented as numbers valued 0/1
//! with a flag rather than a separate variant, because spreadsheet semantics
//! freely coerce booleans to numbers and back.
//!
//! An argument may carry *reference provenance*: the concrete cell and range
//! addresses it was derived from. Provenance is metadata used by
//! address-introspection functions (`ROW`, `COLUMN`, `ISREF`, ...) and is
//! never part of value equality.

use crate::address::{CellRange, CellRef};
use crate::error::ErrorKind;

/// Reference provenance attached to an argument
#[derive(Debug, Clone, Default)]
pub struct Provenance {
    /// Concrete single-cell references this value was derived from
    pub cells: Vec<CellRef>,
    /// Concrete cell ranges this value was derived from
    pub ranges: Vec<CellRange>,
}

impl Provenance {
    /// True if no reference information is attached
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty() && self.ranges.is_empty()
    }

    /// Provenance consisting of one cell reference
    pub fn cell(cell: CellRef) -> Self {
        Self {
            cells: vec![cell],
            ranges: Vec::new(),
        }
    }

    /// Provenance consisting of one range
    pub fn range(range: CellRange) -> Self {
        Self {
            cells: Vec::new(),
            ranges: vec![range],
        }
    }
}

/// The tagged value/error type produced by every evaluation step
#[derive(Debug, Clone)]
pub enum FormulaArgument {
    /// A number; `boolean` marks 0/1 values that entered as TRUE/FALSE
    Number { value: f64, boolean: bool },
    /// A text value
    Text(String),
    /// A spreadsheet error with its code and a diagnostic message
    Error {
        kind: ErrorKind,
        message: String,
        origin: Provenance,
    },
    /// A flat, order-significant list of arguments
    List {
        values: Vec<FormulaArgument>,
        origin: Provenance,
    },
    /// A rectangular, row-major matrix of arguments
    Matrix {
        rows: Vec<Vec<FormulaArgument>>,
        origin: Provenance,
    },
    /// An empty cell or missing argument
    Empty,
    /// A scalar carrying reference provenance (a resolved single cell)
    Cell {
        value: Box<FormulaArgument>,
        origin: Provenance,
    },
}

impl FormulaArgument {
    // === Constructors ===

    pub fn number(value: f64) -> Self {
        FormulaArgument::Number {
            value,
            boolean: false,
        }
    }

    pub fn bool_value(b: bool) -> Self {
        FormulaArgument::Number {
            value: if b { 1.0 } else { 0.0 },
            boolean: true,
        }
    }

    pub fn text<S: Into<String>>(s: S) -> Self {
        FormulaArgument::Text(s.into())
    }

    /// Error argument with the code itself as message
    pub fn error(kind: ErrorKind) -> Self {
        FormulaArgument::Error {
            message: kind.as_code().to_string(),
            kind,
            origin: Provenance::default(),
        }
    }

    /// Error argument with a diagnostic message
    pub fn error_msg<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        FormulaArgument::Error {
            kind,
            message: message.into(),
            origin: Provenance::default(),
        }
    }

    pub fn list(values: Vec<FormulaArgument>) -> Self {
        FormulaArgument::List {
            values,
            origin: Provenance::default(),
        }
    }

    pub fn matrix(rows: Vec<Vec<FormulaArgument>>) -> Self {
        FormulaArgument::Matrix {
            rows,
            origin: Provenance::default(),
        }
    }

    pub fn empty() -> Self {
        FormulaArgument::Empty
    }

    /// Wrap a scalar value with single-cell provenance
    pub fn cell_value(value: FormulaArgument, cell: CellRef) -> Self {
        FormulaArgument::Cell {
            value: Box::new(value),
            origin: Provenance::cell(cell),
        }
    }

    /// Attach range provenance to a matrix
    pub fn range_matrix(rows: Vec<Vec<FormulaArgument>>, range: CellRange) -> Self {
        FormulaArgument::Matrix {
            rows,
            origin: Provenance::range(range),
        }
    }

    // === Inspection ===

    /// The reference provenance attached to this argument, if any
    pub fn origin(&self) -> Option<&Provenance> {
        match self {
            FormulaArgument::Error { origin, .. }
            | FormulaArgument::List { origin, .. }
            | FormulaArgument::Matrix { origin, .. }
            | FormulaArgument::Cell { origin, .. } => {
                if origin.is_empty() {
                    None
                } else {
                    Some(origin)
                }
            }
            _ => None,
        }
    }

    /// Strip one level of cell-provenance wrapping, yielding the plain value
    pub fn unwrap_cell(&self) -> &FormulaArgument {
        match self {
            FormulaArgument::Cell { value, .. } => value.unwrap_cell(),
            other => other,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.unwrap_cell(), FormulaArgument::Error { .. })
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self.unwrap_cell() {
            FormulaArgument::Error { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_empty_value(&self) -> bool {
        matches!(self.unwrap_cell(), FormulaArgument::Empty)
    }

    /// True for plain numbers and flagged booleans
    pub fn is_numeric(&self) -> bool {
        matches!(self.unwrap_cell(), FormulaArgument::Number { .. })
    }

    /// True only for non-boolean numbers
    pub fn is_plain_number(&self) -> bool {
        matches!(
            self.unwrap_cell(),
            FormulaArgument::Number { boolean: false, .. }
        )
    }

    pub fn is_boolean(&self) -> bool {
        matches!(
            self.unwrap_cell(),
            FormulaArgument::Number { boolean: true, .. }
        )
    }

    pub fn is_text(&self) -> bool {
        matches!(self.unwrap_cell(), FormulaArgument::Text(_))
    }

    /// The numeric value if this is a number or boolean, without coercion
    pub fn as_number(&self) -> Option<f64> {
        match self.unwrap_cell() {
            FormulaArgument::Number { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// The text value if this is text, without coercion
    pub fn as_text(&self) -> Option<&str> {
        match self.unwrap_cell() {
            FormulaArgument::Text(s) => Some(s),
            _ => None,
        }
    }

    // === Total conversions (never panic; failure is an Error argument) ===

    /// Convert to a number
    ///
    /// Non-numeric text that does not parse as a float fails with `#VALUE!`.
    /// Empty converts to 0. Errors propagate themselves.
    pub fn to_number(&self) -> std::result::Result<f64, FormulaArgument> {
        match self.unwrap_cell() {
            FormulaArgument::Number { value, .. } => Ok(*value),
            FormulaArgument::Text(s) => s.trim().parse::<f64>().map_err(|_| {
                FormulaArgument::error_msg(
                    ErrorKind::Value,
                    format!("cannot convert {s:?} to number"),
                )
            }),
            FormulaArgument::Empty => Ok(0.0),
            FormulaArgument::Error { .. } => Err(self.unwrap_cell().clone()),
            _ => Err(FormulaArgument::error(ErrorKind::Value)),
        }
    }

    /// Convert to a boolean
    ///
    /// A number equal to 1 converts to true, all other numbers to false.
    /// Text must read `TRUE` or `FALSE` (any case); anything else fails with
    /// `#VALUE!`.
    pub fn to_bool(&self) -> std::result::Result<bool, FormulaArgument> {
        match self.unwrap_cell() {
            FormulaArgument::Number { value, .. } => Ok(*value == 1.0),
            FormulaArgument::Text(s) => match s.to_uppercase().as_str() {
                "TRUE" => Ok(true),
                "FALSE" => Ok(false),
                _ => Err(FormulaArgument::error_msg(
                    ErrorKind::Value,
                    format!("cannot convert {s:?} to boolean"),
                )),
            },
            FormulaArgument::Empty => Ok(false),
            FormulaArgument::Error { .. } => Err(self.unwrap_cell().clone()),
            _ => Err(FormulaArgument::error(ErrorKind::Value)),
        }
    }

    /// Render as text with general formatting
    ///
    /// Booleans render as `TRUE`/`FALSE`; integral numbers render without a
    /// decimal point; errors render their code.
    pub fn to_text(&self) -> String {
        match self.unwrap_cell() {
            FormulaArgument::Number { value, boolean } => {
                if *boolean {
                    if *value == 0.0 { "FALSE" } else { "TRUE" }.to_string()
                } else {
                    format_number(*value)
                }
            }
            FormulaArgument::Text(s) => s.clone(),
            FormulaArgument::Error { kind, .. } => kind.as_code().to_string(),
            FormulaArgument::Empty => String::new(),
            FormulaArgument::List { values, .. } => values
                .iter()
                .map(|v| v.to_text())
                .collect::<Vec<_>>()
                .join(""),
            FormulaArgument::Matrix { rows, .. } => rows
                .iter()
                .flatten()
                .map(|v| v.to_text())
                .collect::<Vec<_>>()
                .join(""),
            FormulaArgument::Cell { .. } => unreachable!("unwrap_cell strips Cell"),
        }
    }

    /// Flatten to an order-significant list: Matrix/List flatten row-major,
    /// scalars become a single-element list, Empty becomes an empty list.
    pub fn flatten(&self) -> Vec<FormulaArgument> {
        match self.unwrap_cell() {
            FormulaArgument::List { values, .. } => {
                values.iter().flat_map(|v| v.flatten()).collect()
            }
            FormulaArgument::Matrix { rows, .. } => rows
                .iter()
                .flatten()
                .flat_map(|v| v.flatten())
                .collect(),
            FormulaArgument::Empty => Vec::new(),
            other => vec![other.clone()],
        }
    }
}

/// General numeric formatting: no trailing zeros, integers without a point
pub fn format_number(n: f64) -> String {
    if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl Default for FormulaArgument {
    fn default() -> Self {
        FormulaArgument::Empty
    }
}

/// Value equality; provenance is metadata and excluded, and errors compare
/// by kind so a `#DIV/0!` equals a `#DIV/0!` regardless of message.
impl PartialEq for FormulaArgument {
    fn eq(&self, other: &Self) -> bool {
        match (self.unwrap_cell(), other.unwrap_cell()) {
            (
                FormulaArgument::Number {
                    value: a,
                    boolean: ab,
                },
                FormulaArgument::Number {
                    value: b,
                    boolean: bb,
                },
            ) => a == b && ab == bb,
            (FormulaArgument::Text(a), FormulaArgument::Text(b)) => a == b,
            (
                FormulaArgument::Error { kind: a, .. },
                FormulaArgument::Error { kind: b, .. },
            ) => a == b,
            (
                FormulaArgument::List { values: a, .. },
                FormulaArgument::List { values: b, .. },
            ) => a == b,
            (
                FormulaArgument::Matrix { rows: a, .. },
                FormulaArgument::Matrix { rows: b, .. },
            ) => a == b,
            (FormulaArgument::Empty, FormulaArgument::Empty) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::CellRef;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_to_number() {
        assert_eq!(FormulaArgument::number(2.5).to_number().unwrap(), 2.5);
        assert_eq!(FormulaArgument::bool_value(true).to_number().unwrap(), 1.0);
        assert_eq!(FormulaArgument::text(" 42 ").to_number().unwrap(), 42.0);
        assert_eq!(FormulaArgument::empty().to_number().unwrap(), 0.0);
        let err = FormulaArgument::text("abc").to_number().unwrap_err();
        assert_eq!(err.error_kind(), Some(ErrorKind::Value));
    }

    #[test]
    fn test_to_bool() {
        assert!(FormulaArgument::number(1.0).to_bool().unwrap());
        // Spreadsheet convention: only 1 maps to true here
        assert!(!FormulaArgument::number(2.0).to_bool().unwrap());
        assert!(!FormulaArgument::number(0.0).to_bool().unwrap());
        assert!(FormulaArgument::text("true").to_bool().unwrap());
        assert!(!FormulaArgument::text("FALSE").to_bool().unwrap());
        assert!(FormulaArgument::text("yes").to_bool().is_err());
    }

    #[test]
    fn test_to_text() {
        assert_eq!(FormulaArgument::number(3.0).to_text(), "3");
        assert_eq!(FormulaArgument::number(3.25).to_text(), "3.25");
        assert_eq!(FormulaArgument::bool_value(true).to_text(), "TRUE");
        assert_eq!(FormulaArgument::bool_value(false).to_text(), "FALSE");
        assert_eq!(
            FormulaArgument::error(ErrorKind::Div0).to_text(),
            "#DIV/0!"
        );
        assert_eq!(FormulaArgument::empty().to_text(), "");
    }

    #[test]
    fn test_flatten() {
        let m = FormulaArgument::matrix(vec![
            vec![FormulaArgument::number(1.0), FormulaArgument::number(2.0)],
            vec![FormulaArgument::number(3.0), FormulaArgument::text("x")],
        ]);
        let flat = m.flatten();
        assert_eq!(flat.len(), 4);
        assert_eq!(flat[2], FormulaArgument::number(3.0));
        assert!(FormulaArgument::empty().flatten().is_empty());
        assert_eq!(FormulaArgument::number(7.0).flatten().len(), 1);
    }

    #[test]
    fn test_provenance_excluded_from_equality() {
        let plain = FormulaArgument::number(5.0);
        let with_ref =
            FormulaArgument::cell_value(FormulaArgument::number(5.0), CellRef::new("S", 1, 1));
        assert_eq!(plain, with_ref);
        assert!(with_ref.origin().is_some());
        assert!(plain.origin().is_none());
    }

    #[test]
    fn test_boolean_is_flagged_number() {
        let b = FormulaArgument::bool_value(true);
        assert!(b.is_numeric());
        assert!(b.is_boolean());
        assert!(!b.is_plain_number());
    }

    proptest! {
        // to_number(to_text(x)) == x for finite numbers within formatting
        // precision
        #[test]
        fn prop_number_text_round_trip(n in -1e12f64..1e12f64) {
            let text = FormulaArgument::number(n).to_text();
            let back = FormulaArgument::text(text).to_number().unwrap();
            prop_assert!((back - n).abs() <= n.abs() * 1e-12 + 1e-12);
        }
    }
}
