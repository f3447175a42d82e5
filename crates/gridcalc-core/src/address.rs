//! Cell and range addressing
//!
//! Column/row coordinates are 1-based, matching the A1 vocabulary formulas
//! use. A coordinate of [`crate::UNSET_AXIS`] (0) marks the missing axis of
//! a column-only or row-only reference until it is combined into a range.

use crate::error::{CoreError, Result};
use crate::{MAX_COLS, MAX_ROWS, UNSET_AXIS};
use std::fmt;

/// Parse column letters to a 1-based column number (A=1, Z=26, AA=27, ...)
pub fn column_name_to_number(name: &str) -> Result<i32> {
    if name.is_empty() {
        return Err(CoreError::InvalidAddress(name.to_string()));
    }
    let mut col: i64 = 0;
    for c in name.chars() {
        let c = c.to_ascii_uppercase();
        if !c.is_ascii_uppercase() {
            return Err(CoreError::InvalidAddress(name.to_string()));
        }
        col = col * 26 + (c as i64 - 'A' as i64 + 1);
        if col > MAX_COLS as i64 {
            return Err(CoreError::ColumnOutOfBounds(name.to_string()));
        }
    }
    Ok(col as i32)
}

/// Convert a 1-based column number to letters (1=A, 26=Z, 27=AA, ...)
pub fn column_number_to_name(mut col: i32) -> String {
    let mut name = String::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        name.insert(0, (b'A' + rem as u8) as char);
        col = (col - 1) / 26;
    }
    name
}

/// A single cell reference with 1-based coordinates
///
/// `col` or `row` may be [`UNSET_AXIS`] while the reference is still a bare
/// column (`"C"`) or bare row (`"3"`) awaiting combination into a range.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellRef {
    pub sheet: String,
    pub col: i32,
    pub row: i32,
}

impl CellRef {
    /// Create a reference with both axes set
    pub fn new<S: Into<String>>(sheet: S, col: i32, row: i32) -> Self {
        Self {
            sheet: sheet.into(),
            col,
            row,
        }
    }

    /// Parse an A1-style cell name like `"B12"` (absolute markers already
    /// stripped by the caller)
    pub fn parse<S: Into<String>>(sheet: S, name: &str) -> Result<Self> {
        let (col, row) = parse_cell_name(name)?;
        Ok(Self::new(sheet, col, row))
    }

    /// True if both axes are set
    pub fn is_complete(&self) -> bool {
        self.col != UNSET_AXIS && self.row != UNSET_AXIS
    }

    /// A1-style name for this reference (without sheet)
    pub fn name(&self) -> String {
        format!("{}{}", column_number_to_name(self.col), self.row)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sheet.is_empty() {
            write!(f, "{}", self.name())
        } else {
            write!(f, "{}!{}", self.sheet, self.name())
        }
    }
}

/// A rectangular cell range
///
/// Invariants: `from <= to` on both axes after [`CellRange::normalize`], and
/// both endpoints share one sheet.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellRange {
    pub from: CellRef,
    pub to: CellRef,
}

impl CellRange {
    pub fn new(from: CellRef, to: CellRef) -> Self {
        Self { from, to }.normalize()
    }

    /// Reorder the endpoints so `from <= to` on both axes
    pub fn normalize(mut self) -> Self {
        if self.from.col > self.to.col {
            std::mem::swap(&mut self.from.col, &mut self.to.col);
        }
        if self.from.row > self.to.row {
            std::mem::swap(&mut self.from.row, &mut self.to.row);
        }
        self
    }

    /// Number of rows spanned
    pub fn rows(&self) -> i32 {
        self.to.row - self.from.row + 1
    }

    /// Number of columns spanned
    pub fn cols(&self) -> i32 {
        self.to.col - self.from.col + 1
    }

    /// True if the range covers a single cell
    pub fn is_single_cell(&self) -> bool {
        self.from.col == self.to.col && self.from.row == self.to.row
    }

    fn name(&self) -> String {
        format!("{}:{}", self.from.name(), self.to.name())
    }

    /// The sheet both endpoints live on
    pub fn sheet(&self) -> &str {
        &self.from.sheet
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sheet().is_empty() {
            write!(f, "{}", self.name())
        } else {
            write!(f, "{}!{}", self.sheet(), self.name())
        }
    }
}

/// Parse an A1-style cell name into `(col, row)`
pub fn parse_cell_name(name: &str) -> Result<(i32, i32)> {
    let col_end = name
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(name.len());
    if col_end == 0 || col_end == name.len() {
        return Err(CoreError::InvalidAddress(name.to_string()));
    }
    let col = column_name_to_number(&name[..col_end])?;
    let row: i32 = name[col_end..]
        .parse()
        .map_err(|_| CoreError::InvalidAddress(name.to_string()))?;
    if row < 1 || row > MAX_ROWS {
        return Err(CoreError::InvalidAddress(name.to_string()));
    }
    Ok((col, row))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_column_name_to_number() {
        assert_eq!(column_name_to_number("A").unwrap(), 1);
        assert_eq!(column_name_to_number("Z").unwrap(), 26);
        assert_eq!(column_name_to_number("AA").unwrap(), 27);
        assert_eq!(column_name_to_number("XFD").unwrap(), 16_384);
        assert!(column_name_to_number("XFE").is_err());
        assert!(column_name_to_number("").is_err());
        assert!(column_name_to_number("A1").is_err());
    }

    #[test]
    fn test_column_number_to_name() {
        assert_eq!(column_number_to_name(1), "A");
        assert_eq!(column_number_to_name(26), "Z");
        assert_eq!(column_number_to_name(27), "AA");
        assert_eq!(column_number_to_name(16_384), "XFD");
    }

    #[test]
    fn test_column_round_trip() {
        for col in [1, 2, 25, 26, 27, 52, 53, 701, 702, 703, 16_384] {
            assert_eq!(column_name_to_number(&column_number_to_name(col)).unwrap(), col);
        }
    }

    #[test]
    fn test_parse_cell_name() {
        assert_eq!(parse_cell_name("A1").unwrap(), (1, 1));
        assert_eq!(parse_cell_name("B12").unwrap(), (2, 12));
        assert_eq!(parse_cell_name("aa100").unwrap(), (27, 100));
        assert!(parse_cell_name("A0").is_err());
        assert!(parse_cell_name("A").is_err());
        assert!(parse_cell_name("1").is_err());
        assert!(parse_cell_name("1A").is_err());
    }

    #[test]
    fn test_range_normalize() {
        let range = CellRange::new(
            CellRef::new("Sheet1", 3, 5),
            CellRef::new("Sheet1", 1, 2),
        );
        assert_eq!(range.from, CellRef::new("Sheet1", 1, 2));
        assert_eq!(range.to, CellRef::new("Sheet1", 3, 5));
        assert_eq!(range.rows(), 4);
        assert_eq!(range.cols(), 3);
    }

    #[test]
    fn test_display() {
        assert_eq!(CellRef::new("Sheet1", 2, 3).to_string(), "Sheet1!B3");
        let range = CellRange::new(CellRef::new("S", 1, 1), CellRef::new("S", 2, 3));
        assert_eq!(range.to_string(), "S!A1:B3");
    }
}
