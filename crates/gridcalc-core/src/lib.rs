//! # gridcalc-core
//!
//! Core data structures for the gridcalc formula evaluation engine.
//!
//! This crate provides the fundamental types shared by the lexer and the
//! evaluation engine:
//! - [`FormulaArgument`] - the tagged value/error carrier every evaluation
//!   step produces and consumes
//! - [`ErrorKind`] - spreadsheet error codes (`#DIV/0!`, `#NAME?`, ...)
//! - [`CellRef`] and [`CellRange`] - typed cell/range descriptors
//! - [`WorkbookStore`] - the read-only workbook interface the engine
//!   evaluates against, with [`MemoryWorkbook`] as the in-memory
//!   reference implementation
//!
//! ## Example
//!
//! ```rust
//! use gridcalc_core::{MemoryWorkbook, WorkbookStore};
//!
//! let mut wb = MemoryWorkbook::new();
//! wb.set_number("Sheet1", "A1", 42.0);
//! wb.set_formula("Sheet1", "B1", "=A1*2");
//!
//! assert_eq!(wb.cell_formula("Sheet1", "B1").as_deref(), Some("=A1*2"));
//! ```

pub mod address;
pub mod error;
pub mod store;
pub mod value;

pub use address::{
    column_name_to_number, column_number_to_name, parse_cell_name, CellRange, CellRef,
};
pub use error::{CoreError, ErrorKind};
pub use store::{CellType, MemoryWorkbook, WorkbookStore};
pub use value::{FormulaArgument, Provenance};

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: i32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: i32 = 16_384;

/// Sentinel for the missing axis of a column-only or row-only reference
pub const UNSET_AXIS: i32 = 0;
