//! # gridcalc
//!
//! A spreadsheet formula lexing and evaluation engine.
//!
//! Gridcalc evaluates A1-style formula text against any workbook that
//! implements the read-only [`WorkbookStore`] interface, with the full
//! spreadsheet value model: coercing arithmetic, error values that flow
//! through expressions, ranges, array literals, defined names, and a
//! built-in function library spanning the math, statistical, financial,
//! date/time, text, logical, lookup, information and database families.
//!
//! ## Example
//!
//! ```rust
//! use gridcalc::prelude::*;
//!
//! let mut wb = MemoryWorkbook::new();
//! wb.set_number("Sheet1", "A1", 10.0);
//! wb.set_number("Sheet1", "A2", 20.0);
//! wb.set_formula("Sheet1", "B1", "=SUM(A1:A2)*2");
//!
//! let engine = Engine::new(&wb);
//! let value = engine.evaluate_cell("Sheet1", "B1").unwrap();
//! assert_eq!(value, FormulaArgument::number(60.0));
//! ```
//!
//! Circular references are handled iteratively: set a limit with
//! [`Engine::with_max_iterations`] and chains that loop back on themselves
//! converge step by step instead of erroring out.

pub mod prelude;

// Re-export core types
pub use gridcalc_core::{
    column_name_to_number, column_number_to_name, parse_cell_name, CellRange, CellRef, CellType,
    CoreError, ErrorKind, FormulaArgument, MemoryWorkbook, Provenance, WorkbookStore, MAX_COLS,
    MAX_ROWS,
};

// Re-export the engine surface
pub use gridcalc_engine::functions::{FunctionDef, FunctionRegistry};
pub use gridcalc_engine::{Clock, Engine, EngineError, FixedClock, SystemClock};

// Re-export the lexer for embedders that want raw token streams
pub use gridcalc_lexer::{tokenize, Token, TokenKind, TokenSubtype};
