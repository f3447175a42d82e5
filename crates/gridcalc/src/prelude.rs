//! Prelude module - common imports for gridcalc users
//!
//! ```rust
//! use gridcalc::prelude::*;
//! ```

pub use crate::{
    // Addressing
    CellRange,
    CellRef,
    // Workbook storage
    CellType,
    // Evaluation
    Clock,
    Engine,
    EngineError,
    // Errors
    ErrorKind,
    FixedClock,
    // Values
    FormulaArgument,
    MemoryWorkbook,
    Provenance,
    SystemClock,
    WorkbookStore,
};
