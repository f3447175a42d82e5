//! Per-evaluation calculation state
//!
//! A [`CalcContext`] lives for one top-level evaluation. It remembers the
//! root cell, counts how many times each formula cell has been recomputed,
//! and caches the latest value per cell. Together these implement iterative
//! circular-reference calculation: a cycle converges (or is cut off) inside
//! one context and never leaks into the next evaluation.

use crate::FnCtx;
use ahash::AHashMap;
use gridcalc_core::{CellType, ErrorKind, FormulaArgument, WorkbookStore};
use std::sync::Mutex;

type CellKey = (String, String);

fn cell_key(sheet: &str, cell: &str) -> CellKey {
    (sheet.to_string(), cell.replace('$', "").to_uppercase())
}

/// Calculation state for a single top-level evaluation
pub struct CalcContext {
    root: CellKey,
    max_iterations: u32,
    iterations: Mutex<AHashMap<CellKey, u32>>,
    cache: Mutex<AHashMap<CellKey, FormulaArgument>>,
}

impl CalcContext {
    pub fn new(sheet: &str, cell: &str, max_iterations: u32) -> Self {
        Self {
            root: cell_key(sheet, cell),
            max_iterations,
            iterations: Mutex::new(AHashMap::new()),
            cache: Mutex::new(AHashMap::new()),
        }
    }

    fn is_root(&self, key: &CellKey) -> bool {
        self.root == *key
    }

    /// The normalized cell name this calculation started from, empty for a
    /// free-standing formula
    pub(crate) fn root_cell(&self) -> &str {
        &self.root.1
    }
}

/// Resolve one cell to a value within the current calculation
///
/// A formula cell is recomputed, up to the iteration limit per context;
/// past the limit its most recently cached value is returned. The root
/// cell is the exception: when a reference chain loops back to the cell
/// that started the calculation, its raw stored value is read instead of
/// recursing, which is what lets iterative calculation make progress.
pub(crate) fn resolve_cell(ctx: &FnCtx, sheet: &str, cell: &str) -> FormulaArgument {
    let key = cell_key(sheet, cell);
    if let Some(formula) = ctx.store().cell_formula(sheet, cell) {
        if !ctx.calc.is_root(&key) {
            let iterate = {
                let mut iterations = ctx.calc.iterations.lock().unwrap();
                let count = iterations.entry(key.clone()).or_insert(0);
                if *count <= ctx.calc.max_iterations {
                    *count += 1;
                    true
                } else {
                    false
                }
            };
            if iterate {
                let value = match ctx.engine.eval_formula_in(ctx.calc, sheet, &formula) {
                    Ok(value) => value,
                    Err(err) => FormulaArgument::error_msg(ErrorKind::Value, err.to_string()),
                };
                ctx.calc.cache.lock().unwrap().insert(key.clone(), value);
            } else {
                log::debug!("iteration limit reached for {}!{}", sheet, cell);
            }
            return ctx
                .calc
                .cache
                .lock()
                .unwrap()
                .get(&key)
                .cloned()
                .unwrap_or_default();
        }
        log::trace!("reference chain re-entered root {}!{}", sheet, cell);
    }
    read_stored_value(ctx.store(), sheet, cell)
}

/// Read a cell's stored value and parse it per its declared type
pub(crate) fn read_stored_value(
    store: &dyn WorkbookStore,
    sheet: &str,
    cell: &str,
) -> FormulaArgument {
    let (raw, cell_type) = store.cell_value(sheet, cell);
    match cell_type {
        CellType::Unset => FormulaArgument::empty(),
        CellType::Boolean => FormulaArgument::bool_value(raw == "TRUE" || raw == "1"),
        CellType::Number => match raw.trim().parse::<f64>() {
            Ok(n) => FormulaArgument::number(n),
            Err(_) => FormulaArgument::text(raw),
        },
        _ => {
            if raw.is_empty() {
                FormulaArgument::empty()
            } else {
                FormulaArgument::text(raw)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcalc_core::MemoryWorkbook;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_read_stored_value_types() {
        let mut wb = MemoryWorkbook::new();
        wb.set_number("Sheet1", "A1", 2.5);
        wb.set_text("Sheet1", "A2", "x");
        wb.set_bool("Sheet1", "A3", true);

        assert_eq!(
            read_stored_value(&wb, "Sheet1", "A1"),
            FormulaArgument::number(2.5)
        );
        assert_eq!(
            read_stored_value(&wb, "Sheet1", "A2"),
            FormulaArgument::text("x")
        );
        assert_eq!(
            read_stored_value(&wb, "Sheet1", "A3"),
            FormulaArgument::bool_value(true)
        );
        assert_eq!(
            read_stored_value(&wb, "Sheet1", "Z9"),
            FormulaArgument::empty()
        );
    }

    #[test]
    fn test_cell_key_normalization() {
        assert_eq!(cell_key("S", "$a$1"), ("S".to_string(), "A1".to_string()));
        assert_eq!(cell_key("S", "B2"), cell_key("S", "b2"));
    }
}
