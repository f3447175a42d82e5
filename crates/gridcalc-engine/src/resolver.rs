//! Reference resolution
//!
//! Turns reference text (`B2`, `$A$1:C3`, `Data!A:A`, defined names) into
//! values. Single cells resolve through [`crate::context::resolve_cell`] and
//! carry cell provenance; everything else becomes a matrix expanded over the
//! sheet's used region, carrying the logical range as provenance.
//!
//! Multi-part references like `A1:B2:B3` denote the bounding rectangle of
//! all parts. A bare column contributes the full height of the sheet and a
//! bare row the full width; the expansion below clamps to the used region so
//! `A:A` stays affordable.

use crate::context;
use crate::FnCtx;
use gridcalc_core::{
    parse_cell_name, CellRange, CellRef, ErrorKind, FormulaArgument, MAX_COLS, MAX_ROWS,
};

/// Resolve reference text to a value
pub(crate) fn parse_reference(ctx: &FnCtx, text: &str) -> FormulaArgument {
    let text = text.trim();

    // Defined names substitute once, before any address parsing
    if let Some(target) = ctx.store().defined_name(text, ctx.sheet) {
        let target = target.trim_start_matches('=').trim().to_string();
        if let Ok(n) = target.parse::<f64>() {
            return FormulaArgument::number(n);
        }
        return parse_parts(ctx, &target);
    }

    parse_parts(ctx, text)
}

enum RefPart {
    Cell(i32, i32),
    Column(i32),
    Row(i32),
}

fn parse_parts(ctx: &FnCtx, text: &str) -> FormulaArgument {
    let mut sheet: Option<String> = None;
    let mut parts = Vec::new();

    for raw in text.split(':') {
        let (part_sheet, part) = match raw.rsplit_once('!') {
            Some((s, rest)) => (Some(s.trim().to_string()), rest),
            None => (None, raw),
        };
        if let Some(s) = part_sheet {
            match &sheet {
                Some(existing) if !existing.eq_ignore_ascii_case(&s) => {
                    return FormulaArgument::error_msg(
                        ErrorKind::Value,
                        format!("invalid reference {text:?}: endpoints on different sheets"),
                    );
                }
                _ => sheet = Some(s),
            }
        }
        let part = part.replace('$', "");
        match classify(&part) {
            Some(p) => parts.push(p),
            None => {
                return FormulaArgument::error_msg(
                    ErrorKind::Name,
                    format!("invalid reference {text:?}"),
                )
            }
        }
    }

    let sheet = sheet.unwrap_or_else(|| ctx.sheet.to_string());
    if ctx.store().sheet_index(&sheet).is_none() {
        return FormulaArgument::error_msg(ErrorKind::Ref, format!("no sheet named {sheet:?}"));
    }

    if let [RefPart::Cell(col, row)] = parts[..] {
        return resolve_single_cell(ctx, &sheet, col, row);
    }

    // Bounding rectangle over every part's corner points
    let mut min_col = i32::MAX;
    let mut max_col = i32::MIN;
    let mut min_row = i32::MAX;
    let mut max_row = i32::MIN;
    let mut span = |col: i32, row: i32| {
        min_col = min_col.min(col);
        max_col = max_col.max(col);
        min_row = min_row.min(row);
        max_row = max_row.max(row);
    };
    for part in &parts {
        match *part {
            RefPart::Cell(col, row) => span(col, row),
            RefPart::Column(col) => {
                span(col, 1);
                span(col, MAX_ROWS);
            }
            RefPart::Row(row) => {
                span(1, row);
                span(MAX_COLS, row);
            }
        }
    }

    let range = CellRange::new(
        CellRef::new(sheet.clone(), min_col, min_row),
        CellRef::new(sheet, max_col, max_row),
    );
    expand_range(ctx, range)
}

fn classify(part: &str) -> Option<RefPart> {
    if part.is_empty() {
        return None;
    }
    if part.chars().all(|c| c.is_ascii_alphabetic()) {
        return match gridcalc_core::column_name_to_number(part) {
            Ok(col) => Some(RefPart::Column(col)),
            Err(_) => None,
        };
    }
    if part.chars().all(|c| c.is_ascii_digit()) {
        return match part.parse::<i32>() {
            Ok(row) if (1..=MAX_ROWS).contains(&row) => Some(RefPart::Row(row)),
            _ => None,
        };
    }
    parse_cell_name(&part.to_uppercase())
        .ok()
        .map(|(col, row)| RefPart::Cell(col, row))
}

fn resolve_single_cell(ctx: &FnCtx, sheet: &str, col: i32, row: i32) -> FormulaArgument {
    let cell = CellRef::new(sheet, col, row);
    let value = context::resolve_cell(ctx, sheet, &cell.name());
    FormulaArgument::cell_value(value, cell)
}

/// Expand a range into a row-major matrix, clamped to the sheet's used
/// region. The attached provenance keeps the logical (unclamped) range so
/// address introspection still sees what the formula wrote.
pub(crate) fn expand_range(ctx: &FnCtx, range: CellRange) -> FormulaArgument {
    let sheet = range.sheet().to_string();
    let (used_rows, used_cols) = ctx.store().used_dimensions(&sheet);
    let row_end = range.to.row.min(used_rows);
    let col_end = range.to.col.min(used_cols);

    let mut rows = Vec::new();
    for row in range.from.row..=row_end {
        let mut cells = Vec::with_capacity((col_end - range.from.col + 1).max(0) as usize);
        for col in range.from.col..=col_end {
            let name = CellRef::new(sheet.as_str(), col, row).name();
            cells.push(context::resolve_cell(ctx, &sheet, &name));
        }
        rows.push(cells);
    }
    FormulaArgument::range_matrix(rows, range)
}
