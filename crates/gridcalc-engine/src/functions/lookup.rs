//! Lookup and reference functions
//!
//! These are the functions that read reference provenance rather than plain
//! values: ROW/COLUMN/ROWS/COLUMNS report the logical address a value came
//! from, INDIRECT re-enters the resolver with computed text, and OFFSET
//! builds a displaced range from an anchor's provenance.

use super::{try_num, FunctionRegistry};
use crate::criteria::{eval_criteria, parse_criteria};
use crate::resolver;
use crate::{context, FnCtx};
use gridcalc_core::{parse_cell_name, CellRange, CellRef, ErrorKind, FormulaArgument};
use std::cmp::Ordering;

pub(crate) fn register(registry: &mut FunctionRegistry) {
    registry.add("CHOOSE", 2, None, fn_choose);
    registry.add("COLUMN", 0, Some(1), fn_column);
    registry.add("COLUMNS", 1, Some(1), fn_columns);
    registry.add("HLOOKUP", 3, Some(4), fn_hlookup);
    registry.add("INDEX", 2, Some(3), fn_index);
    registry.add("INDIRECT", 1, Some(1), fn_indirect);
    registry.add("LOOKUP", 2, Some(3), fn_lookup);
    registry.add("MATCH", 2, Some(3), fn_match);
    registry.add("OFFSET", 3, Some(5), fn_offset);
    registry.add("ROW", 0, Some(1), fn_row);
    registry.add("ROWS", 1, Some(1), fn_rows);
    registry.add("VLOOKUP", 3, Some(4), fn_vlookup);
}

pub fn fn_choose(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let index = try_num!(args[0]).trunc();
    if index < 1.0 || index as usize >= args.len() {
        return FormulaArgument::error(ErrorKind::Value);
    }
    args[index as usize].clone()
}

/// The anchor coordinates of an argument's provenance
fn anchor(arg: &FormulaArgument) -> Option<CellRef> {
    let origin = arg.origin()?;
    if let Some(cell) = origin.cells.first() {
        return Some(cell.clone());
    }
    origin.ranges.first().map(|r| r.from.clone())
}

fn axis_of_root(ctx: &FnCtx, column: bool) -> FormulaArgument {
    match parse_cell_name(ctx.calc.root_cell()) {
        Ok((col, row)) => FormulaArgument::number(if column { col } else { row } as f64),
        Err(_) => FormulaArgument::error_msg(
            ErrorKind::Value,
            "no reference given and no current cell",
        ),
    }
}

pub fn fn_row(ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    if args.is_empty() {
        return axis_of_root(ctx, false);
    }
    match anchor(&args[0]) {
        Some(cell) => FormulaArgument::number(cell.row as f64),
        None => FormulaArgument::error_msg(ErrorKind::Value, "argument is not a reference"),
    }
}

pub fn fn_column(ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    if args.is_empty() {
        return axis_of_root(ctx, true);
    }
    match anchor(&args[0]) {
        Some(cell) => FormulaArgument::number(cell.col as f64),
        None => FormulaArgument::error_msg(ErrorKind::Value, "argument is not a reference"),
    }
}

/// Extent along one axis: the logical range when the argument is a
/// reference, otherwise the array's own shape
fn extent(arg: &FormulaArgument, columns: bool) -> f64 {
    if let Some(origin) = arg.origin() {
        if let Some(range) = origin.ranges.first() {
            return if columns { range.cols() } else { range.rows() } as f64;
        }
        if !origin.cells.is_empty() {
            return 1.0;
        }
    }
    match arg.unwrap_cell() {
        FormulaArgument::Matrix { rows, .. } => (if columns {
            rows.first().map(|r| r.len()).unwrap_or(0)
        } else {
            rows.len()
        }) as f64,
        FormulaArgument::List { values, .. } => {
            if columns {
                values.len() as f64
            } else {
                1.0
            }
        }
        _ => 1.0,
    }
}

pub fn fn_rows(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::number(extent(&args[0], false))
}

pub fn fn_columns(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::number(extent(&args[0], true))
}

fn as_rows(arg: &FormulaArgument) -> Vec<Vec<FormulaArgument>> {
    match arg.unwrap_cell() {
        FormulaArgument::Matrix { rows, .. } => rows.clone(),
        FormulaArgument::List { values, .. } => vec![values.clone()],
        other => vec![vec![other.clone()]],
    }
}

pub fn fn_index(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let rows = as_rows(&args[0]);
    let row = try_num!(args[1]).trunc() as i64;
    // With a one-row array and no column argument, the index selects along
    // the row
    let (row, col) = if args.len() > 2 {
        (row, try_num!(args[2]).trunc() as i64)
    } else if rows.len() == 1 {
        (1, row)
    } else {
        (row, 1)
    };
    if row < 0 || col < 0 {
        return FormulaArgument::error(ErrorKind::Value);
    }
    let width = rows.first().map(|r| r.len()).unwrap_or(0);
    if row as usize > rows.len() || col as usize > width {
        return FormulaArgument::error(ErrorKind::Ref);
    }
    match (row, col) {
        (0, 0) => args[0].clone(),
        // Index 0 selects the whole row or column
        (0, c) => FormulaArgument::matrix(
            rows.iter().map(|r| vec![r[c as usize - 1].clone()]).collect(),
        ),
        (r, 0) => FormulaArgument::matrix(vec![rows[r as usize - 1].clone()]),
        (r, c) => rows[r as usize - 1][c as usize - 1].clone(),
    }
}

fn lookup_cmp(a: &FormulaArgument, b: &FormulaArgument) -> Option<Ordering> {
    if a.is_numeric() && b.is_numeric() {
        return a.as_number()?.partial_cmp(&b.as_number()?);
    }
    if a.is_text() && b.is_text() {
        return Some(a.to_text().to_lowercase().cmp(&b.to_text().to_lowercase()));
    }
    None
}

fn lookup_eq(value: &FormulaArgument, lookup: &FormulaArgument) -> bool {
    if lookup.is_text() {
        // Text matching is case-insensitive with wildcard support
        return eval_criteria(value, &parse_criteria(&lookup.to_text()));
    }
    lookup_cmp(value, lookup) == Some(Ordering::Equal)
}

pub fn fn_match(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let lookup = &args[0];
    let values = args[1].flatten();
    let match_type = if args.len() > 2 { try_num!(args[2]).trunc() } else { 1.0 };

    if match_type == 0.0 {
        for (i, value) in values.iter().enumerate() {
            if lookup_eq(value, lookup) {
                return FormulaArgument::number((i + 1) as f64);
            }
        }
        return FormulaArgument::error(ErrorKind::Na);
    }

    // 1: last value <= lookup in ascending data; -1: last value >= lookup
    // in descending data
    let mut best: Option<usize> = None;
    for (i, value) in values.iter().enumerate() {
        match lookup_cmp(value, lookup) {
            Some(Ordering::Equal) => best = Some(i),
            Some(Ordering::Less) if match_type > 0.0 => best = Some(i),
            Some(Ordering::Greater) if match_type < 0.0 => best = Some(i),
            _ => {}
        }
    }
    match best {
        Some(i) => FormulaArgument::number((i + 1) as f64),
        None => FormulaArgument::error(ErrorKind::Na),
    }
}

/// LOOKUP(value, lookup_vector, [result_vector]); the two-argument array
/// form searches the first column (or first row when the array is wider
/// than tall) and answers from the last
pub fn fn_lookup(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let lookup = &args[0];
    let (keys, results) = if args.len() > 2 {
        (args[1].flatten(), args[2].flatten())
    } else {
        let rows = as_rows(&args[1]);
        let height = rows.len();
        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        if width > height {
            let last = rows.len() - 1;
            (rows[0].clone(), rows[last].clone())
        } else {
            (
                rows.iter().filter_map(|r| r.first().cloned()).collect(),
                rows.iter().filter_map(|r| r.last().cloned()).collect(),
            )
        }
    };
    if keys.len() != results.len() {
        return FormulaArgument::error_msg(
            ErrorKind::Value,
            "LOOKUP vectors must have matching dimensions",
        );
    }
    let mut best: Option<usize> = None;
    for (i, key) in keys.iter().enumerate() {
        match lookup_cmp(key, lookup) {
            Some(Ordering::Equal) | Some(Ordering::Less) => best = Some(i),
            _ => {}
        }
    }
    match best {
        Some(i) => results[i].clone(),
        None => FormulaArgument::error_msg(ErrorKind::Na, "lookup value not found"),
    }
}

fn table_lookup(args: &[FormulaArgument], vertical: bool) -> FormulaArgument {
    let lookup = &args[0];
    let mut table = as_rows(&args[1]);
    if !vertical {
        // Transpose so HLOOKUP shares the row-wise scan
        let width = table.first().map(|r| r.len()).unwrap_or(0);
        table = (0..width)
            .map(|c| table.iter().map(|r| r[c].clone()).collect())
            .collect();
    }
    let index = try_num!(args[2]).trunc() as i64;
    let approximate = if args.len() > 3 {
        match args[3].to_bool() {
            Ok(b) => b,
            Err(err) => return err,
        }
    } else {
        true
    };
    let width = table.first().map(|r| r.len()).unwrap_or(0);
    if index < 1 || index as usize > width {
        return FormulaArgument::error(ErrorKind::Ref);
    }

    let mut best: Option<usize> = None;
    for (i, row) in table.iter().enumerate() {
        let key = &row[0];
        if approximate {
            match lookup_cmp(key, lookup) {
                Some(Ordering::Equal) | Some(Ordering::Less) => best = Some(i),
                _ => {}
            }
        } else if lookup_eq(key, lookup) {
            best = Some(i);
            break;
        }
    }
    match best {
        Some(i) => table[i][index as usize - 1].clone(),
        None => FormulaArgument::error_msg(ErrorKind::Na, "lookup value not found"),
    }
}

pub fn fn_vlookup(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    table_lookup(args, true)
}

pub fn fn_hlookup(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    table_lookup(args, false)
}

pub fn fn_indirect(ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    if args[0].is_error() {
        return args[0].unwrap_cell().clone();
    }
    resolver::parse_reference(ctx, &args[0].to_text())
}

pub fn fn_offset(ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let Some(base) = anchor(&args[0]) else {
        return FormulaArgument::error_msg(ErrorKind::Value, "anchor is not a reference");
    };
    let row_shift = try_num!(args[1]).trunc() as i32;
    let col_shift = try_num!(args[2]).trunc() as i32;
    let height = if args.len() > 3 && !args[3].is_empty_value() {
        try_num!(args[3]).trunc() as i32
    } else {
        extent(&args[0], false) as i32
    };
    let width = if args.len() > 4 && !args[4].is_empty_value() {
        try_num!(args[4]).trunc() as i32
    } else {
        extent(&args[0], true) as i32
    };
    if height < 1 || width < 1 {
        return FormulaArgument::error(ErrorKind::Value);
    }

    let from_col = base.col + col_shift;
    let from_row = base.row + row_shift;
    if from_col < 1 || from_row < 1 {
        return FormulaArgument::error(ErrorKind::Ref);
    }
    let sheet = base.sheet.clone();
    if height == 1 && width == 1 {
        let cell = CellRef::new(sheet.clone(), from_col, from_row);
        let value = context::resolve_cell(ctx, &sheet, &cell.name());
        return FormulaArgument::cell_value(value, cell);
    }
    let range = CellRange::new(
        CellRef::new(sheet.clone(), from_col, from_row),
        CellRef::new(sheet, from_col + width - 1, from_row + height - 1),
    );
    resolver::expand_range(ctx, range)
}
