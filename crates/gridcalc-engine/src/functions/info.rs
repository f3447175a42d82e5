//! Information and type-inspection functions

use super::{try_num, FunctionRegistry};
use crate::FnCtx;
use gridcalc_core::{ErrorKind, FormulaArgument};

pub(crate) fn register(registry: &mut FunctionRegistry) {
    registry.add("ERROR.TYPE", 1, Some(1), fn_error_type);
    registry.add("FORMULATEXT", 1, Some(1), fn_formulatext);
    registry.add("ISBLANK", 1, Some(1), fn_isblank);
    registry.add("ISERR", 1, Some(1), fn_iserr);
    registry.add("ISERROR", 1, Some(1), fn_iserror);
    registry.add("ISEVEN", 1, Some(1), fn_iseven);
    registry.add("ISFORMULA", 1, Some(1), fn_isformula);
    registry.add("ISLOGICAL", 1, Some(1), fn_islogical);
    registry.add("ISNA", 1, Some(1), fn_isna);
    registry.add("ISNONTEXT", 1, Some(1), fn_isnontext);
    registry.add("ISNUMBER", 1, Some(1), fn_isnumber);
    registry.add("ISODD", 1, Some(1), fn_isodd);
    registry.add("ISREF", 1, Some(1), fn_isref);
    registry.add("ISTEXT", 1, Some(1), fn_istext);
    registry.add("N", 1, Some(1), fn_n);
    registry.add("NA", 0, Some(0), fn_na);
    registry.add("SHEET", 0, Some(1), fn_sheet);
    registry.add("SHEETS", 0, Some(0), fn_sheets);
    registry.add("TYPE", 1, Some(1), fn_type);
}

pub fn fn_error_type(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    match args[0].error_kind() {
        Some(kind) => FormulaArgument::number(kind.type_number() as f64),
        None => FormulaArgument::error(ErrorKind::Na),
    }
}

pub fn fn_isblank(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::bool_value(args[0].is_empty_value())
}

pub fn fn_iserror(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::bool_value(args[0].is_error())
}

/// Any error except `#N/A`
pub fn fn_iserr(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let kind = args[0].error_kind();
    FormulaArgument::bool_value(kind.is_some() && kind != Some(ErrorKind::Na))
}

pub fn fn_isna(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::bool_value(args[0].error_kind() == Some(ErrorKind::Na))
}

pub fn fn_iseven(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let n = try_num!(args[0]).trunc();
    FormulaArgument::bool_value(n.rem_euclid(2.0) == 0.0)
}

pub fn fn_isodd(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let n = try_num!(args[0]).trunc();
    FormulaArgument::bool_value(n.rem_euclid(2.0) == 1.0)
}

pub fn fn_islogical(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::bool_value(args[0].is_boolean())
}

pub fn fn_isnumber(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::bool_value(args[0].is_plain_number())
}

pub fn fn_istext(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::bool_value(args[0].is_text())
}

pub fn fn_isnontext(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::bool_value(!args[0].is_text())
}

pub fn fn_isref(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::bool_value(args[0].origin().is_some())
}

pub fn fn_isformula(ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let Some(cell) = args[0].origin().and_then(|o| o.cells.first().cloned()) else {
        return FormulaArgument::error_msg(ErrorKind::Value, "argument is not a reference");
    };
    let has_formula = ctx
        .store()
        .cell_formula(&cell.sheet, &cell.name())
        .is_some();
    FormulaArgument::bool_value(has_formula)
}

pub fn fn_formulatext(ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let Some(cell) = args[0].origin().and_then(|o| o.cells.first().cloned()) else {
        return FormulaArgument::error_msg(ErrorKind::Value, "argument is not a reference");
    };
    match ctx.store().cell_formula(&cell.sheet, &cell.name()) {
        Some(formula) => FormulaArgument::text(formula),
        None => FormulaArgument::error(ErrorKind::Na),
    }
}

/// Coerce to a number the way `N` does: booleans to 0/1, text to 0
pub fn fn_n(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    if args[0].is_error() {
        return args[0].unwrap_cell().clone();
    }
    match args[0].as_number() {
        Some(n) => FormulaArgument::number(n),
        None => FormulaArgument::number(0.0),
    }
}

pub fn fn_na(_ctx: &FnCtx, _args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::error(ErrorKind::Na)
}

pub fn fn_sheet(ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let name = match args.first() {
        None => ctx.sheet.to_string(),
        Some(arg) => match arg.origin().and_then(|o| {
            o.cells
                .first()
                .map(|c| c.sheet.clone())
                .or_else(|| o.ranges.first().map(|r| r.sheet().to_string()))
        }) {
            Some(sheet) => sheet,
            None => arg.to_text(),
        },
    };
    match ctx.store().sheet_index(&name) {
        Some(index) => FormulaArgument::number((index + 1) as f64),
        None => FormulaArgument::error(ErrorKind::Na),
    }
}

pub fn fn_sheets(ctx: &FnCtx, _args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::number(ctx.store().sheet_names().len() as f64)
}

/// 1 number, 2 text, 4 boolean, 16 error, 64 array
pub fn fn_type(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let code = match args[0].unwrap_cell() {
        FormulaArgument::Number { boolean: true, .. } => 4,
        FormulaArgument::Number { .. } | FormulaArgument::Empty => 1,
        FormulaArgument::Text(_) => 2,
        FormulaArgument::Error { .. } => 16,
        FormulaArgument::List { .. } | FormulaArgument::Matrix { .. } => 64,
        FormulaArgument::Cell { .. } => unreachable!("unwrap_cell strips Cell"),
    };
    FormulaArgument::number(code as f64)
}

#[cfg(test)]
mod tests {
    use crate::Engine;
    use gridcalc_core::{ErrorKind, FormulaArgument, MemoryWorkbook};
    use pretty_assertions::assert_eq;

    fn eval(formula: &str) -> FormulaArgument {
        let wb = MemoryWorkbook::new();
        Engine::new(&wb).evaluate_formula("Sheet1", formula).unwrap()
    }

    #[test]
    fn test_is_predicates() {
        assert_eq!(eval("=ISNUMBER(1)"), FormulaArgument::bool_value(true));
        assert_eq!(eval("=ISNUMBER(TRUE)"), FormulaArgument::bool_value(false));
        assert_eq!(eval("=ISTEXT(\"x\")"), FormulaArgument::bool_value(true));
        assert_eq!(eval("=ISNONTEXT(1)"), FormulaArgument::bool_value(true));
        assert_eq!(eval("=ISLOGICAL(TRUE)"), FormulaArgument::bool_value(true));
        assert_eq!(eval("=ISLOGICAL(1)"), FormulaArgument::bool_value(false));
        assert_eq!(eval("=ISEVEN(4)"), FormulaArgument::bool_value(true));
        assert_eq!(eval("=ISODD(-3)"), FormulaArgument::bool_value(true));
    }

    #[test]
    fn test_error_predicates() {
        assert_eq!(eval("=ISERROR(1/0)"), FormulaArgument::bool_value(true));
        assert_eq!(eval("=ISERR(1/0)"), FormulaArgument::bool_value(true));
        assert_eq!(eval("=ISERR(NA())"), FormulaArgument::bool_value(false));
        assert_eq!(eval("=ISNA(NA())"), FormulaArgument::bool_value(true));
        assert_eq!(eval("=ISERROR(1)"), FormulaArgument::bool_value(false));
    }

    #[test]
    fn test_error_type_codes() {
        assert_eq!(eval("=ERROR.TYPE(1/0)"), FormulaArgument::number(2.0));
        assert_eq!(eval("=ERROR.TYPE(#VALUE!)"), FormulaArgument::number(3.0));
        assert_eq!(eval("=ERROR.TYPE(#REF!)"), FormulaArgument::number(4.0));
        assert_eq!(eval("=ERROR.TYPE(NA())"), FormulaArgument::number(7.0));
        assert_eq!(eval("=ERROR.TYPE(1)"), FormulaArgument::error(ErrorKind::Na));
    }

    #[test]
    fn test_reference_predicates() {
        let mut wb = MemoryWorkbook::new();
        wb.set_number("Sheet1", "A1", 5.0);
        wb.set_formula("Sheet1", "B1", "=A1*2");
        let engine = Engine::new(&wb);
        let eval = |f: &str| engine.evaluate_formula("Sheet1", f).unwrap();
        assert_eq!(eval("=ISREF(A1)"), FormulaArgument::bool_value(true));
        assert_eq!(eval("=ISREF(1)"), FormulaArgument::bool_value(false));
        assert_eq!(eval("=ISBLANK(Z9)"), FormulaArgument::bool_value(true));
        assert_eq!(eval("=ISBLANK(A1)"), FormulaArgument::bool_value(false));
        assert_eq!(eval("=ISFORMULA(B1)"), FormulaArgument::bool_value(true));
        assert_eq!(eval("=ISFORMULA(A1)"), FormulaArgument::bool_value(false));
        assert_eq!(eval("=FORMULATEXT(B1)"), FormulaArgument::text("=A1*2"));
        assert_eq!(eval("=FORMULATEXT(A1)").error_kind(), Some(ErrorKind::Na));
    }

    #[test]
    fn test_n_and_type() {
        assert_eq!(eval("=N(7)"), FormulaArgument::number(7.0));
        assert_eq!(eval("=N(TRUE)"), FormulaArgument::number(1.0));
        assert_eq!(eval("=N(\"x\")"), FormulaArgument::number(0.0));
        assert_eq!(eval("=TYPE(1)"), FormulaArgument::number(1.0));
        assert_eq!(eval("=TYPE(\"x\")"), FormulaArgument::number(2.0));
        assert_eq!(eval("=TYPE(TRUE)"), FormulaArgument::number(4.0));
        assert_eq!(eval("=TYPE(1/0)"), FormulaArgument::number(16.0));
        assert_eq!(eval("=TYPE({1,2})"), FormulaArgument::number(64.0));
    }

    #[test]
    fn test_sheet_functions() {
        let mut wb = MemoryWorkbook::new();
        wb.add_sheet("Data");
        wb.set_number("Data", "A1", 1.0);
        let engine = Engine::new(&wb);
        let eval = |f: &str| engine.evaluate_formula("Sheet1", f).unwrap();
        assert_eq!(eval("=SHEETS()"), FormulaArgument::number(2.0));
        assert_eq!(eval("=SHEET()"), FormulaArgument::number(1.0));
        assert_eq!(eval("=SHEET(\"Data\")"), FormulaArgument::number(2.0));
        assert_eq!(eval("=SHEET(Data!A1)"), FormulaArgument::number(2.0));
        assert_eq!(eval("=SHEET(\"Nope\")"), FormulaArgument::error(ErrorKind::Na));
    }
}
