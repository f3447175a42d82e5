//! Logical functions

use super::{try_bool, FunctionRegistry};
use crate::FnCtx;
use gridcalc_core::{ErrorKind, FormulaArgument};

pub(crate) fn register(registry: &mut FunctionRegistry) {
    registry.add("AND", 1, None, fn_and);
    registry.add("FALSE", 0, Some(0), fn_false);
    registry.add("IF", 2, Some(3), fn_if);
    registry.add("IFERROR", 2, Some(2), fn_iferror);
    registry.add("IFNA", 2, Some(2), fn_ifna);
    registry.add("IFS", 2, None, fn_ifs);
    registry.add("NOT", 1, Some(1), fn_not);
    registry.add("OR", 1, None, fn_or);
    registry.add("TRUE", 0, Some(0), fn_true);
    registry.add("XOR", 1, None, fn_xor);
}

/// Collect the truth values of all arguments; text inside ranges is
/// skipped while direct text must read TRUE/FALSE
fn truth_values(args: &[FormulaArgument]) -> std::result::Result<Vec<bool>, FormulaArgument> {
    let mut out = Vec::new();
    for arg in args {
        match arg.unwrap_cell() {
            FormulaArgument::Matrix { .. } | FormulaArgument::List { .. } => {
                for value in arg.flatten() {
                    if value.is_error() {
                        return Err(value.unwrap_cell().clone());
                    }
                    if value.is_numeric() {
                        out.push(value.to_bool()?);
                    }
                }
            }
            FormulaArgument::Empty => {}
            _ => out.push(arg.to_bool()?),
        }
    }
    if out.is_empty() {
        return Err(FormulaArgument::error_msg(
            ErrorKind::Value,
            "no logical values",
        ));
    }
    Ok(out)
}

pub fn fn_and(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    match truth_values(args) {
        Ok(values) => FormulaArgument::bool_value(values.iter().all(|&b| b)),
        Err(err) => err,
    }
}

pub fn fn_or(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    match truth_values(args) {
        Ok(values) => FormulaArgument::bool_value(values.iter().any(|&b| b)),
        Err(err) => err,
    }
}

pub fn fn_xor(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    match truth_values(args) {
        Ok(values) => {
            FormulaArgument::bool_value(values.iter().filter(|&&b| b).count() % 2 == 1)
        }
        Err(err) => err,
    }
}

pub fn fn_not(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::bool_value(!try_bool!(args[0]))
}

pub fn fn_true(_ctx: &FnCtx, _args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::bool_value(true)
}

pub fn fn_false(_ctx: &FnCtx, _args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::bool_value(false)
}

pub fn fn_if(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    if try_bool!(args[0]) {
        args[1].clone()
    } else if args.len() > 2 {
        args[2].clone()
    } else {
        FormulaArgument::bool_value(false)
    }
}

pub fn fn_iferror(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    if args[0].is_error() {
        args[1].clone()
    } else {
        args[0].clone()
    }
}

pub fn fn_ifna(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    if args[0].error_kind() == Some(ErrorKind::Na) {
        args[1].clone()
    } else {
        args[0].clone()
    }
}

pub fn fn_ifs(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    if args.len() % 2 != 0 {
        return FormulaArgument::error_msg(
            ErrorKind::Value,
            "IFS takes condition/value pairs",
        );
    }
    for pair in args.chunks(2) {
        if try_bool!(pair[0]) {
            return pair[1].clone();
        }
    }
    FormulaArgument::error(ErrorKind::Na)
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
    fn test_and_or_xor() {
        assert_eq!(eval("=AND(TRUE,TRUE)"), FormulaArgument::bool_value(true));
        assert_eq!(eval("=AND(TRUE,FALSE)"), FormulaArgument::bool_value(false));
        assert_eq!(eval("=OR(FALSE,TRUE)"), FormulaArgument::bool_value(true));
        assert_eq!(eval("=OR(FALSE,FALSE)"), FormulaArgument::bool_value(false));
        assert_eq!(eval("=XOR(TRUE,TRUE,TRUE)"), FormulaArgument::bool_value(true));
        assert_eq!(eval("=XOR(TRUE,TRUE)"), FormulaArgument::bool_value(false));
        assert_eq!(eval("=AND(1=1,2>1)"), FormulaArgument::bool_value(true));
    }

    #[test]
    fn test_if() {
        assert_eq!(eval("=IF(1<2,\"yes\",\"no\")"), FormulaArgument::text("yes"));
        assert_eq!(eval("=IF(1>2,\"yes\",\"no\")"), FormulaArgument::text("no"));
        assert_eq!(eval("=IF(FALSE,1)"), FormulaArgument::bool_value(false));
        assert_eq!(
            eval("=IF(\"nope\",1,2)").error_kind(),
            Some(ErrorKind::Value)
        );
    }

    #[test]
    fn test_not() {
        assert_eq!(eval("=NOT(TRUE)"), FormulaArgument::bool_value(false));
        assert_eq!(eval("=NOT(0)"), FormulaArgument::bool_value(true));
    }

    #[test]
    fn test_iferror_ifna() {
        assert_eq!(eval("=IFERROR(1/0,42)"), FormulaArgument::number(42.0));
        assert_eq!(eval("=IFERROR(7,42)"), FormulaArgument::number(7.0));
        assert_eq!(eval("=IFNA(#N/A,42)"), FormulaArgument::number(42.0));
        // IFNA lets other errors through
        assert_eq!(
            eval("=IFNA(1/0,42)"),
            FormulaArgument::error(ErrorKind::Div0)
        );
    }

    #[test]
    fn test_ifs() {
        assert_eq!(
            eval("=IFS(1>2,\"a\",2>1,\"b\")"),
            FormulaArgument::text("b")
        );
        assert_eq!(eval("=IFS(1>2,\"a\")"), FormulaArgument::error(ErrorKind::Na));
        assert_eq!(
            eval("=IFS(TRUE,1,FALSE)").error_kind(),
            Some(ErrorKind::Value)
        );
    }

    #[test]
    fn test_constants() {
        assert_eq!(eval("=TRUE()"), FormulaArgument::bool_value(true));
        assert_eq!(eval("=FALSE()"), FormulaArgument::bool_value(false));
    }
}
