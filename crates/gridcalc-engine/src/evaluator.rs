//! Token-stream expression evaluation
//!
//! Operator-precedence evaluation over the lexer's flat token stream, with
//! no intermediate syntax tree. Two operand/operator stack pairs are kept:
//! one for top-level expression text and one shared by all open function
//! calls. Each function or parenthesis pushes a `(` barrier onto the active
//! operator stack, so argument separators and closing tokens only ever
//! reduce the innermost scope.
//!
//! All binary operators reduce left to right within a priority level,
//! including `^`, so `2^3^2` is `(2^3)^2`.

use crate::functions;
use crate::resolver;
use crate::{EngineError, FnCtx, Result};
use gridcalc_core::{ErrorKind, FormulaArgument};
use gridcalc_lexer::{Token, TokenKind, TokenSubtype};

/// Reduction barrier pushed at every function or subexpression start
fn barrier() -> Token {
    Token::new("(", TokenKind::Subexpression, TokenSubtype::Start)
}

fn is_barrier(token: &Token) -> bool {
    token.kind == TokenKind::Subexpression && token.value == "("
}

fn priority(token: &Token) -> u8 {
    if token.kind == TokenKind::OperatorPrefix {
        return 6;
    }
    match token.value.as_str() {
        "^" => 5,
        "*" | "/" => 4,
        "+" | "-" => 3,
        "&" => 2,
        "=" | "<>" | "<" | "<=" | ">" | ">=" => 1,
        _ => 0,
    }
}

fn invalid(msg: &str) -> EngineError {
    EngineError::InvalidFormula(msg.to_string())
}

/// Evaluate a token stream to a single value
pub(crate) fn eval_tokens(tokens: &[Token], ctx: &FnCtx) -> Result<FormulaArgument> {
    let mut st = Stacks::default();
    for token in tokens {
        match token.kind {
            TokenKind::Operand => st.push_operand(operand_value(ctx, token)),
            TokenKind::OperatorPrefix => st.active().0.push(token.clone()),
            TokenKind::OperatorInfix => st.push_infix(token)?,
            TokenKind::OperatorPostfix => st.apply_percent()?,
            TokenKind::Subexpression => match token.subtype {
                TokenSubtype::Start => st.active().0.push(barrier()),
                TokenSubtype::Stop => st.close_subexpression()?,
                _ => return Err(invalid("malformed subexpression token")),
            },
            TokenKind::Function => match token.subtype {
                TokenSubtype::Start => st.open_function(token),
                TokenSubtype::Stop => st.close_function(ctx)?,
                _ => return Err(invalid("malformed function token")),
            },
            TokenKind::Argument => st.push_argument()?,
            TokenKind::Whitespace => {}
            TokenKind::Unknown => {
                return Err(EngineError::InvalidFormula(format!(
                    "unexpected {:?}",
                    token.value
                )))
            }
        }
    }
    st.finish()
}

#[derive(Default)]
struct Stacks {
    /// Top-level operands and operators
    opd: Vec<FormulaArgument>,
    opt: Vec<Token>,
    /// Open function names, innermost last
    opf: Vec<Token>,
    /// Operands and operators of all open function scopes
    opfd: Vec<FormulaArgument>,
    opft: Vec<Token>,
    /// Collected argument values per open function
    args: Vec<Vec<FormulaArgument>>,
    /// `opfd` depth at each function's entry, so an inner call never
    /// consumes an operand pending for an enclosing scope
    marks: Vec<usize>,
}

impl Stacks {
    fn in_function(&self) -> bool {
        !self.opf.is_empty()
    }

    /// The operator and operand stacks of the active scope
    fn active(&mut self) -> (&mut Vec<Token>, &mut Vec<FormulaArgument>) {
        if self.opf.is_empty() {
            (&mut self.opt, &mut self.opd)
        } else {
            (&mut self.opft, &mut self.opfd)
        }
    }

    fn push_operand(&mut self, value: FormulaArgument) {
        self.active().1.push(value);
    }

    fn push_infix(&mut self, token: &Token) -> Result<()> {
        let pri = priority(token);
        let (ops, operands) = self.active();
        while let Some(top) = ops.last() {
            if is_barrier(top) || priority(top) < pri {
                break;
            }
            apply_one(ops, operands)?;
        }
        ops.push(token.clone());
        Ok(())
    }

    fn apply_percent(&mut self) -> Result<()> {
        let (_, operands) = self.active();
        let value = operands.pop().ok_or_else(|| invalid("dangling %"))?;
        let scaled = match value.to_number() {
            Ok(n) => FormulaArgument::number(n / 100.0),
            Err(err) => err,
        };
        operands.push(scaled);
        Ok(())
    }

    fn close_subexpression(&mut self) -> Result<()> {
        let (ops, operands) = self.active();
        loop {
            match ops.last() {
                None => return Err(invalid("unbalanced parenthesis")),
                Some(top) if is_barrier(top) => {
                    ops.pop();
                    return Ok(());
                }
                Some(_) => apply_one(ops, operands)?,
            }
        }
    }

    fn open_function(&mut self, token: &Token) {
        self.opf.push(token.clone());
        self.opft.push(barrier());
        self.args.push(Vec::new());
        self.marks.push(self.opfd.len());
    }

    /// Argument separator: reduce the innermost scope and collect the value
    fn push_argument(&mut self) -> Result<()> {
        if !self.in_function() {
            return Err(invalid("argument separator outside a function call"));
        }
        self.reduce_scope(false)?;
        let value = self.take_scope_operand()?.unwrap_or_default();
        self.args
            .last_mut()
            .ok_or_else(|| invalid("argument separator outside a function call"))?
            .push(value);
        Ok(())
    }

    fn close_function(&mut self, ctx: &FnCtx) -> Result<()> {
        if !self.in_function() {
            return Err(invalid("unbalanced function close"));
        }
        self.reduce_scope(true)?;
        let last = self.take_scope_operand()?;
        self.marks.pop();
        let name = self.opf.pop().map(|t| t.value).unwrap_or_default();
        let mut args = self.args.pop().unwrap_or_default();
        match last {
            Some(value) => args.push(value),
            // A trailing separator implies a final empty argument
            None if !args.is_empty() => args.push(FormulaArgument::empty()),
            None => {}
        }
        let result = match name.as_str() {
            "ARRAYROW" => FormulaArgument::list(args),
            "ARRAY" => collect_array(args),
            _ => functions::call(ctx, &name, args),
        };
        self.push_operand(result);
        Ok(())
    }

    /// Reduce the innermost function scope down to its barrier, optionally
    /// popping the barrier itself
    fn reduce_scope(&mut self, pop_barrier: bool) -> Result<()> {
        loop {
            match self.opft.last() {
                None => return Err(invalid("unbalanced function scope")),
                Some(top) if is_barrier(top) => {
                    if pop_barrier {
                        self.opft.pop();
                    }
                    return Ok(());
                }
                Some(_) => apply_one(&mut self.opft, &mut self.opfd)?,
            }
        }
    }

    /// Pop the one operand the current scope may have produced
    fn take_scope_operand(&mut self) -> Result<Option<FormulaArgument>> {
        let mark = *self.marks.last().ok_or_else(|| invalid("no open function"))?;
        match self.opfd.len() {
            n if n == mark => Ok(None),
            n if n == mark + 1 => Ok(self.opfd.pop()),
            _ => Err(invalid("missing operator between operands")),
        }
    }

    /// Reduce everything left and return the final value
    fn finish(mut self) -> Result<FormulaArgument> {
        if !self.opf.is_empty() || !self.opft.is_empty() || !self.args.is_empty() {
            return Err(invalid("unterminated function call"));
        }
        while let Some(top) = self.opt.last() {
            if is_barrier(top) {
                return Err(invalid("unbalanced parenthesis"));
            }
            apply_one(&mut self.opt, &mut self.opd)?;
        }
        if self.opd.len() != 1 {
            return Err(invalid("expression does not reduce to a single value"));
        }
        Ok(self.opd.pop().unwrap_or_default())
    }
}

/// Pop one operator and apply it to the operand stack
fn apply_one(ops: &mut Vec<Token>, operands: &mut Vec<FormulaArgument>) -> Result<()> {
    let op = ops.pop().ok_or_else(|| invalid("missing operator"))?;
    if op.kind == TokenKind::OperatorPrefix {
        let value = operands.pop().ok_or_else(|| invalid("missing operand"))?;
        let negated = match value.to_number() {
            Ok(n) => FormulaArgument::number(-n),
            Err(err) => err,
        };
        operands.push(negated);
        return Ok(());
    }
    let rhs = operands.pop().ok_or_else(|| invalid("missing operand"))?;
    let lhs = operands.pop().ok_or_else(|| invalid("missing operand"))?;
    operands.push(binary_op(&op.value, lhs, rhs));
    Ok(())
}

fn binary_op(op: &str, lhs: FormulaArgument, rhs: FormulaArgument) -> FormulaArgument {
    if lhs.is_error() {
        return lhs.unwrap_cell().clone();
    }
    if rhs.is_error() {
        return rhs.unwrap_cell().clone();
    }
    match op {
        "+" | "-" | "*" | "/" | "^" => {
            let a = match lhs.to_number() {
                Ok(n) => n,
                Err(err) => return err,
            };
            let b = match rhs.to_number() {
                Ok(n) => n,
                Err(err) => return err,
            };
            let result = match op {
                "+" => a + b,
                "-" => a - b,
                "*" => a * b,
                "/" => {
                    if b == 0.0 {
                        return FormulaArgument::error(ErrorKind::Div0);
                    }
                    a / b
                }
                _ => a.powf(b),
            };
            if result.is_finite() {
                FormulaArgument::number(result)
            } else {
                FormulaArgument::error(ErrorKind::Num)
            }
        }
        "&" => FormulaArgument::text(format!("{}{}", lhs.to_text(), rhs.to_text())),
        "=" | "<>" | "<" | "<=" | ">" | ">=" => compare(op, &lhs, &rhs),
        _ => FormulaArgument::error_msg(ErrorKind::Value, format!("unknown operator {op:?}")),
    }
}

/// Spreadsheet comparison: numbers sort below text, text below booleans;
/// text compares case-insensitively
fn compare(op: &str, lhs: &FormulaArgument, rhs: &FormulaArgument) -> FormulaArgument {
    use std::cmp::Ordering;

    fn rank(v: &FormulaArgument) -> u8 {
        match v.unwrap_cell() {
            FormulaArgument::Number { boolean: true, .. } => 2,
            FormulaArgument::Number { .. } | FormulaArgument::Empty => 0,
            FormulaArgument::Text(_) => 1,
            _ => 3,
        }
    }

    let (ra, rb) = (rank(lhs), rank(rhs));
    let ord = if ra != rb {
        ra.cmp(&rb)
    } else {
        match ra {
            1 => {
                let a = lhs.to_text().to_lowercase();
                let b = rhs.to_text().to_lowercase();
                a.cmp(&b)
            }
            _ => {
                let a = lhs.as_number().unwrap_or(0.0);
                let b = rhs.as_number().unwrap_or(0.0);
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            }
        }
    };
    let result = match op {
        "=" => ord == Ordering::Equal,
        "<>" => ord != Ordering::Equal,
        "<" => ord == Ordering::Less,
        "<=" => ord != Ordering::Greater,
        ">" => ord == Ordering::Greater,
        _ => ord != Ordering::Less,
    };
    FormulaArgument::bool_value(result)
}

fn operand_value(ctx: &FnCtx, token: &Token) -> FormulaArgument {
    match token.subtype {
        TokenSubtype::Number => match token.value.parse::<f64>() {
            Ok(n) => FormulaArgument::number(n),
            Err(_) => FormulaArgument::error_msg(
                ErrorKind::Value,
                format!("bad numeric literal {:?}", token.value),
            ),
        },
        TokenSubtype::Text => FormulaArgument::text(token.value.clone()),
        TokenSubtype::Logical => {
            FormulaArgument::bool_value(token.value.eq_ignore_ascii_case("TRUE"))
        }
        TokenSubtype::Error => match ErrorKind::from_code(&token.value) {
            Some(kind) => FormulaArgument::error(kind),
            None => FormulaArgument::error(ErrorKind::Value),
        },
        TokenSubtype::Range => resolver::parse_reference(ctx, &token.value),
        _ => FormulaArgument::error_msg(
            ErrorKind::Value,
            format!("unexpected operand {:?}", token.value),
        ),
    }
}

/// Assemble ARRAY pseudo-function arguments (one per row) into a matrix
fn collect_array(rows: Vec<FormulaArgument>) -> FormulaArgument {
    let rows = rows
        .into_iter()
        .map(|row| match row {
            FormulaArgument::List { values, .. } => values,
            other => vec![other],
        })
        .collect();
    FormulaArgument::matrix(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Engine;
    use gridcalc_core::MemoryWorkbook;
    use pretty_assertions::assert_eq;

    fn eval(formula: &str) -> FormulaArgument {
        let wb = MemoryWorkbook::new();
        Engine::new(&wb).evaluate_formula("Sheet1", formula).unwrap()
    }

    fn eval_err(formula: &str) -> EngineError {
        let wb = MemoryWorkbook::new();
        Engine::new(&wb)
            .evaluate_formula("Sheet1", formula)
            .unwrap_err()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval("=1+2*3"), FormulaArgument::number(7.0));
        assert_eq!(eval("=(1+2)*3"), FormulaArgument::number(9.0));
        assert_eq!(eval("=10-4/2"), FormulaArgument::number(8.0));
        assert_eq!(eval("=2*3^2"), FormulaArgument::number(18.0));
    }

    #[test]
    fn test_power_is_left_associative() {
        assert_eq!(eval("=2^3^2"), FormulaArgument::number(64.0));
    }

    #[test]
    fn test_unary_minus_binds_tighter_than_power() {
        assert_eq!(eval("=-2^2"), FormulaArgument::number(4.0));
        assert_eq!(eval("=2^-2"), FormulaArgument::number(0.25));
    }

    #[test]
    fn test_percent_postfix() {
        assert_eq!(eval("=50%"), FormulaArgument::number(0.5));
        assert_eq!(eval("=200*10%"), FormulaArgument::number(20.0));
        assert_eq!(eval("=-50%"), FormulaArgument::number(-0.5));
    }

    #[test]
    fn test_concatenation() {
        assert_eq!(eval("=\"a\"&\"b\"&1"), FormulaArgument::text("ab1"));
        assert_eq!(eval("=1&2"), FormulaArgument::text("12"));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval("=1<2"), FormulaArgument::bool_value(true));
        assert_eq!(eval("=\"A\"=\"a\""), FormulaArgument::bool_value(true));
        assert_eq!(eval("=\"b\">\"a\""), FormulaArgument::bool_value(true));
        // Numbers always sort below text
        assert_eq!(eval("=99<\"1\""), FormulaArgument::bool_value(true));
        assert_eq!(eval("=TRUE>\"z\""), FormulaArgument::bool_value(true));
        assert_eq!(eval("=1<>2"), FormulaArgument::bool_value(true));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(eval("=1/0"), FormulaArgument::error(ErrorKind::Div0));
        // Errors propagate through further arithmetic
        assert_eq!(eval("=1/0+5"), FormulaArgument::error(ErrorKind::Div0));
    }

    #[test]
    fn test_error_literal_propagates() {
        assert_eq!(eval("=#REF!+1"), FormulaArgument::error(ErrorKind::Ref));
    }

    #[test]
    fn test_text_arithmetic_coerces() {
        assert_eq!(eval("=\"3\"+4"), FormulaArgument::number(7.0));
        assert_eq!(
            eval("=\"abc\"+1").error_kind(),
            Some(ErrorKind::Value)
        );
    }

    #[test]
    fn test_array_literal() {
        assert_eq!(
            eval("={1,2;3,4}"),
            FormulaArgument::matrix(vec![
                vec![FormulaArgument::number(1.0), FormulaArgument::number(2.0)],
                vec![FormulaArgument::number(3.0), FormulaArgument::number(4.0)],
            ])
        );
    }

    #[test]
    fn test_nested_function_arithmetic() {
        assert_eq!(eval("=SUM(1+2*3,MAX(2,3))"), FormulaArgument::number(10.0));
        assert_eq!(eval("=SUM(1+PI()-PI())"), FormulaArgument::number(1.0));
    }

    #[test]
    fn test_malformed_formulas_rejected() {
        assert!(matches!(eval_err("=1+"), EngineError::InvalidFormula(_)));
        assert!(matches!(eval_err("=(1"), EngineError::InvalidFormula(_)));
        assert!(matches!(eval_err("=SUM(1"), EngineError::InvalidFormula(_)));
        assert!(matches!(eval_err("="), EngineError::InvalidFormula(_)));
    }

    #[test]
    fn test_unknown_function_is_name_error() {
        assert_eq!(eval("=NOSUCHFN(1)").error_kind(), Some(ErrorKind::Name));
    }
}
