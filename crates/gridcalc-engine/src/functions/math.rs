//! Math and trigonometry functions, plus the matrix operations built on
//! the dense-matrix kernels

use super::{
    collect_numeric, kernel_error, matrix_value, numeric_matrix, try_num, FunctionRegistry,
};
use crate::criteria::{eval_criteria, parse_criteria};
use crate::kernels::matrix;
use crate::FnCtx;
use gridcalc_core::{ErrorKind, FormulaArgument};

pub(crate) fn register(registry: &mut FunctionRegistry) {
    registry.add("ABS", 1, Some(1), fn_abs);
    registry.add("ACOS", 1, Some(1), fn_acos);
    registry.add("ASIN", 1, Some(1), fn_asin);
    registry.add("ATAN", 1, Some(1), fn_atan);
    registry.add("ATAN2", 2, Some(2), fn_atan2);
    registry.add("CEILING", 2, Some(2), fn_ceiling);
    registry.add("COMBIN", 2, Some(2), fn_combin);
    registry.add("COS", 1, Some(1), fn_cos);
    registry.add("COSH", 1, Some(1), fn_cosh);
    registry.add("DEGREES", 1, Some(1), fn_degrees);
    registry.add("EVEN", 1, Some(1), fn_even);
    registry.add("EXP", 1, Some(1), fn_exp);
    registry.add("FACT", 1, Some(1), fn_fact);
    registry.add("FLOOR", 2, Some(2), fn_floor);
    registry.add("GCD", 1, None, fn_gcd);
    registry.add("INT", 1, Some(1), fn_int);
    registry.add("LCM", 1, None, fn_lcm);
    registry.add("LN", 1, Some(1), fn_ln);
    registry.add("LOG", 1, Some(2), fn_log);
    registry.add("LOG10", 1, Some(1), fn_log10);
    registry.add("MDETERM", 1, Some(1), fn_mdeterm);
    registry.add("MINVERSE", 1, Some(1), fn_minverse);
    registry.add("MMULT", 2, Some(2), fn_mmult);
    registry.add("MUNIT", 1, Some(1), fn_munit);
    registry.add("MOD", 2, Some(2), fn_mod);
    registry.add("ODD", 1, Some(1), fn_odd);
    registry.add("PI", 0, Some(0), fn_pi);
    registry.add("POWER", 2, Some(2), fn_power);
    registry.add("PRODUCT", 1, None, fn_product);
    registry.add("QUOTIENT", 2, Some(2), fn_quotient);
    registry.add("RADIANS", 1, Some(1), fn_radians);
    registry.add_volatile("RAND", 0, Some(0), fn_rand);
    registry.add_volatile("RANDBETWEEN", 2, Some(2), fn_randbetween);
    registry.add("ROUND", 2, Some(2), fn_round);
    registry.add("ROUNDDOWN", 2, Some(2), fn_rounddown);
    registry.add("ROUNDUP", 2, Some(2), fn_roundup);
    registry.add("SIGN", 1, Some(1), fn_sign);
    registry.add("SIN", 1, Some(1), fn_sin);
    registry.add("SINH", 1, Some(1), fn_sinh);
    registry.add("SQRT", 1, Some(1), fn_sqrt);
    registry.add("SUM", 1, None, fn_sum);
    registry.add("SUMIF", 2, Some(3), fn_sumif);
    registry.add("SUMIFS", 3, None, fn_sumifs);
    registry.add("SUMPRODUCT", 1, None, fn_sumproduct);
    registry.add("SUMSQ", 1, None, fn_sumsq);
    registry.add("TAN", 1, Some(1), fn_tan);
    registry.add("TANH", 1, Some(1), fn_tanh);
    registry.add("TRANSPOSE", 1, Some(1), fn_transpose);
    registry.add("TRUNC", 1, Some(2), fn_trunc);
}

fn finite(n: f64) -> FormulaArgument {
    if n.is_finite() {
        FormulaArgument::number(n)
    } else {
        FormulaArgument::error(ErrorKind::Num)
    }
}

pub fn fn_sum(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    match collect_numeric(args) {
        Ok(values) => FormulaArgument::number(values.iter().sum()),
        Err(err) => err,
    }
}

pub fn fn_product(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    match collect_numeric(args) {
        Ok(values) if values.is_empty() => FormulaArgument::number(0.0),
        Ok(values) => FormulaArgument::number(values.iter().product()),
        Err(err) => err,
    }
}

pub fn fn_sumsq(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    match collect_numeric(args) {
        Ok(values) => FormulaArgument::number(values.iter().map(|n| n * n).sum()),
        Err(err) => err,
    }
}

pub fn fn_abs(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::number(try_num!(args[0]).abs())
}

pub fn fn_sign(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let n = try_num!(args[0]);
    FormulaArgument::number(if n > 0.0 {
        1.0
    } else if n < 0.0 {
        -1.0
    } else {
        0.0
    })
}

pub fn fn_int(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::number(try_num!(args[0]).floor())
}

pub fn fn_trunc(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let n = try_num!(args[0]);
    let digits = if args.len() > 1 {
        try_num!(args[1]).trunc()
    } else {
        0.0
    };
    let factor = 10f64.powf(digits);
    finite((n * factor).trunc() / factor)
}

pub fn fn_round(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let n = try_num!(args[0]);
    let factor = 10f64.powf(try_num!(args[1]).trunc());
    // Half rounds away from zero
    finite((n * factor).round() / factor)
}

pub fn fn_roundup(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let n = try_num!(args[0]);
    let factor = 10f64.powf(try_num!(args[1]).trunc());
    finite((n.abs() * factor).ceil() / factor * n.signum())
}

pub fn fn_rounddown(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let n = try_num!(args[0]);
    let factor = 10f64.powf(try_num!(args[1]).trunc());
    finite((n.abs() * factor).floor() / factor * n.signum())
}

/// MOD follows the sign of the divisor
pub fn fn_mod(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let n = try_num!(args[0]);
    let d = try_num!(args[1]);
    if d == 0.0 {
        return FormulaArgument::error(ErrorKind::Div0);
    }
    FormulaArgument::number(n - d * (n / d).floor())
}

pub fn fn_quotient(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let n = try_num!(args[0]);
    let d = try_num!(args[1]);
    if d == 0.0 {
        return FormulaArgument::error(ErrorKind::Div0);
    }
    FormulaArgument::number((n / d).trunc())
}

pub fn fn_power(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let base = try_num!(args[0]);
    let exp = try_num!(args[1]);
    if base == 0.0 && exp == 0.0 {
        return FormulaArgument::error(ErrorKind::Num);
    }
    finite(base.powf(exp))
}

pub fn fn_sqrt(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let n = try_num!(args[0]);
    if n < 0.0 {
        return FormulaArgument::error(ErrorKind::Num);
    }
    FormulaArgument::number(n.sqrt())
}

pub fn fn_exp(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    finite(try_num!(args[0]).exp())
}

pub fn fn_ln(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let n = try_num!(args[0]);
    if n <= 0.0 {
        return FormulaArgument::error(ErrorKind::Num);
    }
    FormulaArgument::number(n.ln())
}

pub fn fn_log(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let n = try_num!(args[0]);
    let base = if args.len() > 1 {
        try_num!(args[1])
    } else {
        10.0
    };
    if n <= 0.0 || base <= 0.0 || base == 1.0 {
        return FormulaArgument::error(ErrorKind::Num);
    }
    FormulaArgument::number(n.log(base))
}

pub fn fn_log10(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let n = try_num!(args[0]);
    if n <= 0.0 {
        return FormulaArgument::error(ErrorKind::Num);
    }
    FormulaArgument::number(n.log10())
}

pub fn fn_pi(_ctx: &FnCtx, _args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::number(std::f64::consts::PI)
}

pub fn fn_sin(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::number(try_num!(args[0]).sin())
}

pub fn fn_cos(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::number(try_num!(args[0]).cos())
}

pub fn fn_tan(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    finite(try_num!(args[0]).tan())
}

pub fn fn_asin(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let n = try_num!(args[0]);
    if !(-1.0..=1.0).contains(&n) {
        return FormulaArgument::error(ErrorKind::Num);
    }
    FormulaArgument::number(n.asin())
}

pub fn fn_acos(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let n = try_num!(args[0]);
    if !(-1.0..=1.0).contains(&n) {
        return FormulaArgument::error(ErrorKind::Num);
    }
    FormulaArgument::number(n.acos())
}

pub fn fn_atan(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::number(try_num!(args[0]).atan())
}

/// ATAN2(x, y) with the spreadsheet argument order
pub fn fn_atan2(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let x = try_num!(args[0]);
    let y = try_num!(args[1]);
    if x == 0.0 && y == 0.0 {
        return FormulaArgument::error(ErrorKind::Div0);
    }
    FormulaArgument::number(y.atan2(x))
}

pub fn fn_sinh(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    finite(try_num!(args[0]).sinh())
}

pub fn fn_cosh(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    finite(try_num!(args[0]).cosh())
}

pub fn fn_tanh(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::number(try_num!(args[0]).tanh())
}

pub fn fn_degrees(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::number(try_num!(args[0]).to_degrees())
}

pub fn fn_radians(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::number(try_num!(args[0]).to_radians())
}

/// CEILING/FLOOR share the legacy sign rules: significance zero is a
/// division error and a positive number with negative significance is out
/// of domain
fn ceil_floor(args: &[FormulaArgument], ceil: bool) -> FormulaArgument {
    let n = match args[0].to_number() {
        Ok(n) => n,
        Err(err) => return err,
    };
    let sig = match args[1].to_number() {
        Ok(n) => n,
        Err(err) => return err,
    };
    if sig == 0.0 {
        return FormulaArgument::error(ErrorKind::Div0);
    }
    if n > 0.0 && sig < 0.0 {
        return FormulaArgument::error(ErrorKind::Num);
    }
    let q = n / sig;
    FormulaArgument::number(if ceil { q.ceil() } else { q.floor() } * sig)
}

pub fn fn_ceiling(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    ceil_floor(args, true)
}

pub fn fn_floor(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    ceil_floor(args, false)
}

pub fn fn_even(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let n = try_num!(args[0]);
    let rounded = (n.abs() / 2.0).ceil() * 2.0;
    FormulaArgument::number(rounded * if n < 0.0 { -1.0 } else { 1.0 })
}

pub fn fn_odd(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let n = try_num!(args[0]);
    let rounded = ((n.abs() + 1.0) / 2.0).ceil() * 2.0 - 1.0;
    FormulaArgument::number(rounded * if n < 0.0 { -1.0 } else { 1.0 })
}

pub fn fn_fact(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let n = try_num!(args[0]).trunc();
    if !(0.0..=170.0).contains(&n) {
        return FormulaArgument::error(ErrorKind::Num);
    }
    let mut result = 1.0;
    for k in 2..=(n as u64) {
        result *= k as f64;
    }
    FormulaArgument::number(result)
}

pub fn fn_combin(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let n = try_num!(args[0]).trunc();
    let k = try_num!(args[1]).trunc();
    if n < 0.0 || k < 0.0 || k > n {
        return FormulaArgument::error(ErrorKind::Num);
    }
    let k = k.min(n - k);
    let mut result = 1.0;
    for i in 0..(k as u64) {
        result = result * (n - i as f64) / (i as f64 + 1.0);
    }
    finite(result.round())
}

fn integer_args(args: &[FormulaArgument]) -> std::result::Result<Vec<u64>, FormulaArgument> {
    let values = collect_numeric(args)?;
    values
        .into_iter()
        .map(|n| {
            if n < 0.0 {
                Err(FormulaArgument::error(ErrorKind::Num))
            } else {
                Ok(n.trunc() as u64)
            }
        })
        .collect()
}

fn gcd2(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd2(b, a % b)
    }
}

pub fn fn_gcd(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    match integer_args(args) {
        Ok(values) => {
            FormulaArgument::number(values.into_iter().fold(0, gcd2) as f64)
        }
        Err(err) => err,
    }
}

pub fn fn_lcm(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    match integer_args(args) {
        Ok(values) => {
            let mut lcm: u64 = 1;
            for v in values {
                if v == 0 {
                    return FormulaArgument::number(0.0);
                }
                lcm = lcm / gcd2(lcm, v) * v;
            }
            FormulaArgument::number(lcm as f64)
        }
        Err(err) => err,
    }
}

pub fn fn_rand(ctx: &FnCtx, _args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::number(ctx.engine.random())
}

pub fn fn_randbetween(ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let low = try_num!(args[0]).ceil() as i64;
    let high = try_num!(args[1]).floor() as i64;
    if low > high {
        return FormulaArgument::error(ErrorKind::Num);
    }
    FormulaArgument::number(ctx.engine.random_range(low, high) as f64)
}

// === Conditional aggregation ===

pub fn fn_sumif(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let test_values = args[0].flatten();
    let criteria = parse_criteria(&args[1].to_text());
    let sum_values = if args.len() > 2 {
        args[2].flatten()
    } else {
        test_values.clone()
    };
    let mut sum = 0.0;
    for (i, value) in test_values.iter().enumerate() {
        if value.is_error() {
            return value.unwrap_cell().clone();
        }
        if eval_criteria(value, &criteria) {
            if let Some(n) = sum_values.get(i).and_then(|v| v.as_number()) {
                sum += n;
            }
        }
    }
    FormulaArgument::number(sum)
}

/// SUMIFS(sum_range, criteria_range1, criteria1, ...)
pub fn fn_sumifs(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    if args.len() % 2 == 0 {
        return FormulaArgument::error_msg(
            ErrorKind::Value,
            "SUMIFS requires criteria ranges paired with criteria",
        );
    }
    let sum_values = args[0].flatten();
    let mut tests = Vec::new();
    for pair in args[1..].chunks(2) {
        let range = pair[0].flatten();
        if range.len() != sum_values.len() {
            return FormulaArgument::error_msg(
                ErrorKind::Value,
                "SUMIFS ranges must have matching dimensions",
            );
        }
        tests.push((range, parse_criteria(&pair[1].to_text())));
    }
    let mut sum = 0.0;
    for (i, value) in sum_values.iter().enumerate() {
        let all = tests
            .iter()
            .all(|(range, criteria)| eval_criteria(&range[i], criteria));
        if all {
            if let Some(n) = value.as_number() {
                sum += n;
            }
        }
    }
    FormulaArgument::number(sum)
}

/// Non-numeric entries count as zero, per the spreadsheet convention
pub fn fn_sumproduct(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let lists: Vec<Vec<FormulaArgument>> = args.iter().map(|a| a.flatten()).collect();
    let len = lists[0].len();
    if lists.iter().any(|l| l.len() != len) {
        return FormulaArgument::error_msg(
            ErrorKind::Value,
            "SUMPRODUCT arguments must have matching dimensions",
        );
    }
    let mut sum = 0.0;
    for i in 0..len {
        let mut product = 1.0;
        for list in &lists {
            if list[i].is_error() {
                return list[i].unwrap_cell().clone();
            }
            product *= list[i].as_number().unwrap_or(0.0);
        }
        sum += product;
    }
    FormulaArgument::number(sum)
}

// === Matrix operations ===

pub fn fn_mdeterm(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let m = match numeric_matrix(&args[0]) {
        Ok(m) => m,
        Err(err) => return err,
    };
    match matrix::determinant(&m) {
        Ok(det) => FormulaArgument::number(det),
        Err(err) => kernel_error(err),
    }
}

pub fn fn_minverse(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let m = match numeric_matrix(&args[0]) {
        Ok(m) => m,
        Err(err) => return err,
    };
    match matrix::inverse(&m) {
        Ok(inv) => matrix_value(inv),
        Err(err) => kernel_error(err),
    }
}

pub fn fn_mmult(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let a = match numeric_matrix(&args[0]) {
        Ok(m) => m,
        Err(err) => return err,
    };
    let b = match numeric_matrix(&args[1]) {
        Ok(m) => m,
        Err(err) => return err,
    };
    match matrix::multiply(&a, &b) {
        Ok(product) => matrix_value(product),
        Err(err) => kernel_error(err),
    }
}

pub fn fn_munit(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let n = try_num!(args[0]);
    if !n.is_finite() || n < 1.0 || n > 1024.0 {
        return FormulaArgument::error(ErrorKind::Value);
    }
    let n = n as usize;
    let rows = (0..n)
        .map(|i| {
            (0..n)
                .map(|j| FormulaArgument::number(if i == j { 1.0 } else { 0.0 }))
                .collect()
        })
        .collect();
    FormulaArgument::matrix(rows)
}

pub fn fn_transpose(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let rows = match args[0].unwrap_cell() {
        FormulaArgument::Matrix { rows, .. } => rows.clone(),
        other => vec![vec![other.clone()]],
    };
    if rows.is_empty() {
        return FormulaArgument::matrix(Vec::new());
    }
    let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    let transposed = (0..width)
        .map(|j| {
            rows.iter()
                .map(|row| row.get(j).cloned().unwrap_or_default())
                .collect()
        })
        .collect();
    FormulaArgument::matrix(transposed)
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

    fn num(formula: &str) -> f64 {
        eval(formula).as_number().unwrap()
    }

    #[test]
    fn test_rounding_family() {
        assert_eq!(num("=ROUND(2.5,0)"), 3.0);
        assert_eq!(num("=ROUND(1.234,2)"), 1.23);
        assert_eq!(num("=ROUND(-2.5,0)"), -3.0);
        assert_eq!(num("=ROUNDUP(3.21,1)"), 3.3);
        assert_eq!(num("=ROUNDDOWN(-3.29,1)"), -3.2);
        assert_eq!(num("=TRUNC(8.97)"), 8.0);
        assert_eq!(num("=INT(-1.5)"), -2.0);
    }

    #[test]
    fn test_mod_follows_divisor_sign() {
        assert_eq!(num("=MOD(7,3)"), 1.0);
        assert_eq!(num("=MOD(-7,3)"), 2.0);
        assert_eq!(num("=MOD(7,-3)"), -2.0);
        assert_eq!(eval("=MOD(7,0)"), FormulaArgument::error(ErrorKind::Div0));
    }

    #[test]
    fn test_ceiling_floor_sign_rules() {
        assert_eq!(num("=CEILING(2.5,1)"), 3.0);
        assert_eq!(num("=CEILING(-2.5,-2)"), -4.0);
        assert_eq!(num("=FLOOR(-2.5,-2)"), -2.0);
        assert_eq!(
            eval("=CEILING(2.5,-1)"),
            FormulaArgument::error(ErrorKind::Num)
        );
        assert_eq!(
            eval("=FLOOR(2.5,0)"),
            FormulaArgument::error(ErrorKind::Div0)
        );
    }

    #[test]
    fn test_combinatorics() {
        assert_eq!(num("=FACT(5)"), 120.0);
        assert_eq!(num("=COMBIN(10,3)"), 120.0);
        assert_eq!(num("=GCD(12,18,30)"), 6.0);
        assert_eq!(num("=LCM(4,6)"), 12.0);
        assert_eq!(eval("=FACT(-1)"), FormulaArgument::error(ErrorKind::Num));
    }

    #[test]
    fn test_even_odd() {
        assert_eq!(num("=EVEN(1.5)"), 2.0);
        assert_eq!(num("=EVEN(-1)"), -2.0);
        assert_eq!(num("=ODD(2)"), 3.0);
        assert_eq!(num("=ODD(-1.5)"), -3.0);
    }

    #[test]
    fn test_sumif_type_filtering() {
        let mut wb = MemoryWorkbook::new();
        wb.set_number("Sheet1", "A1", 1.0);
        wb.set_text("Sheet1", "A2", "a");
        let engine = Engine::new(&wb);
        // ">0" counts only the number, "a" counts only the text
        assert_eq!(
            engine
                .evaluate_formula("Sheet1", "=SUMIF(A1:A2,\">0\")")
                .unwrap(),
            FormulaArgument::number(1.0)
        );
        assert_eq!(
            engine
                .evaluate_formula("Sheet1", "=COUNTIF(A1:A2,\"a\")")
                .unwrap(),
            FormulaArgument::number(1.0)
        );
    }

    #[test]
    fn test_sumif_with_sum_range() {
        let mut wb = MemoryWorkbook::new();
        for (i, (key, value)) in [(5.0, 10.0), (15.0, 20.0), (25.0, 30.0)].iter().enumerate() {
            wb.set_number("Sheet1", &format!("A{}", i + 1), *key);
            wb.set_number("Sheet1", &format!("B{}", i + 1), *value);
        }
        let engine = Engine::new(&wb);
        assert_eq!(
            engine
                .evaluate_formula("Sheet1", "=SUMIF(A1:A3,\">10\",B1:B3)")
                .unwrap(),
            FormulaArgument::number(50.0)
        );
    }

    #[test]
    fn test_sumifs() {
        let mut wb = MemoryWorkbook::new();
        wb.set_number("Sheet1", "A1", 1.0);
        wb.set_number("Sheet1", "A2", 2.0);
        wb.set_number("Sheet1", "A3", 3.0);
        wb.set_text("Sheet1", "B1", "x");
        wb.set_text("Sheet1", "B2", "y");
        wb.set_text("Sheet1", "B3", "x");
        let engine = Engine::new(&wb);
        assert_eq!(
            engine
                .evaluate_formula("Sheet1", "=SUMIFS(A1:A3,B1:B3,\"x\",A1:A3,\">1\")")
                .unwrap(),
            FormulaArgument::number(3.0)
        );
    }

    #[test]
    fn test_sumproduct() {
        assert_eq!(num("=SUMPRODUCT({1,2,3},{4,5,6})"), 32.0);
        assert_eq!(
            eval("=SUMPRODUCT({1,2},{1,2,3})").error_kind(),
            Some(ErrorKind::Value)
        );
    }

    #[test]
    fn test_matrix_functions() {
        assert_eq!(num("=MDETERM({1,2;3,4})"), -2.0);
        assert_eq!(
            eval("=MMULT({1,2;3,4},MINVERSE({1,2;3,4}))"),
            FormulaArgument::matrix(vec![
                vec![FormulaArgument::number(1.0), FormulaArgument::number(0.0)],
                vec![FormulaArgument::number(0.0), FormulaArgument::number(1.0)],
            ])
        );
        assert_eq!(
            eval("=TRANSPOSE({1,2;3,4})"),
            FormulaArgument::matrix(vec![
                vec![FormulaArgument::number(1.0), FormulaArgument::number(3.0)],
                vec![FormulaArgument::number(2.0), FormulaArgument::number(4.0)],
            ])
        );
        assert_eq!(
            eval("=MINVERSE({1,2;2,4})"),
            FormulaArgument::error(ErrorKind::Num)
        );
        assert_eq!(
            eval("=MUNIT(2)"),
            FormulaArgument::matrix(vec![
                vec![FormulaArgument::number(1.0), FormulaArgument::number(0.0)],
                vec![FormulaArgument::number(0.0), FormulaArgument::number(1.0)],
            ])
        );
        assert_eq!(eval("=MUNIT(0)"), FormulaArgument::error(ErrorKind::Value));
    }

    #[test]
    fn test_sum_coerces_direct_text_only() {
        let mut wb = MemoryWorkbook::new();
        wb.set_number("Sheet1", "A1", 1.0);
        wb.set_text("Sheet1", "A2", "5");
        let engine = Engine::new(&wb);
        // Text inside a range is ignored, direct text arguments coerce
        assert_eq!(
            engine.evaluate_formula("Sheet1", "=SUM(A1:A2)").unwrap(),
            FormulaArgument::number(1.0)
        );
        assert_eq!(
            engine.evaluate_formula("Sheet1", "=SUM(\"5\",1)").unwrap(),
            FormulaArgument::number(6.0)
        );
    }
}
