//! The criteria sub-language used by SUMIF/COUNTIF/AVERAGEIF and the
//! database functions
//!
//! A criterion is plain text (or a number) with an optional comparison
//! prefix: `">=10"`, `"<>done"`, `"5"`, `"a*"`. Wildcard patterns use `?`
//! for one character and `*` for any run, matched case-insensitively
//! against text values only.
//!
//! Ordered comparisons across types are deliberately asymmetric, matching
//! spreadsheet sorting rules: a number is always less than text, so
//! `"<z"` accepts numbers while `">0"` rejects text.

use gridcalc_core::FormulaArgument;
use lazy_regex::regex_captures;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriteriaOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Wildcard pattern match
    Pattern,
}

/// A parsed criterion
#[derive(Debug, Clone)]
pub struct Criteria {
    pub op: CriteriaOp,
    pub operand: FormulaArgument,
    pattern: Option<Regex>,
}

/// Parse criterion text
pub fn parse_criteria(text: &str) -> Criteria {
    let text = text.trim();

    if let Ok(n) = text.parse::<f64>() {
        return Criteria::number(CriteriaOp::Eq, n);
    }
    if let Some((_, digits)) = regex_captures!(r"^(-?\d+(?:\.\d+)?)%$", text) {
        if let Ok(n) = digits.parse::<f64>() {
            return Criteria::number(CriteriaOp::Eq, n / 100.0);
        }
    }

    if let Some((_, prefix, rest)) = regex_captures!(r"^(<=|>=|<>|=|<|>)(.*)$", text) {
        let op = match prefix {
            "<=" => CriteriaOp::Le,
            ">=" => CriteriaOp::Ge,
            "<>" => CriteriaOp::Ne,
            "=" => CriteriaOp::Eq,
            "<" => CriteriaOp::Lt,
            _ => CriteriaOp::Gt,
        };
        let rest = rest.trim();
        if let Ok(n) = rest.parse::<f64>() {
            return Criteria::number(op, n);
        }
        if let Some((_, digits)) = regex_captures!(r"^(-?\d+(?:\.\d+)?)%$", rest) {
            if let Ok(n) = digits.parse::<f64>() {
                return Criteria::number(op, n / 100.0);
            }
        }
        return Criteria {
            op,
            operand: FormulaArgument::text(rest),
            pattern: None,
        };
    }

    if text.contains('?') || text.contains('*') {
        return Criteria {
            op: CriteriaOp::Pattern,
            operand: FormulaArgument::text(text),
            pattern: wildcard_regex(text),
        };
    }

    Criteria {
        op: CriteriaOp::Eq,
        operand: FormulaArgument::text(text),
        pattern: None,
    }
}

impl Criteria {
    fn number(op: CriteriaOp, n: f64) -> Self {
        Self {
            op,
            operand: FormulaArgument::number(n),
            pattern: None,
        }
    }
}

/// Translate a wildcard pattern to an anchored case-insensitive regex
fn wildcard_regex(pattern: &str) -> Option<Regex> {
    let mut out = String::from("(?i)^");
    for c in pattern.chars() {
        match c {
            '?' => out.push('.'),
            '*' => out.push_str(".*"),
            _ => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out.push('$');
    Regex::new(&out).ok()
}

/// Test one value against a parsed criterion
pub fn eval_criteria(value: &FormulaArgument, criteria: &Criteria) -> bool {
    match criteria.op {
        CriteriaOp::Pattern => match (value.as_text(), &criteria.pattern) {
            (Some(s), Some(re)) => re.is_match(s),
            _ => false,
        },
        CriteriaOp::Eq => matches_eq(value, &criteria.operand),
        CriteriaOp::Ne => !matches_eq(value, &criteria.operand),
        CriteriaOp::Lt | CriteriaOp::Le | CriteriaOp::Gt | CriteriaOp::Ge => {
            matches_ordered(criteria.op, value, &criteria.operand)
        }
    }
}

fn matches_eq(value: &FormulaArgument, operand: &FormulaArgument) -> bool {
    match (operand.as_number(), value.as_number()) {
        (Some(a), Some(b)) => a == b,
        (Some(_), None) => false,
        (None, _) => match (operand.as_text(), value.as_text()) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        },
    }
}

fn matches_ordered(op: CriteriaOp, value: &FormulaArgument, operand: &FormulaArgument) -> bool {
    match (value.as_number(), operand.as_number()) {
        (Some(a), Some(b)) => match op {
            CriteriaOp::Lt => a < b,
            CriteriaOp::Le => a <= b,
            CriteriaOp::Gt => a > b,
            _ => a >= b,
        },
        (None, None) => match (value.as_text(), operand.as_text()) {
            (Some(a), Some(b)) => {
                let (a, b) = (a.to_lowercase(), b.to_lowercase());
                match op {
                    CriteriaOp::Lt => a < b,
                    CriteriaOp::Le => a <= b,
                    CriteriaOp::Gt => a > b,
                    _ => a >= b,
                }
            }
            _ => false,
        },
        // Cross-type: a number is less than any text, but the ordered
        // greater-than forms never accept a type mismatch
        (Some(_), None) => matches!(op, CriteriaOp::Lt | CriteriaOp::Le) && operand.is_text(),
        (None, Some(_)) => false,
    }
}
