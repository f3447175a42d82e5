//! Text functions
//!
//! Positions and lengths are 1-based and counted in characters, not bytes,
//! so multibyte text behaves the way a spreadsheet user expects.

use super::{try_bool, try_num, FunctionRegistry};
use crate::FnCtx;
use gridcalc_core::{ErrorKind, FormulaArgument};

pub(crate) fn register(registry: &mut FunctionRegistry) {
    registry.add("CHAR", 1, Some(1), fn_char);
    registry.add("CLEAN", 1, Some(1), fn_clean);
    registry.add("CODE", 1, Some(1), fn_code);
    registry.add("CONCAT", 1, None, fn_concat);
    registry.add("CONCATENATE", 1, None, fn_concatenate);
    registry.add("EXACT", 2, Some(2), fn_exact);
    registry.add("FIND", 2, Some(3), fn_find);
    registry.add("LEFT", 1, Some(2), fn_left);
    registry.add("LEN", 1, Some(1), fn_len);
    registry.add("LOWER", 1, Some(1), fn_lower);
    registry.add("MID", 3, Some(3), fn_mid);
    registry.add("PROPER", 1, Some(1), fn_proper);
    registry.add("REPLACE", 4, Some(4), fn_replace);
    registry.add("REPT", 2, Some(2), fn_rept);
    registry.add("RIGHT", 1, Some(2), fn_right);
    registry.add("SEARCH", 2, Some(3), fn_search);
    registry.add("SUBSTITUTE", 3, Some(4), fn_substitute);
    registry.add("TEXTJOIN", 3, None, fn_textjoin);
    registry.add("TRIM", 1, Some(1), fn_trim);
    registry.add("UPPER", 1, Some(1), fn_upper);
    registry.add("VALUE", 1, Some(1), fn_value);
}

macro_rules! try_text {
    ($arg:expr) => {{
        if $arg.is_error() {
            return $arg.unwrap_cell().clone();
        }
        $arg.to_text()
    }};
}

pub fn fn_char(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let code = try_num!(args[0]).trunc();
    if !(1.0..=255.0).contains(&code) {
        return FormulaArgument::error(ErrorKind::Value);
    }
    match char::from_u32(code as u32) {
        Some(c) => FormulaArgument::text(c.to_string()),
        None => FormulaArgument::error(ErrorKind::Value),
    }
}

pub fn fn_code(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let text = try_text!(args[0]);
    match text.chars().next() {
        Some(c) => FormulaArgument::number(c as u32 as f64),
        None => FormulaArgument::error(ErrorKind::Value),
    }
}

pub fn fn_clean(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let text = try_text!(args[0]);
    FormulaArgument::text(text.chars().filter(|c| !c.is_control()).collect::<String>())
}

pub fn fn_concat(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let mut out = String::new();
    for arg in args {
        for value in arg.flatten() {
            if value.is_error() {
                return value.unwrap_cell().clone();
            }
            out.push_str(&value.to_text());
        }
    }
    FormulaArgument::text(out)
}

pub fn fn_concatenate(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let mut out = String::new();
    for arg in args {
        out.push_str(&try_text!(arg));
    }
    FormulaArgument::text(out)
}

pub fn fn_exact(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::bool_value(try_text!(args[0]) == try_text!(args[1]))
}

fn find_impl(args: &[FormulaArgument], case_sensitive: bool) -> FormulaArgument {
    let mut needle = match args[0].is_error() {
        true => return args[0].unwrap_cell().clone(),
        false => args[0].to_text(),
    };
    let mut haystack = match args[1].is_error() {
        true => return args[1].unwrap_cell().clone(),
        false => args[1].to_text(),
    };
    let start = if args.len() > 2 {
        match args[2].to_number() {
            Ok(n) => n.trunc() as i64,
            Err(err) => return err,
        }
    } else {
        1
    };
    if !case_sensitive {
        needle = needle.to_lowercase();
        haystack = haystack.to_lowercase();
    }
    let chars: Vec<char> = haystack.chars().collect();
    if start < 1 || start as usize > chars.len() + 1 {
        return FormulaArgument::error(ErrorKind::Value);
    }
    let offset = start as usize - 1;
    let tail: String = chars[offset..].iter().collect();
    match tail.find(&needle) {
        Some(byte_pos) => {
            let char_pos = tail[..byte_pos].chars().count();
            FormulaArgument::number((offset + char_pos + 1) as f64)
        }
        None => FormulaArgument::error_msg(ErrorKind::Value, "substring not found"),
    }
}

pub fn fn_find(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    find_impl(args, true)
}

pub fn fn_search(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    find_impl(args, false)
}

pub fn fn_left(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let text = try_text!(args[0]);
    let count = if args.len() > 1 { try_num!(args[1]).trunc() } else { 1.0 };
    if count < 0.0 {
        return FormulaArgument::error(ErrorKind::Value);
    }
    FormulaArgument::text(text.chars().take(count as usize).collect::<String>())
}

pub fn fn_right(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let text = try_text!(args[0]);
    let count = if args.len() > 1 { try_num!(args[1]).trunc() } else { 1.0 };
    if count < 0.0 {
        return FormulaArgument::error(ErrorKind::Value);
    }
    let chars: Vec<char> = text.chars().collect();
    let skip = chars.len().saturating_sub(count as usize);
    FormulaArgument::text(chars[skip..].iter().collect::<String>())
}

pub fn fn_mid(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let text = try_text!(args[0]);
    let start = try_num!(args[1]).trunc();
    let count = try_num!(args[2]).trunc();
    if start < 1.0 || count < 0.0 {
        return FormulaArgument::error(ErrorKind::Value);
    }
    FormulaArgument::text(
        text.chars()
            .skip(start as usize - 1)
            .take(count as usize)
            .collect::<String>(),
    )
}

pub fn fn_len(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::number(try_text!(args[0]).chars().count() as f64)
}

pub fn fn_lower(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::text(try_text!(args[0]).to_lowercase())
}

pub fn fn_upper(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    FormulaArgument::text(try_text!(args[0]).to_uppercase())
}

pub fn fn_proper(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let text = try_text!(args[0]);
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    FormulaArgument::text(out)
}

/// Leading/trailing spaces removed, interior runs collapsed to one
pub fn fn_trim(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let text = try_text!(args[0]);
    FormulaArgument::text(text.split(' ').filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" "))
}

pub fn fn_replace(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let text = try_text!(args[0]);
    let start = try_num!(args[1]).trunc();
    let count = try_num!(args[2]).trunc();
    let replacement = try_text!(args[3]);
    if start < 1.0 || count < 0.0 {
        return FormulaArgument::error(ErrorKind::Value);
    }
    let chars: Vec<char> = text.chars().collect();
    let from = (start as usize - 1).min(chars.len());
    let to = (from + count as usize).min(chars.len());
    let mut out: String = chars[..from].iter().collect();
    out.push_str(&replacement);
    out.extend(&chars[to..]);
    FormulaArgument::text(out)
}

pub fn fn_rept(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let text = try_text!(args[0]);
    let count = try_num!(args[1]).trunc();
    if count < 0.0 {
        return FormulaArgument::error(ErrorKind::Value);
    }
    FormulaArgument::text(text.repeat(count as usize))
}

pub fn fn_substitute(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let text = try_text!(args[0]);
    let old = try_text!(args[1]);
    let new = try_text!(args[2]);
    if old.is_empty() {
        return FormulaArgument::text(text);
    }
    if args.len() > 3 {
        let instance = try_num!(args[3]).trunc();
        if instance < 1.0 {
            return FormulaArgument::error(ErrorKind::Value);
        }
        let mut seen = 0i64;
        let mut search_from = 0;
        while let Some(pos) = text[search_from..].find(&old) {
            let at = search_from + pos;
            seen += 1;
            if seen == instance as i64 {
                let mut out = String::with_capacity(text.len());
                out.push_str(&text[..at]);
                out.push_str(&new);
                out.push_str(&text[at + old.len()..]);
                return FormulaArgument::text(out);
            }
            search_from = at + old.len();
        }
        FormulaArgument::text(text)
    } else {
        FormulaArgument::text(text.replace(&old, &new))
    }
}

pub fn fn_textjoin(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let delimiter = try_text!(args[0]);
    let ignore_empty = try_bool!(args[1]);
    let mut parts = Vec::new();
    for arg in &args[2..] {
        for value in arg.flatten() {
            if value.is_error() {
                return value.unwrap_cell().clone();
            }
            let text = value.to_text();
            if !(ignore_empty && text.is_empty()) {
                parts.push(text);
            }
        }
    }
    FormulaArgument::text(parts.join(&delimiter))
}

pub fn fn_value(_ctx: &FnCtx, args: &[FormulaArgument]) -> FormulaArgument {
    let text = try_text!(args[0]);
    let trimmed = text.trim().replace(',', "");
    if let Ok(n) = trimmed.parse::<f64>() {
        return FormulaArgument::number(n);
    }
    if let Some(body) = trimmed.strip_suffix('%') {
        if let Ok(n) = body.trim().parse::<f64>() {
            return FormulaArgument::number(n / 100.0);
        }
    }
    FormulaArgument::error_msg(ErrorKind::Value, format!("cannot convert {text:?} to number"))
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
    fn test_slicing_is_char_based() {
        assert_eq!(eval("=LEFT(\"héllo\",2)"), FormulaArgument::text("hé"));
        assert_eq!(eval("=RIGHT(\"héllo\",3)"), FormulaArgument::text("llo"));
        assert_eq!(eval("=MID(\"héllo\",2,3)"), FormulaArgument::text("éll"));
        assert_eq!(eval("=LEN(\"héllo\")"), FormulaArgument::number(5.0));
        assert_eq!(eval("=LEFT(\"abc\")"), FormulaArgument::text("a"));
        assert_eq!(
            eval("=MID(\"abc\",0,1)"),
            FormulaArgument::error(ErrorKind::Value)
        );
    }

    #[test]
    fn test_case_and_trim() {
        assert_eq!(eval("=UPPER(\"abc\")"), FormulaArgument::text("ABC"));
        assert_eq!(eval("=LOWER(\"AbC\")"), FormulaArgument::text("abc"));
        assert_eq!(
            eval("=PROPER(\"hello WORLD-two\")"),
            FormulaArgument::text("Hello World-Two")
        );
        assert_eq!(
            eval("=TRIM(\"  a   b  \")"),
            FormulaArgument::text("a b")
        );
    }

    #[test]
    fn test_find_vs_search() {
        assert_eq!(eval("=FIND(\"l\",\"hello\")"), FormulaArgument::number(3.0));
        assert_eq!(eval("=FIND(\"l\",\"hello\",4)"), FormulaArgument::number(4.0));
        assert_eq!(
            eval("=FIND(\"L\",\"hello\")").error_kind(),
            Some(ErrorKind::Value)
        );
        assert_eq!(eval("=SEARCH(\"L\",\"hello\")"), FormulaArgument::number(3.0));
    }

    #[test]
    fn test_substitute() {
        assert_eq!(
            eval("=SUBSTITUTE(\"a-b-c\",\"-\",\"+\")"),
            FormulaArgument::text("a+b+c")
        );
        assert_eq!(
            eval("=SUBSTITUTE(\"a-b-c\",\"-\",\"+\",2)"),
            FormulaArgument::text("a-b+c")
        );
        assert_eq!(
            eval("=SUBSTITUTE(\"a-b\",\"x\",\"y\")"),
            FormulaArgument::text("a-b")
        );
    }

    #[test]
    fn test_replace_rept() {
        assert_eq!(
            eval("=REPLACE(\"abcdef\",2,3,\"X\")"),
            FormulaArgument::text("aXef")
        );
        assert_eq!(eval("=REPT(\"ab\",3)"), FormulaArgument::text("ababab"));
        assert_eq!(eval("=REPT(\"ab\",0)"), FormulaArgument::text(""));
    }

    #[test]
    fn test_join_family() {
        assert_eq!(
            eval("=CONCATENATE(\"a\",1,TRUE)"),
            FormulaArgument::text("a1TRUE")
        );
        assert_eq!(eval("=CONCAT({1,2;3,4})"), FormulaArgument::text("1234"));
        assert_eq!(
            eval("=TEXTJOIN(\",\",TRUE,\"a\",\"\",\"b\")"),
            FormulaArgument::text("a,b")
        );
        assert_eq!(
            eval("=TEXTJOIN(\",\",FALSE,\"a\",\"\",\"b\")"),
            FormulaArgument::text("a,,b")
        );
    }

    #[test]
    fn test_char_code_exact() {
        assert_eq!(eval("=CHAR(65)"), FormulaArgument::text("A"));
        assert_eq!(eval("=CODE(\"A\")"), FormulaArgument::number(65.0));
        assert_eq!(eval("=EXACT(\"a\",\"a\")"), FormulaArgument::bool_value(true));
        assert_eq!(eval("=EXACT(\"a\",\"A\")"), FormulaArgument::bool_value(false));
        assert_eq!(eval("=CHAR(0)"), FormulaArgument::error(ErrorKind::Value));
    }

    #[test]
    fn test_value() {
        assert_eq!(eval("=VALUE(\" 12.5 \")"), FormulaArgument::number(12.5));
        assert_eq!(eval("=VALUE(\"1,234\")"), FormulaArgument::number(1234.0));
        assert_eq!(eval("=VALUE(\"5%\")"), FormulaArgument::number(0.05));
        assert_eq!(
            eval("=VALUE(\"abc\")").error_kind(),
            Some(ErrorKind::Value)
        );
    }
}
