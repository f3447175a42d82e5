//! # gridcalc-lexer
//!
//! Lexical tokenizer for spreadsheet formula text.
//!
//! [`tokenize`] is a pure function turning formula text (without the leading
//! `=`) into a flat token stream. The stream is structurally balanced:
//! every `Function`/`Subexpression` start token has a matching stop token.
//! Array literals `{1,2;3,4}` are emitted as nested pseudo-function calls
//! named `ARRAY` and `ARRAYROW` so the consumer can accumulate rows without
//! special lexical handling.
//!
//! ## Example
//!
//! ```rust
//! use gridcalc_lexer::{tokenize, TokenKind};
//!
//! let tokens = tokenize("SUM(A1:A10)*2");
//! assert_eq!(tokens[0].kind, TokenKind::Function);
//! assert_eq!(tokens[0].value, "SUM");
//! ```

use std::fmt;

/// Token categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// A literal or reference operand
    Operand,
    /// Function call boundary (`Start`/`Stop` subtype)
    Function,
    /// Parenthesized subexpression boundary (`Start`/`Stop` subtype)
    Subexpression,
    /// Function argument separator
    Argument,
    /// Unary prefix operator
    OperatorPrefix,
    /// Binary infix operator
    OperatorInfix,
    /// Unary postfix operator (`%`)
    OperatorPostfix,
    /// Whitespace between tokens
    Whitespace,
    /// Unclassifiable input
    Unknown,
}

/// Token refinement within a kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSubtype {
    None,
    Start,
    Stop,
    Number,
    Text,
    Logical,
    Error,
    /// Cell/range reference text (also defined names; the resolver decides)
    Range,
    Math,
    Concatenation,
    Comparison,
}

/// One lexical token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    pub kind: TokenKind,
    pub subtype: TokenSubtype,
}

impl Token {
    pub fn new<S: Into<String>>(value: S, kind: TokenKind, subtype: TokenSubtype) -> Self {
        Self {
            value: value.into(),
            kind,
            subtype,
        }
    }

    /// True for a `Function`/`Subexpression` start token
    pub fn is_start(&self) -> bool {
        self.subtype == TokenSubtype::Start
    }

    /// True for a `Function`/`Subexpression` stop token
    pub fn is_stop(&self) -> bool {
        self.subtype == TokenSubtype::Stop
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}: {}", self.kind, self.subtype, self.value)
    }
}

const ERROR_CODES: &[&str] = &[
    "#NULL!", "#DIV/0!", "#VALUE!", "#REF!", "#NAME?", "#NUM!", "#N/A", "#SPILL!", "#CALC!",
    "#GETTING_DATA",
];

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    accumulator: String,
    tokens: Vec<Token>,
    // Open Function/Subexpression tokens awaiting their stop marker
    stack: Vec<Token>,
}

/// Tokenize formula text (without the leading `=`) into a token stream
pub fn tokenize(text: &str) -> Vec<Token> {
    Lexer {
        chars: text.chars().collect(),
        pos: 0,
        accumulator: String::new(),
        tokens: Vec::new(),
        stack: Vec::new(),
    }
    .run()
}

impl Lexer {
    fn run(mut self) -> Vec<Token> {
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            match c {
                '"' => self.lex_string(),
                '\'' => self.lex_quoted_sheet(),
                '#' => self.lex_error_code(),
                '{' => {
                    self.flush_operand();
                    self.push_start("ARRAY");
                    self.push_start("ARRAYROW");
                    self.pos += 1;
                }
                '}' => {
                    self.flush_operand();
                    self.push_stop(); // ARRAYROW
                    self.push_stop(); // ARRAY
                    self.pos += 1;
                }
                ';' if self.in_array_row() => {
                    self.flush_operand();
                    self.push_stop(); // ARRAYROW
                    self.tokens
                        .push(Token::new(",", TokenKind::Argument, TokenSubtype::None));
                    self.push_start("ARRAYROW");
                    self.pos += 1;
                }
                ',' => {
                    self.flush_operand();
                    self.tokens
                        .push(Token::new(",", TokenKind::Argument, TokenSubtype::None));
                    self.pos += 1;
                }
                '(' => {
                    // A pending token before `(` is a function name
                    if self.accumulator.is_empty() {
                        self.flush_operand();
                        let token =
                            Token::new("", TokenKind::Subexpression, TokenSubtype::Start);
                        self.stack.push(token.clone());
                        self.tokens.push(token);
                    } else {
                        let name = self.accumulator.to_uppercase();
                        self.accumulator.clear();
                        self.push_start(&name);
                    }
                    self.pos += 1;
                }
                ')' => {
                    self.flush_operand();
                    self.push_stop();
                    self.pos += 1;
                }
                ' ' | '\t' | '\n' | '\r' => {
                    self.flush_operand();
                    self.tokens
                        .push(Token::new(" ", TokenKind::Whitespace, TokenSubtype::None));
                    self.pos += 1;
                }
                '>' | '<' | '=' => self.lex_comparison(),
                '+' | '-' => self.lex_sign(),
                '*' | '/' | '^' => {
                    self.flush_operand();
                    self.tokens.push(Token::new(
                        c.to_string(),
                        TokenKind::OperatorInfix,
                        TokenSubtype::Math,
                    ));
                    self.pos += 1;
                }
                '&' => {
                    self.flush_operand();
                    self.tokens.push(Token::new(
                        "&",
                        TokenKind::OperatorInfix,
                        TokenSubtype::Concatenation,
                    ));
                    self.pos += 1;
                }
                '%' => {
                    self.flush_operand();
                    self.tokens.push(Token::new(
                        "%",
                        TokenKind::OperatorPostfix,
                        TokenSubtype::None,
                    ));
                    self.pos += 1;
                }
                _ => {
                    self.accumulator.push(c);
                    self.pos += 1;
                }
            }
        }
        self.flush_operand();
        self.tokens
            .retain(|t| t.kind != TokenKind::Whitespace);
        self.tokens
    }

    fn in_array_row(&self) -> bool {
        self.stack
            .last()
            .map(|t| t.value == "ARRAYROW")
            .unwrap_or(false)
    }

    fn push_start(&mut self, name: &str) {
        let token = Token::new(name, TokenKind::Function, TokenSubtype::Start);
        self.stack.push(token.clone());
        self.tokens.push(token);
    }

    fn push_stop(&mut self) {
        let kind = match self.stack.pop() {
            Some(open) => open.kind,
            // Unbalanced close; emit a stop anyway and let the evaluator
            // reject the stream
            None => TokenKind::Subexpression,
        };
        self.tokens.push(Token::new("", kind, TokenSubtype::Stop));
    }

    /// String literal; doubled quotes escape a quote
    fn lex_string(&mut self) {
        self.flush_operand();
        self.pos += 1; // opening quote
        let mut s = String::new();
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            if c == '"' {
                if self.chars.get(self.pos + 1) == Some(&'"') {
                    s.push('"');
                    self.pos += 2;
                    continue;
                }
                self.pos += 1;
                break;
            }
            s.push(c);
            self.pos += 1;
        }
        self.tokens
            .push(Token::new(s, TokenKind::Operand, TokenSubtype::Text));
    }

    /// Quoted sheet name: `'My Sheet'!A1`; the quotes are dropped and the
    /// sheet text continues accumulating into a range token
    fn lex_quoted_sheet(&mut self) {
        self.pos += 1; // opening quote
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            if c == '\'' {
                if self.chars.get(self.pos + 1) == Some(&'\'') {
                    self.accumulator.push('\'');
                    self.pos += 2;
                    continue;
                }
                self.pos += 1;
                break;
            }
            self.accumulator.push(c);
            self.pos += 1;
        }
    }

    /// Greedy longest-match against the known error codes
    fn lex_error_code(&mut self) {
        self.flush_operand();
        let rest: String = self.chars[self.pos..].iter().collect();
        let upper = rest.to_uppercase();
        let hit = ERROR_CODES
            .iter()
            .filter(|code| upper.starts_with(**code))
            .max_by_key(|code| code.len());
        match hit {
            Some(code) => {
                self.tokens.push(Token::new(
                    *code,
                    TokenKind::Operand,
                    TokenSubtype::Error,
                ));
                self.pos += code.chars().count();
            }
            None => {
                // Not a recognized error literal; swallow the `#` as unknown
                self.tokens
                    .push(Token::new("#", TokenKind::Unknown, TokenSubtype::None));
                self.pos += 1;
            }
        }
    }

    fn lex_comparison(&mut self) {
        self.flush_operand();
        let c = self.chars[self.pos];
        let next = self.chars.get(self.pos + 1).copied();
        let op = match (c, next) {
            ('>', Some('=')) => ">=",
            ('<', Some('=')) => "<=",
            ('<', Some('>')) => "<>",
            ('>', _) => ">",
            ('<', _) => "<",
            _ => "=",
        };
        self.pos += op.len();
        self.tokens.push(Token::new(
            op,
            TokenKind::OperatorInfix,
            TokenSubtype::Comparison,
        ));
    }

    /// `+`/`-` may be an infix operator, a unary prefix, or part of a
    /// scientific-notation literal like `1E-5`
    fn lex_sign(&mut self) {
        let c = self.chars[self.pos];
        // Inside a numeric literal's exponent the sign accumulates
        if self.accumulator.ends_with(['E', 'e'])
            && self
                .accumulator
                .chars()
                .next()
                .map(|f| f.is_ascii_digit() || f == '.')
                .unwrap_or(false)
        {
            self.accumulator.push(c);
            self.pos += 1;
            return;
        }
        self.flush_operand();
        let prefix_position = match self.last_meaningful() {
            None => true,
            Some(prev) => {
                matches!(
                    prev.kind,
                    TokenKind::OperatorInfix | TokenKind::OperatorPrefix | TokenKind::Argument
                ) || prev.is_start()
            }
        };
        if prefix_position {
            // Leading `+` is a no-op
            if c == '-' {
                self.tokens.push(Token::new(
                    "-",
                    TokenKind::OperatorPrefix,
                    TokenSubtype::None,
                ));
            }
        } else {
            self.tokens.push(Token::new(
                c.to_string(),
                TokenKind::OperatorInfix,
                TokenSubtype::Math,
            ));
        }
        self.pos += 1;
    }

    fn last_meaningful(&self) -> Option<&Token> {
        self.tokens
            .iter()
            .rev()
            .find(|t| t.kind != TokenKind::Whitespace)
    }

    /// Classify and emit the accumulated operand text, if any
    fn flush_operand(&mut self) {
        if self.accumulator.is_empty() {
            return;
        }
        let value = std::mem::take(&mut self.accumulator);
        let subtype = if value.parse::<f64>().is_ok() {
            TokenSubtype::Number
        } else if value.eq_ignore_ascii_case("TRUE") || value.eq_ignore_ascii_case("FALSE") {
            TokenSubtype::Logical
        } else {
            TokenSubtype::Range
        };
        self.tokens
            .push(Token::new(value, TokenKind::Operand, subtype));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(text: &str) -> Vec<(TokenKind, TokenSubtype, String)> {
        tokenize(text)
            .into_iter()
            .map(|t| (t.kind, t.subtype, t.value))
            .collect()
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(
            kinds("1+2*3"),
            vec![
                (TokenKind::Operand, TokenSubtype::Number, "1".into()),
                (TokenKind::OperatorInfix, TokenSubtype::Math, "+".into()),
                (TokenKind::Operand, TokenSubtype::Number, "2".into()),
                (TokenKind::OperatorInfix, TokenSubtype::Math, "*".into()),
                (TokenKind::Operand, TokenSubtype::Number, "3".into()),
            ]
        );
    }

    #[test]
    fn test_function_call() {
        assert_eq!(
            kinds("SUM(A1:A10,2)"),
            vec![
                (TokenKind::Function, TokenSubtype::Start, "SUM".into()),
                (TokenKind::Operand, TokenSubtype::Range, "A1:A10".into()),
                (TokenKind::Argument, TokenSubtype::None, ",".into()),
                (TokenKind::Operand, TokenSubtype::Number, "2".into()),
                (TokenKind::Function, TokenSubtype::Stop, "".into()),
            ]
        );
    }

    #[test]
    fn test_function_name_uppercased() {
        let tokens = tokenize("sum(1)");
        assert_eq!(tokens[0].value, "SUM");
    }

    #[test]
    fn test_nested_functions_balanced() {
        let tokens = tokenize("IF(AND(1,2),SUM(3),4)");
        let starts = tokens.iter().filter(|t| t.is_start()).count();
        let stops = tokens.iter().filter(|t| t.is_stop()).count();
        assert_eq!(starts, 3);
        assert_eq!(stops, 3);
    }

    #[test]
    fn test_string_with_escaped_quote() {
        assert_eq!(
            kinds("\"he said \"\"hi\"\"\""),
            vec![(TokenKind::Operand, TokenSubtype::Text, "he said \"hi\"".into())]
        );
    }

    #[test]
    fn test_prefix_minus() {
        assert_eq!(
            kinds("-5+2"),
            vec![
                (TokenKind::OperatorPrefix, TokenSubtype::None, "-".into()),
                (TokenKind::Operand, TokenSubtype::Number, "5".into()),
                (TokenKind::OperatorInfix, TokenSubtype::Math, "+".into()),
                (TokenKind::Operand, TokenSubtype::Number, "2".into()),
            ]
        );
        // After an operand the minus is infix
        assert_eq!(
            kinds("3-5")[1].0,
            TokenKind::OperatorInfix
        );
        // After a separator it is prefix again
        let tokens = tokenize("SUM(1,-2)");
        assert_eq!(tokens[3].kind, TokenKind::OperatorPrefix);
    }

    #[test]
    fn test_scientific_notation() {
        assert_eq!(
            kinds("1E-5+2"),
            vec![
                (TokenKind::Operand, TokenSubtype::Number, "1E-5".into()),
                (TokenKind::OperatorInfix, TokenSubtype::Math, "+".into()),
                (TokenKind::Operand, TokenSubtype::Number, "2".into()),
            ]
        );
    }

    #[test]
    fn test_comparison_operators() {
        for (text, op) in [
            ("1>=2", ">="),
            ("1<=2", "<="),
            ("1<>2", "<>"),
            ("1>2", ">"),
            ("1<2", "<"),
            ("1=2", "="),
        ] {
            let tokens = tokenize(text);
            assert_eq!(tokens[1].value, op, "in {text}");
            assert_eq!(tokens[1].subtype, TokenSubtype::Comparison);
        }
    }

    #[test]
    fn test_percent_postfix() {
        let tokens = tokenize("50%");
        assert_eq!(tokens[1].kind, TokenKind::OperatorPostfix);
    }

    #[test]
    fn test_array_literal() {
        let values: Vec<String> = tokenize("{1,2;3,4}")
            .into_iter()
            .map(|t| format!("{:?}:{}", t.kind, t.value))
            .collect();
        assert_eq!(
            values,
            vec![
                "Function:ARRAY",
                "Function:ARRAYROW",
                "Operand:1",
                "Argument:,",
                "Operand:2",
                "Function:",
                "Argument:,",
                "Function:ARRAYROW",
                "Operand:3",
                "Argument:,",
                "Operand:4",
                "Function:",
                "Function:",
            ]
        );
    }

    #[test]
    fn test_quoted_sheet_reference() {
        assert_eq!(
            kinds("'My Sheet'!A1"),
            vec![(TokenKind::Operand, TokenSubtype::Range, "My Sheet!A1".into())]
        );
    }

    #[test]
    fn test_error_literal() {
        assert_eq!(
            kinds("#DIV/0!+1"),
            vec![
                (TokenKind::Operand, TokenSubtype::Error, "#DIV/0!".into()),
                (TokenKind::OperatorInfix, TokenSubtype::Math, "+".into()),
                (TokenKind::Operand, TokenSubtype::Number, "1".into()),
            ]
        );
    }

    #[test]
    fn test_subexpression() {
        assert_eq!(
            kinds("(1+2)*3"),
            vec![
                (TokenKind::Subexpression, TokenSubtype::Start, "".into()),
                (TokenKind::Operand, TokenSubtype::Number, "1".into()),
                (TokenKind::OperatorInfix, TokenSubtype::Math, "+".into()),
                (TokenKind::Operand, TokenSubtype::Number, "2".into()),
                (TokenKind::Subexpression, TokenSubtype::Stop, "".into()),
                (TokenKind::OperatorInfix, TokenSubtype::Math, "*".into()),
                (TokenKind::Operand, TokenSubtype::Number, "3".into()),
            ]
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(tokenize("").is_empty());
    }
}
