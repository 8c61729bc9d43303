//! Recursive-descent parser for the filter text DSL.
//!
//! Grammar (AND binds tighter than OR, parentheses override):
//!
//! ```text
//! filter     := or?
//! or         := and ("||" and)*
//! and        := unary ("&&" unary)*
//! unary      := "!" unary | "(" or ")" | comparison
//! comparison := IDENT op value | IDENT "in" list | IDENT "nin" list
//! op         := "==" | "!=" | ">" | ">=" | "<" | "<="
//! list       := "[" value ("," value)* "]"
//! value      := STRING | NUMBER | "true" | "false"
//! ```
//!
//! String literals are single-quoted with `\'` and `\\` escapes; numbers are
//! unquoted (i64 where possible, f64 otherwise). Errors report the byte
//! offset of the offending token and the expected-token set; no partial
//! result is ever returned.

use crate::expr::{CompareOp, Filter, FilterError, FilterExpr, FilterValue};

/// Parse a filter from DSL text. Empty input yields [`Filter::none`].
pub fn parse(input: &str) -> Result<Filter, FilterError> {
    let tokens = lex(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    if matches!(parser.current().1, Token::Eof) {
        return Ok(Filter::none());
    }
    let expr = parser.parse_or()?;
    match parser.current().1 {
        Token::Eof => Ok(Filter::new(expr)),
        _ => Err(parser.error("'&&', '||', or end of input")),
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    AndAnd,
    OrOr,
    Bang,
    EqEq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    Eof,
}

fn describe(token: &Token) -> String {
    match token {
        Token::Ident(name) => format!("'{name}'"),
        Token::Str(s) => format!("string '{s}'"),
        Token::Int(i) => format!("number {i}"),
        Token::Float(f) => format!("number {f}"),
        Token::LParen => "'('".to_string(),
        Token::RParen => "')'".to_string(),
        Token::LBracket => "'['".to_string(),
        Token::RBracket => "']'".to_string(),
        Token::Comma => "','".to_string(),
        Token::AndAnd => "'&&'".to_string(),
        Token::OrOr => "'||'".to_string(),
        Token::Bang => "'!'".to_string(),
        Token::EqEq => "'=='".to_string(),
        Token::NotEq => "'!='".to_string(),
        Token::Gt => "'>'".to_string(),
        Token::Gte => "'>='".to_string(),
        Token::Lt => "'<'".to_string(),
        Token::Lte => "'<='".to_string(),
        Token::Eof => "end of input".to_string(),
    }
}

fn lex(input: &str) -> Result<Vec<(usize, Token)>, FilterError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let start = pos;
        let b = bytes[pos];
        match b {
            b' ' | b'\t' | b'\r' | b'\n' => {
                pos += 1;
            }
            b'(' => {
                tokens.push((start, Token::LParen));
                pos += 1;
            }
            b')' => {
                tokens.push((start, Token::RParen));
                pos += 1;
            }
            b'[' => {
                tokens.push((start, Token::LBracket));
                pos += 1;
            }
            b']' => {
                tokens.push((start, Token::RBracket));
                pos += 1;
            }
            b',' => {
                tokens.push((start, Token::Comma));
                pos += 1;
            }
            b'&' => {
                if bytes.get(pos + 1) == Some(&b'&') {
                    tokens.push((start, Token::AndAnd));
                    pos += 2;
                } else {
                    return Err(lex_error(start, "'&&'", "'&'"));
                }
            }
            b'|' => {
                if bytes.get(pos + 1) == Some(&b'|') {
                    tokens.push((start, Token::OrOr));
                    pos += 2;
                } else {
                    return Err(lex_error(start, "'||'", "'|'"));
                }
            }
            b'=' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    tokens.push((start, Token::EqEq));
                    pos += 2;
                } else {
                    return Err(lex_error(start, "'=='", "'='"));
                }
            }
            b'!' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    tokens.push((start, Token::NotEq));
                    pos += 2;
                } else {
                    tokens.push((start, Token::Bang));
                    pos += 1;
                }
            }
            b'>' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    tokens.push((start, Token::Gte));
                    pos += 2;
                } else {
                    tokens.push((start, Token::Gt));
                    pos += 1;
                }
            }
            b'<' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    tokens.push((start, Token::Lte));
                    pos += 2;
                } else {
                    tokens.push((start, Token::Lt));
                    pos += 1;
                }
            }
            b'\'' => {
                let (token, next) = lex_string(input, pos)?;
                tokens.push((start, token));
                pos = next;
            }
            b'-' | b'0'..=b'9' => {
                let (token, next) = lex_number(input, pos)?;
                tokens.push((start, token));
                pos = next;
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                let mut end = pos + 1;
                while end < bytes.len()
                    && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
                {
                    end += 1;
                }
                tokens.push((start, Token::Ident(input[pos..end].to_string())));
                pos = end;
            }
            _ => {
                let ch = input[pos..].chars().next().unwrap_or('?');
                return Err(lex_error(start, "a token", &format!("'{ch}'")));
            }
        }
    }

    tokens.push((pos, Token::Eof));
    Ok(tokens)
}

fn lex_error(offset: usize, expected: &str, found: &str) -> FilterError {
    FilterError::Parse {
        offset,
        expected: expected.to_string(),
        found: found.to_string(),
    }
}

/// Lex a single-quoted string literal starting at `start`. Supports `\'` and
/// `\\` escapes.
fn lex_string(input: &str, start: usize) -> Result<(Token, usize), FilterError> {
    let bytes = input.as_bytes();
    let mut out = String::new();
    let mut pos = start + 1;

    while pos < bytes.len() {
        match bytes[pos] {
            b'\'' => return Ok((Token::Str(out), pos + 1)),
            b'\\' => match bytes.get(pos + 1) {
                Some(b'\'') => {
                    out.push('\'');
                    pos += 2;
                }
                Some(b'\\') => {
                    out.push('\\');
                    pos += 2;
                }
                _ => return Err(lex_error(pos, "an escaped character", "'\\'")),
            },
            _ => {
                let ch = input[pos..].chars().next().unwrap_or('?');
                out.push(ch);
                pos += ch.len_utf8();
            }
        }
    }

    Err(lex_error(start, "a closing quote", "end of input"))
}

fn lex_number(input: &str, start: usize) -> Result<(Token, usize), FilterError> {
    let bytes = input.as_bytes();
    let mut pos = start;
    if bytes[pos] == b'-' {
        pos += 1;
    }
    let digits_start = pos;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos == digits_start {
        return Err(lex_error(start, "a number", "'-'"));
    }
    let mut is_float = false;
    if pos < bytes.len() && bytes[pos] == b'.' {
        is_float = true;
        pos += 1;
        let frac_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
        if pos == frac_start {
            return Err(lex_error(pos, "a digit", "'.'"));
        }
    }

    let text = &input[start..pos];
    let token = if is_float {
        Token::Float(text.parse().map_err(|_| lex_error(start, "a number", text))?)
    } else {
        match text.parse::<i64>() {
            Ok(i) => Token::Int(i),
            // i64 overflow falls back to float.
            Err(_) => Token::Float(text.parse().map_err(|_| lex_error(start, "a number", text))?),
        }
    };
    Ok((token, pos))
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser {
    fn current(&self) -> &(usize, Token) {
        &self.tokens[self.pos]
    }

    fn bump(&mut self) -> (usize, Token) {
        let token = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, expected: &str) -> FilterError {
        let (offset, token) = self.current();
        FilterError::Parse {
            offset: *offset,
            expected: expected.to_string(),
            found: describe(token),
        }
    }

    fn parse_or(&mut self) -> Result<FilterExpr, FilterError> {
        let mut children = vec![self.parse_and()?];
        while matches!(self.current().1, Token::OrOr) {
            self.bump();
            children.push(self.parse_and()?);
        }
        if children.len() == 1 {
            Ok(children.pop().unwrap())
        } else {
            Ok(FilterExpr::Or(children))
        }
    }

    fn parse_and(&mut self) -> Result<FilterExpr, FilterError> {
        let mut children = vec![self.parse_unary()?];
        while matches!(self.current().1, Token::AndAnd) {
            self.bump();
            children.push(self.parse_unary()?);
        }
        if children.len() == 1 {
            Ok(children.pop().unwrap())
        } else {
            Ok(FilterExpr::And(children))
        }
    }

    fn parse_unary(&mut self) -> Result<FilterExpr, FilterError> {
        match &self.current().1 {
            Token::Bang => {
                self.bump();
                Ok(self.parse_unary()?.negate())
            }
            Token::LParen => {
                self.bump();
                let inner = self.parse_or()?;
                match self.current().1 {
                    Token::RParen => {
                        self.bump();
                        Ok(inner)
                    }
                    _ => Err(self.error("')'")),
                }
            }
            Token::Ident(_) => self.parse_comparison(),
            _ => Err(self.error("a field name, '!', or '('")),
        }
    }

    fn parse_comparison(&mut self) -> Result<FilterExpr, FilterError> {
        let field = match self.bump().1 {
            Token::Ident(name) => name,
            _ => unreachable!("parse_comparison called without an identifier"),
        };

        let op = match &self.current().1 {
            Token::EqEq => Some(CompareOp::Eq),
            Token::NotEq => Some(CompareOp::Ne),
            Token::Gt => Some(CompareOp::Gt),
            Token::Gte => Some(CompareOp::Gte),
            Token::Lt => Some(CompareOp::Lt),
            Token::Lte => Some(CompareOp::Lte),
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            let value = self.parse_value()?;
            return Ok(FilterExpr::Compare { field, op, value });
        }

        match &self.current().1 {
            Token::Ident(kw) if kw.eq_ignore_ascii_case("in") => {
                self.bump();
                let values = self.parse_list()?;
                Ok(FilterExpr::In { field, values })
            }
            Token::Ident(kw) if kw.eq_ignore_ascii_case("nin") => {
                self.bump();
                let values = self.parse_list()?;
                Ok(FilterExpr::NotIn { field, values })
            }
            _ => Err(self.error("'==', '!=', '>', '>=', '<', '<=', 'in', or 'nin'")),
        }
    }

    fn parse_list(&mut self) -> Result<Vec<FilterValue>, FilterError> {
        match self.current().1 {
            Token::LBracket => {
                self.bump();
            }
            _ => return Err(self.error("'['")),
        }

        // An empty membership list is invalid by construction.
        if matches!(self.current().1, Token::RBracket) {
            return Err(FilterError::EmptyValueList);
        }

        let mut values = vec![self.parse_value()?];
        loop {
            match self.current().1 {
                Token::Comma => {
                    self.bump();
                    values.push(self.parse_value()?);
                }
                Token::RBracket => {
                    self.bump();
                    return Ok(values);
                }
                _ => return Err(self.error("',' or ']'")),
            }
        }
    }

    fn parse_value(&mut self) -> Result<FilterValue, FilterError> {
        match &self.current().1 {
            Token::Str(_) | Token::Int(_) | Token::Float(_) => match self.bump().1 {
                Token::Str(s) => Ok(FilterValue::String(s)),
                Token::Int(i) => Ok(FilterValue::Int(i)),
                Token::Float(f) => Ok(FilterValue::Float(f)),
                _ => unreachable!(),
            },
            Token::Ident(kw) if kw.eq_ignore_ascii_case("true") => {
                self.bump();
                Ok(FilterValue::Bool(true))
            }
            Token::Ident(kw) if kw.eq_ignore_ascii_case("false") => {
                self.bump();
                Ok(FilterValue::Bool(false))
            }
            _ => Err(self.error("a string, number, or boolean")),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
