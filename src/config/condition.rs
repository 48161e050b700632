//! Boolean conditions used by `when` keys in `stencil.toml`.
//!
//! Conditions are parsed once when the descriptor is loaded and evaluated
//! against the render context:
//!
//! ```text
//! router == true && (lint_config == "airbnb" || !strict)
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MetadataError;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// Dotted field path, e.g. `author.name`.
    Field(Vec<String>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    Ne(Box<Expr>, Box<Expr>),
}

/// A parsed condition that keeps its source text for diagnostics and round-tripping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Condition {
    source: String,
    expr: Expr,
}

impl Condition {
    pub fn parse(source: &str) -> Result<Self, MetadataError> {
        let invalid = |reason: String| MetadataError::InvalidCondition {
            expr: source.to_string(),
            reason,
        };
        let tokens = tokenize(source).map_err(invalid)?;
        if tokens.is_empty() {
            return Err(invalid("expression is empty".into()));
        }
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or().map_err(invalid)?;
        if let Some(token) = parser.peek() {
            return Err(invalid(format!("unexpected {token} after expression")));
        }
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn evaluate(&self, context: &BTreeMap<String, Value>) -> bool {
        is_truthy(&self.expr.value(context))
    }

    /// Root names of every field the condition reads, in order of appearance.
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.expr.collect_fields(&mut out);
        out
    }
}

impl TryFrom<String> for Condition {
    type Error = MetadataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Condition::parse(&value)
    }
}

impl From<Condition> for String {
    fn from(condition: Condition) -> Self {
        condition.source
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Expr {
    fn value(&self, context: &BTreeMap<String, Value>) -> Value {
        match self {
            Expr::Literal(v) => v.clone(),
            Expr::Field(path) => lookup(context, path),
            Expr::Not(inner) => Value::Bool(!is_truthy(&inner.value(context))),
            Expr::And(lhs, rhs) => {
                Value::Bool(is_truthy(&lhs.value(context)) && is_truthy(&rhs.value(context)))
            }
            Expr::Or(lhs, rhs) => {
                Value::Bool(is_truthy(&lhs.value(context)) || is_truthy(&rhs.value(context)))
            }
            Expr::Eq(lhs, rhs) => Value::Bool(values_equal(&lhs.value(context), &rhs.value(context))),
            Expr::Ne(lhs, rhs) => {
                Value::Bool(!values_equal(&lhs.value(context), &rhs.value(context)))
            }
        }
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Field(path) => {
                if let Some(root) = path.first() {
                    out.push(root);
                }
            }
            Expr::Not(inner) => inner.collect_fields(out),
            Expr::And(lhs, rhs) | Expr::Or(lhs, rhs) | Expr::Eq(lhs, rhs) | Expr::Ne(lhs, rhs) => {
                lhs.collect_fields(out);
                rhs.collect_fields(out);
            }
        }
    }
}

fn lookup(context: &BTreeMap<String, Value>, path: &[String]) -> Value {
    let Some((root, rest)) = path.split_first() else {
        return Value::Null;
    };
    let mut current = match context.get(root) {
        Some(v) => v,
        None => return Value::Null,
    };
    for key in rest {
        match current.get(key.as_str()) {
            Some(v) => current = v,
            None => return Value::Null,
        }
    }
    current.clone()
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => lhs == rhs,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    Not,
    And,
    Or,
    Eq,
    Ne,
    Ident(String),
    Str(String),
    Num(f64),
    True,
    False,
    Null,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::Not => f.write_str("'!'"),
            Token::And => f.write_str("'&&'"),
            Token::Or => f.write_str("'||'"),
            Token::Eq => f.write_str("'=='"),
            Token::Ne => f.write_str("'!='"),
            Token::Ident(name) => write!(f, "field '{name}'"),
            Token::Str(s) => write!(f, "string \"{s}\""),
            Token::Num(n) => write!(f, "number {n}"),
            Token::True => f.write_str("'true'"),
            Token::False => f.write_str("'false'"),
            Token::Null => f.write_str("'null'"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '!' => {
                chars.next();
                if chars.next_if(|&(_, c)| c == '=').is_some() {
                    tokens.push(Token::Ne);
                } else {
                    tokens.push(Token::Not);
                }
            }
            '=' | '&' | '|' => {
                chars.next();
                if chars.next_if(|&(_, next)| next == c).is_none() {
                    return Err(format!("expected '{c}{c}' at offset {offset}"));
                }
                tokens.push(match c {
                    '=' => Token::Eq,
                    '&' => Token::And,
                    _ => Token::Or,
                });
            }
            '"' | '\'' => {
                chars.next();
                let mut s = String::new();
                let mut closed = false;
                while let Some((_, ch)) = chars.next() {
                    match ch {
                        '\\' => {
                            if let Some((_, escaped)) = chars.next() {
                                s.push(escaped);
                            }
                        }
                        ch if ch == c => {
                            closed = true;
                            break;
                        }
                        ch => s.push(ch),
                    }
                }
                if !closed {
                    return Err(format!("unterminated string starting at offset {offset}"));
                }
                tokens.push(Token::Str(s));
            }
            c if c.is_ascii_digit() || c == '-' => {
                chars.next();
                let mut literal = String::from(c);
                while let Some((_, ch)) = chars.next_if(|&(_, ch)| ch.is_ascii_digit() || ch == '.') {
                    literal.push(ch);
                }
                let n: f64 = literal
                    .parse()
                    .map_err(|_| format!("invalid number '{literal}' at offset {offset}"))?;
                tokens.push(Token::Num(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some((_, ch)) =
                    chars.next_if(|&(_, ch)| ch.is_alphanumeric() || ch == '_' || ch == '.')
                {
                    ident.push(ch);
                }
                tokens.push(match ident.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => Token::Ident(ident),
                });
            }
            other => return Err(format!("unexpected character '{other}' at offset {offset}")),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::Or) {
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_not()?;
        while self.eat(&Token::And) {
            let rhs = self.parse_not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, String> {
        if self.eat(&Token::Not) {
            return Ok(Expr::Not(Box::new(self.parse_not()?)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, String> {
        let lhs = self.parse_primary()?;
        if self.eat(&Token::Eq) {
            let rhs = self.parse_primary()?;
            return Ok(Expr::Eq(Box::new(lhs), Box::new(rhs)));
        }
        if self.eat(&Token::Ne) {
            let rhs = self.parse_primary()?;
            return Ok(Expr::Ne(Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                if !self.eat(&Token::RParen) {
                    return Err("missing closing ')'".into());
                }
                Ok(inner)
            }
            Some(Token::True) => Ok(Expr::Literal(Value::Bool(true))),
            Some(Token::False) => Ok(Expr::Literal(Value::Bool(false))),
            Some(Token::Null) => Ok(Expr::Literal(Value::Null)),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Num(n)) => serde_json::Number::from_f64(n)
                .map(|n| Expr::Literal(Value::Number(n)))
                .ok_or_else(|| format!("number {n} is not finite")),
            Some(Token::Ident(name)) => {
                let path: Vec<String> = name.split('.').map(String::from).collect();
                if path.iter().any(String::is_empty) {
                    return Err(format!("invalid field path '{name}'"));
                }
                Ok(Expr::Field(path))
            }
            Some(token) => Err(format!("unexpected {token}")),
            None => Err("unexpected end of expression".into()),
        }
    }
}
