//! Server-side filter expression evaluation for the embedded backend.
//!
//! Covers the query-language subset the filter compiler emits (plus what
//! callers pass as raw expressions): `column eq literal`, `and`, `or`, and
//! parentheses, with single-quoted string literals and signed integers.
//! A remote table service evaluates these expressions itself; the embedded
//! backend has to do it here.

use serde_json::Value;

use crate::error::TableError;
use crate::table::WireRow;

/// A parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Eq { column: String, literal: Literal },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Int(i64),
}

impl Expr {
    /// Parse a filter expression. Malformed input is `TableError::Filter`.
    pub fn parse(input: &str) -> Result<Expr, TableError> {
        let tokens = tokenize(input).map_err(TableError::Filter)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or().map_err(TableError::Filter)?;
        if parser.pos != parser.tokens.len() {
            return Err(TableError::Filter(format!(
                "trailing input after expression: {input:?}"
            )));
        }
        Ok(expr)
    }

    /// Evaluate against a wire row. Missing columns never match.
    pub fn matches(&self, row: &WireRow) -> bool {
        match self {
            Expr::Eq { column, literal } => match (row.get(column), literal) {
                (Some(Value::String(s)), Literal::Str(l)) => s == l,
                (Some(Value::Number(n)), Literal::Int(l)) => n.as_i64() == Some(*l),
                _ => false,
            },
            Expr::And(a, b) => a.matches(row) && b.matches(row),
            Expr::Or(a, b) => a.matches(row) || b.matches(row),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    LParen,
    RParen,
    Eq,
    And,
    Or,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' => {
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
            '\'' => {
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(other) => value.push(other),
                        None => return Err("unterminated string literal".to_string()),
                    }
                }
                tokens.push(Token::Str(value));
            }
            '-' | '0'..='9' => {
                let mut number = String::new();
                if c == '-' {
                    number.push(c);
                    chars.next();
                }
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        number.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let parsed = number
                    .parse::<i64>()
                    .map_err(|_| format!("bad integer literal {number:?}"))?;
                tokens.push(Token::Int(parsed));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        ident.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(match ident.as_str() {
                    "eq" => Token::Eq,
                    "and" => Token::And,
                    "or" => Token::Or,
                    _ => Token::Ident(ident),
                });
            }
            other => return Err(format!("unexpected character {other:?}")),
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
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.next();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_primary()?;
        while self.peek() == Some(&Token::And) {
            self.next();
            let right = self.parse_primary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err("missing closing parenthesis".to_string()),
                }
            }
            Some(Token::Ident(column)) => {
                if self.next() != Some(Token::Eq) {
                    return Err(format!("expected 'eq' after column {column:?}"));
                }
                let literal = match self.next() {
                    Some(Token::Str(s)) => Literal::Str(s),
                    Some(Token::Int(i)) => Literal::Int(i),
                    other => return Err(format!("expected literal, found {other:?}")),
                };
                Ok(Expr::Eq { column, literal })
            }
            other => Err(format!("expected comparison, found {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> WireRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn single_equality_on_string() {
        let expr = Expr::parse("state eq 'init'").unwrap();
        assert!(expr.matches(&row(&[("state", json!("init"))])));
        assert!(!expr.matches(&row(&[("state", json!("busy"))])));
        assert!(!expr.matches(&row(&[])));
    }

    #[test]
    fn integer_equality_is_numeric() {
        let expr = Expr::parse("priority eq -2").unwrap();
        assert!(expr.matches(&row(&[("priority", json!(-2))])));
        assert!(!expr.matches(&row(&[("priority", json!("-2"))])));
    }

    #[test]
    fn or_group_and_conjunction() {
        let expr =
            Expr::parse("(state eq 'init' or state eq 'halt') and PartitionKey eq 'linux'")
                .unwrap();
        assert!(expr.matches(&row(&[
            ("state", json!("halt")),
            ("PartitionKey", json!("linux"))
        ])));
        assert!(!expr.matches(&row(&[
            ("state", json!("halt")),
            ("PartitionKey", json!("windows"))
        ])));
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let expr = Expr::parse("a eq 1 or b eq 2 and c eq 3").unwrap();
        // Parsed as: a eq 1 or (b eq 2 and c eq 3)
        assert!(expr.matches(&row(&[("a", json!(1))])));
        assert!(!expr.matches(&row(&[("b", json!(2))])));
        assert!(expr.matches(&row(&[("b", json!(2)), ("c", json!(3))])));
    }

    #[test]
    fn malformed_input_is_rejected() {
        for bad in [
            "",
            "state eq",
            "state 'init'",
            "(state eq 'init'",
            "state eq 'unterminated",
            "state eq 'a' garbage",
            "state eq 1.5",
        ] {
            assert!(
                matches!(Expr::parse(bad), Err(TableError::Filter(_))),
                "{bad:?} should fail to parse"
            );
        }
    }
}
