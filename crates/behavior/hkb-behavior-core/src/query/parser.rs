//! Recursive descent parser for the boolean query grammar.
//!
//! ```text
//! expr     := or_expr
//! or_expr  := and_expr (OR and_expr)*
//! and_expr := not_expr (AND not_expr)*
//! not_expr := NOT not_expr | atom
//! atom     := '(' or_expr ')' | path '=' value | value
//! ```
//!
//! Adjacent terms without an operator are rejected.

use super::lexer::{Token, TokenKind};
use super::pattern::Pattern;
use crate::error::QueryParseError;
use crate::path::FieldPath;

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `path=value`: true when any value the path resolves to matches.
    Field { path: FieldPath, pattern: Pattern },
    /// Bare value: matched against the text of the whole record.
    Value(Pattern),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

struct TokenStream<'t> {
    tokens: &'t [Token],
    pos: usize,
    /// Offset reported for errors at the end of input.
    end: usize,
}

impl<'t> TokenStream<'t> {
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn peek_nth(&self, n: usize) -> Option<&'t Token> {
        self.tokens.get(self.pos + n)
    }

    fn advance(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().is_some_and(|t| t.kind == *kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn offset(&self) -> usize {
        self.peek().map_or(self.end, |t| t.offset)
    }

    fn error(&self, message: impl Into<String>) -> QueryParseError {
        QueryParseError::new(self.offset(), message)
    }
}

/// Parse a token list. An empty list yields `None` (match everything).
pub fn parse(tokens: &[Token], src_len: usize) -> Result<Option<Condition>, QueryParseError> {
    if tokens.is_empty() {
        return Ok(None);
    }
    let mut stream = TokenStream {
        tokens,
        pos: 0,
        end: src_len,
    };
    let condition = or_expr(&mut stream)?;
    if stream.peek().is_some() {
        return Err(stream.error("unexpected term; combine terms with AND or OR"));
    }
    Ok(Some(condition))
}

fn or_expr(s: &mut TokenStream<'_>) -> Result<Condition, QueryParseError> {
    let mut terms = vec![and_expr(s)?];
    while s.eat(&TokenKind::Or) {
        terms.push(and_expr(s)?);
    }
    Ok(flatten(terms, Condition::Or))
}

fn and_expr(s: &mut TokenStream<'_>) -> Result<Condition, QueryParseError> {
    let mut terms = vec![not_expr(s)?];
    while s.eat(&TokenKind::And) {
        terms.push(not_expr(s)?);
    }
    Ok(flatten(terms, Condition::And))
}

fn flatten(mut terms: Vec<Condition>, wrap: fn(Vec<Condition>) -> Condition) -> Condition {
    if terms.len() == 1 {
        terms.remove(0)
    } else {
        wrap(terms)
    }
}

fn not_expr(s: &mut TokenStream<'_>) -> Result<Condition, QueryParseError> {
    if s.eat(&TokenKind::Not) {
        return Ok(Condition::Not(Box::new(not_expr(s)?)));
    }
    atom(s)
}

fn atom(s: &mut TokenStream<'_>) -> Result<Condition, QueryParseError> {
    let Some(token) = s.peek() else {
        return Err(s.error("expected a term"));
    };
    match &token.kind {
        TokenKind::LParen => {
            s.advance();
            let inner = or_expr(s)?;
            if !s.eat(&TokenKind::RParen) {
                return Err(s.error("expected ')'"));
            }
            Ok(inner)
        }
        TokenKind::Word(text) | TokenKind::Quoted(text)
            if s.peek_nth(1).is_some_and(|t| t.kind == TokenKind::Eq) =>
        {
            let path = FieldPath::parse(text)
                .map_err(|e| QueryParseError::new(token.offset, e.to_string()))?;
            s.advance();
            s.advance();
            let pattern = value(s)?;
            Ok(Condition::Field { path, pattern })
        }
        _ => Ok(Condition::Value(value(s)?)),
    }
}

fn value(s: &mut TokenStream<'_>) -> Result<Pattern, QueryParseError> {
    let Some(token) = s.peek() else {
        return Err(s.error("expected a value"));
    };
    let raw = match &token.kind {
        TokenKind::Word(text) | TokenKind::Quoted(text) | TokenKind::Range(text) => text,
        _ => return Err(s.error("expected a value")),
    };
    s.advance();
    Pattern::compile(raw, token.offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::lexer::tokenize;

    fn parse_str(src: &str) -> Result<Option<Condition>, QueryParseError> {
        parse(&tokenize(src)?, src.len())
    }

    fn field(path: &str, pattern: Pattern) -> Condition {
        Condition::Field {
            path: FieldPath::parse(path).unwrap(),
            pattern,
        }
    }

    #[test]
    fn not_binds_tighter_than_or() {
        let cond = parse_str("NOT name='Test Generator' OR selectedGeneratorIndex=5")
            .unwrap()
            .unwrap();
        assert_eq!(
            cond,
            Condition::Or(vec![
                Condition::Not(Box::new(field(
                    "name",
                    Pattern::Exact("test generator".into())
                ))),
                field("selectedGeneratorIndex", Pattern::Exact("5".into())),
            ])
        );
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let cond = parse_str("a=1 or b=2 AND (c=3 OR d=4)").unwrap().unwrap();
        let Condition::Or(terms) = cond else {
            panic!("expected OR at the top");
        };
        assert_eq!(terms.len(), 2);
        assert!(matches!(&terms[1], Condition::And(inner) if inner.len() == 2));
    }

    #[test]
    fn bare_values_and_empty_queries() {
        assert_eq!(
            parse_str("~jump").unwrap(),
            Some(Condition::Value(Pattern::Fuzzy("jump".into())))
        );
        assert_eq!(parse_str("   ").unwrap(), None);
    }

    #[test]
    fn malformed_queries_fail() {
        assert_eq!(parse_str("foo bar").unwrap_err().offset, 4);
        assert!(parse_str("name=").is_err());
        assert!(parse_str("(a=1").is_err());
        assert!(parse_str("a=1 AND").is_err());
        assert!(parse_str("a//b=1").is_err());
        assert!(parse_str("=3").is_err());
        assert!(parse_str("NOT").is_err());
    }
}
