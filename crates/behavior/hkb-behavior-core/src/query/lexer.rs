//! Query tokenizer.

use crate::error::QueryParseError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    LParen,
    RParen,
    Eq,
    And,
    Or,
    Not,
    /// Unquoted run of characters (path or value).
    Word(String),
    /// Quoted text with escapes resolved.
    Quoted(String),
    /// `[A TO B]`, brackets included.
    Range(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the token in the query text.
    pub offset: usize,
}

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | '=')
}

fn keyword(word: &str) -> Option<TokenKind> {
    if word.eq_ignore_ascii_case("and") {
        Some(TokenKind::And)
    } else if word.eq_ignore_ascii_case("or") {
        Some(TokenKind::Or)
    } else if word.eq_ignore_ascii_case("not") {
        Some(TokenKind::Not)
    } else {
        None
    }
}

pub fn tokenize(src: &str) -> Result<Vec<Token>, QueryParseError> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        let kind = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '(' => {
                chars.next();
                TokenKind::LParen
            }
            ')' => {
                chars.next();
                TokenKind::RParen
            }
            '=' => {
                chars.next();
                TokenKind::Eq
            }
            '"' | '\'' => {
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                while let Some((_, ch)) = chars.next() {
                    match ch {
                        '\\' => match chars.next() {
                            Some((_, escaped)) => text.push(escaped),
                            None => break,
                        },
                        ch if ch == c => {
                            closed = true;
                            break;
                        }
                        ch => text.push(ch),
                    }
                }
                if !closed {
                    return Err(QueryParseError::new(offset, "unterminated quoted string"));
                }
                TokenKind::Quoted(text)
            }
            '[' if range_end(&src[offset..]).is_some() => {
                let len = range_end(&src[offset..]).unwrap_or_default();
                let raw = &src[offset..offset + len];
                while chars.peek().is_some_and(|&(i, _)| i < offset + len) {
                    chars.next();
                }
                TokenKind::Range(raw.to_string())
            }
            _ => {
                let mut word = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if !is_word_char(ch) {
                        break;
                    }
                    word.push(ch);
                    chars.next();
                }
                keyword(&word).unwrap_or(TokenKind::Word(word))
            }
        };
        tokens.push(Token { kind, offset });
    }
    Ok(tokens)
}

/// Byte length of a `[A TO B]` range at the start of `rest`.
fn range_end(rest: &str) -> Option<usize> {
    let close = rest.find(']')?;
    let inner = &rest[1..close];
    (!inner.contains('[') && inner.contains(" TO ")).then_some(close + 1)
}
