//! Tokenizer for computation formulas

use super::FormulaError;

/// Formula token
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Number(i64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{}", n),
            Token::Ident(name) => write!(f, "{}", name),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
        }
    }
}

/// A token paired with the byte offset it starts at
pub(crate) type Spanned = (Token, usize);

/// Split `source` into tokens.
///
/// Whitespace is insignificant. Identifiers are ASCII letters, digits and
/// underscores, starting with a letter or underscore.
pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>, FormulaError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        match c {
            b' ' | b'\t' | b'\n' | b'\r' => pos += 1,
            b'+' => {
                tokens.push((Token::Plus, pos));
                pos += 1;
            }
            b'-' => {
                tokens.push((Token::Minus, pos));
                pos += 1;
            }
            b'*' => {
                tokens.push((Token::Star, pos));
                pos += 1;
            }
            b'/' => {
                tokens.push((Token::Slash, pos));
                pos += 1;
            }
            b'(' => {
                tokens.push((Token::LParen, pos));
                pos += 1;
            }
            b')' => {
                tokens.push((Token::RParen, pos));
                pos += 1;
            }
            b'0'..=b'9' => {
                let start = pos;
                while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                    pos += 1;
                }
                let literal = &source[start..pos];
                let value = literal
                    .parse::<i64>()
                    .map_err(|_| FormulaError::IntegerTooLarge {
                        literal: literal.to_string(),
                    })?;
                tokens.push((Token::Number(value), start));
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let start = pos;
                while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_')
                {
                    pos += 1;
                }
                tokens.push((Token::Ident(source[start..pos].to_string()), start));
            }
            _ => {
                // Report the full character, not a UTF-8 fragment
                let ch = source[pos..].chars().next().unwrap_or('?');
                return Err(FormulaError::UnexpectedChar { ch, pos });
            }
        }
    }

    Ok(tokens)
}
