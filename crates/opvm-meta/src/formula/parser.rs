//! Recursive-descent parser for computation formulas
//!
//! Grammar:
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := '-' unary | primary
//! primary := NUMBER | IDENT | '(' expr ')'
//! ```

use super::lexer::{tokenize, Spanned, Token};
use super::{Expr, FormulaError};

/// Maximum nesting of parentheses and unary minus
const MAX_DEPTH: usize = 64;

/// Parse `source`, accepting `binding` as the only free variable.
pub(crate) fn parse(source: &str, binding: &str) -> Result<Expr, FormulaError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
        binding,
    };
    let expr = parser.expr()?;
    if let Some((token, pos)) = parser.peek() {
        return Err(FormulaError::UnexpectedToken {
            found: token.to_string(),
            pos: *pos,
        });
    }
    Ok(expr)
}

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    depth: usize,
    binding: &'a str,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Spanned> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'a Spanned> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn enter(&mut self) -> Result<(), FormulaError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(FormulaError::NestingTooDeep { max: MAX_DEPTH });
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.term()?;
        loop {
            match self.peek() {
                Some((Token::Plus, _)) => {
                    self.advance();
                    let rhs = self.term()?;
                    lhs = Expr::Add(Box::new(lhs), Box::new(rhs));
                }
                Some((Token::Minus, _)) => {
                    self.advance();
                    let rhs = self.term()?;
                    lhs = Expr::Sub(Box::new(lhs), Box::new(rhs));
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn term(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.unary()?;
        loop {
            match self.peek() {
                Some((Token::Star, _)) => {
                    self.advance();
                    let rhs = self.unary()?;
                    lhs = Expr::Mul(Box::new(lhs), Box::new(rhs));
                }
                Some((Token::Slash, _)) => {
                    self.advance();
                    let rhs = self.unary()?;
                    lhs = Expr::Div(Box::new(lhs), Box::new(rhs));
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn unary(&mut self) -> Result<Expr, FormulaError> {
        if let Some((Token::Minus, _)) = self.peek() {
            self.advance();
            self.enter()?;
            let operand = self.unary()?;
            self.depth -= 1;
            return Ok(Expr::Neg(Box::new(operand)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, FormulaError> {
        match self.advance() {
            Some((Token::Number(n), _)) => Ok(Expr::Const(*n)),
            Some((Token::Ident(name), _)) => {
                if name == self.binding {
                    Ok(Expr::Var)
                } else {
                    Err(FormulaError::UnknownVariable {
                        name: name.clone(),
                        expected: self.binding.to_string(),
                    })
                }
            }
            Some((Token::LParen, _)) => {
                self.enter()?;
                let inner = self.expr()?;
                self.depth -= 1;
                match self.advance() {
                    Some((Token::RParen, _)) => Ok(inner),
                    Some((token, pos)) => Err(FormulaError::UnexpectedToken {
                        found: token.to_string(),
                        pos: *pos,
                    }),
                    None => Err(FormulaError::UnexpectedEnd),
                }
            }
            Some((token, pos)) => Err(FormulaError::UnexpectedToken {
                found: token.to_string(),
                pos: *pos,
            }),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }
}
