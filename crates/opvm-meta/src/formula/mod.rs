//! Computation formulas
//!
//! A computation maps the raw unsigned value decoded from an operand field to
//! its effective value, e.g. `"this + 1"` or `"(this - 1) / 2"`. Formulas are
//! single-variable, pure integer arithmetic over `+ - * /` with the usual
//! precedence, parentheses and unary minus. Division truncates toward zero.

mod lexer;
mod parser;

use thiserror::Error;

/// Variable name bound by operand field computations
pub const DEFAULT_BINDING: &str = "this";

/// Formula syntax tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Integer literal
    Const(i64),
    /// The bound variable
    Var,
    /// Unary minus
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Evaluate with the bound variable set to `value`
    pub fn eval(&self, value: i64) -> Result<i64, FormulaError> {
        match self {
            Expr::Const(n) => Ok(*n),
            Expr::Var => Ok(value),
            Expr::Neg(inner) => inner
                .eval(value)?
                .checked_neg()
                .ok_or(FormulaError::Overflow),
            Expr::Add(a, b) => a
                .eval(value)?
                .checked_add(b.eval(value)?)
                .ok_or(FormulaError::Overflow),
            Expr::Sub(a, b) => a
                .eval(value)?
                .checked_sub(b.eval(value)?)
                .ok_or(FormulaError::Overflow),
            Expr::Mul(a, b) => a
                .eval(value)?
                .checked_mul(b.eval(value)?)
                .ok_or(FormulaError::Overflow),
            Expr::Div(a, b) => {
                let lhs = a.eval(value)?;
                let rhs = b.eval(value)?;
                if rhs == 0 {
                    return Err(FormulaError::DivisionByZero);
                }
                // checked_div truncates toward zero; fails only for MIN / -1
                lhs.checked_div(rhs).ok_or(FormulaError::Overflow)
            }
        }
    }
}

/// Formula errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormulaError {
    #[error("unexpected character '{ch}' at offset {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unexpected '{found}' at offset {pos}")]
    UnexpectedToken { found: String, pos: usize },

    #[error("unexpected end of formula")]
    UnexpectedEnd,

    #[error("unknown variable '{name}' (expected '{expected}')")]
    UnknownVariable { name: String, expected: String },

    #[error("integer literal {literal} does not fit in 64 bits")]
    IntegerTooLarge { literal: String },

    #[error("formula nesting exceeds {max} levels")]
    NestingTooDeep { max: usize },

    #[error("division by zero")]
    DivisionByZero,

    #[error("arithmetic overflow")]
    Overflow,
}

/// A parsed computation formula
///
/// Keeps the original source so the formula can be reported and serialized
/// exactly as it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formula {
    source: String,
    expr: Expr,
}

impl Formula {
    /// Parse a formula whose variable is `this`
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        Self::parse_with_binding(source, DEFAULT_BINDING)
    }

    /// Parse a formula whose single free variable is named `binding`
    ///
    /// Other contexts bind `bits` or `arg` instead of `this`.
    pub fn parse_with_binding(source: &str, binding: &str) -> Result<Self, FormulaError> {
        let expr = parser::parse(source, binding)?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    /// Evaluate the formula for `value`
    pub fn eval(&self, value: i64) -> Result<i64, FormulaError> {
        self.expr.eval(value)
    }

    /// The formula as written
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The parsed syntax tree
    pub fn expr(&self) -> &Expr {
        &self.expr
    }
}

impl std::fmt::Display for Formula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

/// Parse `source` with the default binding and evaluate it for `value`.
pub fn evaluate(source: &str, value: i64) -> Result<i64, FormulaError> {
    Formula::parse(source)?.eval(value)
}
