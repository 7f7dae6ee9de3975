//! Word arithmetic for fold and fixed behaviors
//!
//! Values arrive in push order: `values[0]` is the deepest value consumed and
//! the leftmost operand of the fold.

use super::{FixedOp, FoldOp};
use crate::word::Word;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithError {
    DivisionByZero,
    Overflow,
    /// ENSURE saw a zero at this position
    EnsureFailed(usize),
}

/// Fold `values` left to right (zero for an empty slice).
///
/// EVERY keeps the running value until a zero appears, so it yields the last
/// value when all are non-zero. ANY keeps the first non-zero value.
pub fn fold(op: FoldOp, values: &[Word]) -> Result<Word, ArithError> {
    let Some((&first, rest)) = values.split_first() else {
        return Ok(Word::ZERO);
    };
    rest.iter().try_fold(first, |acc, &value| step(op, acc, value))
}

fn step(op: FoldOp, acc: Word, value: Word) -> Result<Word, ArithError> {
    match op {
        FoldOp::Add => acc.checked_add(value).ok_or(ArithError::Overflow),
        FoldOp::Sub => acc.checked_sub(value).ok_or(ArithError::Overflow),
        FoldOp::Mul => acc.checked_mul(value).ok_or(ArithError::Overflow),
        FoldOp::Div => acc.checked_div(value).ok_or(ArithError::DivisionByZero),
        FoldOp::Mod => acc.checked_rem(value).ok_or(ArithError::DivisionByZero),
        FoldOp::Exp => acc.checked_pow(value).ok_or(ArithError::Overflow),
        FoldOp::Max => Ok(acc.max(value)),
        FoldOp::Min => Ok(acc.min(value)),
        FoldOp::Every if acc.is_zero() || value.is_zero() => Ok(Word::ZERO),
        FoldOp::Every => Ok(value),
        FoldOp::Any if acc.is_zero() => Ok(value),
        FoldOp::Any => Ok(acc),
    }
}

/// Apply a fixed op to its inputs (push order), returning its outputs.
pub fn fixed(op: FixedOp, values: &[Word]) -> Result<Vec<Word>, ArithError> {
    let binary = |f: fn(&Word, &Word) -> bool| vec![Word::from(f(&values[0], &values[1]))];
    Ok(match op {
        FixedOp::IsZero => vec![Word::from(values[0].is_zero())],
        FixedOp::EqualTo => binary(|a, b| a == b),
        FixedOp::GreaterThan => binary(|a, b| a > b),
        FixedOp::LessThan => binary(|a, b| a < b),
        FixedOp::GreaterThanOrEqualTo => binary(|a, b| a >= b),
        FixedOp::LessThanOrEqualTo => binary(|a, b| a <= b),
        FixedOp::EagerIf => {
            let chosen = if values[0].is_zero() { values[2] } else { values[1] };
            vec![chosen]
        }
        FixedOp::Ensure => {
            if let Some(position) = values.iter().position(Word::is_zero) {
                return Err(ArithError::EnsureFailed(position));
            }
            Vec::new()
        }
    })
}
