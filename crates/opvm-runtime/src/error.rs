//! Evaluation errors
//!
//! Every error is fatal to the evaluation that raised it: the VM aborts and
//! hands the error to the embedder without partial results.

use crate::host::HostError;
use crate::operand::OperandError;
use crate::word::Word;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("invalid opcode {opcode:#04x} at source {source_index} pc {pc}")]
    InvalidOpcode {
        opcode: u8,
        source_index: usize,
        pc: usize,
    },

    #[error("invalid operand {operand:#06x} for {opcode}: {reason}")]
    InvalidOperandValue {
        opcode: String,
        operand: u16,
        reason: OperandError,
    },

    #[error("{opcode} needs {needed} value(s) but only {available} are available")]
    StackUnderflow {
        opcode: String,
        needed: usize,
        available: usize,
    },

    #[error("stack depth would exceed the maximum of {max}")]
    StackOverflow { max: usize },

    #[error("call depth would exceed the maximum of {max}")]
    StackDepthExceeded { max: usize },

    #[error("{opcode}: division by zero")]
    DivisionByZero { opcode: String },

    #[error("{opcode}: external read failed: {source}")]
    ExternalReadFailure {
        opcode: String,
        #[source]
        source: HostError,
    },

    #[error("{opcode}: arithmetic overflow")]
    ArithmeticOverflow { opcode: String },

    #[error("context cell (column {column}, row {row}) is out of bounds")]
    ContextOutOfBounds { column: i64, row: Word },

    #[error("source index {index} does not exist")]
    InvalidSourceIndex { index: i64 },

    #[error("constant index {index} does not exist")]
    InvalidConstantIndex { index: i64 },

    #[error("ENSURE failed: value {position} is zero")]
    EnsureFailed { position: usize },

    #[error("evaluation left {actual} value(s) but {expected} were requested")]
    MissingOutputs { expected: usize, actual: usize },
}

/// Result type for evaluation
pub type RuntimeResult<T> = Result<T, RuntimeError>;
