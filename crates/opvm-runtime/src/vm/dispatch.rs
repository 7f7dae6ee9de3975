//! Per-cell dispatch
//!
//! Looks a cell's opcode up in the runtime table, decodes its operand and runs
//! the behavior decided at load time.

use super::Execution;
use crate::bytecode::Cell;
use crate::error::{RuntimeError, RuntimeResult};
use crate::operand::{DecodedOperand, OperandError, Slot};
use crate::ops::arith::{self, ArithError};
use crate::ops::{Behavior, ExternalOp, FixedOp, FoldOp, StoreOp};
use crate::word::Word;
use tracing::trace;

/// A decoded cell ready to execute
pub(super) struct Instruction<'t> {
    pub name: &'t str,
    pub raw: u16,
    pub operand: DecodedOperand,
}

impl Instruction<'_> {
    pub fn invalid(&self, reason: OperandError) -> RuntimeError {
        RuntimeError::InvalidOperandValue {
            opcode: self.name.to_string(),
            operand: self.raw,
            reason,
        }
    }

    fn arith_error(&self, err: ArithError) -> RuntimeError {
        match err {
            ArithError::DivisionByZero => RuntimeError::DivisionByZero {
                opcode: self.name.to_string(),
            },
            ArithError::Overflow => RuntimeError::ArithmeticOverflow {
                opcode: self.name.to_string(),
            },
            ArithError::EnsureFailed(position) => RuntimeError::EnsureFailed { position },
        }
    }
}

impl<'a> Execution<'a> {
    /// Execute the cell at `pc` of the current frame.
    pub(super) fn step(&mut self, cell: Cell, pc: usize) -> RuntimeResult<()> {
        let table = self.table;
        let entry = table
            .entry(cell.opcode)
            .ok_or_else(|| RuntimeError::InvalidOpcode {
                opcode: cell.opcode,
                source_index: self.frames.last().map_or(0, |frame| frame.source_index),
                pc,
            })?;
        let operand =
            entry
                .layout()
                .decode(cell.operand)
                .map_err(|reason| RuntimeError::InvalidOperandValue {
                    opcode: entry.name().to_string(),
                    operand: cell.operand,
                    reason,
                })?;
        let instruction = Instruction {
            name: entry.name(),
            raw: cell.operand,
            operand,
        };

        trace!(
            opcode = instruction.name,
            operand = cell.operand,
            inputs = operand.inputs,
            outputs = operand.outputs,
            depth = self.stack.len(),
            "step"
        );

        match entry.behavior() {
            Behavior::Constant => self.constant(&instruction),
            Behavior::Stack => self.copy_stack(&instruction),
            Behavior::Context => {
                let row = operand.slot(Slot::Row);
                let row = Word::from(u64::try_from(row).unwrap_or(u64::MAX));
                let value = self.context_cell(operand.slot(Slot::Column), row)?;
                self.push(value)
            }
            Behavior::ContextRow => {
                let row = self.pop_n(instruction.name, 1)?;
                let value = self.context_cell(operand.slot(Slot::Column), row[0])?;
                self.push(value)
            }
            Behavior::Fold(op) => self.fold(&instruction, op),
            Behavior::Fixed(op) => self.fixed(&instruction, op),
            Behavior::Store(op) => self.store(&instruction, op),
            Behavior::ExternalRead(op) => self.external_read(&instruction, op),
            Behavior::Call => self.call(&instruction),
            Behavior::LoopN => self.loop_n(&instruction),
            Behavior::DoWhile => self.do_while(&instruction),
            Behavior::FoldContext => self.fold_context(&instruction),
            Behavior::ZipMap => self.zipmap(&instruction),
        }
    }

    fn constant(&mut self, instruction: &Instruction<'_>) -> RuntimeResult<()> {
        let index = instruction.operand.slot(Slot::ConstantIndex);
        let value = usize::try_from(index)
            .ok()
            .and_then(|i| self.program.constant(i))
            .ok_or(RuntimeError::InvalidConstantIndex { index })?;
        self.push(value)
    }

    /// Copy a value of the current frame, counted from its base.
    fn copy_stack(&mut self, instruction: &Instruction<'_>) -> RuntimeResult<()> {
        let index = instruction.operand.slot(Slot::StackIndex);
        let base = self.stack_base();
        let value = usize::try_from(index)
            .ok()
            .and_then(|i| self.stack.get(base + i))
            .copied();
        match value {
            Some(value) => self.push(value),
            None => Err(RuntimeError::StackUnderflow {
                opcode: instruction.name.to_string(),
                needed: usize::try_from(index).map_or(0, |i| i + 1),
                available: self.available(),
            }),
        }
    }

    pub(super) fn context_cell(&self, column: i64, row: Word) -> RuntimeResult<Word> {
        let out_of_bounds = || RuntimeError::ContextOutOfBounds { column, row };
        let column_index = usize::try_from(column).map_err(|_| out_of_bounds())?;
        let row_index = row.to_usize().ok_or_else(out_of_bounds)?;
        self.context
            .get(column_index)
            .and_then(|cells| cells.get(row_index))
            .copied()
            .ok_or_else(out_of_bounds)
    }

    fn fold(&mut self, instruction: &Instruction<'_>, op: FoldOp) -> RuntimeResult<()> {
        if instruction.operand.inputs == 0 {
            return Err(instruction.invalid(OperandError::TooFewInputs {
                needed: 1,
                found: 0,
            }));
        }
        let values = self.pop_n(instruction.name, instruction.operand.inputs)?;
        let result = arith::fold(op, &values).map_err(|e| instruction.arith_error(e))?;
        self.push(result)
    }

    fn fixed(&mut self, instruction: &Instruction<'_>, op: FixedOp) -> RuntimeResult<()> {
        let values = self.pop_n(instruction.name, instruction.operand.inputs)?;
        let results = arith::fixed(op, &values).map_err(|e| instruction.arith_error(e))?;
        self.push_all(results)
    }

    fn store(&mut self, instruction: &Instruction<'_>, op: StoreOp) -> RuntimeResult<()> {
        match op {
            StoreOp::Get => {
                let key = self.pop_n(instruction.name, 1)?[0];
                let value = match self.writes.get(&key) {
                    Some(&value) => value,
                    None => self.host.get(&key).map_err(|source| {
                        RuntimeError::ExternalReadFailure {
                            opcode: instruction.name.to_string(),
                            source,
                        }
                    })?,
                };
                self.push(value)
            }
            StoreOp::Set => {
                let pair = self.pop_n(instruction.name, 2)?;
                self.writes.insert(pair[0], pair[1]);
                Ok(())
            }
        }
    }

    fn external_read(&mut self, instruction: &Instruction<'_>, op: ExternalOp) -> RuntimeResult<()> {
        let needed = op.parameter_count();
        let found = instruction.operand.inputs;
        if found < needed {
            return Err(instruction.invalid(OperandError::TooFewInputs { needed, found }));
        }
        let values = self.pop_n(instruction.name, found)?;
        let (params, context) = values.split_at(needed);

        let host = self.host;
        let result = match op {
            ExternalOp::Erc20BalanceOf => host.erc20_balance_of(&params[0], &params[1]),
            ExternalOp::Erc20TotalSupply => host.erc20_total_supply(&params[0]),
            ExternalOp::Erc721BalanceOf => host.erc721_balance_of(&params[0], &params[1]),
            ExternalOp::Erc721OwnerOf => host.erc721_owner_of(&params[0], &params[1]),
            ExternalOp::Erc1155BalanceOf => {
                host.erc1155_balance_of(&params[0], &params[1], &params[2])
            }
            ExternalOp::TierReport => host.tier_report(&params[0], &params[1], context),
            ExternalOp::TierReportTimeForTier => {
                host.tier_report_time_for_tier(&params[0], &params[1], &params[2], context)
            }
        }
        .map_err(|source| RuntimeError::ExternalReadFailure {
            opcode: instruction.name.to_string(),
            source,
        })?;
        self.push(result)
    }
}
