//! Behaviors that run other sources
//!
//! Each call pushes a frame whose base is the first argument handed to the
//! callee. The calling cell only starts the first call; when the callee's
//! frame returns, [`Execution::resume`] takes its top values and either calls
//! again or pushes the final results.

use super::dispatch::Instruction;
use super::frame::{Resume, Return};
use super::Execution;
use crate::error::{RuntimeError, RuntimeResult};
use crate::operand::{OperandError, Slot};
use crate::table::MAX_LOOP_SIZE;
use crate::word::{Word, WORD_BITS};

impl<'a> Execution<'a> {
    /// CALL: inputs become the callee's frame, its top outputs come back.
    pub(super) fn call(&mut self, instruction: &Instruction<'a>) -> RuntimeResult<()> {
        let operand = &instruction.operand;
        let arguments = self.pop_n(instruction.name, operand.inputs)?;
        self.call_source(
            operand.slot(Slot::SourceIndex),
            &arguments,
            Return {
                opcode: instruction.name,
                keep: operand.outputs,
                resume: Resume::Call,
            },
        )
    }

    /// LOOP_N: thread the values through the source `Loop Count` times.
    pub(super) fn loop_n(&mut self, instruction: &Instruction<'a>) -> RuntimeResult<()> {
        let operand = &instruction.operand;
        let values = self.pop_n(instruction.name, operand.inputs)?;
        let count = operand.slot(Slot::LoopCount);
        if count <= 0 {
            return self.push_all(values);
        }
        self.call_source(
            operand.slot(Slot::SourceIndex),
            &values,
            Return {
                opcode: instruction.name,
                keep: operand.outputs,
                resume: Resume::LoopN {
                    remaining: count - 1,
                },
            },
        )
    }

    /// DO_WHILE: the top input is the condition; each pass returns the values
    /// plus a fresh condition on top.
    pub(super) fn do_while(&mut self, instruction: &Instruction<'a>) -> RuntimeResult<()> {
        let operand = &instruction.operand;
        let mut values = self.pop_n(instruction.name, operand.inputs)?;
        let condition = values.pop().unwrap_or_default();
        if condition.is_zero() {
            return self.push_all(values);
        }
        self.call_source(
            operand.slot(Slot::SourceIndex),
            &values,
            Return {
                opcode: instruction.name,
                keep: operand.outputs + 1,
                resume: Resume::DoWhile,
            },
        )
    }

    /// FOLD_CONTEXT: for every row, call the source with the accumulators
    /// followed by that row's value in each of `Width` columns.
    pub(super) fn fold_context(&mut self, instruction: &Instruction<'a>) -> RuntimeResult<()> {
        let operand = &instruction.operand;
        let first = operand.slot(Slot::Column);
        let width = operand.slot(Slot::Width).max(0);

        let context = self.context;
        let columns = (first..first + width)
            .map(|column| {
                usize::try_from(column)
                    .ok()
                    .and_then(|c| context.get(c))
                    .map(Vec::as_slice)
                    .ok_or(RuntimeError::ContextOutOfBounds {
                        column,
                        row: Word::ZERO,
                    })
            })
            .collect::<RuntimeResult<Vec<&[Word]>>>()?;

        let rows = row_count(&columns);
        for (offset, cells) in columns.iter().enumerate() {
            if cells.len() < rows {
                return Err(RuntimeError::ContextOutOfBounds {
                    column: first + offset as i64,
                    row: Word::from(cells.len()),
                });
            }
        }

        let accumulators = self.pop_n(instruction.name, operand.inputs)?;
        if rows == 0 {
            return self.push_all(accumulators);
        }
        let arguments = row_arguments(accumulators, &columns, 0);
        self.call_source(
            operand.slot(Slot::SourceIndex),
            &arguments,
            Return {
                opcode: instruction.name,
                keep: operand.outputs,
                resume: Resume::FoldContext {
                    columns,
                    next_row: 1,
                },
            },
        )
    }

    /// ZIPMAP: split each input word into `2^Loop Size` equal lanes and call
    /// the source once per lane, lowest lane first.
    pub(super) fn zipmap(&mut self, instruction: &Instruction<'a>) -> RuntimeResult<()> {
        let operand = &instruction.operand;
        let loop_size = operand.slot(Slot::LoopSize);
        if !(0..=MAX_LOOP_SIZE).contains(&loop_size) {
            return Err(instruction.invalid(OperandError::LoopSize { value: loop_size }));
        }

        let lanes = 1usize << loop_size;
        let lane_bits = WORD_BITS >> loop_size;
        if operand.outputs % lanes != 0 {
            return Err(instruction.invalid(OperandError::LaneMismatch {
                outputs: operand.outputs,
                lanes,
            }));
        }

        let packed = self.pop_n(instruction.name, operand.inputs)?;
        let arguments = lane_arguments(&packed, 0, lane_bits);
        self.call_source(
            operand.slot(Slot::SourceIndex),
            &arguments,
            Return {
                opcode: instruction.name,
                keep: operand.outputs / lanes,
                resume: Resume::ZipMap {
                    packed,
                    next_lane: 1,
                    lanes,
                    lane_bits,
                    results: Vec::with_capacity(operand.outputs),
                },
            },
        )
    }

    /// Continue the caller of a returned frame with the callee's `results`.
    pub(super) fn resume(
        &mut self,
        source: usize,
        opcode: &'a str,
        keep: usize,
        resume: Resume<'a>,
        mut results: Vec<Word>,
    ) -> RuntimeResult<()> {
        let again = |resume: Resume<'a>| {
            Some(Return {
                opcode,
                keep,
                resume,
            })
        };

        match resume {
            Resume::Call => self.push_all(results),
            Resume::LoopN { remaining } if remaining > 0 => self.enter(
                source,
                &results,
                again(Resume::LoopN {
                    remaining: remaining - 1,
                }),
            ),
            Resume::LoopN { .. } => self.push_all(results),
            Resume::DoWhile => {
                let condition = results.pop().unwrap_or_default();
                if condition.is_zero() {
                    self.push_all(results)
                } else {
                    self.enter(source, &results, again(Resume::DoWhile))
                }
            }
            Resume::FoldContext { columns, next_row } => {
                if next_row >= row_count(&columns) {
                    return self.push_all(results);
                }
                let arguments = row_arguments(results, &columns, next_row);
                self.enter(
                    source,
                    &arguments,
                    again(Resume::FoldContext {
                        columns,
                        next_row: next_row + 1,
                    }),
                )
            }
            Resume::ZipMap {
                packed,
                next_lane,
                lanes,
                lane_bits,
                results: mut collected,
            } => {
                collected.append(&mut results);
                if next_lane >= lanes {
                    return self.push_all(collected);
                }
                let arguments = lane_arguments(&packed, next_lane, lane_bits);
                self.enter(
                    source,
                    &arguments,
                    again(Resume::ZipMap {
                        packed,
                        next_lane: next_lane + 1,
                        lanes,
                        lane_bits,
                        results: collected,
                    }),
                )
            }
        }
    }
}

/// Rows of a FOLD_CONTEXT, taken from its first column
fn row_count(columns: &[&[Word]]) -> usize {
    columns.first().map_or(0, |cells| cells.len())
}

fn row_arguments(mut accumulators: Vec<Word>, columns: &[&[Word]], row: usize) -> Vec<Word> {
    accumulators.extend(columns.iter().map(|cells| cells[row]));
    accumulators
}

/// Lane `lane` of every packed word, `lane_bits` wide
fn lane_arguments(packed: &[Word], lane: usize, lane_bits: u32) -> Vec<Word> {
    let shift = lane as u32 * lane_bits;
    packed
        .iter()
        .map(|&word| (word >> shift).low_bits(lane_bits))
        .collect()
}
