//! Stack-based virtual machine
//!
//! Evaluates a [`Program`] against an opcode table, a context matrix and a
//! host. Every evaluation owns its own stack, frames and write set, so one
//! [`Vm`] can serve any number of evaluations, concurrently or not.
//! - Stack values are 256-bit words
//! - Sources call sources through frames (CALL and the loop opcodes); the
//!   frames live on the heap, so call depth is bounded only by the config
//! - Storage writes are collected and returned, never applied

mod dispatch;
mod frame;
mod loops;

pub use frame::{CallFrame, Resume, Return};

use crate::bytecode::Program;
use crate::error::{RuntimeError, RuntimeResult};
use crate::host::Host;
use crate::table::RuntimeTable;
use crate::word::Word;
use opvm_config::VmConfig;
use std::collections::BTreeMap;
use tracing::{debug, instrument, trace};

/// One evaluation's inputs
#[derive(Debug, Clone, Copy)]
pub struct EvalRequest<'a> {
    pub program: &'a Program,
    /// Source executed first
    pub entrypoint: usize,
    /// Number of bottom stack values to return (`None` returns the whole stack)
    pub final_stack_index: Option<usize>,
    /// Context matrix, indexed `[column][row]`
    pub context: &'a [Vec<Word>],
    /// Values on the stack before the entrypoint runs
    pub inputs: &'a [Word],
}

impl<'a> EvalRequest<'a> {
    pub fn new(program: &'a Program) -> Self {
        Self {
            program,
            entrypoint: 0,
            final_stack_index: None,
            context: &[],
            inputs: &[],
        }
    }

    pub fn entrypoint(mut self, entrypoint: usize) -> Self {
        self.entrypoint = entrypoint;
        self
    }

    pub fn final_stack_index(mut self, count: usize) -> Self {
        self.final_stack_index = Some(count);
        self
    }

    pub fn context(mut self, context: &'a [Vec<Word>]) -> Self {
        self.context = context;
        self
    }

    pub fn inputs(mut self, inputs: &'a [Word]) -> Self {
        self.inputs = inputs;
        self
    }
}

/// Result of a successful evaluation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvalOutput {
    /// Final stack, bottom first
    pub stack: Vec<Word>,
    /// Storage writes made by SET, last write per key wins
    pub writes: BTreeMap<Word, Word>,
}

impl EvalOutput {
    /// Top of the final stack
    pub fn top(&self) -> Option<Word> {
        self.stack.last().copied()
    }
}

/// Virtual machine over one runtime table
#[derive(Debug, Clone, Copy)]
pub struct Vm<'t> {
    table: &'t RuntimeTable,
    config: VmConfig,
}

impl<'t> Vm<'t> {
    pub fn new(table: &'t RuntimeTable) -> Self {
        Self::with_config(table, VmConfig::default())
    }

    pub fn with_config(table: &'t RuntimeTable, config: VmConfig) -> Self {
        Self { table, config }
    }

    pub fn table(&self) -> &'t RuntimeTable {
        self.table
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Run one evaluation to completion.
    ///
    /// Any error aborts the evaluation; no partial stack or writes escape.
    #[instrument(
        level = "debug",
        skip_all,
        fields(entrypoint = request.entrypoint, sources = request.program.sources.len())
    )]
    pub fn eval(&self, request: &EvalRequest<'_>, host: &dyn Host) -> RuntimeResult<EvalOutput> {
        let mut execution = Execution {
            table: self.table,
            config: self.config,
            program: request.program,
            context: request.context,
            host,
            stack: Vec::new(),
            frames: Vec::new(),
            writes: BTreeMap::new(),
        };
        execution.enter(request.entrypoint, request.inputs, None)?;
        execution.run()?;

        let Execution {
            mut stack, writes, ..
        } = execution;
        if let Some(count) = request.final_stack_index {
            if stack.len() < count {
                return Err(RuntimeError::MissingOutputs {
                    expected: count,
                    actual: stack.len(),
                });
            }
            stack.truncate(count);
        }

        debug!(outputs = stack.len(), writes = writes.len(), "evaluation finished");
        Ok(EvalOutput { stack, writes })
    }
}

/// Mutable state of one evaluation
struct Execution<'a> {
    table: &'a RuntimeTable,
    config: VmConfig,
    program: &'a Program,
    context: &'a [Vec<Word>],
    host: &'a dyn Host,
    stack: Vec<Word>,
    frames: Vec<CallFrame<'a>>,
    writes: BTreeMap<Word, Word>,
}

impl<'a> Execution<'a> {
    /// Execute cells until the entrypoint frame returns.
    ///
    /// Calls never recurse on the native stack: a calling cell pushes a frame
    /// and this loop picks it up, and a frame that runs out of cells hands its
    /// results to the caller's [`Return`].
    fn run(&mut self) -> RuntimeResult<()> {
        let program = self.program;
        while let Some(frame) = self.frames.last_mut() {
            let pc = frame.pc;
            let cell = program
                .source(frame.source_index)
                .and_then(|source| source.cells().get(pc))
                .copied();
            match cell {
                Some(cell) => {
                    frame.pc += 1;
                    self.step(cell, pc)?;
                }
                None => {
                    if let Some(frame) = self.frames.pop() {
                        self.leave(frame)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Push a frame for `source_index` over `arguments`.
    fn enter(
        &mut self,
        source_index: usize,
        arguments: &[Word],
        caller: Option<Return<'a>>,
    ) -> RuntimeResult<()> {
        if self.program.source(source_index).is_none() {
            return Err(RuntimeError::InvalidSourceIndex {
                index: i64::try_from(source_index).unwrap_or(i64::MAX),
            });
        }
        if self.frames.len() >= self.config.max_call_depth {
            return Err(RuntimeError::StackDepthExceeded {
                max: self.config.max_call_depth,
            });
        }

        let stack_base = self.stack.len();
        self.push_all(arguments.iter().copied())?;
        self.frames
            .push(CallFrame::new(source_index, stack_base, caller));
        Ok(())
    }

    /// Call `source` from the current frame; `then` resumes the caller.
    fn call_source(
        &mut self,
        source: i64,
        arguments: &[Word],
        then: Return<'a>,
    ) -> RuntimeResult<()> {
        let index =
            usize::try_from(source).map_err(|_| RuntimeError::InvalidSourceIndex { index: source })?;
        self.enter(index, arguments, Some(then))
    }

    /// Pop a finished frame's top `keep` values and resume its caller.
    ///
    /// Whatever else the callee left behind is discarded.
    fn leave(&mut self, frame: CallFrame<'a>) -> RuntimeResult<()> {
        let Some(then) = frame.caller else {
            return Ok(());
        };

        let produced = self.stack.len() - frame.stack_base;
        if produced < then.keep {
            return Err(RuntimeError::StackUnderflow {
                opcode: then.opcode.to_string(),
                needed: then.keep,
                available: produced,
            });
        }
        let results = self.stack.split_off(self.stack.len() - then.keep);
        self.stack.truncate(frame.stack_base);

        trace!(
            opcode = then.opcode,
            source = frame.source_index,
            frames = self.frames.len(),
            "return"
        );
        self.resume(frame.source_index, then.opcode, then.keep, then.resume, results)
    }

    // ========================================================================
    // Stack
    // ========================================================================

    fn stack_base(&self) -> usize {
        self.frames.last().map_or(0, |frame| frame.stack_base)
    }

    /// Values the current frame may consume
    fn available(&self) -> usize {
        self.stack.len().saturating_sub(self.stack_base())
    }

    fn push(&mut self, value: Word) -> RuntimeResult<()> {
        if self.stack.len() >= self.config.max_stack_depth {
            return Err(RuntimeError::StackOverflow {
                max: self.config.max_stack_depth,
            });
        }
        self.stack.push(value);
        Ok(())
    }

    fn push_all(&mut self, values: impl IntoIterator<Item = Word>) -> RuntimeResult<()> {
        for value in values {
            self.push(value)?;
        }
        Ok(())
    }

    /// Pop `count` values, returned in push order.
    fn pop_n(&mut self, opcode: &str, count: usize) -> RuntimeResult<Vec<Word>> {
        let available = self.available();
        if count > available {
            return Err(RuntimeError::StackUnderflow {
                opcode: opcode.to_string(),
                needed: count,
                available,
            });
        }
        Ok(self.stack.split_off(self.stack.len() - count))
    }
}
