//! Call frames

use crate::word::Word;

/// One executing source
///
/// Sources that call other sources (CALL, LOOP_N, DO_WHILE, FOLD_CONTEXT,
/// ZIPMAP) push a frame whose base sits at the first argument they hand over.
///
/// ```text
/// caller frame             callee frame
/// [a][b][c]            |   [x][y]
///  ^                        ^
///  caller stack_base        callee stack_base
/// ```
///
/// Everything at or above `stack_base` belongs to the frame; `STACK n` reads
/// `stack[stack_base + n]` and pops never go below the base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFrame<'a> {
    /// Source being executed
    pub source_index: usize,
    /// Next cell to execute
    pub pc: usize,
    /// Stack index where this frame's values begin
    pub stack_base: usize,
    /// What the caller does with this frame's results (`None` for the entrypoint)
    pub caller: Option<Return<'a>>,
}

impl<'a> CallFrame<'a> {
    pub fn new(source_index: usize, stack_base: usize, caller: Option<Return<'a>>) -> Self {
        Self {
            source_index,
            pc: 0,
            stack_base,
            caller,
        }
    }
}

/// The caller's side of a call, resumed when the callee frame pops
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Return<'a> {
    /// Calling opcode, for errors
    pub opcode: &'a str,
    /// Values taken from the top of the callee's frame
    pub keep: usize,
    pub resume: Resume<'a>,
}

/// Loop state carried across calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resume<'a> {
    /// Push the results
    Call,
    /// Call again while passes remain
    LoopN { remaining: i64 },
    /// Call again while the returned condition is non-zero
    DoWhile,
    /// Call again with the next context row
    FoldContext {
        columns: Vec<&'a [Word]>,
        next_row: usize,
    },
    /// Call again with the next lane, collecting every lane's results
    ZipMap {
        packed: Vec<Word>,
        next_lane: usize,
        lanes: usize,
        lane_bits: u32,
        results: Vec<Word>,
    },
}
