//! Bytecode: cells, sources and programs
//!
//! A cell is one instruction, an 8-bit opcode plus a 16-bit operand. A
//! source is an immutable run of cells executed from start to end; a program
//! bundles every source it can call together with its constant pool.
//!
//! Byte form of a source: 3 bytes per cell, `opcode` then the operand
//! big-endian.

pub mod disasm;

use crate::word::Word;
use thiserror::Error;

/// Bytes per encoded cell
pub const CELL_BYTES: usize = 3;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BytecodeError {
    #[error("source is {len} bytes, not a whole number of 3-byte cells")]
    TrailingBytes { len: usize },
}

/// One instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    pub opcode: u8,
    pub operand: u16,
}

impl Cell {
    pub const fn new(opcode: u8, operand: u16) -> Self {
        Self { opcode, operand }
    }

    pub fn to_bytes(self) -> [u8; CELL_BYTES] {
        let [high, low] = self.operand.to_be_bytes();
        [self.opcode, high, low]
    }

    pub fn from_bytes(bytes: [u8; CELL_BYTES]) -> Self {
        Self {
            opcode: bytes[0],
            operand: u16::from_be_bytes([bytes[1], bytes[2]]),
        }
    }
}

/// Ordered, immutable run of cells
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Source {
    cells: Vec<Cell>,
}

impl Source {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn get(&self, pc: usize) -> Option<Cell> {
        self.cells.get(pc).copied()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.cells.iter().flat_map(|cell| cell.to_bytes()).collect()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BytecodeError> {
        if bytes.len() % CELL_BYTES != 0 {
            return Err(BytecodeError::TrailingBytes { len: bytes.len() });
        }
        let cells = bytes
            .chunks_exact(CELL_BYTES)
            .map(|chunk| Cell::from_bytes([chunk[0], chunk[1], chunk[2]]))
            .collect();
        Ok(Self { cells })
    }
}

impl From<Vec<Cell>> for Source {
    fn from(cells: Vec<Cell>) -> Self {
        Self::new(cells)
    }
}

/// Sources plus the constant pool they share
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    pub sources: Vec<Source>,
    pub constants: Vec<Word>,
}

impl Program {
    pub fn new(sources: Vec<Source>, constants: Vec<Word>) -> Self {
        Self { sources, constants }
    }

    pub fn source(&self, index: usize) -> Option<&Source> {
        self.sources.get(index)
    }

    pub fn constant(&self, index: usize) -> Option<Word> {
        self.constants.get(index).copied()
    }
}
