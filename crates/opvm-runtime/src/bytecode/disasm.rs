//! Bytecode disassembler
//!
//! Renders a program as text using the names and operand fields of an opcode
//! table. Used for debugging and in snapshot tests.

use super::{Cell, Program};
use crate::table::RuntimeTable;
use opvm_meta::extract_bits;
use std::fmt;

/// Disassemble a program to human-readable text
///
/// # Format
/// ```text
/// === Constants ===
/// 0: 42
///
/// === Source 0 ===
/// 0000  CONSTANT         Constant Index=0
/// 0001  ADD              Inputs=2
/// ```
pub fn disassemble(program: &Program, table: &RuntimeTable) -> String {
    Disassembly { program, table }.to_string()
}

/// Lazily formatted disassembly of a program
pub struct Disassembly<'a> {
    pub program: &'a Program,
    pub table: &'a RuntimeTable,
}

impl fmt::Display for Disassembly<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.program.constants.is_empty() {
            writeln!(f, "=== Constants ===")?;
            for (index, constant) in self.program.constants.iter().enumerate() {
                writeln!(f, "{}: {}", index, constant)?;
            }
            writeln!(f)?;
        }

        for (index, source) in self.program.sources.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            writeln!(f, "=== Source {} ===", index)?;
            for (pc, &cell) in source.cells().iter().enumerate() {
                write!(f, "{:04}  ", pc)?;
                write_cell(f, self.table, cell)?;
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

fn write_cell(f: &mut fmt::Formatter<'_>, table: &RuntimeTable, cell: Cell) -> fmt::Result {
    let Some(descriptor) = table.descriptor(cell.opcode) else {
        return write!(f, "<invalid opcode: {:#04x}>", cell.opcode);
    };

    let fields = descriptor.fields();
    if fields.is_empty() {
        return write!(f, "{}", descriptor.name);
    }
    write!(f, "{:<16}", descriptor.name)?;
    for (i, field) in fields.iter().enumerate() {
        let raw = extract_bits(cell.operand, field.start_bit, field.end_bit);
        let sep = if i == 0 { " " } else { ", " };
        write!(f, "{}{}={}", sep, field.name, raw)?;
    }
    Ok(())
}
