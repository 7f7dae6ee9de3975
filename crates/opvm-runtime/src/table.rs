//! Runtime opcode table
//!
//! Wraps a validated [`OpcodeTable`] with everything the VM needs per opcode,
//! decided once at load time: the behavior, the compiled operand layout and
//! the slot bindings.

use crate::bytecode::Cell;
use crate::operand::OperandLayout;
use crate::ops::{standard, Behavior, ExternalOp};
use opvm_meta::{
    insert_bits, ArityField, ArityKind, FormulaError, OpcodeDescriptor, OpcodeTable,
    ValidationReport,
};
use thiserror::Error;
use tracing::debug;

/// Largest ZIPMAP loop size: 2^8 lanes of one bit each
pub const MAX_LOOP_SIZE: i64 = 8;

#[derive(Error, Debug)]
pub enum TableError {
    #[error(transparent)]
    Validation(#[from] ValidationReport),

    #[error("opcode {opcode} has no known behavior")]
    UnknownBehavior { opcode: String },

    #[error("opcode {opcode} is missing operand field '{field}'")]
    MissingField { opcode: String, field: &'static str },

    #[error("opcode {opcode} must declare {expected} {arity}")]
    ArityMismatch {
        opcode: String,
        arity: ArityKind,
        expected: u32,
    },

    #[error("opcode {opcode}: {source}")]
    Formula {
        opcode: String,
        #[source]
        source: FormulaError,
    },

    #[error(
        "opcode {opcode} declares {declared} fixed parameter(s){}, its host read takes {expected}{}",
        spread_suffix(.declared_spread),
        spread_suffix(.expected_spread)
    )]
    ParameterMismatch {
        opcode: String,
        declared: usize,
        declared_spread: bool,
        expected: usize,
        expected_spread: bool,
    },

    #[error("opcode {opcode} can encode loop size {value}; lane widths need 0..=8")]
    UnboundedLoopSize { opcode: String, value: i64 },

    #[error("unknown opcode '{0}'")]
    UnknownOpcode(String),

    #[error("opcode {opcode} has no operand field '{field}'")]
    UnknownField { opcode: String, field: String },

    #[error("value {value} does not fit field '{field}' of {opcode} (max {capacity})")]
    FieldOverflow {
        opcode: String,
        field: String,
        value: u32,
        capacity: u32,
    },
}

fn spread_suffix(spread: &bool) -> &'static str {
    if *spread {
        " plus a spread"
    } else {
        ""
    }
}

/// Load-time facts about one opcode
#[derive(Debug, Clone)]
pub struct OpcodeEntry {
    name: String,
    behavior: Behavior,
    layout: OperandLayout,
}

impl OpcodeEntry {
    fn load(descriptor: &OpcodeDescriptor) -> Result<Self, TableError> {
        let opcode = || descriptor.name.clone();
        let behavior = Behavior::for_name(&descriptor.name)
            .ok_or_else(|| TableError::UnknownBehavior { opcode: opcode() })?;

        let expected = behavior.expected_arity();
        for (kind, want) in [
            (ArityKind::Inputs, expected.inputs),
            (ArityKind::Outputs, expected.outputs),
        ] {
            if let Some(want) = want {
                if descriptor.arity(kind) != &ArityField::Fixed(want) {
                    return Err(TableError::ArityMismatch {
                        opcode: opcode(),
                        arity: kind,
                        expected: want,
                    });
                }
            }
        }

        let mut layout = OperandLayout::compile(descriptor).map_err(|source| TableError::Formula {
            opcode: opcode(),
            source,
        })?;
        for &(slot, field) in behavior.slots() {
            if !layout.bind(slot, field) {
                return Err(TableError::MissingField {
                    opcode: opcode(),
                    field,
                });
            }
        }

        match behavior {
            Behavior::ZipMap => check_loop_size(descriptor)?,
            Behavior::ExternalRead(op) => check_parameters(descriptor, op)?,
            _ => {}
        }

        Ok(Self {
            name: descriptor.name.clone(),
            behavior,
            layout,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn behavior(&self) -> Behavior {
        self.behavior
    }

    pub fn layout(&self) -> &OperandLayout {
        &self.layout
    }
}

/// The declared parameters must be the host read's fixed arguments, then at
/// most one trailing spread.
fn check_parameters(descriptor: &OpcodeDescriptor, op: ExternalOp) -> Result<(), TableError> {
    let parameters = &descriptor.parameters;
    let declared = parameters.iter().take_while(|p| !p.spread).count();
    let spreads = parameters.len() - declared;

    if declared != op.parameter_count() || spreads != usize::from(op.spreads()) {
        return Err(TableError::ParameterMismatch {
            opcode: descriptor.name.clone(),
            declared,
            declared_spread: spreads > 0,
            expected: op.parameter_count(),
            expected_spread: op.spreads(),
        });
    }
    Ok(())
}

/// Every loop size the field admits must give a whole lane width.
fn check_loop_size(descriptor: &OpcodeDescriptor) -> Result<(), TableError> {
    let Some(field) = descriptor.field_named("Loop Size") else {
        return Ok(());
    };
    let formula = field
        .computation
        .as_ref()
        .map(|c| c.formula())
        .transpose()
        .map_err(|source| TableError::Formula {
            opcode: descriptor.name.clone(),
            source,
        })?;

    for raw in field.admitted_values() {
        let value = match &formula {
            Some(formula) => formula.eval(i64::from(raw)).map_err(|source| TableError::Formula {
                opcode: descriptor.name.clone(),
                source,
            })?,
            None => i64::from(raw),
        };
        if !(0..=MAX_LOOP_SIZE).contains(&value) {
            return Err(TableError::UnboundedLoopSize {
                opcode: descriptor.name.clone(),
                value,
            });
        }
    }
    Ok(())
}

/// Validated table plus per-opcode behaviors, shared read-only by evaluations
#[derive(Debug, Clone)]
pub struct RuntimeTable {
    table: OpcodeTable,
    entries: Vec<OpcodeEntry>,
}

impl RuntimeTable {
    pub fn new(table: OpcodeTable) -> Result<Self, TableError> {
        let entries = table
            .descriptors()
            .iter()
            .map(OpcodeEntry::load)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(opcodes = entries.len(), "runtime table loaded");
        Ok(Self { table, entries })
    }

    /// Runtime table over the standard opcode set
    pub fn standard() -> Result<Self, TableError> {
        Self::new(standard::table()?)
    }

    pub fn entry(&self, opcode: u8) -> Option<&OpcodeEntry> {
        self.entries.get(usize::from(opcode))
    }

    pub fn descriptor(&self, opcode: u8) -> Option<&OpcodeDescriptor> {
        self.table.get(opcode)
    }

    pub fn lookup(&self, identifier: &str) -> Option<u8> {
        self.table.lookup(identifier)
    }

    pub fn opcode_table(&self) -> &OpcodeTable {
        &self.table
    }

    /// Assemble a cell from an opcode name and raw field values.
    ///
    /// Fields not listed are zero. Values are raw (before computations).
    pub fn cell(&self, identifier: &str, fields: &[(&str, u32)]) -> Result<Cell, TableError> {
        let opcode = self
            .lookup(identifier)
            .ok_or_else(|| TableError::UnknownOpcode(identifier.to_string()))?;
        let descriptor = self
            .descriptor(opcode)
            .ok_or_else(|| TableError::UnknownOpcode(identifier.to_string()))?;

        let mut operand = 0u16;
        for &(name, value) in fields {
            let field = descriptor
                .field_named(name)
                .ok_or_else(|| TableError::UnknownField {
                    opcode: descriptor.name.clone(),
                    field: name.to_string(),
                })?;
            if value > field.capacity() {
                return Err(TableError::FieldOverflow {
                    opcode: descriptor.name.clone(),
                    field: name.to_string(),
                    value,
                    capacity: field.capacity(),
                });
            }
            operand = insert_bits(operand, field.start_bit, field.end_bit, value);
        }
        Ok(Cell::new(opcode, operand))
    }
}
