//! Operand decoding
//!
//! Each descriptor is compiled once into an [`OperandLayout`]: formulas are
//! parsed, valid ranges copied and the fields a behavior needs are bound to
//! [`Slot`]s. Decoding a cell is then pure bit arithmetic plus formula
//! evaluation, with no name lookups.

use opvm_meta::{
    extract_bits, ArityField, ArityKind, Formula, FormulaError, OpcodeDescriptor, ValidRange,
};
use thiserror::Error;

/// Operand values a behavior reads by role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    ConstantIndex,
    StackIndex,
    Column,
    Row,
    SourceIndex,
    LoopCount,
    LoopSize,
    Width,
}

impl Slot {
    pub const COUNT: usize = 8;

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperandError {
    #[error("field '{field}' holds {raw}, outside its valid range")]
    OutOfRange { field: String, raw: u32 },

    #[error("computation of '{field}' failed: {reason}")]
    Computation { field: String, reason: FormulaError },

    #[error("{arity} count evaluates to {value}")]
    InvalidCount { arity: ArityKind, value: i64 },

    #[error("needs at least {needed} input(s), operand declares {found}")]
    TooFewInputs { needed: usize, found: usize },

    #[error("{outputs} outputs cannot be split evenly across {lanes} lanes")]
    LaneMismatch { outputs: usize, lanes: usize },

    #[error("loop size {value} is out of range 0..=8")]
    LoopSize { value: i64 },
}

#[derive(Debug, Clone)]
struct CompiledField {
    name: String,
    start_bit: u8,
    end_bit: u8,
    valid_range: Option<Vec<ValidRange>>,
    formula: Option<Formula>,
    slot: Option<Slot>,
}

impl CompiledField {
    fn decode(&self, operand: u16) -> Result<i64, OperandError> {
        let raw = extract_bits(operand, self.start_bit, self.end_bit);
        if let Some(ranges) = &self.valid_range {
            if !ranges.iter().any(|r| r.contains(raw)) {
                return Err(OperandError::OutOfRange {
                    field: self.name.clone(),
                    raw,
                });
            }
        }
        match &self.formula {
            None => Ok(i64::from(raw)),
            Some(formula) => formula
                .eval(i64::from(raw))
                .map_err(|reason| OperandError::Computation {
                    field: self.name.clone(),
                    reason,
                }),
        }
    }
}

#[derive(Debug, Clone)]
enum CompiledArity {
    Fixed(u32),
    Derived {
        start_bit: u8,
        end_bit: u8,
        formula: Option<Formula>,
    },
}

impl CompiledArity {
    fn compile(arity: &ArityField) -> Result<Self, FormulaError> {
        Ok(match arity {
            ArityField::Fixed(n) => CompiledArity::Fixed(*n),
            ArityField::Derived(derived) => CompiledArity::Derived {
                start_bit: derived.start_bit,
                end_bit: derived.end_bit,
                formula: derived
                    .computation
                    .as_ref()
                    .map(|c| c.formula())
                    .transpose()?,
            },
        })
    }

    fn decode(&self, kind: ArityKind, operand: u16) -> Result<usize, OperandError> {
        let value = match self {
            CompiledArity::Fixed(n) => return Ok(*n as usize),
            CompiledArity::Derived {
                start_bit,
                end_bit,
                formula,
            } => {
                let raw = i64::from(extract_bits(operand, *start_bit, *end_bit));
                match formula {
                    None => raw,
                    Some(formula) => {
                        formula
                            .eval(raw)
                            .map_err(|reason| OperandError::Computation {
                                field: kind.field_name().to_string(),
                                reason,
                            })?
                    }
                }
            }
        };
        usize::try_from(value).map_err(|_| OperandError::InvalidCount { arity: kind, value })
    }
}

/// Compiled operand layout of one opcode
#[derive(Debug, Clone)]
pub struct OperandLayout {
    fields: Vec<CompiledField>,
    inputs: CompiledArity,
    outputs: CompiledArity,
}

impl OperandLayout {
    /// Compile a validated descriptor.
    pub fn compile(descriptor: &OpcodeDescriptor) -> Result<Self, FormulaError> {
        let fields = descriptor
            .fields()
            .iter()
            .map(|field| {
                Ok(CompiledField {
                    name: field.name.clone(),
                    start_bit: field.start_bit,
                    end_bit: field.end_bit,
                    valid_range: field.valid_range.clone(),
                    formula: field.computation.as_ref().map(|c| c.formula()).transpose()?,
                    slot: None,
                })
            })
            .collect::<Result<Vec<_>, FormulaError>>()?;

        Ok(Self {
            fields,
            inputs: CompiledArity::compile(&descriptor.inputs)?,
            outputs: CompiledArity::compile(&descriptor.outputs)?,
        })
    }

    /// Bind the field called `name` to `slot`; false if there is no such field.
    pub fn bind(&mut self, slot: Slot, name: &str) -> bool {
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(field) => {
                field.slot = Some(slot);
                true
            }
            None => false,
        }
    }

    /// Decode every field (checking valid ranges) and both arities.
    pub fn decode(&self, operand: u16) -> Result<DecodedOperand, OperandError> {
        let mut slots = [0i64; Slot::COUNT];
        for field in &self.fields {
            let value = field.decode(operand)?;
            if let Some(slot) = field.slot {
                slots[slot.index()] = value;
            }
        }
        Ok(DecodedOperand {
            inputs: self.inputs.decode(ArityKind::Inputs, operand)?,
            outputs: self.outputs.decode(ArityKind::Outputs, operand)?,
            slots,
        })
    }
}

/// Effective values of one operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedOperand {
    pub inputs: usize,
    pub outputs: usize,
    slots: [i64; Slot::COUNT],
}

impl DecodedOperand {
    pub fn slot(&self, slot: Slot) -> i64 {
        self.slots[slot.index()]
    }
}
