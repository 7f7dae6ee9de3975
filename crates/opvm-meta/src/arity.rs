//! Input/output arity of an opcode

use crate::field::{extract_bits, Computation};
use serde::{Deserialize, Serialize};

/// Which side of the stack effect an arity describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArityKind {
    Inputs,
    Outputs,
}

impl ArityKind {
    /// Name of the operand field that conventionally backs this arity
    pub fn field_name(self) -> &'static str {
        match self {
            ArityKind::Inputs => "Inputs",
            ArityKind::Outputs => "Outputs",
        }
    }
}

impl std::fmt::Display for ArityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArityKind::Inputs => write!(f, "inputs"),
            ArityKind::Outputs => write!(f, "outputs"),
        }
    }
}

/// Arity read from operand bits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct DerivedArity {
    pub start_bit: u8,
    pub end_bit: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computation: Option<Computation>,
}

impl DerivedArity {
    /// Raw value of the arity bits within `word`
    ///
    /// Callers must ensure the bit range is well formed.
    pub fn extract(&self, word: u16) -> u32 {
        extract_bits(word, self.start_bit, self.end_bit)
    }
}

/// Stack arity: a fixed count, or one derived from operand bits
///
/// JSON form is either a number or `{ startBit, endBit, computation? }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArityField {
    Fixed(u32),
    Derived(DerivedArity),
}

impl ArityField {
    pub fn fixed(count: u32) -> Self {
        ArityField::Fixed(count)
    }

    pub fn derived(start_bit: u8, end_bit: u8) -> Self {
        ArityField::Derived(DerivedArity {
            start_bit,
            end_bit,
            computation: None,
        })
    }

    pub fn derived_with(start_bit: u8, end_bit: u8, computation: impl Into<String>) -> Self {
        ArityField::Derived(DerivedArity {
            start_bit,
            end_bit,
            computation: Some(Computation::new(computation)),
        })
    }

    pub fn is_derived(&self) -> bool {
        matches!(self, ArityField::Derived(_))
    }

    pub fn as_derived(&self) -> Option<&DerivedArity> {
        match self {
            ArityField::Derived(d) => Some(d),
            ArityField::Fixed(_) => None,
        }
    }
}

impl From<u32> for ArityField {
    fn from(count: u32) -> Self {
        ArityField::Fixed(count)
    }
}
