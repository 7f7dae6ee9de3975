//! Operand field model
//!
//! An operand is a 16-bit word split into named bit ranges. Each field knows
//! how to extract its raw value from the word and, optionally, which raw
//! values are legal and how to turn the raw value into an effective one.

use crate::formula::{Formula, FormulaError};
use serde::{Deserialize, Serialize};

/// Width of an operand word in bits
pub const OPERAND_BITS: u8 = 16;

/// Highest addressable operand bit
pub const MAX_OPERAND_BIT: u8 = OPERAND_BITS - 1;

/// Extract the inclusive bit range `start..=end` from `word`.
///
/// Callers must ensure `start <= end <= 15`.
pub fn extract_bits(word: u16, start: u8, end: u8) -> u32 {
    let width = u32::from(end - start) + 1;
    (u32::from(word) >> start) & ((1u32 << width) - 1)
}

/// Place `value` into the inclusive bit range `start..=end` of an operand.
///
/// Bits of `value` that do not fit the range are dropped.
pub fn insert_bits(word: u16, start: u8, end: u8, value: u32) -> u16 {
    let width = u32::from(end - start) + 1;
    let mask = ((1u32 << width) - 1) << start;
    let cleared = u32::from(word) & !mask;
    (cleared | ((value << start) & mask)) as u16
}

/// Arithmetic formula attached to a field, kept as written
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Computation(String);

impl Computation {
    pub fn new(source: impl Into<String>) -> Self {
        Self(source.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the formula with the `this` binding
    pub fn formula(&self) -> Result<Formula, FormulaError> {
        Formula::parse(&self.0)
    }
}

impl From<&str> for Computation {
    fn from(source: &str) -> Self {
        Self::new(source)
    }
}

impl std::fmt::Display for Computation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of a field's `validRange`
///
/// Serialized as `[value]` or `[min, max]` (both inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u32>", into = "Vec<u32>")]
pub enum ValidRange {
    /// Exactly one legal value
    Single(u32),
    /// Inclusive range of legal values
    Span { min: u32, max: u32 },
}

impl ValidRange {
    pub fn single(value: u32) -> Self {
        ValidRange::Single(value)
    }

    pub fn span(min: u32, max: u32) -> Self {
        ValidRange::Span { min, max }
    }

    pub fn min(&self) -> u32 {
        match self {
            ValidRange::Single(v) => *v,
            ValidRange::Span { min, .. } => *min,
        }
    }

    pub fn max(&self) -> u32 {
        match self {
            ValidRange::Single(v) => *v,
            ValidRange::Span { max, .. } => *max,
        }
    }

    pub fn contains(&self, value: u32) -> bool {
        value >= self.min() && value <= self.max()
    }
}

impl TryFrom<Vec<u32>> for ValidRange {
    type Error = String;

    fn try_from(values: Vec<u32>) -> Result<Self, Self::Error> {
        match values.as_slice() {
            [v] => Ok(ValidRange::Single(*v)),
            [min, max] => Ok(ValidRange::Span {
                min: *min,
                max: *max,
            }),
            other => Err(format!(
                "validRange entries hold one or two values, found {}",
                other.len()
            )),
        }
    }
}

impl From<ValidRange> for Vec<u32> {
    fn from(range: ValidRange) -> Self {
        match range {
            ValidRange::Single(v) => vec![v],
            ValidRange::Span { min, max } => vec![min, max],
        }
    }
}

impl std::fmt::Display for ValidRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidRange::Single(v) => write!(f, "[{}]", v),
            ValidRange::Span { min, max } => write!(f, "[{}, {}]", min, max),
        }
    }
}

/// A named bit range of the operand word
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct OperandField {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_bit: u8,
    pub end_bit: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computation: Option<Computation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_range: Option<Vec<ValidRange>>,
}

impl OperandField {
    pub fn new(name: impl Into<String>, start_bit: u8, end_bit: u8) -> Self {
        Self {
            name: name.into(),
            description: None,
            start_bit,
            end_bit,
            computation: None,
            valid_range: None,
        }
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn computation(mut self, source: impl Into<String>) -> Self {
        self.computation = Some(Computation::new(source));
        self
    }

    pub fn valid_range(mut self, range: ValidRange) -> Self {
        self.valid_range.get_or_insert_with(Vec::new).push(range);
        self
    }

    /// `start_bit <= end_bit <= 15`
    pub fn is_well_formed(&self) -> bool {
        self.start_bit <= self.end_bit && self.end_bit <= MAX_OPERAND_BIT
    }

    /// Number of bits covered (0 for an inverted range)
    pub fn width(&self) -> u8 {
        if self.start_bit > self.end_bit {
            0
        } else {
            self.end_bit - self.start_bit + 1
        }
    }

    /// Largest raw value the field can hold
    pub fn capacity(&self) -> u32 {
        match self.width() {
            0 => 0,
            w => (1u32 << u32::from(w)) - 1,
        }
    }

    /// Whether the two fields claim any common bit
    pub fn overlaps(&self, other: &OperandField) -> bool {
        self.start_bit <= other.end_bit && other.start_bit <= self.end_bit
    }

    /// Raw value of this field within `word`
    pub fn extract(&self, word: u16) -> u32 {
        extract_bits(word, self.start_bit, self.end_bit)
    }

    /// Whether `raw` satisfies `validRange` (always true without one)
    pub fn admits(&self, raw: u32) -> bool {
        match &self.valid_range {
            None => true,
            Some(ranges) => ranges.iter().any(|r| r.contains(raw)),
        }
    }

    /// Every raw value the field can hold that also satisfies `validRange`
    pub fn admitted_values(&self) -> impl Iterator<Item = u32> + '_ {
        (0..=self.capacity()).filter(move |v| self.admits(*v))
    }
}
