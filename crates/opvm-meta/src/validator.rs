//! Descriptor table validator — structural checks before a table is trusted
//!
//! Per-descriptor checks:
//! 1. **Order & overlap** — fields are listed high bits first and never share
//!    a bit
//! 2. **Bit range sanity** — `startBit <= endBit <= 15`
//! 3. **Computations** — every formula parses and evaluates for every raw
//!    value its bits (and `validRange`) admit
//! 4. **Named fields** — at most one `Inputs` and one `Outputs` field
//! 5. **Arity/operand consistency** — derived arities are backed by an
//!    operand field with the same bits
//! 6. **Derived arity needs operand bits**
//! 7. **Valid ranges** — well ordered and within the field's capacity
//! 8. **Identifiers** — UPPER_SNAKE_CASE names and aliases
//!
//! Table-wide checks:
//! 9. **Uniqueness** — every name and alias appears once across the table
//! 10. **Size** — at most 256 opcodes (opcode values are `u8`)
//!
//! All errors are collected; the order is deterministic (descriptor order,
//! then check order, then table-wide checks).

use crate::arity::{ArityField, ArityKind, DerivedArity};
use crate::descriptor::OpcodeDescriptor;
use crate::field::{Computation, OperandField, MAX_OPERAND_BIT};
use crate::formula::FormulaError;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use thiserror::Error;

/// Largest number of opcodes a table may hold
pub const MAX_OPCODES: usize = 256;

/// Value substituted into a computation that has no decodable bit range
pub const SENTINEL_VALUE: i64 = 1;

// ============================================================================
// Errors
// ============================================================================

/// The opcode a validation error belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpcodeRef {
    pub index: usize,
    pub name: String,
}

impl std::fmt::Display for OpcodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "opcode #{} {}", self.index, self.name)
    }
}

/// A single rule violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Offending opcode (`None` for table-wide errors)
    pub opcode: Option<OpcodeRef>,
    pub kind: ValidationErrorKind,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.opcode {
            Some(opcode) => write!(f, "{}: {}", opcode, self.kind),
            None => write!(f, "table: {}", self.kind),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Kinds of errors the validator can detect
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    #[error("fields '{first}' ({first_start}..={first_end}) and '{second}' ({second_start}..={second_end}) overlap")]
    OverlappingBitRanges {
        first: String,
        first_start: u8,
        first_end: u8,
        second: String,
        second_start: u8,
        second_end: u8,
    },

    #[error("field '{first}' must be listed after '{second}' (fields go from high bits to low bits)")]
    UnorderedBitRanges { first: String, second: String },

    #[error("field '{field}' has start bit {start_bit} after end bit {end_bit}")]
    InvertedBitRange {
        field: String,
        start_bit: u8,
        end_bit: u8,
    },

    #[error("field '{field}' ends at bit {end_bit}, past the last operand bit 15")]
    BitOutOfRange { field: String, end_bit: u8 },

    /// A computation failed to parse, or failed to evaluate on a raw value its
    /// field admits.
    ///
    /// Every raw value the field can hold is tried, not just a sample, so
    /// `"16 / this"` on a field that can hold 0 is rejected. Give the field a
    /// `validRange` that excludes `value` to accept it.
    #[error("computation '{computation}' of {location} is malformed{}: {reason}", at_value(.value))]
    MalformedComputation {
        location: String,
        computation: String,
        /// Raw field value the computation failed on (`None` for a parse error)
        value: Option<i64>,
        reason: FormulaError,
    },

    #[error("more than one operand field is named '{name}'")]
    DuplicateNamedField { name: String },

    #[error("{arity} arity does not match the operand: {reason}")]
    ArityOperandMismatch { arity: ArityKind, reason: String },

    #[error("outputs are derived from operand bits but the opcode has no operand")]
    ComputedOutputWithoutOperand,

    #[error("inputs are derived from operand bits but the opcode has no operand")]
    ComputedInputWithoutOperand,

    #[error("identifier '{identifier}' is already used by {first_opcode}")]
    DuplicateOpcodeIdentifier {
        identifier: String,
        first_opcode: String,
    },

    #[error("field '{field}' has valid range [{min}, {max}] outside 0..={capacity} or out of order")]
    InvalidValidRange {
        field: String,
        min: u32,
        max: u32,
        capacity: u32,
    },

    #[error("identifier '{identifier}' is not UPPER_SNAKE_CASE")]
    InvalidIdentifier { identifier: String },

    #[error("table holds {count} opcodes, more than the {max} a u8 opcode can address")]
    TooManyOpcodes { count: usize, max: usize },
}

fn at_value(value: &Option<i64>) -> String {
    match value {
        Some(v) => format!(" for raw value {}", v),
        None => String::new(),
    }
}

/// All violations found in a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// First error of the given kind
    pub fn find(&self, predicate: impl Fn(&ValidationErrorKind) -> bool) -> Option<&ValidationError> {
        self.errors.iter().find(|e| predicate(&e.kind))
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "opcode table failed validation ({} error(s))", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  - {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationReport {}

// ============================================================================
// Public API
// ============================================================================

/// Validate a table of descriptors, collecting every error found.
///
/// Returns `Ok(())` when the table is structurally sound. Does NOT
/// short-circuit on the first error.
pub fn validate(descriptors: &[OpcodeDescriptor]) -> Result<(), ValidationReport> {
    let mut errors = Vec::new();

    for (index, descriptor) in descriptors.iter().enumerate() {
        let opcode = OpcodeRef {
            index,
            name: descriptor.name.clone(),
        };
        let mut push = |kind: ValidationErrorKind| {
            errors.push(ValidationError {
                opcode: Some(opcode.clone()),
                kind,
            })
        };
        validate_descriptor(descriptor, &mut push);
    }

    check_unique_identifiers(descriptors, &mut errors);

    if descriptors.len() > MAX_OPCODES {
        errors.push(ValidationError {
            opcode: None,
            kind: ValidationErrorKind::TooManyOpcodes {
                count: descriptors.len(),
                max: MAX_OPCODES,
            },
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationReport { errors })
    }
}

/// Validate a single descriptor in isolation (no table-wide checks).
pub fn validate_descriptor_alone(descriptor: &OpcodeDescriptor) -> Vec<ValidationErrorKind> {
    let mut kinds = Vec::new();
    validate_descriptor(descriptor, &mut |kind: ValidationErrorKind| kinds.push(kind));
    kinds
}

fn validate_descriptor(descriptor: &OpcodeDescriptor, push: &mut dyn FnMut(ValidationErrorKind)) {
    let fields = descriptor.fields();

    check_bit_ranges(fields, push);
    check_order_and_overlap(fields, push);
    check_field_computations(fields, push);
    check_named_fields(fields, push);
    check_valid_ranges(fields, push);

    for kind in [ArityKind::Inputs, ArityKind::Outputs] {
        check_arity(descriptor, kind, push);
    }

    for identifier in descriptor.identifiers() {
        if !identifier_pattern().is_match(identifier) {
            push(ValidationErrorKind::InvalidIdentifier {
                identifier: identifier.to_string(),
            });
        }
    }
}

// ============================================================================
// Bit ranges
// ============================================================================

fn check_bit_ranges(fields: &[OperandField], push: &mut dyn FnMut(ValidationErrorKind)) {
    for field in fields {
        if field.start_bit > field.end_bit {
            push(ValidationErrorKind::InvertedBitRange {
                field: field.name.clone(),
                start_bit: field.start_bit,
                end_bit: field.end_bit,
            });
        }
        if field.end_bit > MAX_OPERAND_BIT {
            push(ValidationErrorKind::BitOutOfRange {
                field: field.name.clone(),
                end_bit: field.end_bit,
            });
        }
    }
}

fn check_order_and_overlap(fields: &[OperandField], push: &mut dyn FnMut(ValidationErrorKind)) {
    // Inverted ranges are already reported; comparing them would only add noise.
    let sane = |f: &OperandField| f.start_bit <= f.end_bit;

    for (i, first) in fields.iter().enumerate() {
        for second in fields.iter().skip(i + 1) {
            if sane(first) && sane(second) && first.overlaps(second) {
                push(ValidationErrorKind::OverlappingBitRanges {
                    first: first.name.clone(),
                    first_start: first.start_bit,
                    first_end: first.end_bit,
                    second: second.name.clone(),
                    second_start: second.start_bit,
                    second_end: second.end_bit,
                });
            }
        }
    }

    for pair in fields.windows(2) {
        let (current, next) = (&pair[0], &pair[1]);
        if !sane(current) || !sane(next) || current.overlaps(next) {
            continue;
        }
        if current.start_bit <= next.end_bit {
            push(ValidationErrorKind::UnorderedBitRanges {
                first: current.name.clone(),
                second: next.name.clone(),
            });
        }
    }
}

// ============================================================================
// Computations
// ============================================================================

fn check_field_computations(fields: &[OperandField], push: &mut dyn FnMut(ValidationErrorKind)) {
    for field in fields {
        if let Some(computation) = &field.computation {
            let location = format!("field '{}'", field.name);
            let domain = field.is_well_formed().then_some(field);
            if let Some(kind) = check_computation(&location, computation, domain) {
                push(kind);
            }
        }
    }
}

/// Parse `computation` and evaluate it for every raw value `domain` admits
/// (or the sentinel when no well-formed domain is known).
fn check_computation(
    location: &str,
    computation: &Computation,
    domain: Option<&OperandField>,
) -> Option<ValidationErrorKind> {
    let malformed = |value, reason| ValidationErrorKind::MalformedComputation {
        location: location.to_string(),
        computation: computation.to_string(),
        value,
        reason,
    };

    let formula = match computation.formula() {
        Ok(formula) => formula,
        Err(reason) => return Some(malformed(None, reason)),
    };

    match domain {
        Some(field) => {
            for raw in field.admitted_values() {
                if let Err(reason) = formula.eval(i64::from(raw)) {
                    return Some(malformed(Some(i64::from(raw)), reason));
                }
            }
            None
        }
        None => formula
            .eval(SENTINEL_VALUE)
            .err()
            .map(|reason| malformed(Some(SENTINEL_VALUE), reason)),
    }
}

// ============================================================================
// Named fields and valid ranges
// ============================================================================

fn check_named_fields(fields: &[OperandField], push: &mut dyn FnMut(ValidationErrorKind)) {
    for kind in [ArityKind::Inputs, ArityKind::Outputs] {
        let name = kind.field_name();
        if fields.iter().filter(|f| f.name == name).count() > 1 {
            push(ValidationErrorKind::DuplicateNamedField {
                name: name.to_string(),
            });
        }
    }
}

fn check_valid_ranges(fields: &[OperandField], push: &mut dyn FnMut(ValidationErrorKind)) {
    for field in fields.iter().filter(|f| f.is_well_formed()) {
        let capacity = field.capacity();
        for range in field.valid_range.iter().flatten() {
            if range.min() > range.max() || range.max() > capacity {
                push(ValidationErrorKind::InvalidValidRange {
                    field: field.name.clone(),
                    min: range.min(),
                    max: range.max(),
                    capacity,
                });
            }
        }
    }
}

// ============================================================================
// Arity
// ============================================================================

/// Find the operand field that backs a derived arity.
///
/// The conventionally named field (`Inputs`/`Outputs`) wins; otherwise any
/// field with exactly the same bits.
pub fn backing_field<'a>(
    fields: &'a [OperandField],
    kind: ArityKind,
    derived: &DerivedArity,
) -> Option<&'a OperandField> {
    fields
        .iter()
        .find(|f| f.name == kind.field_name())
        .or_else(|| {
            fields
                .iter()
                .find(|f| f.start_bit == derived.start_bit && f.end_bit == derived.end_bit)
        })
}

fn check_arity(descriptor: &OpcodeDescriptor, kind: ArityKind, push: &mut dyn FnMut(ValidationErrorKind)) {
    let fields = descriptor.fields();

    match descriptor.arity(kind) {
        ArityField::Fixed(_) => {
            if fields.iter().any(|f| f.name == kind.field_name()) {
                push(ValidationErrorKind::ArityOperandMismatch {
                    arity: kind,
                    reason: format!(
                        "arity is fixed but the operand declares an '{}' field",
                        kind.field_name()
                    ),
                });
            }
        }
        ArityField::Derived(derived) => {
            if fields.is_empty() {
                push(match kind {
                    ArityKind::Inputs => ValidationErrorKind::ComputedInputWithoutOperand,
                    ArityKind::Outputs => ValidationErrorKind::ComputedOutputWithoutOperand,
                });
                if let Some(computation) = &derived.computation {
                    if let Some(error) = check_computation(&kind.to_string(), computation, None) {
                        push(error);
                    }
                }
                return;
            }

            let backing = backing_field(fields, kind, derived);
            match backing {
                None => push(ValidationErrorKind::ArityOperandMismatch {
                    arity: kind,
                    reason: format!(
                        "no operand field covers bits {}..={}",
                        derived.start_bit, derived.end_bit
                    ),
                }),
                Some(field) => {
                    if field.start_bit != derived.start_bit || field.end_bit != derived.end_bit {
                        push(ValidationErrorKind::ArityOperandMismatch {
                            arity: kind,
                            reason: format!(
                                "bits {}..={} differ from field '{}' ({}..={})",
                                derived.start_bit,
                                derived.end_bit,
                                field.name,
                                field.start_bit,
                                field.end_bit
                            ),
                        });
                    } else if field.name == kind.field_name()
                        && field.computation.is_some() != derived.computation.is_some()
                    {
                        push(ValidationErrorKind::ArityOperandMismatch {
                            arity: kind,
                            reason: format!(
                                "computation presence differs from field '{}'",
                                field.name
                            ),
                        });
                    }
                }
            }

            if let Some(computation) = &derived.computation {
                let domain = backing.filter(|f| {
                    f.is_well_formed()
                        && f.start_bit == derived.start_bit
                        && f.end_bit == derived.end_bit
                });
                if let Some(error) = check_computation(&kind.to_string(), computation, domain) {
                    push(error);
                }
            }
        }
    }
}

// ============================================================================
// Identifiers
// ============================================================================

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z][A-Z0-9_]*$").expect("identifier pattern is valid"))
}

fn check_unique_identifiers(descriptors: &[OpcodeDescriptor], errors: &mut Vec<ValidationError>) {
    let mut seen: HashMap<&str, usize> = HashMap::new();

    for (index, descriptor) in descriptors.iter().enumerate() {
        for identifier in descriptor.identifiers() {
            match seen.get(identifier) {
                Some(&first) => errors.push(ValidationError {
                    opcode: Some(OpcodeRef {
                        index,
                        name: descriptor.name.clone(),
                    }),
                    kind: ValidationErrorKind::DuplicateOpcodeIdentifier {
                        identifier: identifier.to_string(),
                        first_opcode: OpcodeRef {
                            index: first,
                            name: descriptors[first].name.clone(),
                        }
                        .to_string(),
                    },
                }),
                None => {
                    seen.insert(identifier, index);
                }
            }
        }
    }
}

// ============================================================================
// Unit tests
// ============================================================================
