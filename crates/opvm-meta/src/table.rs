//! Validated opcode table
//!
//! The table is the single source of opcode metadata. It can only be built
//! through [`validate`](crate::validator::validate), so holders of an
//! `OpcodeTable` never see a descriptor that breaks the layout rules.

use crate::descriptor::OpcodeDescriptor;
use crate::error::MetaError;
use crate::validator::{validate, ValidationReport};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Ordered, immutable sequence of descriptors; the index is the opcode value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpcodeTable {
    descriptors: Vec<OpcodeDescriptor>,
    by_identifier: HashMap<String, u8>,
}

impl OpcodeTable {
    /// Validate `descriptors` and build a table from them.
    pub fn new(descriptors: Vec<OpcodeDescriptor>) -> Result<Self, ValidationReport> {
        if let Err(report) = validate(&descriptors) {
            warn!(
                opcodes = descriptors.len(),
                errors = report.len(),
                "opcode table rejected"
            );
            return Err(report);
        }

        // Validation guarantees unique identifiers and at most 256 opcodes.
        let mut by_identifier = HashMap::new();
        for (index, descriptor) in descriptors.iter().enumerate() {
            for identifier in descriptor.identifiers() {
                by_identifier.insert(identifier.to_string(), index as u8);
            }
        }

        debug!(opcodes = descriptors.len(), "opcode table built");
        Ok(Self {
            descriptors,
            by_identifier,
        })
    }

    /// Parse a JSON array of descriptors and validate it.
    pub fn from_json(json: &str) -> Result<Self, MetaError> {
        let descriptors: Vec<OpcodeDescriptor> = serde_json::from_str(json)?;
        Ok(Self::new(descriptors)?)
    }

    /// Canonical (compact, field-ordered) JSON
    pub fn to_json(&self) -> Result<String, MetaError> {
        Ok(serde_json::to_string(&self.descriptors)?)
    }

    /// Human-readable JSON
    pub fn to_json_pretty(&self) -> Result<String, MetaError> {
        Ok(serde_json::to_string_pretty(&self.descriptors)?)
    }

    /// Descriptor for an opcode value
    pub fn get(&self, opcode: u8) -> Option<&OpcodeDescriptor> {
        self.descriptors.get(usize::from(opcode))
    }

    /// Opcode value for a name or alias
    pub fn lookup(&self, identifier: &str) -> Option<u8> {
        self.by_identifier.get(identifier).copied()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// `(opcode, descriptor)` pairs in opcode order
    pub fn iter(&self) -> impl Iterator<Item = (u8, &OpcodeDescriptor)> {
        self.descriptors
            .iter()
            .enumerate()
            .map(|(index, descriptor)| (index as u8, descriptor))
    }

    pub fn descriptors(&self) -> &[OpcodeDescriptor] {
        &self.descriptors
    }

    pub fn into_descriptors(self) -> Vec<OpcodeDescriptor> {
        self.descriptors
    }
}
