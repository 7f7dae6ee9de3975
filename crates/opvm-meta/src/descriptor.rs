//! Opcode descriptors
//!
//! A descriptor is the declarative description of one opcode: its name and
//! aliases, stack arity, operand layout and the parameters it pops (for
//! documentation and code generation).

use crate::arity::{ArityField, ArityKind};
use crate::field::OperandField;
use serde::{Deserialize, Serialize};

/// Documentation of one stack value consumed by an opcode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterDescriptor {
    pub name: String,
    /// The parameter repeats for the variable part of the inputs
    pub spread: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            spread: false,
            description: None,
        }
    }

    pub fn spread(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            spread: true,
            description: None,
        }
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Operand layout: the literal `0` (no operand bits) or a list of fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(try_from = "OperandRepr", into = "OperandRepr")]
pub enum Operand {
    #[default]
    None,
    Fields(Vec<OperandField>),
}

impl Operand {
    /// Fields in declaration order (empty for `0`)
    pub fn fields(&self) -> &[OperandField] {
        match self {
            Operand::None => &[],
            Operand::Fields(fields) => fields,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Operand::None)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum OperandRepr {
    Zero(u64),
    Fields(Vec<OperandField>),
}

impl TryFrom<OperandRepr> for Operand {
    type Error = String;

    fn try_from(repr: OperandRepr) -> Result<Self, Self::Error> {
        match repr {
            OperandRepr::Zero(0) => Ok(Operand::None),
            OperandRepr::Zero(n) => Err(format!(
                "operand must be 0 or an array of fields, found {}",
                n
            )),
            OperandRepr::Fields(fields) => Ok(Operand::Fields(fields)),
        }
    }
}

impl From<Operand> for OperandRepr {
    fn from(operand: Operand) -> Self {
        match operand {
            Operand::None => OperandRepr::Zero(0),
            Operand::Fields(fields) => OperandRepr::Fields(fields),
        }
    }
}

/// Declarative description of one opcode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpcodeDescriptor {
    pub name: String,
    pub description: String,
    pub outputs: ArityField,
    pub inputs: ArityField,
    pub operand: Operand,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterDescriptor>,
}

impl OpcodeDescriptor {
    /// Descriptor with no operand and zero arity
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            outputs: ArityField::Fixed(0),
            inputs: ArityField::Fixed(0),
            operand: Operand::None,
            aliases: Vec::new(),
            parameters: Vec::new(),
        }
    }

    pub fn inputs(mut self, inputs: impl Into<ArityField>) -> Self {
        self.inputs = inputs.into();
        self
    }

    pub fn outputs(mut self, outputs: impl Into<ArityField>) -> Self {
        self.outputs = outputs.into();
        self
    }

    /// Append an operand field (fields are listed high bits first)
    pub fn field(mut self, field: OperandField) -> Self {
        match &mut self.operand {
            Operand::None => self.operand = Operand::Fields(vec![field]),
            Operand::Fields(fields) => fields.push(field),
        }
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn parameter(mut self, parameter: ParameterDescriptor) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn arity(&self, kind: ArityKind) -> &ArityField {
        match kind {
            ArityKind::Inputs => &self.inputs,
            ArityKind::Outputs => &self.outputs,
        }
    }

    /// Operand fields in declaration order
    pub fn fields(&self) -> &[OperandField] {
        self.operand.fields()
    }

    /// Look up an operand field by name
    pub fn field_named(&self, name: &str) -> Option<&OperandField> {
        self.fields().iter().find(|f| f.name == name)
    }

    /// Name followed by aliases
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::ValidRange;
    use pretty_assertions::assert_eq;

    fn add() -> OpcodeDescriptor {
        OpcodeDescriptor::new("ADD", "Sum of N values")
            .inputs(ArityField::derived(0, 7))
            .outputs(1)
            .field(OperandField::new("Inputs", 0, 7).valid_range(ValidRange::span(2, 255)))
            .alias("SUM")
            .parameter(ParameterDescriptor::spread("Value"))
    }

    #[test]
    fn test_json_round_trip() {
        let json = serde_json::to_string(&add()).unwrap();
        assert_eq!(
            json,
            concat!(
                r#"{"name":"ADD","description":"Sum of N values","outputs":1,"#,
                r#""inputs":{"startBit":0,"endBit":7},"#,
                r#""operand":[{"name":"Inputs","startBit":0,"endBit":7,"validRange":[[2,255]]}],"#,
                r#""aliases":["SUM"],"parameters":[{"name":"Value","spread":true}]}"#
            )
        );
        let back: OpcodeDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, add());
    }

    #[test]
    fn test_operand_zero_literal() {
        let json = r#"{"name":"IS_ZERO","description":"","outputs":1,"inputs":1,"operand":0}"#;
        let desc: OpcodeDescriptor = serde_json::from_str(json).unwrap();
        assert!(desc.operand.is_none());
        assert!(desc.aliases.is_empty());
        assert_eq!(serde_json::to_string(&desc).unwrap(), json);
    }

    #[test]
    fn test_operand_rejects_nonzero_literal() {
        let json = r#"{"name":"X","description":"","outputs":1,"inputs":1,"operand":3}"#;
        assert!(serde_json::from_str::<OpcodeDescriptor>(json).is_err());
    }

    #[test]
    fn test_rejects_unknown_top_level_key() {
        let json = r#"{"name":"X","description":"","outputs":1,"inputs":1,"operand":0,"gas":3}"#;
        assert!(serde_json::from_str::<OpcodeDescriptor>(json).is_err());
    }

    #[test]
    fn test_identifiers() {
        let desc = add();
        assert_eq!(desc.identifiers().collect::<Vec<_>>(), vec!["ADD", "SUM"]);
        assert!(desc.field_named("Inputs").is_some());
        assert!(desc.field_named("Outputs").is_none());
    }
}
