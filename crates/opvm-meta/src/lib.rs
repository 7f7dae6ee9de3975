//! opvm opcode metadata
//!
//! Declarative description of every opcode's stack arity and 16-bit operand
//! layout, plus the tooling that keeps the description trustworthy:
//! - Operand fields: named bit ranges with optional computations and valid ranges
//! - Computation formulas: a tiny pure arithmetic language over one variable
//! - Validator: structural checks over a whole descriptor table
//! - Opcode table: the validated, immutable table handed to the VM
//! - Compiled form: deflated canonical JSON as `0x` hex
//!
//! # Example
//!
//! ```
//! use opvm_meta::{ArityField, OpcodeDescriptor, OpcodeTable, OperandField};
//!
//! let add = OpcodeDescriptor::new("ADD", "Sum of N values")
//!     .inputs(ArityField::derived(0, 7))
//!     .outputs(1)
//!     .field(OperandField::new("Inputs", 0, 7));
//! let table = OpcodeTable::new(vec![add]).unwrap();
//! let hex = opvm_meta::compile(&table).unwrap();
//! assert_eq!(opvm_meta::decompile(&hex).unwrap(), table);
//! ```

pub mod arity;
pub mod compile;
pub mod descriptor;
pub mod error;
pub mod field;
pub mod formula;
pub mod table;
pub mod validator;

pub use arity::{ArityField, ArityKind, DerivedArity};
pub use compile::{
    compile, compile_with_config, compile_with_level, decompile, DEFAULT_COMPRESSION_LEVEL,
};
pub use descriptor::{OpcodeDescriptor, Operand, ParameterDescriptor};
pub use error::MetaError;
pub use field::{extract_bits, insert_bits, Computation, OperandField, ValidRange};
pub use formula::{evaluate, Formula, FormulaError};
pub use table::OpcodeTable;
pub use validator::{validate, ValidationError, ValidationErrorKind, ValidationReport};
