//! opvm runtime
//!
//! Stack machine whose opcodes are described by `opvm-meta` tables. Loading a
//! table maps each opcode to a behavior and compiles its operand layout once;
//! evaluation then runs sources of 24-bit cells over 256-bit words.
//!
//! # Example
//!
//! ```
//! use opvm_runtime::{EvalRequest, MemoryHost, Program, RuntimeTable, Source, Vm, Word};
//!
//! let table = RuntimeTable::standard().unwrap();
//! let program = Program::new(
//!     vec![Source::new(vec![
//!         table.cell("CONSTANT", &[("Constant Index", 0)]).unwrap(),
//!         table.cell("CONSTANT", &[("Constant Index", 1)]).unwrap(),
//!         table.cell("ADD", &[("Inputs", 2)]).unwrap(),
//!     ])],
//!     vec![Word::from_u64(40), Word::from_u64(2)],
//! );
//!
//! let output = Vm::new(&table)
//!     .eval(&EvalRequest::new(&program), &MemoryHost::new())
//!     .unwrap();
//! assert_eq!(output.top(), Some(Word::from_u64(42)));
//! ```

pub mod bytecode;
pub mod error;
pub mod host;
pub mod operand;
pub mod ops;
pub mod table;
pub mod vm;
pub mod word;

pub use bytecode::disasm::disassemble;
pub use bytecode::{Cell, Program, Source};
pub use error::{RuntimeError, RuntimeResult};
pub use host::{Host, HostError, MemoryHost};
pub use operand::{DecodedOperand, OperandError, OperandLayout, Slot};
pub use ops::Behavior;
pub use table::{RuntimeTable, TableError};
pub use vm::{EvalOutput, EvalRequest, Vm};
pub use word::Word;

pub use opvm_config::VmConfig;
