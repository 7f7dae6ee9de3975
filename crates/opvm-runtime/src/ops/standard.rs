//! Standard opcode set
//!
//! The descriptor list below is the reference operand layout for every
//! behavior the VM implements. Its order fixes the opcode values.

use opvm_meta::{
    ArityField, OpcodeDescriptor, OpcodeTable, OperandField, ParameterDescriptor, ValidRange,
    ValidationReport,
};

/// Variadic fold: `Inputs` in the low byte, at least `min` values
fn fold(name: &str, description: &str, min: u32) -> OpcodeDescriptor {
    OpcodeDescriptor::new(name, description)
        .inputs(ArityField::derived(0, 7))
        .outputs(1)
        .field(
            OperandField::new("Inputs", 0, 7)
                .described("Number of values to fold")
                .valid_range(ValidRange::span(min, 255)),
        )
        .parameter(ParameterDescriptor::spread("Value"))
}

/// Fixed two-input comparison
fn compare(name: &str, description: &str) -> OpcodeDescriptor {
    OpcodeDescriptor::new(name, description)
        .inputs(2)
        .outputs(1)
        .parameter(ParameterDescriptor::new("A"))
        .parameter(ParameterDescriptor::new("B"))
}

/// Host read with fixed parameters
fn external(name: &str, description: &str, params: &[&str]) -> OpcodeDescriptor {
    params.iter().fold(
        OpcodeDescriptor::new(name, description)
            .inputs(params.len() as u32)
            .outputs(1),
        |desc, param| desc.parameter(ParameterDescriptor::new(*param)),
    )
}

/// Tier read: fixed parameters followed by spread context values
fn tier(name: &str, description: &str, params: &[&str]) -> OpcodeDescriptor {
    let computation = format!("this + {}", params.len());
    let desc = OpcodeDescriptor::new(name, description)
        .inputs(ArityField::derived_with(0, 7, computation.as_str()))
        .outputs(1)
        .field(
            OperandField::new("Inputs", 0, 7)
                .described("Number of context values")
                .computation(computation.as_str()),
        );
    params
        .iter()
        .fold(desc, |desc, param| desc.parameter(ParameterDescriptor::new(*param)))
        .parameter(ParameterDescriptor::spread("Context"))
}

/// Descriptors of the standard opcode set, in opcode order
pub fn descriptors() -> Vec<OpcodeDescriptor> {
    vec![
        // ===== Stack sources =====
        OpcodeDescriptor::new("CONSTANT", "Copy a value from the constant pool")
            .outputs(1)
            .field(OperandField::new("Constant Index", 0, 15)),
        OpcodeDescriptor::new("STACK", "Copy a value from the current frame")
            .outputs(1)
            .field(
                OperandField::new("Stack Index", 0, 15).described("Offset from the frame base"),
            ),
        OpcodeDescriptor::new("CONTEXT", "Read a cell of the context matrix")
            .outputs(1)
            .field(OperandField::new("Column Index", 8, 15))
            .field(OperandField::new("Row Index", 0, 7)),
        OpcodeDescriptor::new("CONTEXT_ROW", "Read a context cell at a dynamic row")
            .inputs(1)
            .outputs(1)
            .field(OperandField::new("Column Index", 0, 15))
            .parameter(ParameterDescriptor::new("Row")),
        // ===== Control flow =====
        OpcodeDescriptor::new("CALL", "Run a source over the top inputs values")
            .inputs(ArityField::derived(0, 3))
            .outputs(ArityField::derived(4, 7))
            .field(OperandField::new("Source Index", 8, 15).valid_range(ValidRange::span(1, 255)))
            .field(OperandField::new("Outputs", 4, 7))
            .field(OperandField::new("Inputs", 0, 3))
            .parameter(ParameterDescriptor::spread("Input")),
        OpcodeDescriptor::new("LOOP_N", "Thread values through a source a fixed number of times")
            .inputs(ArityField::derived(0, 7))
            .outputs(ArityField::derived(0, 7))
            .field(OperandField::new("Loop Count", 12, 15))
            .field(OperandField::new("Source Index", 8, 11).valid_range(ValidRange::span(1, 15)))
            .field(OperandField::new("Inputs", 0, 7))
            .parameter(ParameterDescriptor::spread("Value")),
        OpcodeDescriptor::new("DO_WHILE", "Run a source while the condition on top is non-zero")
            .inputs(ArityField::derived_with(0, 7, "this + 1"))
            .outputs(ArityField::derived(0, 7))
            .field(OperandField::new("Source Index", 8, 15).valid_range(ValidRange::span(1, 255)))
            .field(OperandField::new("Inputs", 0, 7).computation("this + 1"))
            .parameter(ParameterDescriptor::spread("Value"))
            .parameter(ParameterDescriptor::new("Condition")),
        OpcodeDescriptor::new("FOLD_CONTEXT", "Fold a source over the rows of context columns")
            .inputs(ArityField::derived(0, 3))
            .outputs(ArityField::derived(0, 3))
            .field(OperandField::new("Source Index", 12, 15).valid_range(ValidRange::span(1, 15)))
            .field(OperandField::new("Column", 8, 11))
            .field(OperandField::new("Width", 4, 7))
            .field(OperandField::new("Inputs", 0, 3).described("Number of accumulators"))
            .parameter(ParameterDescriptor::spread("Accumulator")),
        OpcodeDescriptor::new("ZIPMAP", "Map a source over the lanes of packed words")
            .inputs(ArityField::derived_with(0, 2, "this + 1"))
            .outputs(ArityField::derived(3, 7))
            .field(OperandField::new("Source Index", 11, 15).valid_range(ValidRange::span(1, 31)))
            .field(
                OperandField::new("Loop Size", 8, 10)
                    .described("log2 of the lane count")
                    .valid_range(ValidRange::span(0, 5)),
            )
            .field(OperandField::new("Outputs", 3, 7))
            .field(OperandField::new("Inputs", 0, 2).computation("this + 1"))
            .parameter(ParameterDescriptor::spread("Packed")),
        // ===== Math =====
        fold("ADD", "Sum of N values", 2),
        fold("SUB", "First value minus the rest", 2),
        fold("MUL", "Product of N values", 2),
        fold("DIV", "First value divided by the rest", 2),
        fold("MOD", "First value modulo each of the rest", 2),
        fold("EXP", "First value raised by each of the rest", 2),
        fold("MAX", "Largest of N values", 2),
        fold("MIN", "Smallest of N values", 2),
        // ===== Logic =====
        fold("EVERY", "Last value if every value is non-zero, else 0", 1).alias("AND"),
        fold("ANY", "First non-zero value, else 0", 1).alias("OR"),
        OpcodeDescriptor::new("IS_ZERO", "1 if the value is zero")
            .inputs(1)
            .outputs(1)
            .parameter(ParameterDescriptor::new("Value")),
        compare("EQUAL_TO", "1 if A equals B"),
        compare("GREATER_THAN", "1 if A is greater than B"),
        compare("LESS_THAN", "1 if A is less than B"),
        compare("GREATER_THAN_OR_EQUAL_TO", "1 if A is at least B"),
        compare("LESS_THAN_OR_EQUAL_TO", "1 if A is at most B"),
        OpcodeDescriptor::new("EAGER_IF", "A if the condition is non-zero, else B")
            .inputs(3)
            .outputs(1)
            .parameter(ParameterDescriptor::new("Condition"))
            .parameter(ParameterDescriptor::new("A"))
            .parameter(ParameterDescriptor::new("B")),
        OpcodeDescriptor::new("ENSURE", "Abort unless every value is non-zero")
            .inputs(ArityField::derived(0, 7))
            .field(OperandField::new("Inputs", 0, 7).valid_range(ValidRange::span(1, 255)))
            .parameter(ParameterDescriptor::spread("Value")),
        // ===== Storage =====
        OpcodeDescriptor::new("GET", "Read a storage value")
            .inputs(1)
            .outputs(1)
            .parameter(ParameterDescriptor::new("Key")),
        OpcodeDescriptor::new("SET", "Write a storage value")
            .inputs(2)
            .parameter(ParameterDescriptor::new("Key"))
            .parameter(ParameterDescriptor::new("Value")),
        // ===== Host reads =====
        external("ERC20_BALANCE_OF", "ERC20 balance of an account", &["Token", "Account"]),
        external("ERC20_TOTAL_SUPPLY", "ERC20 total supply", &["Token"]),
        external("ERC721_BALANCE_OF", "ERC721 balance of an account", &["Token", "Account"]),
        external("ERC721_OWNER_OF", "Owner of an ERC721 token", &["Token", "Id"]),
        external(
            "ERC1155_BALANCE_OF",
            "ERC1155 balance of an account",
            &["Token", "Account", "Id"],
        ),
        tier("ITIERV2_REPORT", "Tier report of an account", &["Contract", "Account"]),
        tier(
            "ITIERV2_REPORT_TIME_FOR_TIER",
            "Time an account reached a tier",
            &["Contract", "Account", "Tier"],
        ),
    ]
}

/// Validated standard table
pub fn table() -> Result<OpcodeTable, ValidationReport> {
    OpcodeTable::new(descriptors())
}
