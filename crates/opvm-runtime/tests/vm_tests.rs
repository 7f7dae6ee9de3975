//! End-to-end evaluation tests over the standard opcode table

use opvm_runtime::{
    Cell, EvalOutput, EvalRequest, MemoryHost, OperandError, Program, RuntimeError,
    RuntimeResult, RuntimeTable, Source, Vm, VmConfig, Word,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::{fixture, rstest};

fn w(value: u64) -> Word {
    Word::from_u64(value)
}

fn words(values: &[u64]) -> Vec<Word> {
    values.iter().map(|&v| w(v)).collect()
}

/// Pack `values` into consecutive lanes of `lane_bits`, lowest lane first
fn packed(values: &[u64], lane_bits: u32) -> Word {
    values
        .iter()
        .enumerate()
        .fold(Word::ZERO, |acc, (lane, &v)| acc | (w(v) << (lane as u32 * lane_bits)))
}

#[fixture]
fn table() -> RuntimeTable {
    RuntimeTable::standard().unwrap()
}

/// Assembles cells by opcode name
struct Asm<'t>(&'t RuntimeTable);

impl Asm<'_> {
    fn op(&self, name: &str, fields: &[(&str, u32)]) -> Cell {
        self.0.cell(name, fields).unwrap()
    }

    fn constant(&self, index: u32) -> Cell {
        self.op("CONSTANT", &[("Constant Index", index)])
    }

    fn stack(&self, index: u32) -> Cell {
        self.op("STACK", &[("Stack Index", index)])
    }

    fn fold(&self, name: &str, inputs: u32) -> Cell {
        self.op(name, &[("Inputs", inputs)])
    }
}

fn eval(table: &RuntimeTable, program: &Program) -> RuntimeResult<EvalOutput> {
    Vm::new(table).eval(&EvalRequest::new(program), &MemoryHost::new())
}

// ============================================================================
// Math and logic
// ============================================================================

#[rstest]
#[case("ADD", &[1, 2, 3], 6)]
#[case("SUB", &[10, 2, 3], 5)]
#[case("MUL", &[3, 4, 5], 60)]
#[case("DIV", &[12, 2, 3], 2)]
#[case("MOD", &[13, 2, 3], 1)]
#[case("EXP", &[2, 3, 2], 64)]
#[case("MAX", &[4, 9, 2], 9)]
#[case("MIN", &[4, 9, 2], 2)]
#[case("EVERY", &[4, 9, 2], 2)]
#[case("AND", &[4, 0, 2], 0)]
#[case("ANY", &[0, 9, 2], 9)]
#[case("OR", &[0, 0], 0)]
fn test_fold_over_constants(
    table: RuntimeTable,
    #[case] name: &str,
    #[case] values: &[u64],
    #[case] expected: u64,
) {
    let asm = Asm(&table);
    let mut cells: Vec<Cell> = (0..values.len() as u32).map(|i| asm.constant(i)).collect();
    cells.push(asm.fold(name, values.len() as u32));
    let program = Program::new(vec![Source::new(cells)], words(values));

    let output = eval(&table, &program).unwrap();
    assert_eq!(output.stack, vec![w(expected)]);
}

#[rstest]
#[case("EQUAL_TO", 3, 3, 1)]
#[case("EQUAL_TO", 3, 4, 0)]
#[case("GREATER_THAN", 5, 3, 1)]
#[case("LESS_THAN", 5, 3, 0)]
#[case("GREATER_THAN_OR_EQUAL_TO", 3, 3, 1)]
#[case("LESS_THAN_OR_EQUAL_TO", 4, 3, 0)]
fn test_comparisons(
    table: RuntimeTable,
    #[case] name: &str,
    #[case] a: u64,
    #[case] b: u64,
    #[case] expected: u64,
) {
    let asm = Asm(&table);
    let program = Program::new(
        vec![Source::new(vec![asm.constant(0), asm.constant(1), asm.op(name, &[])])],
        words(&[a, b]),
    );
    assert_eq!(eval(&table, &program).unwrap().stack, words(&[expected]));
}

#[rstest]
fn test_eager_if_and_is_zero(table: RuntimeTable) {
    let asm = Asm(&table);
    let program = Program::new(
        vec![Source::new(vec![
            asm.constant(0),
            asm.op("IS_ZERO", &[]),
            asm.constant(1),
            asm.constant(2),
            asm.op("EAGER_IF", &[]),
        ])],
        words(&[0, 7, 8]),
    );
    assert_eq!(eval(&table, &program).unwrap().stack, words(&[7]));
}

#[rstest]
fn test_ensure(table: RuntimeTable) {
    let asm = Asm(&table);
    let passing = Program::new(
        vec![Source::new(vec![asm.constant(0), asm.constant(0), asm.fold("ENSURE", 2)])],
        words(&[1, 0]),
    );
    assert_eq!(eval(&table, &passing).unwrap().stack, Vec::<Word>::new());

    let failing = Program::new(
        vec![Source::new(vec![asm.constant(0), asm.constant(1), asm.fold("ENSURE", 2)])],
        words(&[1, 0]),
    );
    assert_eq!(
        eval(&table, &failing),
        Err(RuntimeError::EnsureFailed { position: 1 })
    );
}

#[rstest]
#[case("DIV", &[1, 0], RuntimeError::DivisionByZero { opcode: "DIV".into() })]
#[case("MOD", &[1, 0], RuntimeError::DivisionByZero { opcode: "MOD".into() })]
#[case("SUB", &[1, 2], RuntimeError::ArithmeticOverflow { opcode: "SUB".into() })]
fn test_arithmetic_errors(
    table: RuntimeTable,
    #[case] name: &str,
    #[case] values: &[u64],
    #[case] expected: RuntimeError,
) {
    let asm = Asm(&table);
    let program = Program::new(
        vec![Source::new(vec![asm.constant(0), asm.constant(1), asm.fold(name, 2)])],
        words(values),
    );
    assert_eq!(eval(&table, &program), Err(expected));
}

#[rstest]
fn test_add_overflow(table: RuntimeTable) {
    let asm = Asm(&table);
    let program = Program::new(
        vec![Source::new(vec![asm.constant(0), asm.constant(1), asm.fold("ADD", 2)])],
        vec![Word::MAX, Word::ONE],
    );
    assert_eq!(
        eval(&table, &program),
        Err(RuntimeError::ArithmeticOverflow {
            opcode: "ADD".into()
        })
    );
}

// ============================================================================
// Control flow
// ============================================================================

#[rstest]
fn test_call_consumes_inputs_and_leaves_outputs(table: RuntimeTable) {
    let asm = Asm(&table);
    let program = Program::new(
        vec![
            Source::new(vec![
                asm.constant(0),
                asm.constant(1),
                asm.constant(2),
                asm.op("CALL", &[("Source Index", 1), ("Outputs", 1), ("Inputs", 3)]),
            ]),
            Source::new(vec![asm.fold("ADD", 3)]),
        ],
        words(&[1, 2, 3]),
    );

    // three values in, one out: the caller's stack shrinks by two
    let output = eval(&table, &program).unwrap();
    assert_eq!(output.stack, words(&[6]));
}

#[rstest]
fn test_call_keeps_only_top_outputs(table: RuntimeTable) {
    let asm = Asm(&table);
    let program = Program::new(
        vec![
            Source::new(vec![
                asm.constant(0),
                asm.constant(1),
                asm.op("CALL", &[("Source Index", 1), ("Outputs", 2), ("Inputs", 1)]),
            ]),
            // frame [x]: leaves [x, x, 2x, 3x]
            Source::new(vec![
                asm.stack(0),
                asm.stack(0),
                asm.stack(0),
                asm.fold("ADD", 2),
                asm.stack(0),
                asm.stack(2),
                asm.fold("ADD", 2),
            ]),
        ],
        words(&[9, 5]),
    );
    assert_eq!(eval(&table, &program).unwrap().stack, words(&[9, 10, 15]));
}

#[rstest]
fn test_callee_cannot_reach_below_its_frame(table: RuntimeTable) {
    let asm = Asm(&table);
    let program = Program::new(
        vec![
            Source::new(vec![
                asm.constant(0),
                asm.op("CALL", &[("Source Index", 1), ("Outputs", 1), ("Inputs", 0)]),
            ]),
            Source::new(vec![asm.op("IS_ZERO", &[])]),
        ],
        words(&[1]),
    );
    assert_eq!(
        eval(&table, &program),
        Err(RuntimeError::StackUnderflow {
            opcode: "IS_ZERO".into(),
            needed: 1,
            available: 0,
        })
    );
}

#[rstest]
fn test_loop_n(table: RuntimeTable) {
    let asm = Asm(&table);
    let program = Program::new(
        vec![
            Source::new(vec![
                asm.constant(0),
                asm.op(
                    "LOOP_N",
                    &[("Loop Count", 5), ("Source Index", 1), ("Inputs", 1)],
                ),
            ]),
            Source::new(vec![asm.constant(1), asm.fold("MUL", 2)]),
        ],
        words(&[1, 2]),
    );
    assert_eq!(eval(&table, &program).unwrap().stack, words(&[32]));
}

#[rstest]
#[case(1, 192)]
#[case(0, 3)]
fn test_do_while(table: RuntimeTable, #[case] condition: u64, #[case] expected: u64) {
    let asm = Asm(&table);
    let program = Program::new(
        vec![
            Source::new(vec![
                asm.constant(0),
                asm.constant(1),
                asm.op("DO_WHILE", &[("Source Index", 1), ("Inputs", 1)]),
            ]),
            // frame [x]: leaves [2x, 2x < 100]
            Source::new(vec![
                asm.constant(2),
                asm.fold("MUL", 2),
                asm.stack(0),
                asm.constant(3),
                asm.op("LESS_THAN", &[]),
            ]),
        ],
        words(&[3, condition, 2, 100]),
    );
    assert_eq!(eval(&table, &program).unwrap().stack, words(&[expected]));
}

#[rstest]
fn test_fold_context_sums_row_products(table: RuntimeTable) {
    let asm = Asm(&table);
    let program = Program::new(
        vec![
            Source::new(vec![
                asm.constant(0),
                asm.op(
                    "FOLD_CONTEXT",
                    &[("Source Index", 1), ("Column", 0), ("Width", 2), ("Inputs", 1)],
                ),
            ]),
            // frame [acc, a, b]: leaves acc + a * b on top
            Source::new(vec![
                asm.stack(1),
                asm.stack(2),
                asm.fold("MUL", 2),
                asm.stack(0),
                asm.fold("ADD", 2),
            ]),
        ],
        words(&[0]),
    );
    let context = vec![words(&[1, 2, 3]), words(&[10, 20, 30])];

    let output = Vm::new(&table)
        .eval(
            &EvalRequest::new(&program).context(&context),
            &MemoryHost::new(),
        )
        .unwrap();
    assert_eq!(output.stack, words(&[140]));

    let narrow = vec![words(&[1, 2, 3])];
    assert_eq!(
        Vm::new(&table).eval(
            &EvalRequest::new(&program).context(&narrow),
            &MemoryHost::new()
        ),
        Err(RuntimeError::ContextOutOfBounds {
            column: 1,
            row: Word::ZERO
        })
    );
}

#[rstest]
fn test_zipmap_maps_every_lane(table: RuntimeTable) {
    let asm = Asm(&table);
    let a = packed(&[1, 2, 3, 4, 5, 6, 7, 8], 32);
    let b = packed(&[10, 20, 30, 40, 50, 60, 70, 80], 32);
    let program = Program::new(
        vec![
            Source::new(vec![
                asm.constant(0),
                asm.constant(1),
                asm.op(
                    "ZIPMAP",
                    &[
                        ("Source Index", 1),
                        ("Loop Size", 3),
                        ("Outputs", 16),
                        ("Inputs", 1),
                    ],
                ),
            ]),
            // frame [a, b]: leaves a + b then a * b on top
            Source::new(vec![
                asm.stack(0),
                asm.stack(1),
                asm.fold("ADD", 2),
                asm.stack(0),
                asm.stack(1),
                asm.fold("MUL", 2),
            ]),
        ],
        vec![a, b],
    );

    let output = eval(&table, &program).unwrap();
    let top_first: Vec<Word> = output.stack.iter().rev().copied().collect();
    assert_eq!(
        top_first,
        words(&[640, 88, 490, 77, 360, 66, 250, 55, 160, 44, 90, 33, 40, 22, 10, 11])
    );
}

#[rstest]
fn test_zipmap_rejects_uneven_outputs(table: RuntimeTable) {
    let asm = Asm(&table);
    let program = Program::new(
        vec![
            Source::new(vec![
                asm.constant(0),
                asm.op(
                    "ZIPMAP",
                    &[
                        ("Source Index", 1),
                        ("Loop Size", 2),
                        ("Outputs", 3),
                        ("Inputs", 0),
                    ],
                ),
            ]),
            Source::new(vec![]),
        ],
        words(&[1]),
    );
    assert!(matches!(
        eval(&table, &program),
        Err(RuntimeError::InvalidOperandValue {
            reason: OperandError::LaneMismatch { outputs: 3, lanes: 4 },
            ..
        })
    ));
}

#[rstest]
fn test_recursion_hits_call_depth(table: RuntimeTable) {
    let asm = Asm(&table);
    let program = Program::new(
        vec![
            Source::new(vec![asm.op("CALL", &[("Source Index", 1)])]),
            Source::new(vec![asm.op("CALL", &[("Source Index", 1)])]),
        ],
        Vec::new(),
    );
    assert_eq!(
        eval(&table, &program),
        Err(RuntimeError::StackDepthExceeded { max: 32 })
    );

    let config = VmConfig {
        max_call_depth: 4,
        ..VmConfig::default()
    };
    assert_eq!(
        Vm::with_config(&table, config).eval(&EvalRequest::new(&program), &MemoryHost::new()),
        Err(RuntimeError::StackDepthExceeded { max: 4 })
    );
}

#[rstest]
fn test_deep_recursion_is_a_typed_error(table: RuntimeTable) {
    // Frames live on the heap, so a limit far past any native stack still
    // ends in an error rather than an abort.
    let asm = Asm(&table);
    let program = Program::new(
        vec![
            Source::new(vec![asm.op("CALL", &[("Source Index", 1)])]),
            Source::new(vec![asm.op("CALL", &[("Source Index", 1)])]),
        ],
        Vec::new(),
    );
    let config = VmConfig {
        max_call_depth: 200_000,
        ..VmConfig::default()
    };
    assert_eq!(
        Vm::with_config(&table, config).eval(&EvalRequest::new(&program), &MemoryHost::new()),
        Err(RuntimeError::StackDepthExceeded { max: 200_000 })
    );
}

#[rstest]
fn test_nested_loops_resume_their_callers(table: RuntimeTable) {
    let asm = Asm(&table);
    let program = Program::new(
        vec![
            Source::new(vec![
                asm.constant(0),
                asm.op(
                    "LOOP_N",
                    &[("Loop Count", 3), ("Source Index", 1), ("Inputs", 1)],
                ),
                asm.constant(1),
            ]),
            Source::new(vec![asm.op(
                "LOOP_N",
                &[("Loop Count", 2), ("Source Index", 2), ("Inputs", 1)],
            )]),
            Source::new(vec![asm.constant(1), asm.fold("MUL", 2)]),
        ],
        words(&[1, 2]),
    );
    // 2^(3 * 2), then the cell after the outer loop
    assert_eq!(eval(&table, &program).unwrap().stack, words(&[64, 2]));
}

// ============================================================================
// Context, storage and host reads
// ============================================================================

#[rstest]
fn test_context_reads(table: RuntimeTable) {
    let asm = Asm(&table);
    let program = Program::new(
        vec![Source::new(vec![
            asm.op("CONTEXT", &[("Column Index", 1), ("Row Index", 0)]),
            asm.constant(0),
            asm.op("CONTEXT_ROW", &[("Column Index", 0)]),
        ])],
        words(&[1]),
    );
    let context = vec![words(&[5, 6]), words(&[7, 8])];
    let output = Vm::new(&table)
        .eval(&EvalRequest::new(&program).context(&context), &MemoryHost::new())
        .unwrap();
    assert_eq!(output.stack, words(&[7, 6]));

    let missing = Program::new(
        vec![Source::new(vec![asm.op(
            "CONTEXT",
            &[("Column Index", 3), ("Row Index", 0)],
        )])],
        Vec::new(),
    );
    assert_eq!(
        Vm::new(&table).eval(&EvalRequest::new(&missing).context(&context), &MemoryHost::new()),
        Err(RuntimeError::ContextOutOfBounds {
            column: 3,
            row: Word::ZERO
        })
    );
}

#[rstest]
fn test_get_sees_earlier_set(table: RuntimeTable) {
    let asm = Asm(&table);
    let program = Program::new(
        vec![Source::new(vec![
            asm.constant(0),
            asm.op("GET", &[]),
            asm.constant(0),
            asm.constant(1),
            asm.op("SET", &[]),
            asm.constant(0),
            asm.op("GET", &[]),
        ])],
        words(&[1, 7]),
    );
    let host = MemoryHost::new().with_storage(w(1), w(100));

    let output = Vm::new(&table)
        .eval(&EvalRequest::new(&program), &host)
        .unwrap();
    assert_eq!(output.stack, words(&[100, 7]));
    assert_eq!(output.writes.get(&w(1)), Some(&w(7)));
    assert_eq!(output.writes.len(), 1);
}

#[rstest]
fn test_token_reads(table: RuntimeTable) {
    let asm = Asm(&table);
    let program = Program::new(
        vec![Source::new(vec![
            asm.constant(0),
            asm.constant(1),
            asm.op("ERC20_BALANCE_OF", &[]),
            asm.constant(0),
            asm.op("ERC20_TOTAL_SUPPLY", &[]),
            asm.constant(0),
            asm.constant(1),
            asm.constant(2),
            asm.op("ERC1155_BALANCE_OF", &[]),
            asm.constant(0),
            asm.constant(1),
            asm.op("ERC721_BALANCE_OF", &[]),
        ])],
        words(&[1, 2, 3]),
    );
    let host = MemoryHost::new()
        .with_erc20_balance(w(1), w(2), w(500))
        .with_erc20_supply(w(1), w(9000))
        .with_erc1155_balance(w(1), w(2), w(3), w(4))
        .with_erc721_balance(w(1), w(2), w(7));

    let output = Vm::new(&table)
        .eval(&EvalRequest::new(&program), &host)
        .unwrap();
    assert_eq!(output.stack, words(&[500, 9000, 4, 7]));
}

#[rstest]
fn test_tier_report(table: RuntimeTable) {
    let asm = Asm(&table);
    let report = packed(&[100, 200], 32);
    // One extra input is handed to the host as context
    let program = Program::new(
        vec![Source::new(vec![
            asm.constant(0),
            asm.constant(1),
            asm.op("ITIERV2_REPORT", &[]),
            asm.constant(0),
            asm.constant(2),
            asm.constant(3),
            asm.op("ITIERV2_REPORT", &[("Inputs", 1)]),
        ])],
        words(&[1, 2, 3, 42]),
    );
    let host = MemoryHost::new().with_tier_report(w(1), w(2), report);

    let output = Vm::new(&table)
        .eval(&EvalRequest::new(&program), &host)
        .unwrap();
    // Accounts without a report read as never having held any tier
    assert_eq!(output.stack, vec![report, Word::MAX]);
}

#[rstest]
fn test_tier_report_time_for_tier(table: RuntimeTable) {
    let asm = Asm(&table);
    let program = Program::new(
        vec![Source::new(vec![
            asm.constant(0),
            asm.constant(1),
            asm.constant(2),
            asm.op("ITIERV2_REPORT_TIME_FOR_TIER", &[]),
        ])],
        words(&[1, 2, 2]),
    );
    let host = MemoryHost::new().with_tier_report(w(1), w(2), packed(&[100, 200], 32));

    let output = Vm::new(&table)
        .eval(&EvalRequest::new(&program), &host)
        .unwrap();
    assert_eq!(output.stack, words(&[200]));
}

#[rstest]
fn test_failed_host_read_aborts(table: RuntimeTable) {
    let asm = Asm(&table);
    let program = Program::new(
        vec![Source::new(vec![
            asm.constant(0),
            asm.constant(1),
            asm.op("ERC721_OWNER_OF", &[]),
        ])],
        words(&[1, 2]),
    );
    assert!(matches!(
        eval(&table, &program),
        Err(RuntimeError::ExternalReadFailure { opcode, .. }) if opcode == "ERC721_OWNER_OF"
    ));
}

// ============================================================================
// Evaluation boundaries
// ============================================================================

#[rstest]
fn test_inputs_entrypoint_and_final_stack(table: RuntimeTable) {
    let asm = Asm(&table);
    let program = Program::new(
        vec![
            Source::new(vec![asm.constant(0)]),
            Source::new(vec![asm.stack(1), asm.stack(0), asm.fold("SUB", 2)]),
        ],
        words(&[99]),
    );
    let inputs = words(&[4, 10]);
    let request = EvalRequest::new(&program).entrypoint(1).inputs(&inputs);

    let output = Vm::new(&table).eval(&request, &MemoryHost::new()).unwrap();
    assert_eq!(output.stack, words(&[4, 10, 6]));

    let output = Vm::new(&table)
        .eval(&request.final_stack_index(1), &MemoryHost::new())
        .unwrap();
    assert_eq!(output.stack, words(&[4]));

    assert_eq!(
        Vm::new(&table).eval(&request.final_stack_index(5), &MemoryHost::new()),
        Err(RuntimeError::MissingOutputs {
            expected: 5,
            actual: 3
        })
    );
}

#[rstest]
fn test_stack_overflow(table: RuntimeTable) {
    let asm = Asm(&table);
    let program = Program::new(
        vec![Source::new(vec![asm.constant(0), asm.constant(0), asm.constant(0)])],
        words(&[1]),
    );
    let config = VmConfig {
        max_stack_depth: 2,
        ..VmConfig::default()
    };
    assert_eq!(
        Vm::with_config(&table, config).eval(&EvalRequest::new(&program), &MemoryHost::new()),
        Err(RuntimeError::StackOverflow { max: 2 })
    );
}

#[rstest]
fn test_underflow(table: RuntimeTable) {
    let asm = Asm(&table);
    let program = Program::new(vec![Source::new(vec![asm.fold("ADD", 2)])], Vec::new());
    assert_eq!(
        eval(&table, &program),
        Err(RuntimeError::StackUnderflow {
            opcode: "ADD".into(),
            needed: 2,
            available: 0,
        })
    );
}

#[rstest]
fn test_bad_cells(table: RuntimeTable) {
    let asm = Asm(&table);
    let invalid_opcode = Program::new(
        vec![Source::new(vec![asm.constant(0), Cell::new(200, 0)])],
        words(&[1]),
    );
    assert_eq!(
        eval(&table, &invalid_opcode),
        Err(RuntimeError::InvalidOpcode {
            opcode: 200,
            source_index: 0,
            pc: 1
        })
    );

    // CALL source 0 is outside the field's valid range
    let out_of_range = Program::new(vec![Source::new(vec![asm.op("CALL", &[])])], Vec::new());
    assert!(matches!(
        eval(&table, &out_of_range),
        Err(RuntimeError::InvalidOperandValue {
            reason: OperandError::OutOfRange { raw: 0, .. },
            ..
        })
    ));

    let missing_source = Program::new(
        vec![Source::new(vec![asm.op("CALL", &[("Source Index", 5)])])],
        Vec::new(),
    );
    assert_eq!(
        eval(&table, &missing_source),
        Err(RuntimeError::InvalidSourceIndex { index: 5 })
    );

    let missing_constant = Program::new(vec![Source::new(vec![asm.constant(3)])], Vec::new());
    assert_eq!(
        eval(&table, &missing_constant),
        Err(RuntimeError::InvalidConstantIndex { index: 3 })
    );

    assert_eq!(
        Vm::new(&table).eval(&EvalRequest::new(&Program::default()), &MemoryHost::new()),
        Err(RuntimeError::InvalidSourceIndex { index: 0 })
    );
}

proptest! {
    #[test]
    fn prop_add_matches_u128(a in any::<u64>(), b in any::<u64>()) {
        let table = RuntimeTable::standard().unwrap();
        let asm = Asm(&table);
        let program = Program::new(
            vec![Source::new(vec![asm.constant(0), asm.constant(1), asm.fold("ADD", 2)])],
            words(&[a, b]),
        );
        let output = eval(&table, &program).unwrap();
        prop_assert_eq!(output.top(), Some(Word::from(u128::from(a) + u128::from(b))));
    }
}
