//! Compiled form round trip and layout properties

use opvm_config::MetaConfig;
use opvm_meta::{
    compile, compile_with_config, compile_with_level, decompile, MetaError, validate, ArityField, OpcodeDescriptor, OpcodeTable,
    OperandField, ValidRange,
};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

/// Fields packed from the high bits down, each 1-4 bits wide with optional gaps
fn packed_fields() -> impl Strategy<Value = Vec<OperandField>> {
    prop::collection::vec((1u8..=4, 0u8..=1, prop::option::of(0i64..20)), 0..4).prop_map(
        |shapes| {
            let mut fields = Vec::new();
            let mut top: i16 = 15;
            for (i, (width, gap, offset)) in shapes.into_iter().enumerate() {
                let end = top - i16::from(gap);
                let start = end - i16::from(width) + 1;
                if start < 0 {
                    break;
                }
                let mut field = OperandField::new(format!("Field {}", i), start as u8, end as u8);
                if let Some(offset) = offset {
                    field = field.computation(format!("this + {}", offset));
                }
                if width > 1 {
                    field = field.valid_range(ValidRange::span(1, (1 << width) - 1));
                }
                fields.push(field);
                top = start - 1;
            }
            fields
        },
    )
}

fn valid_table() -> impl Strategy<Value = Vec<OpcodeDescriptor>> {
    prop::collection::vec((packed_fields(), 0u32..4, 0u32..4), 1..12).prop_map(|entries| {
        entries
            .into_iter()
            .enumerate()
            .map(|(i, (fields, inputs, outputs))| {
                let mut descriptor = OpcodeDescriptor::new(format!("OP_{}", i), format!("op {}", i))
                    .inputs(inputs)
                    .outputs(outputs);
                for field in fields {
                    descriptor = descriptor.field(field);
                }
                if i % 3 == 0 {
                    descriptor = descriptor.alias(format!("ALIAS_{}", i));
                }
                descriptor
            })
            .collect()
    })
}

fn arbitrary_fields() -> impl Strategy<Value = Vec<OperandField>> {
    prop::collection::vec((0u8..16, 0u8..16), 0..5).prop_map(|ranges| {
        ranges
            .into_iter()
            .enumerate()
            .map(|(i, (start, end))| OperandField::new(format!("F{}", i), start, end))
            .collect()
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_compile_round_trip(descriptors in valid_table(), level in 0u32..=9) {
        let table = OpcodeTable::new(descriptors).unwrap();
        let hex = compile_with_level(&table, level).unwrap();
        prop_assert!(hex.starts_with("0x"));
        prop_assert_eq!(decompile(&hex).unwrap(), table);
    }

    #[test]
    fn prop_accepted_fields_never_share_bits(fields in arbitrary_fields()) {
        let mut descriptor = OpcodeDescriptor::new("SAMPLE", "");
        for field in fields.iter().cloned() {
            descriptor = descriptor.field(field);
        }
        if validate(&[descriptor]).is_ok() {
            for (i, a) in fields.iter().enumerate() {
                for b in fields.iter().skip(i + 1) {
                    prop_assert!(!a.overlaps(b), "{:?} overlaps {:?}", a, b);
                    prop_assert!(a.start_bit > b.end_bit, "{:?} listed before {:?}", a, b);
                }
            }
        }
    }

    #[test]
    fn prop_validation_is_deterministic(descriptors in valid_table(), extra in arbitrary_fields()) {
        let mut descriptors = descriptors;
        let mut duplicate = OpcodeDescriptor::new("OP_0", "").inputs(ArityField::derived(0, 3));
        for field in extra {
            duplicate = duplicate.field(field);
        }
        descriptors.push(duplicate);
        prop_assert_eq!(validate(&descriptors), validate(&descriptors));
    }
}

#[test]
fn test_standard_layout_round_trip() {
    let table = OpcodeTable::new(vec![
        OpcodeDescriptor::new("ZIPMAP", "Map a source over packed lanes")
            .inputs(ArityField::derived_with(0, 2, "this + 1"))
            .outputs(ArityField::derived(3, 7))
            .field(OperandField::new("Source Index", 11, 15).valid_range(ValidRange::span(1, 31)))
            .field(OperandField::new("Loop Size", 8, 10).valid_range(ValidRange::span(0, 5)))
            .field(OperandField::new("Outputs", 3, 7))
            .field(OperandField::new("Inputs", 0, 2).computation("this + 1")),
    ])
    .unwrap();

    let hex = compile(&table).unwrap();
    let back = decompile(&hex).unwrap();
    assert_eq!(back, table);
    assert_eq!(back.to_json().unwrap(), table.to_json().unwrap());
}

#[test]
fn test_compile_follows_configured_level() {
    let table = OpcodeTable::new(vec![OpcodeDescriptor::new("CONSTANT", "Copy a constant")
        .outputs(1)
        .field(OperandField::new("Constant Index", 0, 15))])
    .unwrap();

    let stored = compile_with_config(&table, &MetaConfig { compression_level: 0 }).unwrap();
    assert_eq!(stored, compile_with_level(&table, 0).unwrap());
    assert!(stored.len() >= compile(&table).unwrap().len());
    assert_eq!(decompile(&stored).unwrap(), table);

    assert_eq!(
        compile_with_config(&table, &MetaConfig::default()).unwrap(),
        compile(&table).unwrap()
    );
    assert!(matches!(
        compile_with_config(&table, &MetaConfig { compression_level: 10 }),
        Err(MetaError::InvalidCompressionLevel(10))
    ));
}
