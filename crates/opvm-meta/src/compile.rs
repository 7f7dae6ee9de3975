//! Compiled (deployable) form of an opcode table
//!
//! Canonical JSON, zlib-compressed with flate2, exposed as a `0x`-prefixed
//! lowercase hex string. Decompiling inflates, parses and re-validates.

use crate::error::MetaError;
use crate::table::OpcodeTable;
use flate2::read::{ZlibDecoder, ZlibEncoder};
use flate2::Compression;
use opvm_config::MetaConfig;
use std::io::Read;
use tracing::debug;

// ============================================================================
// Constants
// ============================================================================

/// Default compression level (maximum; the artifact is deployed once)
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 9;

/// Highest compression level flate2 accepts
pub const MAX_COMPRESSION_LEVEL: u32 = 9;

const HEX_PREFIX: &str = "0x";

// ============================================================================
// Compile / decompile
// ============================================================================

/// Compile a table at the default compression level.
pub fn compile(table: &OpcodeTable) -> Result<String, MetaError> {
    compile_with_level(table, DEFAULT_COMPRESSION_LEVEL)
}

/// Compile a table at the level configured in `[meta]` of `opvm.toml`
/// (or `OPVM_COMPRESSION_LEVEL`).
///
/// ```
/// use opvm_config::OpvmConfig;
/// use opvm_meta::{OpcodeDescriptor, OpcodeTable};
///
/// // Usually `ConfigLoader::new().load_from_directory(..)?.settings`
/// let config = OpvmConfig::default();
/// let table = OpcodeTable::new(vec![OpcodeDescriptor::new("NOOP", "Do nothing")]).unwrap();
/// let hex = opvm_meta::compile_with_config(&table, &config.meta).unwrap();
/// assert_eq!(opvm_meta::decompile(&hex).unwrap(), table);
/// ```
pub fn compile_with_config(table: &OpcodeTable, config: &MetaConfig) -> Result<String, MetaError> {
    compile_with_level(table, config.compression_level)
}

/// Compile a table at `level` (0 = store only, 9 = maximum).
pub fn compile_with_level(table: &OpcodeTable, level: u32) -> Result<String, MetaError> {
    let bytes = compile_bytes(table, level)?;
    Ok(encode_hex(&bytes))
}

/// Compressed canonical JSON bytes.
pub fn compile_bytes(table: &OpcodeTable, level: u32) -> Result<Vec<u8>, MetaError> {
    if level > MAX_COMPRESSION_LEVEL {
        return Err(MetaError::InvalidCompressionLevel(level));
    }

    let json = table.to_json()?;
    let mut encoder = ZlibEncoder::new(json.as_bytes(), Compression::new(level));
    let mut compressed = Vec::new();
    encoder
        .read_to_end(&mut compressed)
        .map_err(MetaError::Compression)?;

    debug!(
        opcodes = table.len(),
        json_bytes = json.len(),
        compressed_bytes = compressed.len(),
        level,
        "compiled opcode table"
    );
    Ok(compressed)
}

/// Recover a validated table from its hex form.
pub fn decompile(hex: &str) -> Result<OpcodeTable, MetaError> {
    let bytes = decode_hex(hex)?;
    decompile_bytes(&bytes)
}

/// Recover a validated table from compressed bytes.
pub fn decompile_bytes(compressed: &[u8]) -> Result<OpcodeTable, MetaError> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut json = String::new();
    decoder
        .read_to_string(&mut json)
        .map_err(MetaError::Decompression)?;
    OpcodeTable::from_json(&json)
}

// ============================================================================
// Hex
// ============================================================================

/// `0x`-prefixed lowercase hex
pub fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(HEX_PREFIX.len() + bytes.len() * 2);
    out.push_str(HEX_PREFIX);
    for byte in bytes {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

/// Parse hex with an optional `0x` prefix (either case of digits).
pub fn decode_hex(hex: &str) -> Result<Vec<u8>, MetaError> {
    let digits = hex.strip_prefix(HEX_PREFIX).unwrap_or(hex);
    if digits.len() % 2 != 0 {
        return Err(MetaError::Hex(format!(
            "odd number of digits ({})",
            digits.len()
        )));
    }

    digits
        .as_bytes()
        .chunks(2)
        .enumerate()
        .map(|(i, pair)| {
            let high = hex_digit(pair[0]);
            let low = hex_digit(pair[1]);
            match (high, low) {
                (Some(h), Some(l)) => Ok((h << 4) | l),
                _ => Err(MetaError::Hex(format!(
                    "invalid digit pair '{}' at offset {}",
                    String::from_utf8_lossy(pair),
                    i * 2
                ))),
            }
        })
        .collect()
}

fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}
