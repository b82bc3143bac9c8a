//! Byte size parsing for working-set and chunk arguments

use crate::error::{GeneratorError, Result};

/// Parse a formatted byte size (e.g. `512MiB`, `4.5GB`, `4096`) into bytes
///
/// `KiB`/`MiB`/`GiB`/`TiB` are binary multiples, `KB`/`MB`/`GB`/`TB` are
/// decimal multiples. A bare number is a byte count. Fractional values are
/// truncated to whole bytes.
pub fn parse_size(input: &str) -> Result<u64> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    let malformed = || GeneratorError::InvalidSize {
        input: input.to_string(),
    };

    if number.is_empty() {
        return Err(malformed());
    }
    let value: f64 = number.parse().map_err(|_| malformed())?;

    let multiplier: u64 = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "kb" => 1_000,
        "mb" => 1_000_000,
        "gb" => 1_000_000_000,
        "tb" => 1_000_000_000_000,
        "kib" | "k" => 1 << 10,
        "mib" | "m" => 1 << 20,
        "gib" | "g" => 1 << 30,
        "tib" | "t" => 1 << 40,
        _ => return Err(malformed()),
    };

    let bytes = value * multiplier as f64;
    if !bytes.is_finite() || bytes >= u64::MAX as f64 {
        return Err(malformed());
    }
    Ok(bytes as u64)
}
