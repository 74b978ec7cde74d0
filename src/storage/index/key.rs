use std::fmt;

use crate::storage::{ArrayValue, PropValueOwned};
use crate::types::{Result, SombraError};

const TAG_BOOL: u8 = 0x01;
const TAG_INT: u8 = 0x02;
const TAG_FLOAT: u8 = 0x03;
const TAG_STR: u8 = 0x04;
const TAG_ARRAY: u8 = 0x10;

/// Canonical, type-tagged byte encoding of a property value.
///
/// Two values produce equal keys exactly when they are the same type and compare
/// equal, so the key can stand in for the value both in index entries and in
/// index-entry lock keys. `Int(1)` and `Float(1.0)` are distinct keys.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ValueKey(Vec<u8>);

impl ValueKey {
    /// Encodes `value`. NaN floats have no canonical key.
    pub fn encode(value: &PropValueOwned) -> Result<Self> {
        let mut out = Vec::with_capacity(16);
        match value {
            PropValueOwned::Bool(v) => {
                out.push(TAG_BOOL);
                out.push(u8::from(*v));
            }
            PropValueOwned::Int(v) => {
                out.push(TAG_INT);
                out.extend_from_slice(&encode_i64_key(*v));
            }
            PropValueOwned::Float(v) => {
                out.push(TAG_FLOAT);
                out.extend_from_slice(&encode_f64_key(*v)?);
            }
            PropValueOwned::Str(s) => {
                out.push(TAG_STR);
                encode_bytes_key(&mut out, s.as_bytes())?;
            }
            PropValueOwned::Array(array) => encode_array(&mut out, array)?,
        }
        Ok(Self(out))
    }
}

impl fmt::Display for ValueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("0x")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

fn encode_array(out: &mut Vec<u8>, array: &ArrayValue) -> Result<()> {
    let len = u32::try_from(array.len())
        .map_err(|_| SombraError::Invalid("array property exceeds maximum length"))?;
    let elem_tag = match array {
        ArrayValue::Bool(_) => TAG_BOOL,
        ArrayValue::Int(_) => TAG_INT,
        ArrayValue::Float(_) => TAG_FLOAT,
        ArrayValue::Str(_) => TAG_STR,
    };
    out.push(TAG_ARRAY | elem_tag);
    out.extend_from_slice(&len.to_be_bytes());
    match array {
        ArrayValue::Bool(values) => out.extend(values.iter().map(|v| u8::from(*v))),
        ArrayValue::Int(values) => {
            for v in values {
                out.extend_from_slice(&encode_i64_key(*v));
            }
        }
        ArrayValue::Float(values) => {
            for v in values {
                out.extend_from_slice(&encode_f64_key(*v)?);
            }
        }
        ArrayValue::Str(values) => {
            for v in values {
                encode_bytes_key(out, v.as_bytes())?;
            }
        }
    }
    Ok(())
}

fn encode_i64_key(value: i64) -> [u8; 8] {
    ((value as u64) ^ 0x8000_0000_0000_0000).to_be_bytes()
}

fn encode_f64_key(value: f64) -> Result<[u8; 8]> {
    if value.is_nan() {
        return Err(SombraError::Invalid("NaN values cannot be indexed"));
    }
    // -0.0 == 0.0, so both must share a key.
    let value = if value == 0.0 { 0.0 } else { value };
    let bits = value.to_bits();
    let normalized = if bits & 0x8000_0000_0000_0000 != 0 {
        !bits
    } else {
        bits ^ 0x8000_0000_0000_0000
    };
    Ok(normalized.to_be_bytes())
}

fn encode_bytes_key(out: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    let len = u32::try_from(bytes.len())
        .map_err(|_| SombraError::Invalid("property value exceeds maximum length"))?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}
