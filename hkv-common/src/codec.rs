//! # Value Codec
//!
//! Purpose: Define the reversible boundary between application values and the
//! bytes stored in the backing store.
//!
//! ## Design Principles
//! 1. **Explicit Modes**: "no decoding" is `Encoding::Raw`, not a null sentinel.
//! 2. **Identity for Bytes**: Byte values are never re-encoded.
//! 3. **Fail Loudly**: Undecodable data is an error, never truncated or replaced.
//!
//! ## Round-Trip Law
//!
//! ```text
//! decode(encode(Text(v), e), e)   == Text(v)
//! decode(encode(Bytes(b), e), Raw) == Bytes(b)
//! ```

use std::borrow::Cow;
use std::fmt;

use serde::Deserialize;

use crate::error::{CacheError, CacheResult};

/// Character encoding applied at the codec boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
pub enum Encoding {
    /// UTF-8 text.
    #[default]
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
    /// ISO-8859-1; every byte maps to exactly one code point.
    #[serde(rename = "latin-1", alias = "latin1", alias = "iso-8859-1")]
    Latin1,
    /// No decoding: stored bytes are returned unchanged.
    #[serde(rename = "raw")]
    Raw,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Latin1 => "latin-1",
            Encoding::Raw => "raw bytes",
        };
        f.write_str(name)
    }
}

/// Application-level cache value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// Textual data, encoded on write.
    Text(String),
    /// Arbitrary bytes, stored as-is.
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns the text payload, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            Value::Bytes(_) => None,
        }
    }

    /// Returns the byte payload, if this is a byte value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Text(_) => None,
            Value::Bytes(bytes) => Some(bytes),
        }
    }

    /// Encodes the value for storage. See [`encode`].
    pub fn encode(&self, encoding: Encoding) -> CacheResult<Cow<'_, [u8]>> {
        encode(self, encoding)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(value.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Value {
    fn from(value: &[u8; N]) -> Self {
        Value::Bytes(value.to_vec())
    }
}

/// Encodes `value` into its stored form.
///
/// Byte values pass through untouched. Text is encoded with `encoding`;
/// `Raw` writes text as UTF-8 since there is no other lossless choice.
pub fn encode(value: &Value, encoding: Encoding) -> CacheResult<Cow<'_, [u8]>> {
    match value {
        Value::Bytes(bytes) => Ok(Cow::Borrowed(bytes)),
        Value::Text(text) => match encoding {
            Encoding::Utf8 | Encoding::Raw => Ok(Cow::Borrowed(text.as_bytes())),
            Encoding::Latin1 => encode_latin1(text).map(Cow::Owned),
        },
    }
}

/// Decodes stored bytes according to `encoding`.
///
/// `Raw` returns `Value::Bytes` exactly as stored.
pub fn decode(bytes: Vec<u8>, encoding: Encoding) -> CacheResult<Value> {
    match encoding {
        Encoding::Raw => Ok(Value::Bytes(bytes)),
        Encoding::Utf8 => String::from_utf8(bytes)
            .map(Value::Text)
            .map_err(|_| CacheError::EncodingMismatch { encoding }),
        Encoding::Latin1 => Ok(Value::Text(bytes.iter().map(|&b| char::from(b)).collect())),
    }
}

fn encode_latin1(text: &str) -> CacheResult<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len());
    for ch in text.chars() {
        let byte = u8::try_from(u32::from(ch)).map_err(|_| CacheError::EncodingMismatch {
            encoding: Encoding::Latin1,
        })?;
        out.push(byte);
    }
    Ok(out)
}
