//! Compact binary value codec.
//!
//! Leaf payloads travel inside the (textual) request graph as base64 text
//! wrapping a MessagePack encoding of the underlying value. This is the only
//! place raw bytes cross the text boundary.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Codec error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Input ended in the middle of a value
    #[error("Unexpected end of input at offset {0}")]
    Truncated(usize),

    /// A complete value was followed by extra bytes
    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),

    /// Reserved byte or extension type
    #[error("Unsupported marker byte 0x{0:02x}")]
    UnsupportedMarker(u8),

    /// uint64 value above i64::MAX
    #[error("Integer out of range")]
    IntegerOutOfRange,

    /// Arrays and maps nest deeper than the decoder accepts
    #[error("Value nests deeper than {0} levels")]
    TooDeep(usize),

    /// String payload is not valid UTF-8
    #[error("Invalid UTF-8 in string payload")]
    InvalidUtf8,

    /// Text is not valid standard base64
    #[error("Invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Declared blob size disagrees with the decoded payload
    #[error("Blob size mismatch: declared {declared}, actual {actual}")]
    SizeMismatch { declared: usize, actual: usize },
}

/// Result type alias using CodecError.
pub type CodecResult<T> = Result<T, CodecError>;

/// A value that can be carried in a binary leaf payload.
#[derive(Debug, Clone, PartialEq)]
pub enum PackValue {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bin(Vec<u8>),
    Array(Vec<PackValue>),
    /// Entries keep their insertion order.
    Map(Vec<(PackValue, PackValue)>),
}

impl From<bool> for PackValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PackValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for PackValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for PackValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for PackValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<u8>> for PackValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bin(value)
    }
}

impl From<Vec<PackValue>> for PackValue {
    fn from(value: Vec<PackValue>) -> Self {
        Self::Array(value)
    }
}

/// Encode a value using the smallest MessagePack representation.
pub fn encode(value: &PackValue) -> Vec<u8> {
    let mut out = Vec::new();
    write_value(&mut out, value);
    out
}

/// Decode exactly one value spanning the whole input.
pub fn decode(bytes: &[u8]) -> CodecResult<PackValue> {
    let mut reader = Reader {
        bytes,
        pos: 0,
        depth: 0,
    };
    let value = reader.read_value()?;
    if reader.pos != bytes.len() {
        return Err(CodecError::TrailingBytes(bytes.len() - reader.pos));
    }
    Ok(value)
}

/// Standard base64 with padding.
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Inverse of [`to_base64`].
pub fn from_base64(text: &str) -> CodecResult<Vec<u8>> {
    Ok(STANDARD.decode(text)?)
}

fn write_value(out: &mut Vec<u8>, value: &PackValue) {
    match value {
        PackValue::Nil => out.push(0xc0),
        PackValue::Bool(false) => out.push(0xc2),
        PackValue::Bool(true) => out.push(0xc3),
        PackValue::Int(n) => write_int(out, *n),
        PackValue::Float(f) => {
            out.push(0xcb);
            out.extend_from_slice(&f.to_be_bytes());
        }
        PackValue::Str(s) => {
            let len = s.len();
            if len < 32 {
                out.push(0xa0 | len as u8);
            } else if len <= u8::MAX as usize {
                out.push(0xd9);
                out.push(len as u8);
            } else if len <= u16::MAX as usize {
                out.push(0xda);
                out.extend_from_slice(&(len as u16).to_be_bytes());
            } else {
                out.push(0xdb);
                out.extend_from_slice(&(len as u32).to_be_bytes());
            }
            out.extend_from_slice(s.as_bytes());
        }
        PackValue::Bin(bytes) => {
            let len = bytes.len();
            if len <= u8::MAX as usize {
                out.push(0xc4);
                out.push(len as u8);
            } else if len <= u16::MAX as usize {
                out.push(0xc5);
                out.extend_from_slice(&(len as u16).to_be_bytes());
            } else {
                out.push(0xc6);
                out.extend_from_slice(&(len as u32).to_be_bytes());
            }
            out.extend_from_slice(bytes);
        }
        PackValue::Array(items) => {
            write_container_header(out, items.len(), 0x90, 0xdc, 0xdd);
            for item in items {
                write_value(out, item);
            }
        }
        PackValue::Map(entries) => {
            write_container_header(out, entries.len(), 0x80, 0xde, 0xdf);
            for (key, item) in entries {
                write_value(out, key);
                write_value(out, item);
            }
        }
    }
}

fn write_int(out: &mut Vec<u8>, n: i64) {
    if n >= 0 {
        let n = n as u64;
        if n < 0x80 {
            out.push(n as u8);
        } else if n <= u8::MAX as u64 {
            out.push(0xcc);
            out.push(n as u8);
        } else if n <= u16::MAX as u64 {
            out.push(0xcd);
            out.extend_from_slice(&(n as u16).to_be_bytes());
        } else if n <= u32::MAX as u64 {
            out.push(0xce);
            out.extend_from_slice(&(n as u32).to_be_bytes());
        } else {
            out.push(0xcf);
            out.extend_from_slice(&n.to_be_bytes());
        }
    } else if n >= -32 {
        out.push(n as i8 as u8);
    } else if n >= i8::MIN as i64 {
        out.push(0xd0);
        out.push(n as i8 as u8);
    } else if n >= i16::MIN as i64 {
        out.push(0xd1);
        out.extend_from_slice(&(n as i16).to_be_bytes());
    } else if n >= i32::MIN as i64 {
        out.push(0xd2);
        out.extend_from_slice(&(n as i32).to_be_bytes());
    } else {
        out.push(0xd3);
        out.extend_from_slice(&n.to_be_bytes());
    }
}

fn write_container_header(out: &mut Vec<u8>, len: usize, fix: u8, marker16: u8, marker32: u8) {
    if len < 16 {
        out.push(fix | len as u8);
    } else if len <= u16::MAX as usize {
        out.push(marker16);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        out.push(marker32);
        out.extend_from_slice(&(len as u32).to_be_bytes());
    }
}

/// Deepest array/map nesting accepted by [`decode`].
pub const MAX_NESTING: usize = 128;

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    /// Arrays and maps currently open.
    depth: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> CodecResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(CodecError::Truncated(self.pos))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    fn len8(&mut self) -> CodecResult<usize> {
        Ok(u8::from_be_bytes(self.array()?) as usize)
    }

    fn len16(&mut self) -> CodecResult<usize> {
        Ok(u16::from_be_bytes(self.array()?) as usize)
    }

    fn len32(&mut self) -> CodecResult<usize> {
        Ok(u32::from_be_bytes(self.array()?) as usize)
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn read_value(&mut self) -> CodecResult<PackValue> {
        let marker = u8::from_be_bytes(self.array()?);
        match marker {
            0x00..=0x7f => Ok(PackValue::Int(marker as i64)),
            0x80..=0x8f => self.read_map((marker & 0x0f) as usize),
            0x90..=0x9f => self.read_array((marker & 0x0f) as usize),
            0xa0..=0xbf => self.read_str((marker & 0x1f) as usize),
            0xc0 => Ok(PackValue::Nil),
            0xc2 => Ok(PackValue::Bool(false)),
            0xc3 => Ok(PackValue::Bool(true)),
            0xc4 => {
                let len = self.len8()?;
                self.read_bin(len)
            }
            0xc5 => {
                let len = self.len16()?;
                self.read_bin(len)
            }
            0xc6 => {
                let len = self.len32()?;
                self.read_bin(len)
            }
            0xca => Ok(PackValue::Float(f32::from_be_bytes(self.array()?) as f64)),
            0xcb => Ok(PackValue::Float(f64::from_be_bytes(self.array()?))),
            0xcc => Ok(PackValue::Int(u8::from_be_bytes(self.array()?) as i64)),
            0xcd => Ok(PackValue::Int(u16::from_be_bytes(self.array()?) as i64)),
            0xce => Ok(PackValue::Int(u32::from_be_bytes(self.array()?) as i64)),
            0xcf => {
                let n = u64::from_be_bytes(self.array()?);
                i64::try_from(n)
                    .map(PackValue::Int)
                    .map_err(|_| CodecError::IntegerOutOfRange)
            }
            0xd0 => Ok(PackValue::Int(i8::from_be_bytes(self.array()?) as i64)),
            0xd1 => Ok(PackValue::Int(i16::from_be_bytes(self.array()?) as i64)),
            0xd2 => Ok(PackValue::Int(i32::from_be_bytes(self.array()?) as i64)),
            0xd3 => Ok(PackValue::Int(i64::from_be_bytes(self.array()?))),
            0xd9 => {
                let len = self.len8()?;
                self.read_str(len)
            }
            0xda => {
                let len = self.len16()?;
                self.read_str(len)
            }
            0xdb => {
                let len = self.len32()?;
                self.read_str(len)
            }
            0xdc => {
                let len = self.len16()?;
                self.read_array(len)
            }
            0xdd => {
                let len = self.len32()?;
                self.read_array(len)
            }
            0xde => {
                let len = self.len16()?;
                self.read_map(len)
            }
            0xdf => {
                let len = self.len32()?;
                self.read_map(len)
            }
            0xe0..=0xff => Ok(PackValue::Int(marker as i8 as i64)),
            other => Err(CodecError::UnsupportedMarker(other)),
        }
    }

    fn read_str(&mut self, len: usize) -> CodecResult<PackValue> {
        let bytes = self.take(len)?;
        let s = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
        Ok(PackValue::Str(s.to_string()))
    }

    fn read_bin(&mut self, len: usize) -> CodecResult<PackValue> {
        Ok(PackValue::Bin(self.take(len)?.to_vec()))
    }

    fn enter(&mut self) -> CodecResult<()> {
        if self.depth == MAX_NESTING {
            return Err(CodecError::TooDeep(MAX_NESTING));
        }
        self.depth += 1;
        Ok(())
    }

    fn read_array(&mut self, len: usize) -> CodecResult<PackValue> {
        self.enter()?;
        // Every element takes at least one byte, so this caps hostile lengths.
        let mut items = Vec::with_capacity(len.min(self.remaining()));
        for _ in 0..len {
            items.push(self.read_value()?);
        }
        self.depth -= 1;
        Ok(PackValue::Array(items))
    }

    fn read_map(&mut self, len: usize) -> CodecResult<PackValue> {
        self.enter()?;
        let mut entries = Vec::with_capacity(len.min(self.remaining() / 2));
        for _ in 0..len {
            let key = self.read_value()?;
            let value = self.read_value()?;
            entries.push((key, value));
        }
        self.depth -= 1;
        Ok(PackValue::Map(entries))
    }
}

/// Wire form of a binary literal argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobPayload {
    /// Whether the resolver should back the blob with a file.
    #[serde(default)]
    pub as_file: bool,
    /// Length of the decoded payload in bytes.
    pub size: usize,
    /// Base64 text of the payload.
    pub blob: String,
}

impl BlobPayload {
    /// Wrap raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            as_file: false,
            size: bytes.len(),
            blob: to_base64(bytes),
        }
    }

    /// Encode a value and wrap the resulting bytes.
    pub fn from_value(value: &PackValue) -> Self {
        Self::from_bytes(&encode(value))
    }

    /// Decode the base64 text, checking it against the declared size.
    pub fn bytes(&self) -> CodecResult<Vec<u8>> {
        let bytes = from_base64(&self.blob)?;
        if bytes.len() != self.size {
            return Err(CodecError::SizeMismatch {
                declared: self.size,
                actual: bytes.len(),
            });
        }
        Ok(bytes)
    }

    /// Decode the payload back into a value.
    pub fn decode_value(&self) -> CodecResult<PackValue> {
        decode(&self.bytes()?)
    }
}
