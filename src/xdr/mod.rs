//! Canonical value model and binary codec
//!
//! The subset of the host value grammar this engine produces and consumes:
//! void, bool, u32, u64, i64, bytes, symbol, string, vec, map, address.
//! Discriminant numbering follows the host ScVal ordering so encodings
//! stay interoperable for the covered subset.
//!
//! Encoding rules: 4-byte big-endian discriminants and lengths, payloads
//! zero-padded to 4-byte boundaries, container values carry a presence
//! word, maps are ordered entry lists (order is significant and preserved).

use crate::address::Address;
use crate::error::{EngineError, ErrorCode};

/// Maximum container nesting depth accepted by the decoder
const MAX_DEPTH: u32 = 64;

// Host discriminants for the covered subset
const DISC_BOOL: u32 = 0;
const DISC_VOID: u32 = 1;
const DISC_U32: u32 = 3;
const DISC_U64: u32 = 5;
const DISC_I64: u32 = 6;
const DISC_BYTES: u32 = 13;
const DISC_STRING: u32 = 14;
const DISC_SYMBOL: u32 = 15;
const DISC_VEC: u32 = 16;
const DISC_MAP: u32 = 17;
const DISC_ADDRESS: u32 = 18;

// Address sub-discriminants
const ADDR_ACCOUNT: u32 = 0;
const ADDR_CONTRACT: u32 = 1;
const KEY_TYPE_ED25519: u32 = 0;

/// A structured host value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Void,
    Bool(bool),
    U32(u32),
    U64(u64),
    I64(i64),
    Bytes(Vec<u8>),
    Str(String),
    Symbol(String),
    Vec(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Address(Address),
}

impl Value {
    pub fn symbol(s: &str) -> Value {
        Value::Symbol(s.to_string())
    }

    pub fn bytes(b: impl Into<Vec<u8>>) -> Value {
        Value::Bytes(b.into())
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Value::Void)
    }

    pub fn as_vec(&self) -> Option<&[Value]> {
        match self {
            Value::Vec(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<&Address> {
        match self {
            Value::Address(a) => Some(a),
            _ => None,
        }
    }
}

/// Codec failure modes
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum XdrError {
    #[error("Unexpected end of input")]
    UnexpectedEof,

    #[error("Unknown value discriminant: {0}")]
    UnknownDiscriminant(u32),

    #[error("Non-zero padding byte")]
    InvalidPadding,

    #[error("Container depth limit exceeded")]
    DepthExceeded,

    #[error("Invalid UTF-8 in string value")]
    InvalidUtf8,

    #[error("Trailing bytes after value")]
    TrailingBytes,

    #[error("Container missing presence word")]
    MissingPresence,
}

impl From<XdrError> for EngineError {
    fn from(e: XdrError) -> Self {
        EngineError::new(ErrorCode::XdrError, e.to_string())
    }
}

/// Encode a value to its canonical byte form
pub fn encode(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(value, &mut out);
    out
}

/// Encode a value, appending to an existing buffer
pub fn encode_into(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Void => put_u32(out, DISC_VOID),
        Value::Bool(b) => {
            put_u32(out, DISC_BOOL);
            put_u32(out, u32::from(*b));
        }
        Value::U32(n) => {
            put_u32(out, DISC_U32);
            put_u32(out, *n);
        }
        Value::U64(n) => {
            put_u32(out, DISC_U64);
            out.extend_from_slice(&n.to_be_bytes());
        }
        Value::I64(n) => {
            put_u32(out, DISC_I64);
            out.extend_from_slice(&n.to_be_bytes());
        }
        Value::Bytes(b) => {
            put_u32(out, DISC_BYTES);
            put_opaque(out, b);
        }
        Value::Str(s) => {
            put_u32(out, DISC_STRING);
            put_opaque(out, s.as_bytes());
        }
        Value::Symbol(s) => {
            put_u32(out, DISC_SYMBOL);
            put_opaque(out, s.as_bytes());
        }
        Value::Vec(items) => {
            put_u32(out, DISC_VEC);
            put_u32(out, 1); // presence
            put_u32(out, items.len() as u32);
            for item in items {
                encode_into(item, out);
            }
        }
        Value::Map(entries) => {
            put_u32(out, DISC_MAP);
            put_u32(out, 1); // presence
            put_u32(out, entries.len() as u32);
            for (k, v) in entries {
                encode_into(k, out);
                encode_into(v, out);
            }
        }
        Value::Address(addr) => {
            put_u32(out, DISC_ADDRESS);
            match addr {
                Address::Account(key) => {
                    put_u32(out, ADDR_ACCOUNT);
                    put_u32(out, KEY_TYPE_ED25519);
                    out.extend_from_slice(key);
                }
                Address::Contract(id) => {
                    put_u32(out, ADDR_CONTRACT);
                    out.extend_from_slice(id);
                }
            }
        }
    }
}

/// Decode a single value; trailing bytes are an error
pub fn decode(bytes: &[u8]) -> Result<Value, XdrError> {
    let mut reader = Reader { buf: bytes, pos: 0 };
    let value = decode_value(&mut reader, 0)?;
    if reader.pos != bytes.len() {
        return Err(XdrError::TrailingBytes);
    }
    Ok(value)
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], XdrError> {
        if self.pos + n > self.buf.len() {
            return Err(XdrError::UnexpectedEof);
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u32(&mut self) -> Result<u32, XdrError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_u64(&mut self) -> Result<u64, XdrError> {
        let bytes = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(bytes);
        Ok(u64::from_be_bytes(arr))
    }

    fn read_opaque(&mut self) -> Result<Vec<u8>, XdrError> {
        let len = self.read_u32()? as usize;
        let data = self.take(len)?.to_vec();
        let pad = (4 - len % 4) % 4;
        for &b in self.take(pad)? {
            if b != 0 {
                return Err(XdrError::InvalidPadding);
            }
        }
        Ok(data)
    }
}

fn decode_value(reader: &mut Reader<'_>, depth: u32) -> Result<Value, XdrError> {
    if depth > MAX_DEPTH {
        return Err(XdrError::DepthExceeded);
    }

    let disc = reader.read_u32()?;
    match disc {
        DISC_VOID => Ok(Value::Void),
        DISC_BOOL => Ok(Value::Bool(reader.read_u32()? != 0)),
        DISC_U32 => Ok(Value::U32(reader.read_u32()?)),
        DISC_U64 => Ok(Value::U64(reader.read_u64()?)),
        DISC_I64 => Ok(Value::I64(reader.read_u64()? as i64)),
        DISC_BYTES => Ok(Value::Bytes(reader.read_opaque()?)),
        DISC_STRING => {
            let raw = reader.read_opaque()?;
            String::from_utf8(raw).map(Value::Str).map_err(|_| XdrError::InvalidUtf8)
        }
        DISC_SYMBOL => {
            let raw = reader.read_opaque()?;
            String::from_utf8(raw).map(Value::Symbol).map_err(|_| XdrError::InvalidUtf8)
        }
        DISC_VEC => {
            if reader.read_u32()? != 1 {
                return Err(XdrError::MissingPresence);
            }
            let len = reader.read_u32()? as usize;
            let mut items = Vec::with_capacity(len.min(1024));
            for _ in 0..len {
                items.push(decode_value(reader, depth + 1)?);
            }
            Ok(Value::Vec(items))
        }
        DISC_MAP => {
            if reader.read_u32()? != 1 {
                return Err(XdrError::MissingPresence);
            }
            let len = reader.read_u32()? as usize;
            let mut entries = Vec::with_capacity(len.min(1024));
            for _ in 0..len {
                let key = decode_value(reader, depth + 1)?;
                let val = decode_value(reader, depth + 1)?;
                entries.push((key, val));
            }
            Ok(Value::Map(entries))
        }
        DISC_ADDRESS => {
            let kind = reader.read_u32()?;
            match kind {
                ADDR_ACCOUNT => {
                    if reader.read_u32()? != KEY_TYPE_ED25519 {
                        return Err(XdrError::UnknownDiscriminant(kind));
                    }
                    let mut key = [0u8; 32];
                    key.copy_from_slice(reader.take(32)?);
                    Ok(Value::Address(Address::Account(key)))
                }
                ADDR_CONTRACT => {
                    let mut id = [0u8; 32];
                    id.copy_from_slice(reader.take(32)?);
                    Ok(Value::Address(Address::Contract(id)))
                }
                other => Err(XdrError::UnknownDiscriminant(other)),
            }
        }
        other => Err(XdrError::UnknownDiscriminant(other)),
    }
}

fn put_u32(out: &mut Vec<u8>, n: u32) {
    out.extend_from_slice(&n.to_be_bytes());
}

fn put_opaque(out: &mut Vec<u8>, data: &[u8]) {
    put_u32(out, data.len() as u32);
    out.extend_from_slice(data);
    let pad = (4 - data.len() % 4) % 4;
    out.extend_from_slice(&[0u8; 4][..pad]);
}
