//! Canonical MessagePack encoding.
//!
//! The ledger hashes and signs the exact bytes of this encoding, so it has
//! to be canonical: map keys sorted, empty or zero fields left out, and
//! every header in its smallest form. Only the subset the transaction
//! format uses is implemented (unsigned ints, strings, binary, arrays and
//! string-keyed maps).

use crate::account::Address;

/// An encodable value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Uint(u64),
    Str(String),
    Bin(Vec<u8>),
    Array(Vec<Value>),
    Map(Vec<(&'static str, Value)>),
}

impl Value {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256);
        self.write(&mut out);
        out
    }

    fn write(&self, out: &mut Vec<u8>) {
        match self {
            Value::Uint(v) => write_uint(out, *v),
            Value::Str(s) => write_str(out, s),
            Value::Bin(b) => write_bin(out, b),
            Value::Array(items) => {
                write_len(out, items.len(), 0x90, 0x0f, 0xdc, 0xdd);
                for item in items {
                    item.write(out);
                }
            }
            Value::Map(entries) => {
                let mut sorted: Vec<&(&'static str, Value)> = entries.iter().collect();
                sorted.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
                write_len(out, sorted.len(), 0x80, 0x0f, 0xde, 0xdf);
                for (key, value) in sorted {
                    write_str(out, key);
                    value.write(out);
                }
            }
        }
    }
}

fn write_uint(out: &mut Vec<u8>, v: u64) {
    if v <= 0x7f {
        out.push(v as u8);
    } else if v <= u64::from(u8::MAX) {
        out.push(0xcc);
        out.push(v as u8);
    } else if v <= u64::from(u16::MAX) {
        out.push(0xcd);
        out.extend_from_slice(&(v as u16).to_be_bytes());
    } else if v <= u64::from(u32::MAX) {
        out.push(0xce);
        out.extend_from_slice(&(v as u32).to_be_bytes());
    } else {
        out.push(0xcf);
        out.extend_from_slice(&v.to_be_bytes());
    }
}

fn write_str(out: &mut Vec<u8>, s: &str) {
    let len = s.len();
    if len <= 31 {
        out.push(0xa0 | len as u8);
    } else if len <= usize::from(u8::MAX) {
        out.push(0xd9);
        out.push(len as u8);
    } else if len <= usize::from(u16::MAX) {
        out.push(0xda);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        out.push(0xdb);
        out.extend_from_slice(&(len as u32).to_be_bytes());
    }
    out.extend_from_slice(s.as_bytes());
}

fn write_bin(out: &mut Vec<u8>, b: &[u8]) {
    let len = b.len();
    if len <= usize::from(u8::MAX) {
        out.push(0xc4);
        out.push(len as u8);
    } else if len <= usize::from(u16::MAX) {
        out.push(0xc5);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        out.push(0xc6);
        out.extend_from_slice(&(len as u32).to_be_bytes());
    }
    out.extend_from_slice(b);
}

/// Array and map headers share a shape: fix form, 16-bit, 32-bit.
fn write_len(out: &mut Vec<u8>, len: usize, fix: u8, fix_max: usize, h16: u8, h32: u8) {
    if len <= fix_max {
        out.push(fix | len as u8);
    } else if len <= usize::from(u16::MAX) {
        out.push(h16);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        out.push(h32);
        out.extend_from_slice(&(len as u32).to_be_bytes());
    }
}

// ---------------------------------------------------------------------------
// MapBuilder
// ---------------------------------------------------------------------------

/// Collects map entries, silently dropping empty ones.
///
/// "Empty" means zero, the empty string, empty bytes, the zero address, an
/// empty array or an empty map; the ledger treats an absent key and a zero
/// value as the same thing, and only the absent form is canonical.
#[derive(Debug, Default)]
pub struct MapBuilder {
    entries: Vec<(&'static str, Value)>,
}

impl MapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uint(mut self, key: &'static str, v: u64) -> Self {
        if v != 0 {
            self.entries.push((key, Value::Uint(v)));
        }
        self
    }

    pub fn str(mut self, key: &'static str, s: &str) -> Self {
        if !s.is_empty() {
            self.entries.push((key, Value::Str(s.to_string())));
        }
        self
    }

    pub fn bin(mut self, key: &'static str, b: &[u8]) -> Self {
        if !b.is_empty() {
            self.entries.push((key, Value::Bin(b.to_vec())));
        }
        self
    }

    /// 32-byte digests (genesis hash, group id). All-zero counts as empty.
    pub fn digest(mut self, key: &'static str, d: Option<&[u8; 32]>) -> Self {
        if let Some(d) = d.filter(|d| **d != [0u8; 32]) {
            self.entries.push((key, Value::Bin(d.to_vec())));
        }
        self
    }

    pub fn address(mut self, key: &'static str, a: Option<&Address>) -> Self {
        if let Some(a) = a.filter(|a| !a.is_zero()) {
            self.entries.push((key, Value::Bin(a.as_bytes().to_vec())));
        }
        self
    }

    pub fn array(mut self, key: &'static str, items: Vec<Value>) -> Self {
        if !items.is_empty() {
            self.entries.push((key, Value::Array(items)));
        }
        self
    }

    pub fn map(mut self, key: &'static str, inner: MapBuilder) -> Self {
        if !inner.entries.is_empty() {
            self.entries.push((key, inner.finish()));
        }
        self
    }

    /// Unconditional entry, for values that must be present even when
    /// empty-looking (the `txn` body of a signed transaction).
    pub fn value(mut self, key: &'static str, v: Value) -> Self {
        self.entries.push((key, v));
        self
    }

    pub fn finish(self) -> Value {
        Value::Map(self.entries)
    }
}
