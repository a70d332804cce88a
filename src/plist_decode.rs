//! Decoder for property lists embedded in byte blobs.
//!
//! The `plist` reader picks binary or XML from the bytes themselves. The
//! parsed tree is converted into the engine's own [`Value`] so the extractor
//! never sees a foreign type.
//!
//! Conversion runs on an explicit work stack and takes the parsed tree apart
//! as it goes. Nesting below `max_level` is cut off: the container at the
//! last allowed level comes back empty and [`Decoded::truncated`] is set.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::io::Cursor;
use std::time::SystemTime;

use crate::error::{HarnessError, Result};
use crate::value::{Scalar, Value};

/// A converted document. The root is level 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub value: Value,
    /// Some subtree sat deeper than the allowed level and was dropped.
    pub truncated: bool,
}

/// Parse `bytes` as a property list, starting at the first occurrence of
/// `signature` when the signature is not at offset 0.
pub fn decode_embedded(bytes: &[u8], signature: &str, max_level: usize) -> Result<Decoded> {
    let start = find_bytes(bytes, signature.as_bytes()).unwrap_or(0);
    decode(&bytes[start..], max_level)
}

/// Parse a complete property list, keeping at most `max_level` levels of
/// nesting below the root.
pub fn decode(bytes: &[u8], max_level: usize) -> Result<Decoded> {
    let parsed = plist::Value::from_reader(Cursor::new(bytes))
        .map_err(|e| HarnessError::Decode(e.to_string()))?;
    Ok(convert(parsed, max_level))
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// A container whose children are still being converted.
enum Frame {
    Sequence {
        rest: std::vec::IntoIter<plist::Value>,
        out: Vec<Value>,
    },
    Mapping {
        rest: std::vec::IntoIter<(String, plist::Value)>,
        out: BTreeMap<String, Value>,
        key: String,
    },
}

impl Frame {
    fn next_child(&mut self) -> Option<plist::Value> {
        match self {
            Frame::Sequence { rest, .. } => rest.next(),
            Frame::Mapping { rest, key, .. } => rest.next().map(|(k, v)| {
                *key = k;
                v
            }),
        }
    }

    fn accept(&mut self, child: Value) {
        match self {
            Frame::Sequence { out, .. } => out.push(child),
            Frame::Mapping { out, key, .. } => {
                out.insert(std::mem::take(key), child);
            }
        }
    }

    fn close(self) -> Value {
        match self {
            Frame::Sequence { out, .. } => Value::Sequence(out),
            Frame::Mapping { out, .. } => Value::Mapping(out),
        }
    }
}

enum Opened {
    Leaf(Value),
    Container(Frame),
}

fn convert(root: plist::Value, max_level: usize) -> Decoded {
    let mut truncated = false;
    let mut stack: Vec<Frame> = Vec::new();
    let mut raw = root;

    loop {
        let descend = stack.len() < max_level;
        let mut finished = match open(raw, descend, &mut truncated) {
            Opened::Leaf(value) => Some(value),
            Opened::Container(frame) => {
                stack.push(frame);
                None
            }
        };

        loop {
            let Some(top) = stack.last_mut() else {
                return Decoded {
                    value: finished.unwrap_or_else(Value::null),
                    truncated,
                };
            };
            if let Some(value) = finished.take() {
                top.accept(value);
            }
            match top.next_child() {
                Some(child) => {
                    raw = child;
                    break;
                }
                None => finished = stack.pop().map(Frame::close),
            }
        }
    }
}

fn open(value: plist::Value, descend: bool, truncated: &mut bool) -> Opened {
    match value {
        plist::Value::Array(items) => {
            if !descend && !items.is_empty() {
                *truncated = true;
                discard(items);
                return Opened::Leaf(Value::Sequence(Vec::new()));
            }
            Opened::Container(Frame::Sequence {
                out: Vec::with_capacity(items.len()),
                rest: items.into_iter(),
            })
        }
        plist::Value::Dictionary(dict) => {
            let entries: Vec<(String, plist::Value)> = dict.into_iter().collect();
            if !descend && !entries.is_empty() {
                *truncated = true;
                discard(entries.into_iter().map(|(_, v)| v).collect());
                return Opened::Leaf(Value::Mapping(BTreeMap::new()));
            }
            Opened::Container(Frame::Mapping {
                rest: entries.into_iter(),
                out: BTreeMap::new(),
                key: String::new(),
            })
        }
        other => Opened::Leaf(convert_leaf(other)),
    }
}

/// Drop a parsed subtree without recursing into it.
fn discard(items: Vec<plist::Value>) {
    let mut pending = items;
    while let Some(value) = pending.pop() {
        match value {
            plist::Value::Array(inner) => pending.extend(inner),
            plist::Value::Dictionary(dict) => pending.extend(dict.into_iter().map(|(_, v)| v)),
            _ => {}
        }
    }
}

fn convert_leaf(value: plist::Value) -> Value {
    match value {
        plist::Value::Boolean(b) => Value::Scalar(Scalar::Bool(b)),
        plist::Value::Data(bytes) => Value::Bytes(bytes),
        plist::Value::Date(date) => {
            let when: DateTime<Utc> = SystemTime::from(date).into();
            Value::text(when.to_rfc3339())
        }
        plist::Value::Real(r) => Value::Scalar(Scalar::Real(r)),
        plist::Value::Integer(i) => match (i.as_signed(), i.as_unsigned()) {
            (Some(signed), _) => Value::int(signed),
            (None, Some(unsigned)) => Value::text(unsigned.to_string()),
            (None, None) => Value::null(),
        },
        plist::Value::String(s) => Value::text(s),
        plist::Value::Uid(uid) => match i64::try_from(uid.get()) {
            Ok(n) => Value::int(n),
            Err(_) => Value::text(uid.get().to_string()),
        },
        // Containers are handled by `open`; `plist::Value` is non-exhaustive.
        _ => Value::null(),
    }
}

/// Hand-built binary property lists the `plist` writer cannot produce.
#[cfg(test)]
pub(crate) mod fixtures {
    /// `levels` nested one-element arrays around an ASCII string leaf.
    pub(crate) fn nested_arrays(levels: usize, leaf: &str) -> Vec<u8> {
        let count = levels + 1;
        assert!(count <= u16::MAX as usize && leaf.len() < 128);

        let mut out = b"bplist00".to_vec();
        let mut offsets: Vec<u32> = Vec::with_capacity(count);
        for i in 0..levels {
            offsets.push(out.len() as u32);
            out.push(0xa1);
            out.extend_from_slice(&((i + 1) as u16).to_be_bytes());
        }
        offsets.push(out.len() as u32);
        out.extend_from_slice(&[0x5f, 0x10, leaf.len() as u8]);
        out.extend_from_slice(leaf.as_bytes());

        let table_offset = out.len() as u64;
        for offset in offsets {
            out.extend_from_slice(&offset.to_be_bytes());
        }
        out.extend_from_slice(&[0; 6]);
        out.push(4); // offset size
        out.push(2); // object reference size
        out.extend_from_slice(&(count as u64).to_be_bytes());
        out.extend_from_slice(&0u64.to_be_bytes());
        out.extend_from_slice(&table_offset.to_be_bytes());
        out
    }
}
