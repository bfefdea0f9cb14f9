//! Binary attachments and the placeholder protocol.
//!
//! A binary event travels as one text frame whose JSON carries
//! `{"_placeholder": true, "num": i}` markers, followed by one binary
//! frame per marker. The caller marks blobs explicitly by building an
//! [`EventData`] tree; a depth-first walk extracts the blobs on the way
//! out and substitutes them back on the way in. Both walks build fresh
//! trees rather than mutating in place.

use std::collections::BTreeMap;
use std::io::Read;

use serde_json::{json, Map, Value};

use sockeye_core::error::{SioError, SioResult};

/// A discriminated event argument: JSON, a binary blob, or a container
/// mixing both.
///
/// A `Json` leaf always holds a binary-free subtree; containers exist so
/// blobs can sit at arbitrary depths.
#[derive(Debug, Clone, PartialEq)]
pub enum EventData {
    /// A pure JSON value (no binary anywhere beneath it).
    Json(Value),
    /// A binary blob, transmitted as its own WebSocket binary frame.
    Binary(Vec<u8>),
    /// An array that may contain blobs.
    Array(Vec<EventData>),
    /// An object that may contain blobs.
    Object(BTreeMap<String, EventData>),
}

impl EventData {
    /// Drain a readable stream into a blob.
    ///
    /// Auto-detection adapter for handle-like inputs: non-empty streams
    /// become binary, empty streams become JSON null.
    pub fn from_reader<R: Read>(mut reader: R) -> std::io::Result<EventData> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        if buf.is_empty() {
            Ok(EventData::Json(Value::Null))
        } else {
            Ok(EventData::Binary(buf))
        }
    }

    /// The JSON value, when this is a pure JSON leaf.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            EventData::Json(v) => Some(v),
            _ => None,
        }
    }

    /// The blob bytes, when this is a binary leaf.
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            EventData::Binary(b) => Some(b),
            _ => None,
        }
    }

    /// Look up an object member.
    pub fn get(&self, key: &str) -> Option<&EventData> {
        match self {
            EventData::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// Whether any binary leaf exists in this tree.
    pub fn has_binary(&self) -> bool {
        match self {
            EventData::Json(_) => false,
            EventData::Binary(_) => true,
            EventData::Array(items) => items.iter().any(EventData::has_binary),
            EventData::Object(map) => map.values().any(EventData::has_binary),
        }
    }

    /// Convert to a plain JSON value. Fails on binary leaves, which have
    /// no JSON form until extraction assigns them placeholders.
    pub fn to_value(&self) -> SioResult<Value> {
        match self {
            EventData::Json(v) => Ok(v.clone()),
            EventData::Binary(_) => Err(SioError::InvalidArgument(
                "binary blob has no plain JSON form".into(),
            )),
            EventData::Array(items) => Ok(Value::Array(
                items
                    .iter()
                    .map(EventData::to_value)
                    .collect::<SioResult<_>>()?,
            )),
            EventData::Object(map) => {
                let mut out = Map::new();
                for (key, value) in map {
                    out.insert(key.clone(), value.to_value()?);
                }
                Ok(Value::Object(out))
            }
        }
    }
}

impl From<Value> for EventData {
    fn from(value: Value) -> Self {
        EventData::Json(value)
    }
}

impl From<&str> for EventData {
    fn from(value: &str) -> Self {
        EventData::Json(Value::String(value.to_string()))
    }
}

impl From<String> for EventData {
    fn from(value: String) -> Self {
        EventData::Json(Value::String(value))
    }
}

impl From<Vec<u8>> for EventData {
    fn from(value: Vec<u8>) -> Self {
        EventData::Binary(value)
    }
}

impl From<&[u8]> for EventData {
    fn from(value: &[u8]) -> Self {
        EventData::Binary(value.to_vec())
    }
}

/// The in-JSON marker standing in for attachment `num`.
pub fn placeholder(num: usize) -> Value {
    json!({ "_placeholder": true, "num": num })
}

/// The attachment index, when `value` is a placeholder object.
pub fn placeholder_num(value: &Value) -> Option<usize> {
    let obj = value.as_object()?;
    if obj.len() != 2 || obj.get("_placeholder")?.as_bool() != Some(true) {
        return None;
    }
    obj.get("num")?.as_u64().map(|n| n as usize)
}

/// Walk the arguments depth-first, replacing each blob with a numbered
/// placeholder. Returns the placeholder-bearing JSON and the blobs in
/// placeholder order. Empty blobs become JSON null.
pub fn extract(args: &[EventData]) -> (Vec<Value>, Vec<Vec<u8>>) {
    let mut attachments = Vec::new();
    let values = args
        .iter()
        .map(|arg| extract_one(arg, &mut attachments))
        .collect();
    (values, attachments)
}

fn extract_one(data: &EventData, attachments: &mut Vec<Vec<u8>>) -> Value {
    match data {
        EventData::Json(v) => v.clone(),
        EventData::Binary(b) if b.is_empty() => Value::Null,
        EventData::Binary(b) => {
            attachments.push(b.clone());
            placeholder(attachments.len() - 1)
        }
        EventData::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| extract_one(item, attachments))
                .collect(),
        ),
        EventData::Object(map) => {
            let mut out = Map::new();
            for (key, value) in map {
                out.insert(key.clone(), extract_one(value, attachments));
            }
            Value::Object(out)
        }
    }
}

/// Walk placeholder-bearing JSON depth-first, substituting attachment
/// `i` for every placeholder with `num == i`.
pub fn inject(args: Vec<Value>, attachments: &[Vec<u8>]) -> SioResult<Vec<EventData>> {
    args.into_iter()
        .map(|arg| inject_one(arg, attachments))
        .collect()
}

fn inject_one(value: Value, attachments: &[Vec<u8>]) -> SioResult<EventData> {
    if let Some(num) = placeholder_num(&value) {
        let blob = attachments.get(num).ok_or_else(|| {
            SioError::Protocol(format!(
                "placeholder {num} exceeds {} attachments",
                attachments.len()
            ))
        })?;
        return Ok(EventData::Binary(blob.clone()));
    }
    if !contains_placeholder(&value) {
        return Ok(EventData::Json(value));
    }
    match value {
        Value::Array(items) => Ok(EventData::Array(
            items
                .into_iter()
                .map(|item| inject_one(item, attachments))
                .collect::<SioResult<_>>()?,
        )),
        Value::Object(map) => {
            let mut out = BTreeMap::new();
            for (key, item) in map {
                out.insert(key, inject_one(item, attachments)?);
            }
            Ok(EventData::Object(out))
        }
        other => Ok(EventData::Json(other)),
    }
}

fn contains_placeholder(value: &Value) -> bool {
    if placeholder_num(value).is_some() {
        return true;
    }
    match value {
        Value::Array(items) => items.iter().any(contains_placeholder),
        Value::Object(map) => map.values().any(contains_placeholder),
        _ => false,
    }
}
