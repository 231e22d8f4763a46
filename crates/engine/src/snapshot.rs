//! Snapshot loading
//!
//! A snapshot is a UTF-8 JSON object mapping canonical URN strings to aspect
//! objects:
//!
//! ```json
//! {
//!   "corp:dataset:foo": { "description": "d" },
//!   "corp:dataset:bar": { "description": "e" }
//! }
//! ```
//!
//! Entries are checked in input order and the first bad entry aborts the
//! load. A repeated key keeps its last value.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde_json::Value;
use tracing::debug;

use aspectdb_core::{Aspect, StoreError, StoreResult, Urn};

/// Raw entries in input order
struct OrderedEntries(Vec<(String, Value)>);

impl<'de> serde::Deserialize<'de> for OrderedEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = OrderedEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object keyed by URN")
            }

            fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> Result<Self::Value, M::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, Value>()? {
                    entries.push((key, value));
                }
                Ok(OrderedEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// JSON type name of a value, as reported in shape errors
fn shape_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn read_error(e: serde_json::Error) -> StoreError {
    if e.is_io() {
        StoreError::resource_init(format!("Failed to read snapshot: {}", e))
    } else {
        StoreError::parse(format!("Failed to parse snapshot: {}", e))
    }
}

/// Decode a snapshot into URN → aspect pairs
///
/// The reader is consumed and dropped before this returns, on success and on
/// every error.
///
/// # Errors
///
/// - `Parse` if the input is not a JSON object, a key is not a valid URN,
///   or a value is not an object
/// - `Serialization` if an object does not decode as `M`
/// - `ResourceInit` if the reader fails
pub fn load_aspects<M: Aspect, R: Read>(reader: R) -> StoreResult<BTreeMap<Urn, M>> {
    let entries: OrderedEntries = serde_json::from_reader(reader).map_err(read_error)?;

    let mut aspects = BTreeMap::new();
    for (key, value) in entries.0 {
        let urn = Urn::parse(&key)?;
        if !value.is_object() {
            return Err(StoreError::parse(format!(
                "Failed to parse value for urn `{}`. Expected an object but got `{}`",
                key,
                shape_of(&value)
            )));
        }
        let aspect: M = serde_json::from_value(value).map_err(|e| {
            StoreError::serialization(format!(
                "Failed to decode `{}` for urn `{}`: {}",
                M::KIND,
                key,
                e
            ))
        })?;
        aspects.insert(urn, aspect);
    }

    debug!(
        target: "aspectdb::snapshot",
        aspect = M::KIND,
        entries = aspects.len(),
        "Loaded snapshot"
    );
    Ok(aspects)
}
