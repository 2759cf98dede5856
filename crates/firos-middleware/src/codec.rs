//! [`QuotedJsonCodec`] – attribute value decoding.
//!
//! The context broker stores structured values as Python-style strings such
//! as `"{'data': 1.5, 'updateStamp': 't1'}"`. Decoding swaps every single
//! quote for a double quote and parses the result as JSON.
//!
//! The swap is blind: a single quote that is part of string content (for
//! example `"it's"`) gets corrupted and usually makes the value unparsable.
//! This mirrors how the broker-side producer encodes values and is kept for
//! compatibility.

use firos_types::{DecodedValue, FirosError, STAMP_FIELD, UpdateStamp};
use serde_json::Value;

use crate::adapter::ValueCodec;

/// Parse a single-quoted pseudo-JSON string.
pub fn parse_quoted_json(raw: &str) -> Result<Value, FirosError> {
    serde_json::from_str(&raw.replace('\'', "\""))
        .map_err(|e| FirosError::Parsing(format!("value {raw:?} is not quoted JSON: {e}")))
}

/// Default [`ValueCodec`]: quoted-JSON strings or inline structures, which
/// must be objects carrying an `updateStamp` field.
#[derive(Debug, Default, Clone, Copy)]
pub struct QuotedJsonCodec;

impl ValueCodec for QuotedJsonCodec {
    fn parse(&self, raw: &Value) -> Result<DecodedValue, FirosError> {
        let decoded = match raw {
            Value::String(text) => parse_quoted_json(text)?,
            other => other.clone(),
        };

        let fields = match decoded {
            Value::Object(fields) => fields,
            other => {
                return Err(FirosError::Parsing(format!(
                    "attribute value must decode to an object, got {other}"
                )));
            }
        };

        let stamp = match fields.get(STAMP_FIELD) {
            Some(Value::String(s)) => UpdateStamp::Text(s.clone()),
            Some(Value::Number(n)) => UpdateStamp::Number(n.clone()),
            Some(other) => {
                return Err(FirosError::Parsing(format!(
                    "'{STAMP_FIELD}' must be a string or number, got {other}"
                )));
            }
            None => {
                return Err(FirosError::Parsing(format!(
                    "attribute value has no '{STAMP_FIELD}' field"
                )));
            }
        };

        Ok(DecodedValue { fields, stamp })
    }
}
