//! `application/x-www-form-urlencoded` conversion between [`Parameters`] and bytes.
//!
//! Only flat mappings are representable: strings, numbers and booleans are written in their
//! display form, `null` as an empty value. Spaces are written as `%20` rather than `+` so the
//! output is valid both as a body and as a URL query.

use serde_json::{Map, Value};

use crate::codec::{CodecError, Parameters};

pub(crate) fn encode(parameters: &Parameters) -> Result<String, CodecError> {
    let mut pairs = Vec::with_capacity(parameters.len());
    for (key, value) in parameters {
        let value = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => String::new(),
            Value::Array(_) | Value::Object(_) => {
                return Err(CodecError::form_serialize(format!("value of `{key}` is not a scalar")));
            }
        };
        pairs.push((key.as_str(), value));
    }

    let encoded = serde_urlencoded::to_string(&pairs).map_err(CodecError::form_serialize)?;
    // a literal '+' is already escaped as %2B, so every '+' left is a space
    Ok(encoded.replace('+', "%20"))
}

pub(crate) fn decode(data: &[u8]) -> Result<Value, CodecError> {
    let text = std::str::from_utf8(data).map_err(|source| CodecError::NotUtf8 { source })?;
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(text).map_err(|source| CodecError::FormParse { source })?;

    let object: Map<String, Value> = pairs.into_iter().map(|(key, value)| (key, Value::String(value))).collect();
    Ok(Value::Object(object))
}
