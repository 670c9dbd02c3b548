//! Decoded cross-boundary calls and the raw batch codec.
//!
//! The engine reports pending calls as an opaque JSON payload: a top-level
//! array of three parallel arrays `[[moduleIds], [methodIds], [params]]`,
//! optionally followed by a fourth `[callIds]` array whose entries are
//! integers or `null`. The bridge never inspects the payload itself; it
//! hands it to [`parse_method_calls`], which is pure and deterministic.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BridgeError;

/// One decoded cross-boundary invocation.
///
/// Immutable once constructed; produced only by [`parse_method_calls`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodCall {
    /// Target module identifier.
    pub module_id: u32,
    /// Method identifier within the module.
    pub method_id: u32,
    /// Positional arguments.
    pub arguments: Vec<Value>,
    /// Correlation id for asynchronous callbacks, if any.
    pub call_id: Option<u64>,
}

impl MethodCall {
    /// Create a call without a correlation id.
    pub fn new(module_id: u32, method_id: u32, arguments: Vec<Value>) -> Self {
        Self {
            module_id,
            method_id,
            arguments,
            call_id: None,
        }
    }

    /// Attach a correlation id.
    pub fn with_call_id(mut self, call_id: u64) -> Self {
        self.call_id = Some(call_id);
        self
    }
}

/// Parse a raw batch payload into an ordered list of calls.
///
/// Empty, whitespace-only, `null`, and `undefined` payloads decode to an
/// empty batch; engines report an empty queue that way. Anything else that
/// does not conform to the batch encoding is a
/// [`BridgeError::BatchDecode`]: an engine-side contract violation, never
/// retried.
pub fn parse_method_calls(raw: &str) -> Result<Vec<MethodCall>, BridgeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" || trimmed == "undefined" {
        return Ok(Vec::new());
    }

    let payload: Value = serde_json::from_str(trimmed)
        .map_err(|e| BridgeError::decode(format!("invalid JSON: {}", e)))?;

    let fields = payload
        .as_array()
        .ok_or_else(|| BridgeError::decode("top level is not an array"))?;

    if fields.is_empty() {
        return Ok(Vec::new());
    }
    if fields.len() != 3 && fields.len() != 4 {
        return Err(BridgeError::decode(format!(
            "expected 3 or 4 fields, got {}",
            fields.len()
        )));
    }

    let module_ids = id_array(&fields[0], "module ids")?;
    let method_ids = id_array(&fields[1], "method ids")?;
    let params = fields[2]
        .as_array()
        .ok_or_else(|| BridgeError::decode("params field is not an array"))?;

    if module_ids.len() != method_ids.len() || module_ids.len() != params.len() {
        return Err(BridgeError::decode(format!(
            "mismatched field lengths: {} module ids, {} method ids, {} params",
            module_ids.len(),
            method_ids.len(),
            params.len()
        )));
    }

    let call_ids: Option<Vec<Option<u64>>> = match fields.get(3) {
        Some(field) => {
            let entries = field
                .as_array()
                .ok_or_else(|| BridgeError::decode("call ids field is not an array"))?;
            if entries.len() != module_ids.len() {
                return Err(BridgeError::decode(format!(
                    "mismatched field lengths: {} calls, {} call ids",
                    module_ids.len(),
                    entries.len()
                )));
            }
            Some(
                entries
                    .iter()
                    .map(|entry| match entry {
                        Value::Null => Ok(None),
                        other => other
                            .as_u64()
                            .map(Some)
                            .ok_or_else(|| BridgeError::decode("call id is not an integer")),
                    })
                    .collect::<Result<_, _>>()?,
            )
        }
        None => None,
    };

    let mut calls = Vec::with_capacity(module_ids.len());
    for (index, (module_id, method_id)) in module_ids.iter().zip(&method_ids).enumerate() {
        let arguments = params[index]
            .as_array()
            .cloned()
            .ok_or_else(|| BridgeError::decode(format!("params[{}] is not an array", index)))?;
        calls.push(MethodCall {
            module_id: *module_id,
            method_id: *method_id,
            arguments,
            call_id: call_ids.as_ref().and_then(|ids| ids[index]),
        });
    }

    Ok(calls)
}

/// Encode calls into the raw batch format.
///
/// The inverse of [`parse_method_calls`]; executor implementations use this
/// to report their accumulated queue. The call-id field is omitted when no
/// call carries one.
pub fn encode_method_calls(calls: &[MethodCall]) -> String {
    let module_ids: Vec<Value> = calls.iter().map(|c| c.module_id.into()).collect();
    let method_ids: Vec<Value> = calls.iter().map(|c| c.method_id.into()).collect();
    let params: Vec<Value> = calls
        .iter()
        .map(|c| Value::Array(c.arguments.clone()))
        .collect();

    let mut fields = vec![
        Value::Array(module_ids),
        Value::Array(method_ids),
        Value::Array(params),
    ];
    if calls.iter().any(|c| c.call_id.is_some()) {
        fields.push(Value::Array(
            calls
                .iter()
                .map(|c| c.call_id.map(Value::from).unwrap_or(Value::Null))
                .collect(),
        ));
    }

    Value::Array(fields).to_string()
}

fn id_array(field: &Value, what: &str) -> Result<Vec<u32>, BridgeError> {
    field
        .as_array()
        .ok_or_else(|| BridgeError::decode(format!("{} field is not an array", what)))?
        .iter()
        .map(|entry| {
            entry
                .as_u64()
                .and_then(|id| u32::try_from(id).ok())
                .ok_or_else(|| BridgeError::decode(format!("{} entry is not a valid id", what)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_single_call() {
        let calls = parse_method_calls(r#"[[1],[2],[[]]]"#).unwrap();
        assert_eq!(calls, vec![MethodCall::new(1, 2, vec![])]);
    }

    #[test]
    fn test_parse_preserves_order_and_arguments() {
        let calls = parse_method_calls(r#"[[7,3],[0,1],[["a",true],[42]]]"#).unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].module_id, 7);
        assert_eq!(calls[0].arguments, vec![json!("a"), json!(true)]);
        assert_eq!(calls[1].method_id, 1);
        assert_eq!(calls[1].arguments, vec![json!(42)]);
    }

    #[test]
    fn test_parse_call_ids() {
        let calls = parse_method_calls(r#"[[1,2],[3,4],[[],[]],[9,null]]"#).unwrap();
        assert_eq!(calls[0].call_id, Some(9));
        assert_eq!(calls[1].call_id, None);
    }

    #[test]
    fn test_empty_payloads_decode_to_empty_batch() {
        for raw in ["", "  ", "null", "undefined", "[]"] {
            assert!(parse_method_calls(raw).unwrap().is_empty(), "raw: {:?}", raw);
        }
    }

    #[test]
    fn test_malformed_payloads_are_decode_errors() {
        for raw in [
            "{}",
            "[[1],[2]]",
            "[[1],[2],[[]],[1],[2]]",
            r#"[[1,2],[3],[[]]]"#,
            r#"[[1],[2],[7]]"#,
            r#"[["x"],[2],[[]]]"#,
            r#"[[1],[2],[[]],["x"]]"#,
            "not json",
        ] {
            let err = parse_method_calls(raw).unwrap_err();
            assert!(
                matches!(err, BridgeError::BatchDecode { .. }),
                "raw: {:?} -> {:?}",
                raw,
                err
            );
        }
    }

    #[test]
    fn test_round_trip() {
        let calls = vec![
            MethodCall::new(1, 2, vec![json!([1, 2, 3]), json!({"k": "v"})]),
            MethodCall::new(5, 0, vec![]).with_call_id(77),
            MethodCall::new(0, 9, vec![json!(null)]),
        ];
        let raw = encode_method_calls(&calls);
        assert_eq!(parse_method_calls(&raw).unwrap(), calls);
    }

    #[test]
    fn test_round_trip_without_call_ids_omits_field() {
        let calls = vec![MethodCall::new(1, 2, vec![json!("hi")])];
        let raw = encode_method_calls(&calls);
        assert_eq!(raw, r#"[[1],[2],[["hi"]]]"#);
        assert_eq!(parse_method_calls(&raw).unwrap(), calls);
    }
}
