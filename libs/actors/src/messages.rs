//! Actor Wire Messages
//!
//! The message shapes exchanged between a spawning side and an execution
//! context. Field names are the de facto protocol and must not change:
//!
//! ```text
//! context inbox : SpawnEvent   { actorId, args, port }        (in-memory, moves a Port)
//! port (1st msg): SpawnResult  {} | { error }
//! port → actor  : CallRequest  { callId, method, args }
//! port ← actor  : CallResponse { callId, response } | { callId, error }
//! ```
//!
//! Everything that travels over a [`Port`](crate::transport::Port) is JSON
//! encoded into a [`Bytes`] frame, which gives the same copy-on-send semantics
//! as a structured clone.

use crate::error::{ErrorValue, Result};
use crate::transport::Port;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Ordered argument sequence for constructors and methods
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Args(Vec<Value>);

impl Args {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Decode the arguments positionally into `T`
    ///
    /// Tuples decode element by element, so `(i64, String)` expects exactly
    /// two arguments of those types.
    pub fn decode<T: DeserializeOwned>(&self) -> std::result::Result<T, ErrorValue> {
        serde_json::from_value(Value::Array(self.0.clone())).map_err(|e| {
            ErrorValue::type_error(format!("invalid arguments: {}", e))
        })
    }

    /// Get a single argument by position
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<Value> {
        self.0
    }
}

impl From<Vec<Value>> for Args {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

/// Turn any serializable value into an argument sequence
///
/// Tuples and arrays become one argument per element, `()` becomes no
/// arguments, anything else becomes a single argument.
pub fn encode_args<A: Serialize>(args: A) -> Result<Args> {
    let args = match serde_json::to_value(args)? {
        Value::Array(values) => values,
        Value::Null => Vec::new(),
        single => vec![single],
    };
    Ok(Args(args))
}

/// Spawn request delivered to an execution context
///
/// Owns the transferred endpoint. Once posted, the spawning side can no
/// longer reach `port`.
pub struct SpawnEvent {
    pub actor_id: String,
    pub args: Args,
    pub port: Port,
}

impl fmt::Debug for SpawnEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpawnEvent")
            .field("actor_id", &self.actor_id)
            .field("args", &self.args.len())
            .field("port", &self.port.label())
            .finish()
    }
}

/// Handshake outcome, always the first message on a fresh channel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpawnResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorValue>,
}

impl SpawnResult {
    pub fn ok() -> Self {
        Self { error: None }
    }

    pub fn failed(error: ErrorValue) -> Self {
        Self { error: Some(error) }
    }
}

/// Method invocation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    pub call_id: u64,
    pub method: String,
    pub args: Args,
}

/// Method invocation outcome, correlated by `call_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallResponse {
    pub call_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorValue>,
}

impl CallResponse {
    pub fn success(call_id: u64, response: Value) -> Self {
        Self {
            call_id,
            response: Some(response),
            error: None,
        }
    }

    pub fn failure(call_id: u64, error: ErrorValue) -> Self {
        Self {
            call_id,
            response: None,
            error: Some(error),
        }
    }

    pub fn from_outcome(call_id: u64, outcome: std::result::Result<Value, ErrorValue>) -> Self {
        match outcome {
            Ok(value) => Self::success(call_id, value),
            Err(error) => Self::failure(call_id, error),
        }
    }

    /// Resolve the response; an error wins over any response value
    pub fn into_outcome(self) -> std::result::Result<Value, ErrorValue> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.response.unwrap_or(Value::Null)),
        }
    }
}

/// Encode a wire message into a frame
pub fn encode<T: Serialize>(message: &T) -> Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(message)?))
}

/// Decode a frame into a wire message
pub fn decode<T: DeserializeOwned>(frame: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(frame)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_spawn_result_wire_shape() {
        let ok = serde_json::to_value(SpawnResult::ok()).unwrap();
        assert_eq!(ok, json!({}));

        let failed = serde_json::to_value(SpawnResult::failed("boom".into())).unwrap();
        assert_eq!(failed, json!({"error": {"kind": "Error", "message": "boom"}}));
    }

    #[test]
    fn test_call_request_wire_shape() {
        let request = CallRequest {
            call_id: 7,
            method: "add".to_string(),
            args: Args::new(vec![json!(2), json!(3)]),
        };
        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(encoded, json!({"callId": 7, "method": "add", "args": [2, 3]}));
    }

    #[test]
    fn test_call_response_wire_shape() {
        let ok = serde_json::to_value(CallResponse::success(1, json!(5))).unwrap();
        assert_eq!(ok, json!({"callId": 1, "response": 5}));

        let failed = serde_json::to_value(CallResponse::failure(2, "boom".into())).unwrap();
        assert_eq!(
            failed,
            json!({"callId": 2, "error": {"kind": "Error", "message": "boom"}})
        );
    }

    #[test]
    fn test_null_response_is_kept() {
        let encoded = serde_json::to_value(CallResponse::success(3, Value::Null)).unwrap();
        assert_eq!(encoded, json!({"callId": 3, "response": null}));

        let decoded: CallResponse = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded.into_outcome(), Ok(Value::Null));
    }

    #[test]
    fn test_error_wins_over_null_response() {
        let decoded: CallResponse = serde_json::from_value(json!({
            "callId": 4,
            "response": null,
            "error": {"kind": "Error", "message": "boom"}
        }))
        .unwrap();
        assert_eq!(decoded.into_outcome(), Err(ErrorValue::from("boom")));
    }

    #[test]
    fn test_encode_args_shapes() {
        assert_eq!(encode_args((2, 3)).unwrap().into_inner(), vec![json!(2), json!(3)]);
        assert!(encode_args(()).unwrap().is_empty());
        assert_eq!(encode_args(5).unwrap().into_inner(), vec![json!(5)]);
        assert_eq!(
            encode_args(("a", true, json!({"go": "x"}))).unwrap().len(),
            3
        );
    }

    #[test]
    fn test_args_decode() {
        let args = Args::new(vec![json!(42), json!("name")]);
        let (n, s): (i64, String) = args.decode().unwrap();
        assert_eq!(n, 42);
        assert_eq!(s, "name");

        let err = args.decode::<(String, String)>().unwrap_err();
        assert!(err.is_type_error());
    }

    #[test]
    fn test_frame_codec() {
        let request = CallRequest {
            call_id: 0,
            method: "ping".to_string(),
            args: Args::empty(),
        };
        let frame = encode(&request).unwrap();
        let decoded: CallRequest = decode(&frame).unwrap();
        assert_eq!(decoded, request);

        assert!(decode::<CallRequest>(b"not json").is_err());
    }
}
