//! JSON text-frame codec
//!
//! Frames are plain JSON text. Decoding classifies each payload as a
//! `Response` (has a `result` field) or a `Request` (everything else).

use serde::Serialize;
use serde_json::{Map, Value};

use crate::correlation::CorrelationId;
use crate::error::ProtocolError;
use crate::message::{Inbound, Request, Response};

/// Decode one inbound text frame
pub fn decode_inbound(text: &str) -> Result<Inbound, ProtocolError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(mut object) = value else {
        return Err(ProtocolError::NotAnObject);
    };

    let attribute = match object.remove("attribute") {
        Some(Value::String(attribute)) => attribute,
        _ => return Err(ProtocolError::MissingAttribute),
    };
    let id = take_id(&mut object)?;

    // Presence, not truthiness: `null` and `false` are valid results.
    if let Some(result) = object.remove("result") {
        return Ok(Inbound::Response(Response {
            attribute,
            result,
            id,
        }));
    }

    let args = match object.remove("args") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(args)) => args,
        Some(other) => {
            return Err(ProtocolError::InvalidField {
                field: "args",
                reason: format!("expected array, got {}", type_name(&other)),
            })
        }
    };

    let kwargs = match object.remove("kwargs") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(kwargs)) => kwargs,
        Some(other) => {
            return Err(ProtocolError::InvalidField {
                field: "kwargs",
                reason: format!("expected object, got {}", type_name(&other)),
            })
        }
    };

    Ok(Inbound::Request(Request {
        attribute,
        args,
        kwargs,
        id,
    }))
}

/// Encode an outbound payload as a JSON text frame
pub fn encode<T: Serialize + ?Sized>(payload: &T) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(payload)?)
}

fn take_id(object: &mut Map<String, Value>) -> Result<Option<CorrelationId>, ProtocolError> {
    match object.remove("id") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(id)) => Ok(Some(CorrelationId::from(id))),
        Some(other) => Err(ProtocolError::InvalidField {
            field: "id",
            reason: format!("expected string, got {}", type_name(&other)),
        }),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_response() {
        let inbound =
            decode_inbound(r#"{"attribute":"connection_token","result":{"secret":"tok_abc"}}"#)
                .unwrap();
        match inbound {
            Inbound::Response(response) => {
                assert_eq!(response.attribute, "connection_token");
                assert_eq!(response.result, json!({"secret": "tok_abc"}));
                assert_eq!(response.id, None);
            }
            other => panic!("Expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_null_result_is_still_a_response() {
        let inbound = decode_inbound(r#"{"attribute":"x","result":null,"id":"c-9"}"#).unwrap();
        match inbound {
            Inbound::Response(response) => {
                assert_eq!(response.result, Value::Null);
                assert_eq!(response.id, Some(CorrelationId::from("c-9")));
            }
            other => panic!("Expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_request() {
        let inbound = decode_inbound(
            r#"{"attribute":"discoverReaders","args":[1],"kwargs":{"simulated":true}}"#,
        )
        .unwrap();
        match inbound {
            Inbound::Request(request) => {
                assert_eq!(request.attribute, "discoverReaders");
                assert_eq!(request.args, vec![json!(1)]);
                assert_eq!(request.kwargs.get("simulated"), Some(&json!(true)));
            }
            other => panic!("Expected request, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_request_defaults_missing_arguments() {
        let inbound = decode_inbound(r#"{"attribute":"sdkVersion"}"#).unwrap();
        assert_eq!(inbound, Inbound::Request(Request::new("sdkVersion")));
    }

    #[test]
    fn test_decode_rejects_invalid_json() {
        assert!(matches!(
            decode_inbound("not json"),
            Err(ProtocolError::Json(_))
        ));
    }

    #[test]
    fn test_decode_rejects_missing_attribute() {
        assert!(matches!(
            decode_inbound(r#"{"args":[]}"#),
            Err(ProtocolError::MissingAttribute)
        ));
        assert!(matches!(
            decode_inbound(r#"{"attribute":5}"#),
            Err(ProtocolError::MissingAttribute)
        ));
    }

    #[test]
    fn test_decode_rejects_non_object() {
        assert!(matches!(
            decode_inbound("[1,2]"),
            Err(ProtocolError::NotAnObject)
        ));
    }

    #[test]
    fn test_decode_rejects_bad_args() {
        let err = decode_inbound(r#"{"attribute":"x","args":{"a":1}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidField { field: "args", .. }));
    }

    #[test]
    fn test_encode_raw_value() {
        assert_eq!(encode(&json!([1, "a"])).unwrap(), r#"[1,"a"]"#);
    }
}
