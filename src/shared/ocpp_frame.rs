//! OCPP-J message framing
//!
//! - **Call**       `[2, "<uniqueId>", "<action>", {<payload>}]`
//! - **CallResult** `[3, "<uniqueId>", {<payload>}]`
//! - **CallError**  `[4, "<uniqueId>", "<errorCode>", "<errorDescription>", {<errorDetails>}]`

use serde_json::{json, Value};
use thiserror::Error;

const MSG_TYPE_CALL: u64 = 2;
const MSG_TYPE_CALL_RESULT: u64 = 3;
const MSG_TYPE_CALL_ERROR: u64 = 4;

/// A parsed OCPP-J frame.
#[derive(Debug, Clone, PartialEq)]
pub enum OcppFrame {
    Call {
        unique_id: String,
        action: String,
        payload: Value,
    },
    CallResult {
        unique_id: String,
        payload: Value,
    },
    CallError {
        unique_id: String,
        error_code: String,
        error_description: String,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum OcppFrameError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    #[error("frame is not a non-empty array")]
    NotAnArray,
    #[error("unknown message type: {0}")]
    UnknownMessageType(u64),
    #[error("expected at least {expected} fields, got {got}")]
    MissingFields { expected: usize, got: usize },
    #[error("field type mismatch: {0}")]
    FieldTypeMismatch(&'static str),
}

fn str_at(arr: &[Value], idx: usize, what: &'static str) -> Result<String, OcppFrameError> {
    arr[idx]
        .as_str()
        .map(str::to_string)
        .ok_or(OcppFrameError::FieldTypeMismatch(what))
}

fn require_len(arr: &[Value], expected: usize) -> Result<(), OcppFrameError> {
    if arr.len() < expected {
        return Err(OcppFrameError::MissingFields {
            expected,
            got: arr.len(),
        });
    }
    Ok(())
}

impl OcppFrame {
    pub fn parse(text: &str) -> Result<Self, OcppFrameError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| OcppFrameError::InvalidJson(e.to_string()))?;
        let arr = match value {
            Value::Array(arr) if !arr.is_empty() => arr,
            _ => return Err(OcppFrameError::NotAnArray),
        };

        let msg_type = arr[0]
            .as_u64()
            .ok_or(OcppFrameError::FieldTypeMismatch("message type must be a number"))?;

        match msg_type {
            MSG_TYPE_CALL => {
                require_len(&arr, 4)?;
                Ok(Self::Call {
                    unique_id: str_at(&arr, 1, "uniqueId must be a string")?,
                    action: str_at(&arr, 2, "action must be a string")?,
                    payload: arr[3].clone(),
                })
            }
            MSG_TYPE_CALL_RESULT => {
                require_len(&arr, 3)?;
                Ok(Self::CallResult {
                    unique_id: str_at(&arr, 1, "uniqueId must be a string")?,
                    payload: arr[2].clone(),
                })
            }
            MSG_TYPE_CALL_ERROR => {
                require_len(&arr, 3)?;
                Ok(Self::CallError {
                    unique_id: str_at(&arr, 1, "uniqueId must be a string")?,
                    error_code: arr[2].as_str().unwrap_or("InternalError").to_string(),
                    error_description: arr
                        .get(3)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                })
            }
            other => Err(OcppFrameError::UnknownMessageType(other)),
        }
    }

    pub fn serialize(&self) -> String {
        let arr = match self {
            Self::Call {
                unique_id,
                action,
                payload,
            } => json!([MSG_TYPE_CALL, unique_id, action, payload]),
            Self::CallResult { unique_id, payload } => {
                json!([MSG_TYPE_CALL_RESULT, unique_id, payload])
            }
            Self::CallError {
                unique_id,
                error_code,
                error_description,
            } => json!([MSG_TYPE_CALL_ERROR, unique_id, error_code, error_description, {}]),
        };
        arr.to_string()
    }

    pub fn unique_id(&self) -> &str {
        match self {
            Self::Call { unique_id, .. }
            | Self::CallResult { unique_id, .. }
            | Self::CallError { unique_id, .. } => unique_id,
        }
    }

    pub fn error_response(
        unique_id: impl Into<String>,
        error_code: impl Into<String>,
        error_description: impl Into<String>,
    ) -> Self {
        Self::CallError {
            unique_id: unique_id.into(),
            error_code: error_code.into(),
            error_description: error_description.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_meter_values_call() {
        let text = r#"[2,"19223201","MeterValues",{"connectorId":1,"transactionId":7,"meterValue":[]}]"#;
        match OcppFrame::parse(text).unwrap() {
            OcppFrame::Call {
                unique_id,
                action,
                payload,
            } => {
                assert_eq!(unique_id, "19223201");
                assert_eq!(action, "MeterValues");
                assert_eq!(payload["transactionId"], 7);
            }
            other => panic!("expected Call, got {:?}", other),
        }
    }

    #[test]
    fn parse_remote_stop_result() {
        let frame = OcppFrame::parse(r#"[3,"CS-4",{"status":"Accepted"}]"#).unwrap();
        assert_eq!(
            frame,
            OcppFrame::CallResult {
                unique_id: "CS-4".into(),
                payload: json!({"status": "Accepted"}),
            }
        );
    }

    #[test]
    fn parse_call_error_without_details() {
        let frame = OcppFrame::parse(r#"[4,"CS-5","NotSupported"]"#).unwrap();
        assert_eq!(frame, OcppFrame::error_response("CS-5", "NotSupported", ""));
    }

    #[test]
    fn rejects_malformed_frames() {
        assert!(matches!(OcppFrame::parse("{}"), Err(OcppFrameError::NotAnArray)));
        assert!(matches!(OcppFrame::parse("[]"), Err(OcppFrameError::NotAnArray)));
        assert_eq!(
            OcppFrame::parse(r#"[9,"x"]"#),
            Err(OcppFrameError::UnknownMessageType(9))
        );
        assert_eq!(
            OcppFrame::parse(r#"[2,"x","Heartbeat"]"#),
            Err(OcppFrameError::MissingFields { expected: 4, got: 3 })
        );
        assert!(matches!(OcppFrame::parse("not json"), Err(OcppFrameError::InvalidJson(_))));
    }

    #[test]
    fn serialized_call_has_wire_shape() {
        let frame = OcppFrame::Call {
            unique_id: "CS-1".into(),
            action: "RemoteStopTransaction".into(),
            payload: json!({"transactionId": 42}),
        };
        assert_eq!(
            frame.serialize(),
            r#"[2,"CS-1","RemoteStopTransaction",{"transactionId":42}]"#
        );
    }
}
