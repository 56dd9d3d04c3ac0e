/// Controller wire format: one JSON object per line
///
/// ```text
/// parent ──> {"id":1,"target":"excitement","method":"state","args":[]}
/// child  <── {"id":1,"result":"coast"}
/// child  <── {"id":2,"error":"Method fly is not exported by excitement"}
/// ```
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;

use crate::error::BridgeError;
use crate::messaging::CallResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    pub target: String,
    pub method: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl Request {
    pub fn description(&self) -> String {
        format!("#{} {}.{}({} args)", self.id, self.target, self.method, self.args.len())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Ok { id: u64, result: Value },
    Err { id: u64, error: String },
}

impl Response {
    pub fn from_result(id: u64, result: CallResult) -> Self {
        match result {
            Ok(result) => Response::Ok { id, result },
            Err(e) => Response::Err {
                id,
                error: e.to_string(),
            },
        }
    }

    pub fn id(&self) -> u64 {
        match self {
            Response::Ok { id, .. } | Response::Err { id, .. } => *id,
        }
    }

    pub fn into_result(self) -> Result<Value, BridgeError> {
        match self {
            Response::Ok { result, .. } => Ok(result),
            Response::Err { error, .. } => Err(BridgeError::Remote(error)),
        }
    }
}

/// Write one frame followed by a newline
pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, frame: &T) -> Result<(), BridgeError> {
    let mut line = serde_json::to_vec(frame)?;
    line.push(b'\n');
    writer.write_all(&line)?;
    writer.flush()?;
    Ok(())
}

pub fn parse_frame<T: DeserializeOwned>(line: &[u8]) -> Result<T, BridgeError> {
    Ok(serde_json::from_slice(line)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BusError;
    use serde_json::json;

    #[test]
    fn test_request_without_args() {
        let request: Request =
            parse_frame(br#"{"id":7,"target":"head","method":"mode"}"#).unwrap();
        assert_eq!(request.id, 7);
        assert!(request.args.is_empty());
        assert_eq!(request.description(), "#7 head.mode(0 args)");
    }

    #[test]
    fn test_response_shapes() {
        let ok = Response::from_result(1, Ok(json!("coast")));
        assert_eq!(serde_json::to_value(&ok).unwrap(), json!({"id": 1, "result": "coast"}));

        let err = Response::from_result(2, Err(BusError::ComponentNotFound("toy".into())));
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({"id": 2, "error": "Component not found: toy"})
        );
    }

    #[test]
    fn test_parse_response_variants() {
        let ok: Response = parse_frame(br#"{"id":3,"result":null}"#).unwrap();
        assert_eq!(ok.id(), 3);
        assert_eq!(ok.into_result().unwrap(), Value::Null);

        let err: Response = parse_frame(br#"{"id":4,"error":"boom"}"#).unwrap();
        assert!(matches!(err.into_result(), Err(BridgeError::Remote(e)) if e == "boom"));
    }

    #[test]
    fn test_write_frame_appends_newline() {
        let mut out = Vec::new();
        write_frame(&mut out, &Response::Ok { id: 5, result: json!(1) }).unwrap();
        assert_eq!(out, b"{\"id\":5,\"result\":1}\n");
    }
}
