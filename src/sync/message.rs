use serde::{Deserialize, Serialize};

use crate::core::Result;
use crate::result::RecordSet;

pub const DATA_CHANGED: &str = "data-changed";

/// `{"type": "data-changed", "payload": {"results": <record set>}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: ChangePayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangePayload {
    pub results: RecordSet,
}

#[derive(Deserialize)]
struct Tag {
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl ChangeMessage {
    pub fn data_changed(results: RecordSet) -> Self {
        Self {
            kind: DATA_CHANGED.to_string(),
            payload: ChangePayload { results },
        }
    }

    pub fn is_data_changed(&self) -> bool {
        self.kind == DATA_CHANGED
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes a frame. `Ok(None)` for frames of any other type.
    pub fn decode(frame: &str) -> Result<Option<Self>> {
        let tag: Tag = serde_json::from_str(frame)?;
        if tag.kind.as_deref() != Some(DATA_CHANGED) {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(frame)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FieldDescriptor, Value, type_oid};

    #[test]
    fn encodes_to_the_channel_shape() {
        let results = RecordSet::new(
            1,
            vec![FieldDescriptor::new("id", type_oid::INT4)],
            vec![vec![Value::Integer(1)]],
        )
        .unwrap();
        let frame = ChangeMessage::data_changed(results.clone()).encode().unwrap();
        let json: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(json["type"], "data-changed");
        assert_eq!(json["payload"]["results"]["rows"][0]["id"], 1);

        let decoded = ChangeMessage::decode(&frame).unwrap().unwrap();
        assert_eq!(decoded.payload.results, results);
    }

    #[test]
    fn other_types_are_ignored() {
        assert_eq!(ChangeMessage::decode(r#"{"type":"ping"}"#).unwrap(), None);
        assert_eq!(ChangeMessage::decode(r#"{}"#).unwrap(), None);
        assert!(ChangeMessage::decode("not json").is_err());
    }

    #[test]
    fn malformed_payload_is_an_error() {
        let frame = r#"{"type":"data-changed","payload":{"results":{"fields":[],"rows":[{"id":1}]}}}"#;
        assert!(ChangeMessage::decode(frame).is_err());
    }
}
