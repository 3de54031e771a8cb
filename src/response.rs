use serde::{Deserialize, Serialize};

/// Body returned by the resource server for both the public and the protected resource.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ApiMessage {
    pub message: String,
}

impl ApiMessage {
    pub(crate) fn from_payload(payload: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(payload)
    }
}
