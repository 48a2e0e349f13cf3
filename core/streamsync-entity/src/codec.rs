//! Feed envelope codec.
//!
//! Every control-plane event is wrapped in a JSON envelope:
//!
//! ```json
//! {"clientID": "c_stream", "method": "update", "data": {"frameRate": 10}}
//! ```
//!
//! `clientID` names the publishing process role and is what receivers use
//! to drop their own echoes.

use crate::error::{EntityError, EntityResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Envelope method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Method {
    Create,
    Update,
    Delete,
    /// Any method this crate does not act on.
    Other(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for Method {
    fn from(s: String) -> Self {
        match s.as_str() {
            "create" => Self::Create,
            "update" => Self::Update,
            "delete" => Self::Delete,
            _ => Self::Other(s),
        }
    }
}

impl From<Method> for String {
    fn from(m: Method) -> Self {
        match m {
            Method::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded feed envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "clientID")]
    pub client_id: String,
    pub method: Method,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    /// The `data` member, if it is a JSON object.
    pub fn data_object(&self) -> Option<&Map<String, Value>> {
        self.data.as_ref().and_then(Value::as_object)
    }
}

/// Encodes and decodes envelopes on behalf of one client identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventCodec {
    client_id: String,
}

impl EventCodec {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
        }
    }

    /// The identity stamped into every encoded envelope.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Encodes an envelope carrying `data`.
    pub fn encode(&self, method: Method, data: Map<String, Value>) -> EntityResult<String> {
        let envelope = Envelope {
            client_id: self.client_id.clone(),
            method,
            data: Some(Value::Object(data)),
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    /// Decodes a raw feed payload.
    ///
    /// Fails with [`EntityError::Protocol`] when the payload is not a JSON
    /// object or lacks a string `clientID` or `method`.
    pub fn decode(raw: &[u8]) -> EntityResult<Envelope> {
        serde_json::from_slice(raw).map_err(|e| EntityError::Protocol(e.to_string()))
    }

    /// Whether `envelope` was published under this codec's identity.
    pub fn is_own(&self, envelope: &Envelope) -> bool {
        envelope.client_id == self.client_id
    }
}
