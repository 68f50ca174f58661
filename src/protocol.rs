//! Wire protocol messages sent to clients.

use crate::error::Result;
use crate::types::Path;
use serde::{Deserialize, Serialize};

/// Message operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    /// Full current value of a key, sent once per successful link.
    Init,
    Update,
    Insert,
    Delete,
    /// The key's root value was deleted; the registration is gone.
    Finalize,
    /// Acknowledges an unlink.
    Closed,
}

/// One unit of protocol traffic for one client.
///
/// `path` is relative to the root object. `init`, `finalize` and `closed`
/// carry no path; `delete`, `finalize` and `closed` carry no value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub op: Op,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Path>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

impl Message {
    pub fn init(key: impl Into<String>, value: Option<serde_json::Value>) -> Self {
        Self {
            op: Op::Init,
            key: key.into(),
            path: None,
            value,
        }
    }

    /// A delta message (`update`, `insert` or `delete`).
    pub fn delta(
        op: Op,
        key: impl Into<String>,
        path: Path,
        value: Option<serde_json::Value>,
    ) -> Self {
        let value = if op == Op::Delete { None } else { value };
        Self {
            op,
            key: key.into(),
            path: Some(path),
            value,
        }
    }

    pub fn finalize(key: impl Into<String>) -> Self {
        Self {
            op: Op::Finalize,
            key: key.into(),
            path: None,
            value: None,
        }
    }

    pub fn closed(key: impl Into<String>) -> Self {
        Self {
            op: Op::Closed,
            key: key.into(),
            path: None,
            value: None,
        }
    }

    pub fn is_finalize(&self) -> bool {
        self.op == Op::Finalize
    }

    /// Frame the message for transmission.
    pub fn to_bytes(&self, format: WireFormat) -> Result<Vec<u8>> {
        match format {
            WireFormat::Json => Ok(serde_json::to_vec(self)?),
            WireFormat::MessagePack => Ok(rmp_serde::to_vec_named(self)?),
        }
    }

    /// Parse a framed message.
    pub fn from_bytes(format: WireFormat, bytes: &[u8]) -> Result<Self> {
        match format {
            WireFormat::Json => Ok(serde_json::from_slice(bytes)?),
            WireFormat::MessagePack => Ok(rmp_serde::from_slice(bytes)?),
        }
    }
}

/// Byte framing used by [`Message::to_bytes`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WireFormat {
    #[default]
    Json,
    MessagePack,
}
