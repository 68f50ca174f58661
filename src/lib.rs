//! # Rootcast
//!
//! Streams changes to a table of root objects to the clients subscribed to
//! each root key.
//!
//! ## Core Concepts
//!
//! - **Root objects**: Nested values addressed by a string key
//! - **Change records**: One per elementary mutation of the table
//! - **Registrations**: (client, key) pairs created by `link`
//! - **Finalize**: Deleting a root value ends every registration for its key
//!
//! ## Example
//!
//! ```ignore
//! use rootcast::{path, EngineConfig, SyncEngine, Value};
//!
//! let (engine, transport) = SyncEngine::in_process(EngineConfig::default());
//! let client = transport.connect();
//!
//! engine.set(&path!["foo"], Value::object())?;
//!
//! // Client gets {"op":"init","key":"foo","value":{}}
//! engine.link(client.id, "foo")?;
//!
//! // Client gets {"op":"insert","key":"foo","path":["abc"],"value":"def"}
//! engine.set(&path!["foo", "abc"], "def")?;
//!
//! // Client gets {"op":"finalize","key":"foo"} and is unregistered
//! engine.delete(&path!["foo"])?;
//! ```

pub mod codec;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod subscriptions;
pub mod table;
pub mod translate;
pub mod transport;
pub mod types;
pub mod value;

// Re-exports
pub use codec::{Codec, JsonCodec, UNREPRESENTABLE_KEY};
pub use engine::{EngineConfig, Mutation, SyncEngine};
pub use error::{Result, SyncError};
pub use protocol::{Message, Op, WireFormat};
pub use subscriptions::SubscriberRegistry;
pub use table::{ChangeBatch, ObservableTable};
pub use translate::{finalize_for, translate};
pub use transport::{ChannelTransport, ClientHandle, Transport, TransportError};
pub use types::*;
pub use value::Value;
