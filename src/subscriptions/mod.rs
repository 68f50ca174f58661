//! Subscription bookkeeping.
//!
//! A registration pairs one client with one root key. Registrations are
//! created by `link` and end on `unlink`, on client disconnect, or when the
//! key's root value is deleted (finalize).
//!
//! # Example
//!
//! ```ignore
//! let mut registry = SubscriberRegistry::new();
//! registry.add(ClientId(1), "foo");
//!
//! for client in registry.clients_for("foo") {
//!     transport.send(*client, &message)?;
//! }
//!
//! // Key deleted: everyone goes
//! let dropped = registry.remove_all_for_key("foo");
//! ```

mod registry;

pub use registry::SubscriberRegistry;
