//! Root-object table.
//!
//! The table owns every root object and reports each elementary mutation as a
//! [`ChangeRecord`](crate::types::ChangeRecord). One logical mutation yields one
//! batch; batches arrive on the channel in program order.

mod observable;

pub use observable::{ChangeBatch, ObservableTable};
