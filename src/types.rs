//! Core types for the sync engine.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier for a connected client.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClientId(pub u64);

impl fmt::Debug for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientId({})", self.0)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One step into a nested value: a record field or a sequence index.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segment {
    Index(usize),
    Key(String),
}

impl Segment {
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Segment::Key(k) => Some(k),
            Segment::Index(_) => None,
        }
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(k) => write!(f, "{:?}", k),
            Segment::Index(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for Segment {
    fn from(s: &str) -> Self {
        Segment::Key(s.to_string())
    }
}

impl From<String> for Segment {
    fn from(s: String) -> Self {
        Segment::Key(s)
    }
}

impl From<usize> for Segment {
    fn from(i: usize) -> Self {
        Segment::Index(i)
    }
}

/// Location of a value. In a [`ChangeRecord`] the first segment is the root key.
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(pub Vec<Segment>);

impl Path {
    pub fn root(key: impl Into<String>) -> Self {
        Path(vec![Segment::Key(key.into())])
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The root key this path addresses, if the first segment is a field name.
    pub fn root_key(&self) -> Option<&str> {
        self.0.first().and_then(Segment::as_key)
    }

    /// Everything after the root key.
    pub fn relative(&self) -> Path {
        Path(self.0.iter().skip(1).cloned().collect())
    }

    /// A new path with `segment` appended.
    pub fn child(&self, segment: impl Into<Segment>) -> Path {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Path(segments)
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                Segment::Key(k) if i == 0 => write!(f, "{}", k)?,
                Segment::Key(k) => write!(f, ".{}", k)?,
                Segment::Index(idx) => write!(f, "[{}]", idx)?,
            }
        }
        Ok(())
    }
}

impl<S: Into<Segment>> FromIterator<S> for Path {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Path(iter.into_iter().map(Into::into).collect())
    }
}

/// Builds a [`Path`] from a mix of field names and indices.
///
/// ```ignore
/// let p = path!["foo", "bar", 2];
/// ```
#[macro_export]
macro_rules! path {
    () => { $crate::types::Path::default() };
    ($($seg:expr),+ $(,)?) => {
        $crate::types::Path(vec![$($crate::types::Segment::from($seg)),+])
    };
}

/// Kind of elementary mutation reported by the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    /// Whole-sequence sort.
    Shuffle,
    /// Whole-sequence reversal.
    Reverse,
}

/// One elementary mutation emitted by the observable table.
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeRecord {
    pub kind: ChangeKind,
    pub path: Path,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

impl ChangeRecord {
    /// True when the entire root value of a key was removed.
    pub fn is_root_delete(&self) -> bool {
        self.kind == ChangeKind::Delete && self.path.len() == 1
    }
}

/// Engine statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Root keys present in the table.
    pub key_count: usize,
    /// Active (client, key) registrations.
    pub registration_count: usize,
    /// Clients with at least one registration.
    pub client_count: usize,
    /// Messages handed to the transport successfully.
    pub messages_sent: u64,
    /// Messages the transport refused.
    pub send_failures: u64,
    /// Root deletions that finalized a key.
    pub keys_finalized: u64,
}
