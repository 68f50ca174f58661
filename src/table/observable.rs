//! The mutation-observable root-object table.

use crate::error::{Result, SyncError};
use crate::types::{ChangeKind, ChangeRecord, Path, Segment};
use crate::value::Value;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::trace;

/// A batch of change records produced by one mutation, in emission order.
pub type ChangeBatch = Vec<ChangeRecord>;

/// Root-object table that reports every successful mutation as a batch of
/// elementary [`ChangeRecord`]s on a single-consumer channel.
///
/// Batches are sent synchronously, before the mutating call returns. A failed
/// mutation leaves the table untouched and sends nothing.
pub struct ObservableTable {
    roots: BTreeMap<String, Value>,
    changes: Sender<ChangeBatch>,
}

impl ObservableTable {
    /// Create an empty table and the receiving end of its change stream.
    pub fn new() -> (Self, Receiver<ChangeBatch>) {
        let (changes, receiver) = unbounded();
        let table = Self {
            roots: BTreeMap::new(),
            changes,
        };
        (table, receiver)
    }

    // --- Reads ---

    /// Value at an absolute path (first segment is the root key).
    pub fn get(&self, path: &Path) -> Option<&Value> {
        let key = path.root_key()?;
        self.roots.get(key)?.pointer(&path.segments()[1..])
    }

    pub fn get_root(&self, key: &str) -> Option<&Value> {
        self.roots.get(key)
    }

    /// True when `key` holds a defined value.
    pub fn contains_key(&self, key: &str) -> bool {
        self.roots.get(key).is_some_and(|v| !v.is_undefined())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.roots.keys().map(String::as_str)
    }

    /// Number of root keys present (including ones set to undefined).
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    // --- Mutations ---

    /// Assign `value` at `path`.
    ///
    /// Emits `insert` when the slot did not exist (a missing field or root key,
    /// or the index one past the end of a sequence) and `update` otherwise.
    pub fn set(&mut self, path: &Path, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let key = Self::root_key(path)?;

        if path.len() == 1 {
            let old = self.roots.insert(key.to_string(), value.clone());
            let kind = if old.is_some() {
                ChangeKind::Update
            } else {
                ChangeKind::Insert
            };
            self.emit(vec![ChangeRecord {
                kind,
                path: path.clone(),
                old_value: old,
                new_value: Some(value),
            }]);
            return Ok(());
        }

        let (parent_path, last) = Self::split_last(path)?;
        let parent = self.resolve_mut(&parent_path)?;
        let (kind, old) = match (parent, last) {
            (Value::Object(fields), Segment::Key(k)) => {
                let old = fields.insert(k.clone(), value.clone());
                let kind = if old.is_some() {
                    ChangeKind::Update
                } else {
                    ChangeKind::Insert
                };
                (kind, old)
            }
            (Value::Array(items), Segment::Index(i)) if *i < items.len() => {
                let old = std::mem::replace(&mut items[*i], value.clone());
                (ChangeKind::Update, Some(old))
            }
            (Value::Array(items), Segment::Index(i)) if *i == items.len() => {
                items.push(value.clone());
                (ChangeKind::Insert, None)
            }
            _ => return Err(SyncError::PathNotFound(path.clone())),
        };

        self.emit(vec![ChangeRecord {
            kind,
            path: path.clone(),
            old_value: old,
            new_value: Some(value),
        }]);
        Ok(())
    }

    /// Remove the value at `path`. Removing an absent slot is a no-op.
    ///
    /// Deleting a sequence element shifts the rest down, like a one-element
    /// splice.
    pub fn delete(&mut self, path: &Path) -> Result<()> {
        let key = Self::root_key(path)?;

        if path.len() == 1 {
            if let Some(old) = self.roots.remove(key) {
                self.emit(vec![ChangeRecord {
                    kind: ChangeKind::Delete,
                    path: path.clone(),
                    old_value: Some(old),
                    new_value: None,
                }]);
            }
            return Ok(());
        }

        let (parent_path, last) = Self::split_last(path)?;
        let parent = self.resolve_mut(&parent_path)?;
        let old = match (parent, last) {
            (Value::Object(fields), Segment::Key(k)) => fields.remove(k),
            (Value::Array(items), Segment::Index(i)) if *i < items.len() => Some(items.remove(*i)),
            (Value::Array(_), Segment::Index(_)) => None,
            _ => return Err(SyncError::PathNotFound(path.clone())),
        };

        if let Some(old) = old {
            self.emit(vec![ChangeRecord {
                kind: ChangeKind::Delete,
                path: path.clone(),
                old_value: Some(old),
                new_value: None,
            }]);
        }
        Ok(())
    }

    /// Append to the sequence at `path`.
    pub fn push(&mut self, path: &Path, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let items = self.sequence_mut(path)?;
        let index = items.len();
        items.push(value.clone());

        self.emit(vec![ChangeRecord {
            kind: ChangeKind::Insert,
            path: path.child(index),
            old_value: None,
            new_value: Some(value),
        }]);
        Ok(())
    }

    /// Remove `delete_count` elements starting at `start` and insert `items`
    /// in their place. Returns the removed elements.
    ///
    /// Emits one `delete` per removed element, highest index first, then one
    /// `insert` per new element in order.
    pub fn splice(
        &mut self,
        path: &Path,
        start: usize,
        delete_count: usize,
        items: Vec<Value>,
    ) -> Result<Vec<Value>> {
        let sequence = self.sequence_mut(path)?;
        let start = start.min(sequence.len());
        let end = start.saturating_add(delete_count).min(sequence.len());

        let removed: Vec<Value> = sequence
            .splice(start..end, items.iter().cloned())
            .collect();

        let mut records = Vec::with_capacity(removed.len() + items.len());
        for (offset, old) in removed.iter().enumerate().rev() {
            records.push(ChangeRecord {
                kind: ChangeKind::Delete,
                path: path.child(start + offset),
                old_value: Some(old.clone()),
                new_value: None,
            });
        }
        for (offset, new) in items.into_iter().enumerate() {
            records.push(ChangeRecord {
                kind: ChangeKind::Insert,
                path: path.child(start + offset),
                old_value: None,
                new_value: Some(new),
            });
        }

        self.emit(records);
        Ok(removed)
    }

    /// Sort the sequence at `path` with [`Value::default_cmp`].
    pub fn sort(&mut self, path: &Path) -> Result<()> {
        self.sort_by(path, Value::default_cmp)
    }

    /// Sort the sequence at `path`; reported as a single `shuffle`.
    pub fn sort_by<F>(&mut self, path: &Path, compare: F) -> Result<()>
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        let items = self.sequence_mut(path)?;
        let old = Value::Array(items.clone());
        items.sort_by(compare);

        self.emit(vec![ChangeRecord {
            kind: ChangeKind::Shuffle,
            path: path.clone(),
            old_value: Some(old),
            new_value: None,
        }]);
        Ok(())
    }

    /// Reverse the sequence at `path`; reported as a single `reverse`.
    pub fn reverse(&mut self, path: &Path) -> Result<()> {
        let items = self.sequence_mut(path)?;
        items.reverse();

        self.emit(vec![ChangeRecord {
            kind: ChangeKind::Reverse,
            path: path.clone(),
            old_value: None,
            new_value: None,
        }]);
        Ok(())
    }

    // --- Internal ---

    fn root_key(path: &Path) -> Result<&str> {
        match path.segments().first() {
            Some(Segment::Key(k)) => Ok(k),
            Some(Segment::Index(i)) => Err(SyncError::InvalidPath(format!(
                "root segment must be a key, got index {}",
                i
            ))),
            None => Err(SyncError::InvalidPath("empty path".to_string())),
        }
    }

    fn split_last(path: &Path) -> Result<(Path, &Segment)> {
        match path.segments().split_last() {
            Some((last, parent)) => Ok((Path(parent.to_vec()), last)),
            None => Err(SyncError::InvalidPath("empty path".to_string())),
        }
    }

    fn resolve_mut(&mut self, path: &Path) -> Result<&mut Value> {
        let key = Self::root_key(path)?;
        self.roots
            .get_mut(key)
            .and_then(|root| root.pointer_mut(&path.segments()[1..]))
            .ok_or_else(|| SyncError::PathNotFound(path.clone()))
    }

    fn sequence_mut(&mut self, path: &Path) -> Result<&mut Vec<Value>> {
        let value = self.resolve_mut(path)?;
        value
            .as_array_mut()
            .ok_or_else(|| SyncError::NotASequence(path.clone()))
    }

    fn emit(&self, batch: ChangeBatch) {
        if batch.is_empty() {
            return;
        }
        if self.changes.send(batch).is_err() {
            trace!("change stream has no listener, batch discarded");
        }
    }
}
