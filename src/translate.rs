//! Translation of change records into protocol messages.

use crate::codec::Codec;
use crate::protocol::{Message, Op};
use crate::table::ObservableTable;
use crate::types::{ChangeKind, ChangeRecord};

/// Build the single message describing `record`.
///
/// Sorts and reversals are not expressed as positional deltas: the current
/// value of the reordered sequence is read back from `table` and sent as one
/// `update`. Root deletions must be routed to [`finalize_for`] by the caller.
///
/// # Panics
///
/// If the record's path is empty or does not start with a field name.
pub fn translate(record: &ChangeRecord, table: &ObservableTable, codec: &dyn Codec) -> Message {
    let key = record
        .path
        .root_key()
        .unwrap_or_else(|| panic!("malformed change record path: {:?}", record.path));
    let path = record.path.relative();

    match record.kind {
        ChangeKind::Insert => Message::delta(Op::Insert, key, path, encode(record, codec)),
        ChangeKind::Update => Message::delta(Op::Update, key, path, encode(record, codec)),
        ChangeKind::Delete => Message::delta(Op::Delete, key, path, None),
        ChangeKind::Shuffle | ChangeKind::Reverse => {
            let current = table.get(&record.path).and_then(|v| codec.encode(v));
            Message::delta(Op::Update, key, path, current)
        }
    }
}

/// Terminal message for a key whose root value was deleted.
pub fn finalize_for(record: &ChangeRecord) -> Message {
    debug_assert!(record.is_root_delete());
    let key = record
        .path
        .root_key()
        .unwrap_or_else(|| panic!("malformed change record path: {:?}", record.path));
    Message::finalize(key)
}

fn encode(record: &ChangeRecord, codec: &dyn Codec) -> Option<serde_json::Value> {
    record.new_value.as_ref().and_then(|v| codec.encode(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonCodec;
    use crate::path;
    use crate::types::Path;
    use crate::value::Value;
    use serde_json::json;

    fn record(kind: ChangeKind, path: Path, new_value: Option<Value>) -> ChangeRecord {
        ChangeRecord {
            kind,
            path,
            old_value: None,
            new_value,
        }
    }

    #[test]
    fn test_root_update_has_empty_path() {
        let (table, _rx) = ObservableTable::new();
        let msg = translate(
            &record(ChangeKind::Update, path!["foo"], Some(Value::from("def"))),
            &table,
            &JsonCodec,
        );
        assert_eq!(msg, Message::delta(Op::Update, "foo", path![], Some(json!("def"))));
    }

    #[test]
    fn test_nested_insert() {
        let (table, _rx) = ObservableTable::new();
        let msg = translate(
            &record(ChangeKind::Insert, path!["foo", "abc"], Some(Value::from("def"))),
            &table,
            &JsonCodec,
        );
        assert_eq!(msg.op, Op::Insert);
        assert_eq!(msg.path, Some(path!["abc"]));
        assert_eq!(msg.value, Some(json!("def")));
    }

    #[test]
    fn test_delete_ignores_value() {
        let (table, _rx) = ObservableTable::new();
        let mut rec = record(ChangeKind::Delete, path!["foo", "abc"], None);
        rec.old_value = Some(Value::from("gone"));
        let msg = translate(&rec, &table, &JsonCodec);
        assert_eq!(msg.op, Op::Delete);
        assert!(msg.value.is_none());
    }

    #[test]
    fn test_undefined_new_value_is_omitted() {
        let (table, _rx) = ObservableTable::new();
        let msg = translate(
            &record(ChangeKind::Update, path!["foo", "x"], Some(Value::Undefined)),
            &table,
            &JsonCodec,
        );
        assert_eq!(msg.op, Op::Update);
        assert!(msg.value.is_none());
    }

    #[test]
    fn test_shuffle_resnapshots_current_value() {
        let (mut table, _rx) = ObservableTable::new();
        table
            .set(&path!["foo"], Value::from(json!({"bar": ["a", "c", "b"]})))
            .unwrap();
        table.sort(&path!["foo", "bar"]).unwrap();

        let msg = translate(
            &record(ChangeKind::Shuffle, path!["foo", "bar"], None),
            &table,
            &JsonCodec,
        );
        assert_eq!(
            msg,
            Message::delta(Op::Update, "foo", path!["bar"], Some(json!(["a", "b", "c"])))
        );
    }

    #[test]
    fn test_reverse_resnapshots_current_value() {
        let (mut table, _rx) = ObservableTable::new();
        table.set(&path!["list"], Value::from(json!([1, 2, 3]))).unwrap();
        table.reverse(&path!["list"]).unwrap();

        let msg = translate(
            &record(ChangeKind::Reverse, path!["list"], None),
            &table,
            &JsonCodec,
        );
        assert_eq!(msg, Message::delta(Op::Update, "list", path![], Some(json!([3, 2, 1]))));
    }

    #[test]
    fn test_finalize_for_root_delete() {
        let rec = record(ChangeKind::Delete, path!["foo"], None);
        assert_eq!(finalize_for(&rec), Message::finalize("foo"));
    }

    #[test]
    #[should_panic(expected = "malformed change record")]
    fn test_empty_path_panics() {
        let (table, _rx) = ObservableTable::new();
        translate(&record(ChangeKind::Insert, Path::default(), None), &table, &JsonCodec);
    }
}
