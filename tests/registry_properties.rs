//! Property tests for subscription bookkeeping and delivery.

use proptest::prelude::*;
use rootcast::{path, ClientId, EngineConfig, Op, SubscriberRegistry, SyncEngine, Value};
use std::collections::BTreeSet;

#[derive(Clone, Debug)]
enum RegistryOp {
    Add(u64, u8),
    Remove(u64, u8),
    RemoveClient(u64),
    RemoveKey(u8),
}

fn registry_op() -> impl Strategy<Value = RegistryOp> {
    prop_oneof![
        4 => (0u64..6, 0u8..4).prop_map(|(c, k)| RegistryOp::Add(c, k)),
        2 => (0u64..6, 0u8..4).prop_map(|(c, k)| RegistryOp::Remove(c, k)),
        1 => (0u64..6).prop_map(RegistryOp::RemoveClient),
        1 => (0u8..4).prop_map(RegistryOp::RemoveKey),
    ]
}

fn key(k: u8) -> String {
    format!("key-{}", k)
}

proptest! {
    #[test]
    fn registry_matches_set_model(ops in proptest::collection::vec(registry_op(), 0..64)) {
        let mut registry = SubscriberRegistry::new();
        let mut model: BTreeSet<(u64, String)> = BTreeSet::new();

        for op in ops {
            match op {
                RegistryOp::Add(c, k) => {
                    let added = registry.add(ClientId(c), &key(k));
                    prop_assert_eq!(added, model.insert((c, key(k))));
                }
                RegistryOp::Remove(c, k) => {
                    let removed = registry.remove(ClientId(c), &key(k));
                    prop_assert_eq!(removed, model.remove(&(c, key(k))));
                }
                RegistryOp::RemoveClient(c) => {
                    registry.remove_all_for_client(ClientId(c));
                    model.retain(|(mc, _)| *mc != c);
                }
                RegistryOp::RemoveKey(k) => {
                    registry.remove_all_for_key(&key(k));
                    model.retain(|(_, mk)| *mk != key(k));
                }
            }

            prop_assert!(registry.is_consistent());
            prop_assert_eq!(registry.registration_count(), model.len());
            for c in 0..6u64 {
                let expected: BTreeSet<String> = model
                    .iter()
                    .filter(|(mc, _)| *mc == c)
                    .map(|(_, k)| k.clone())
                    .collect();
                let actual: BTreeSet<String> =
                    registry.keys_for(ClientId(c)).iter().cloned().collect();
                prop_assert_eq!(actual, expected);
            }
        }
    }

    #[test]
    fn linked_client_gets_one_message_per_change(values in proptest::collection::vec(0i64..1000, 1..40)) {
        let (engine, transport) = SyncEngine::in_process(EngineConfig::default());
        let client = transport.connect();

        engine.set(&path!["log"], Value::array()).unwrap();
        engine.link(client.id, "log").unwrap();

        for v in &values {
            engine.push(&path!["log"], *v).unwrap();
        }
        engine.sort(&path!["log"]).unwrap();

        let received = client.drain();
        prop_assert_eq!(received.len(), values.len() + 2);
        prop_assert_eq!(received[0].op, Op::Init);
        for (i, msg) in received[1..=values.len()].iter().enumerate() {
            prop_assert_eq!(msg.op, Op::Insert);
            prop_assert_eq!(msg.value.clone(), Some(serde_json::json!(values[i])));
        }

        let mut sorted = values.clone();
        sorted.sort();
        let last = received.last().unwrap();
        prop_assert_eq!(last.op, Op::Update);
        prop_assert_eq!(last.value.clone(), Some(serde_json::json!(sorted)));
    }
}
