//! Bidirectional index of (client, key) registrations.

use crate::types::ClientId;
use std::collections::HashMap;

/// Tracks which clients are registered for which root keys.
///
/// Both directions are kept in step by every mutating method: a client is
/// listed under a key exactly when that key is listed under the client.
/// Entries whose list becomes empty are removed. Lists keep registration
/// order, which is also fan-out order.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    /// key -> clients registered for it.
    key_to_clients: HashMap<String, Vec<ClientId>>,

    /// client -> keys it is registered for.
    client_to_keys: HashMap<ClientId, Vec<String>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `client` for `key`. Returns false if it already was.
    pub fn add(&mut self, client: ClientId, key: &str) -> bool {
        let clients = self.key_to_clients.entry(key.to_string()).or_default();
        if clients.contains(&client) {
            return false;
        }
        clients.push(client);
        self.client_to_keys
            .entry(client)
            .or_default()
            .push(key.to_string());
        true
    }

    /// Drop one registration. Returns false if there was none.
    pub fn remove(&mut self, client: ClientId, key: &str) -> bool {
        let removed = detach(&mut self.key_to_clients, key, &client);
        if removed {
            detach(&mut self.client_to_keys, &client, key);
        }
        removed
    }

    /// Drop every registration held by `client`. Returns the keys it held.
    pub fn remove_all_for_client(&mut self, client: ClientId) -> Vec<String> {
        let keys = self.client_to_keys.remove(&client).unwrap_or_default();
        for key in &keys {
            detach(&mut self.key_to_clients, key.as_str(), &client);
        }
        keys
    }

    /// Drop every registration for `key`. Returns the clients that held one.
    pub fn remove_all_for_key(&mut self, key: &str) -> Vec<ClientId> {
        let clients = self.key_to_clients.remove(key).unwrap_or_default();
        for client in &clients {
            detach(&mut self.client_to_keys, client, key);
        }
        clients
    }

    /// Clients registered for `key`, in registration order.
    pub fn clients_for(&self, key: &str) -> &[ClientId] {
        self.key_to_clients
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Keys `client` is registered for, in registration order.
    pub fn keys_for(&self, client: ClientId) -> &[String] {
        self.client_to_keys
            .get(&client)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn contains(&self, client: ClientId, key: &str) -> bool {
        self.clients_for(key).contains(&client)
    }

    pub fn registration_count(&self) -> usize {
        self.client_to_keys.values().map(Vec::len).sum()
    }

    pub fn client_count(&self) -> usize {
        self.client_to_keys.len()
    }

    pub fn key_count(&self) -> usize {
        self.key_to_clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.client_to_keys.is_empty()
    }

    /// Check that both directions agree and no empty lists remain.
    pub fn is_consistent(&self) -> bool {
        let forward = self.key_to_clients.iter().all(|(key, clients)| {
            !clients.is_empty() && clients.iter().all(|c| self.keys_for(*c).contains(key))
        });
        let backward = self.client_to_keys.iter().all(|(client, keys)| {
            !keys.is_empty() && keys.iter().all(|k| self.clients_for(k).contains(client))
        });
        forward && backward
    }
}

/// Remove `item` from the list at `map[owner]`, dropping the entry if it
/// empties. Returns whether anything was removed.
fn detach<K, Q, V, I>(map: &mut HashMap<K, Vec<V>>, owner: &Q, item: &I) -> bool
where
    K: std::borrow::Borrow<Q> + std::hash::Hash + Eq,
    Q: std::hash::Hash + Eq + ?Sized,
    V: PartialEq<I>,
    I: ?Sized,
{
    let Some(list) = map.get_mut(owner) else {
        return false;
    };
    let Some(pos) = list.iter().position(|v| v == item) else {
        return false;
    };
    list.remove(pos);
    if list.is_empty() {
        map.remove(owner);
    }
    true
}
