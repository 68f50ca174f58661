//! The sync engine: owns the table, routes its changes to subscribed clients.

use crate::codec::{Codec, JsonCodec};
use crate::error::{Result, SyncError};
use crate::protocol::{Message, WireFormat};
use crate::subscriptions::SubscriberRegistry;
use crate::table::{ChangeBatch, ObservableTable};
use crate::transport::{ChannelTransport, Transport, TransportError, DEFAULT_CLIENT_BUFFER};
use crate::translate::{finalize_for, translate};
use crate::types::{ClientId, EngineStats, Path};
use crate::value::Value;
use crossbeam_channel::Receiver;
use parking_lot::{Mutex, MutexGuard};
use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Engine configuration.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Per-client queue size for the in-process transport.
    /// Default: 1000
    pub client_buffer: usize,

    /// Framing used by [`SyncEngine::frame`].
    pub wire_format: WireFormat,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            client_buffer: DEFAULT_CLIENT_BUFFER,
            wire_format: WireFormat::Json,
        }
    }
}

/// State that table mutations and registry edits must see consistently.
struct Inner {
    table: ObservableTable,
    changes: Receiver<ChangeBatch>,
    registry: SubscriberRegistry,
    keys_finalized: u64,
}

/// Routes table changes to the clients registered for each root key.
///
/// All table mutations and all registry edits run under one lock, so a change
/// batch is fully delivered before any later mutation, link or unlink is
/// served. Clients the transport reports as departed are dropped from the
/// registry each time the lock is taken.
pub struct SyncEngine<T: Transport> {
    inner: Mutex<Inner>,
    transport: T,
    departures: Option<Receiver<ClientId>>,
    codec: Box<dyn Codec>,
    config: EngineConfig,
    messages_sent: AtomicU64,
    send_failures: AtomicU64,
}

impl SyncEngine<Arc<ChannelTransport>> {
    /// Engine wired to a fresh in-process transport sized from `config`.
    pub fn in_process(config: EngineConfig) -> (Self, Arc<ChannelTransport>) {
        let transport = Arc::new(ChannelTransport::with_buffer(config.client_buffer));
        let engine = Self::with_config(Arc::clone(&transport), config);
        (engine, transport)
    }
}

impl<T: Transport> SyncEngine<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, EngineConfig::default())
    }

    pub fn with_config(transport: T, config: EngineConfig) -> Self {
        Self::with_codec(transport, JsonCodec, config)
    }

    pub fn with_codec(transport: T, codec: impl Codec + 'static, config: EngineConfig) -> Self {
        let (table, changes) = ObservableTable::new();
        let departures = transport.departures();
        Self {
            inner: Mutex::new(Inner {
                table,
                changes,
                registry: SubscriberRegistry::new(),
                keys_finalized: 0,
            }),
            transport,
            departures,
            codec: Box::new(codec),
            config,
            messages_sent: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // --- Subscriptions ---

    /// Register `client` for `key` and send it the key's current value.
    ///
    /// Fails with [`SyncError::NoSuchKey`] without touching any state if `key`
    /// has no defined value. Linking twice keeps one registration but sends a
    /// fresh `init`. If the transport no longer knows the client, the
    /// registration is rolled back.
    pub fn link(&self, client: ClientId, key: &str) -> Result<()> {
        let mut inner = self.lock();

        let init = match inner.table.get_root(key) {
            Some(value) if !value.is_undefined() => Message::init(key, self.codec.encode(value)),
            _ => return Err(SyncError::NoSuchKey(key.to_string())),
        };

        inner.registry.add(client, key);
        debug!(%client, key, "linked");
        if let Err(e) = self.deliver(client, &init) {
            if e.is_gone() {
                inner.registry.remove_all_for_client(client);
                debug!(%client, key, "link dropped, client gone");
            }
        }
        Ok(())
    }

    /// Drop the registration, if any, and send `closed`.
    pub fn unlink(&self, client: ClientId, key: &str) {
        let mut inner = self.lock();
        let was_linked = inner.registry.remove(client, key);
        debug!(%client, key, was_linked, "unlinked");
        let _ = self.deliver(client, &Message::closed(key));
    }

    /// Drop every registration of a client that has gone away. Sends nothing.
    pub fn disconnect(&self, client: ClientId) {
        let mut inner = self.lock();
        drop_client(&mut inner, client);
    }

    pub fn is_linked(&self, client: ClientId, key: &str) -> bool {
        self.lock().registry.contains(client, key)
    }

    /// Clients registered for `key`, in registration order.
    pub fn subscribers(&self, key: &str) -> Vec<ClientId> {
        self.lock().registry.clients_for(key).to_vec()
    }

    /// Keys `client` is registered for.
    pub fn subscriptions(&self, client: ClientId) -> Vec<String> {
        self.lock().registry.keys_for(client).to_vec()
    }

    // --- Table access ---

    /// Run `f` against the table. Every mutation made through the
    /// [`Mutation`] is broadcast as soon as it is applied, and the whole
    /// closure runs without interleaving with links, unlinks or other
    /// mutations.
    ///
    /// # Deadlocks
    ///
    /// `f` runs with the engine lock held and the lock is not reentrant.
    /// Calling any `SyncEngine` method from inside `f` (`get`, `link`,
    /// `stats`, another `mutate`, ...) deadlocks. Read through
    /// [`Mutation::get`] or [`Mutation::table`] instead.
    pub fn mutate<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Mutation<'_, T>) -> R,
    {
        let mut inner = self.lock();
        let mut mutation = Mutation {
            engine: self,
            inner: &mut *inner,
        };
        let out = f(&mut mutation);
        self.dispatch(&mut *inner);
        out
    }

    /// Read-only access to the table. The same lock rules as
    /// [`mutate`](Self::mutate) apply to `f`.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&ObservableTable) -> R,
    {
        f(&self.lock().table)
    }

    /// Current root value for `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.read(|table| table.get_root(key).cloned())
    }

    pub fn set(&self, path: &Path, value: impl Into<Value>) -> Result<()> {
        self.mutate(|m| m.set(path, value))
    }

    pub fn delete(&self, path: &Path) -> Result<()> {
        self.mutate(|m| m.delete(path))
    }

    pub fn push(&self, path: &Path, value: impl Into<Value>) -> Result<()> {
        self.mutate(|m| m.push(path, value))
    }

    pub fn splice(
        &self,
        path: &Path,
        start: usize,
        delete_count: usize,
        items: Vec<Value>,
    ) -> Result<Vec<Value>> {
        self.mutate(|m| m.splice(path, start, delete_count, items))
    }

    pub fn sort(&self, path: &Path) -> Result<()> {
        self.mutate(|m| m.sort(path))
    }

    pub fn reverse(&self, path: &Path) -> Result<()> {
        self.mutate(|m| m.reverse(path))
    }

    // --- Misc ---

    /// Frame a message with the configured wire format.
    pub fn frame(&self, message: &Message) -> Result<Vec<u8>> {
        message.to_bytes(self.config.wire_format)
    }

    pub fn stats(&self) -> EngineStats {
        let inner = self.lock();
        EngineStats {
            key_count: inner.table.keys().count(),
            registration_count: inner.registry.registration_count(),
            client_count: inner.registry.client_count(),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            keys_finalized: inner.keys_finalized,
        }
    }

    // --- Internal ---

    /// Take the engine lock, first dropping clients the transport has lost.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        let mut inner = self.inner.lock();
        self.reap(&mut inner);
        inner
    }

    fn reap(&self, inner: &mut Inner) {
        if let Some(departures) = &self.departures {
            for client in departures.try_iter() {
                drop_client(inner, client);
            }
        }
    }

    /// Translate and fan out every pending change batch, in order.
    fn dispatch(&self, inner: &mut Inner) {
        while let Ok(batch) = inner.changes.try_recv() {
            trace!(records = batch.len(), "dispatching change batch");
            for record in &batch {
                if record.is_root_delete() {
                    let message = finalize_for(record);
                    self.broadcast(&inner.registry, &message);
                    let dropped = inner.registry.remove_all_for_key(&message.key);
                    inner.keys_finalized += 1;
                    debug!(key = %message.key, clients = dropped.len(), "key finalized");
                } else {
                    let message = translate(record, &inner.table, self.codec.as_ref());
                    self.broadcast(&inner.registry, &message);
                }
            }
            // Clients found gone during this batch miss nothing further
            self.reap(inner);
        }
    }

    fn broadcast(&self, registry: &SubscriberRegistry, message: &Message) {
        for &client in registry.clients_for(&message.key) {
            let _ = self.deliver(client, message);
        }
    }

    fn deliver(
        &self,
        client: ClientId,
        message: &Message,
    ) -> std::result::Result<(), TransportError> {
        let sent = self.transport.send(client, message);
        match &sent {
            Ok(()) => {
                self.messages_sent.fetch_add(1, Ordering::Relaxed);
                trace!(%client, op = ?message.op, key = %message.key, "sent");
            }
            Err(e) => {
                self.send_failures.fetch_add(1, Ordering::Relaxed);
                warn!(%client, op = ?message.op, key = %message.key, error = %e, "send failed");
            }
        }
        sent
    }
}

fn drop_client(inner: &mut Inner, client: ClientId) {
    let keys = inner.registry.remove_all_for_client(client);
    debug!(%client, dropped = keys.len(), "client disconnected");
}

/// Write access to the table inside [`SyncEngine::mutate`].
///
/// Each operation's change records are broadcast before it returns.
pub struct Mutation<'a, T: Transport> {
    engine: &'a SyncEngine<T>,
    inner: &'a mut Inner,
}

impl<T: Transport> Mutation<'_, T> {
    pub fn table(&self) -> &ObservableTable {
        &self.inner.table
    }

    pub fn get(&self, path: &Path) -> Option<&Value> {
        self.inner.table.get(path)
    }

    pub fn set(&mut self, path: &Path, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.apply(|table| table.set(path, value))
    }

    pub fn delete(&mut self, path: &Path) -> Result<()> {
        self.apply(|table| table.delete(path))
    }

    pub fn push(&mut self, path: &Path, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.apply(|table| table.push(path, value))
    }

    pub fn splice(
        &mut self,
        path: &Path,
        start: usize,
        delete_count: usize,
        items: Vec<Value>,
    ) -> Result<Vec<Value>> {
        self.apply(|table| table.splice(path, start, delete_count, items))
    }

    pub fn sort(&mut self, path: &Path) -> Result<()> {
        self.apply(|table| table.sort(path))
    }

    pub fn sort_by<F>(&mut self, path: &Path, compare: F) -> Result<()>
    where
        F: FnMut(&Value, &Value) -> CmpOrdering,
    {
        self.apply(|table| table.sort_by(path, compare))
    }

    pub fn reverse(&mut self, path: &Path) -> Result<()> {
        self.apply(|table| table.reverse(path))
    }

    fn apply<R>(&mut self, op: impl FnOnce(&mut ObservableTable) -> Result<R>) -> Result<R> {
        let out = op(&mut self.inner.table);
        self.engine.dispatch(self.inner);
        out
    }
}
