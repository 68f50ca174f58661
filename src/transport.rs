//! Delivery of messages to clients.
//!
//! The engine needs [`Transport::send`] and, to drop the registrations of
//! clients that go away, [`Transport::departures`]. Connection management
//! belongs to whoever owns the clients. [`ChannelTransport`] is an in-process
//! implementation backed by bounded crossbeam channels, one per client.

use crate::protocol::Message;
use crate::types::ClientId;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Why a message could not be handed to a client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Unknown client: {0}")]
    UnknownClient(ClientId),

    #[error("Send buffer full for client {0}")]
    Full(ClientId),

    #[error("Client {0} disconnected")]
    Disconnected(ClientId),
}

impl TransportError {
    /// The client will never receive anything again.
    pub fn is_gone(&self) -> bool {
        matches!(
            self,
            TransportError::UnknownClient(_) | TransportError::Disconnected(_)
        )
    }
}

/// Delivers one message to one client. Fire-and-forget: implementations must
/// not block waiting for the client.
pub trait Transport: Send + Sync {
    fn send(&self, client: ClientId, message: &Message) -> Result<(), TransportError>;

    /// Stream of clients that have disconnected. The engine drains it before
    /// serving each call and drops their registrations without sending
    /// anything. `None` means disconnects are only reported through
    /// [`SyncEngine::disconnect`](crate::engine::SyncEngine::disconnect).
    fn departures(&self) -> Option<Receiver<ClientId>> {
        None
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, client: ClientId, message: &Message) -> Result<(), TransportError> {
        (**self).send(client, message)
    }

    fn departures(&self) -> Option<Receiver<ClientId>> {
        (**self).departures()
    }
}

/// Default per-client buffer.
pub const DEFAULT_CLIENT_BUFFER: usize = 1000;

/// In-process transport: each connected client gets a bounded queue.
///
/// A client departs when [`disconnect`](Self::disconnect) is called or when a
/// send finds its [`ClientHandle`] dropped. Either way its id is reported once
/// on the departures channel.
pub struct ChannelTransport {
    clients: RwLock<HashMap<ClientId, Sender<Message>>>,
    next_id: AtomicU64,
    buffer_size: usize,
    departed: Sender<ClientId>,
    departures: Receiver<ClientId>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::with_buffer(DEFAULT_CLIENT_BUFFER)
    }

    pub fn with_buffer(buffer_size: usize) -> Self {
        let (departed, departures) = unbounded();
        Self {
            clients: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer_size,
            departed,
            departures,
        }
    }

    /// Connect a new client.
    pub fn connect(&self) -> ClientHandle {
        let id = ClientId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(self.buffer_size);
        self.clients.write().insert(id, sender);
        ClientHandle { id, receiver }
    }

    /// Forget a client and report its departure. Returns false if it was not
    /// connected.
    pub fn disconnect(&self, client: ClientId) -> bool {
        let removed = self.clients.write().remove(&client).is_some();
        if removed {
            // We hold the receiver, so this cannot fail
            let _ = self.departed.send(client);
        }
        removed
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }
}

impl Default for ChannelTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for ChannelTransport {
    fn send(&self, client: ClientId, message: &Message) -> Result<(), TransportError> {
        let sent = {
            let clients = self.clients.read();
            let sender = clients
                .get(&client)
                .ok_or(TransportError::UnknownClient(client))?;
            sender.try_send(message.clone())
        };
        match sent {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(TransportError::Full(client)),
            Err(TrySendError::Disconnected(_)) => {
                self.disconnect(client);
                Err(TransportError::Disconnected(client))
            }
        }
    }

    fn departures(&self) -> Option<Receiver<ClientId>> {
        Some(self.departures.clone())
    }
}

/// Receiving side of a [`ChannelTransport`] client.
pub struct ClientHandle {
    pub id: ClientId,
    /// Channel to receive messages.
    pub receiver: Receiver<Message>,
}

impl ClientHandle {
    /// Receive the next message (blocking).
    pub fn recv(&self) -> Result<Message, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message (non-blocking).
    pub fn try_recv(&self) -> Result<Message, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> Result<Message, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything queued right now.
    pub fn drain(&self) -> Vec<Message> {
        self.receiver.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_send_receive() {
        let transport = ChannelTransport::new();
        let handle = transport.connect();

        transport.send(handle.id, &Message::closed("foo")).unwrap();
        let msg = handle.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(msg, Message::closed("foo"));
    }

    #[test]
    fn test_unique_ids() {
        let transport = ChannelTransport::new();
        let a = transport.connect();
        let b = transport.connect();
        assert_ne!(a.id, b.id);
        assert_eq!(transport.client_count(), 2);
    }

    #[test]
    fn test_full_buffer_reports_error() {
        let transport = ChannelTransport::with_buffer(1);
        let handle = transport.connect();

        transport.send(handle.id, &Message::closed("a")).unwrap();
        let result = transport.send(handle.id, &Message::closed("b"));
        assert_eq!(result, Err(TransportError::Full(handle.id)));
    }

    #[test]
    fn test_dropped_receiver_reports_disconnected() {
        let transport = ChannelTransport::new();
        let handle = transport.connect();
        let id = handle.id;
        drop(handle);

        let result = transport.send(id, &Message::closed("a"));
        assert_eq!(result, Err(TransportError::Disconnected(id)));
        assert!(result.unwrap_err().is_gone());

        // Forgotten and reported exactly once
        assert_eq!(transport.client_count(), 0);
        let departures = transport.departures().unwrap();
        assert_eq!(departures.try_iter().collect::<Vec<_>>(), vec![id]);
        let result = transport.send(id, &Message::closed("b"));
        assert_eq!(result, Err(TransportError::UnknownClient(id)));
        assert!(departures.try_recv().is_err());
    }

    #[test]
    fn test_send_after_disconnect() {
        let transport = ChannelTransport::new();
        let handle = transport.connect();
        assert!(transport.disconnect(handle.id));
        assert!(!transport.disconnect(handle.id));

        let result = transport.send(handle.id, &Message::closed("a"));
        assert_eq!(result, Err(TransportError::UnknownClient(handle.id)));

        let departures = transport.departures().unwrap();
        assert_eq!(departures.try_iter().collect::<Vec<_>>(), vec![handle.id]);
    }

    #[test]
    fn test_full_buffer_is_not_a_departure() {
        let transport = ChannelTransport::with_buffer(1);
        let handle = transport.connect();

        transport.send(handle.id, &Message::closed("a")).unwrap();
        let err = transport.send(handle.id, &Message::closed("b")).unwrap_err();
        assert!(!err.is_gone());
        assert_eq!(transport.client_count(), 1);
        assert!(transport.departures().unwrap().try_recv().is_err());
    }
}
