//! The fan-out hub.
//!
//! The hub is a single task that owns the client registry and the room index.
//! Connections talk to it only through the bounded queues behind a
//! [`HubHandle`], so every membership change is totally ordered and nothing
//! in here needs a lock.
//!
//! Fan-out never waits on a subscriber. A subscriber whose outbound queue is
//! full when a message arrives is dropped from the hub on the spot, which
//! closes its queue and ends its connection.

use crate::client::{ClientHandle, ClientId, OutboundFrame};
use crate::message::Broadcast;
use crate::room::{Room, RoomId};
use crate::store::{MembershipStore, MessageStore};
use roomcast_protocol::{codec, ErrorFrame};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// Hub errors.
#[derive(Debug, Error)]
pub enum HubError {
    /// The hub task has stopped.
    #[error("Hub is not running")]
    Closed,
}

/// Hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Capacity of each request queue (register, unregister, broadcast).
    pub queue_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
        }
    }
}

/// Hub statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Number of registered clients.
    pub client_count: usize,
    /// Number of non-empty rooms.
    pub room_count: usize,
    /// Total number of room subscriptions.
    pub total_subscriptions: usize,
    /// Messages persisted and fanned out since start.
    pub messages_relayed: u64,
    /// Clients dropped because their outbound queue was full.
    pub slow_consumers_evicted: u64,
}

/// What happened to a broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastOutcome {
    /// The room had no subscribers; nothing was stored or sent.
    EmptyRoom,
    /// Persistence failed; the origin was told and nothing was sent.
    PersistFailed,
    /// The message was stored and offered to every subscriber.
    Delivered {
        /// Subscribers whose queue accepted the frame.
        recipients: usize,
        /// Subscribers dropped because their queue was full or closed.
        evicted: Vec<ClientId>,
    },
}

/// Cloneable sending side of the hub's request queues.
#[derive(Debug, Clone)]
pub struct HubHandle {
    register: mpsc::Sender<ClientHandle>,
    unregister: mpsc::Sender<ClientId>,
    broadcast: mpsc::Sender<Broadcast>,
    stats: mpsc::Sender<oneshot::Sender<HubStats>>,
}

impl HubHandle {
    /// Hand a new client to the hub.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub has stopped.
    pub async fn register(&self, client: ClientHandle) -> Result<(), HubError> {
        self.register.send(client).await.map_err(|_| HubError::Closed)
    }

    /// Remove a client. Safe to call any number of times.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub has stopped.
    pub async fn unregister(&self, id: ClientId) -> Result<(), HubError> {
        self.unregister.send(id).await.map_err(|_| HubError::Closed)
    }

    /// Queue a message for persistence and fan-out.
    ///
    /// Waits while the broadcast queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub has stopped.
    pub async fn broadcast(&self, request: Broadcast) -> Result<(), HubError> {
        self.broadcast.send(request).await.map_err(|_| HubError::Closed)
    }

    /// Fetch a statistics snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub has stopped.
    pub async fn stats(&self) -> Result<HubStats, HubError> {
        let (tx, rx) = oneshot::channel();
        self.stats.send(tx).await.map_err(|_| HubError::Closed)?;
        rx.await.map_err(|_| HubError::Closed)
    }
}

/// Receiving side of the hub's request queues.
#[derive(Debug)]
pub struct HubInbox {
    register: mpsc::Receiver<ClientHandle>,
    unregister: mpsc::Receiver<ClientId>,
    broadcast: mpsc::Receiver<Broadcast>,
    stats: mpsc::Receiver<oneshot::Sender<HubStats>>,
}

/// Create the hub's request queues.
#[must_use]
pub fn channel(config: &HubConfig) -> (HubHandle, HubInbox) {
    let capacity = config.queue_capacity.max(1);
    let (register_tx, register_rx) = mpsc::channel(capacity);
    let (unregister_tx, unregister_rx) = mpsc::channel(capacity);
    let (broadcast_tx, broadcast_rx) = mpsc::channel(capacity);
    let (stats_tx, stats_rx) = mpsc::channel(capacity);

    let handle = HubHandle {
        register: register_tx,
        unregister: unregister_tx,
        broadcast: broadcast_tx,
        stats: stats_tx,
    };
    let inbox = HubInbox {
        register: register_rx,
        unregister: unregister_rx,
        broadcast: broadcast_rx,
        stats: stats_rx,
    };
    (handle, inbox)
}

/// The hub state: client registry, room index and the stores.
pub struct Hub {
    /// Registered clients by id.
    clients: HashMap<ClientId, ClientHandle>,
    /// Non-empty rooms by id.
    rooms: HashMap<RoomId, Room>,
    memberships: Arc<dyn MembershipStore>,
    messages: Arc<dyn MessageStore>,
    messages_relayed: u64,
    slow_consumers_evicted: u64,
}

impl Hub {
    /// Create an empty hub.
    #[must_use]
    pub fn new(memberships: Arc<dyn MembershipStore>, messages: Arc<dyn MessageStore>) -> Self {
        Self {
            clients: HashMap::new(),
            rooms: HashMap::new(),
            memberships,
            messages,
            messages_relayed: 0,
            slow_consumers_evicted: 0,
        }
    }

    /// Create a hub, spawn its event loop and return a handle to it.
    #[must_use]
    pub fn start(
        config: &HubConfig,
        memberships: Arc<dyn MembershipStore>,
        messages: Arc<dyn MessageStore>,
    ) -> (HubHandle, JoinHandle<()>) {
        let (handle, inbox) = channel(config);
        let task = tokio::spawn(Self::new(memberships, messages).run(inbox));
        (handle, task)
    }

    /// Run the event loop until every [`HubHandle`] is dropped.
    ///
    /// Queues are polled in a fixed order (register, unregister, broadcast,
    /// stats) so a request never overtakes an earlier register from the same
    /// connection.
    pub async fn run(mut self, mut inbox: HubInbox) {
        info!("Hub started");
        loop {
            tokio::select! {
                biased;

                Some(client) = inbox.register.recv() => self.register(client).await,
                Some(id) = inbox.unregister.recv() => {
                    self.unregister(&id);
                }
                Some(request) = inbox.broadcast.recv() => {
                    self.broadcast(request).await;
                }
                Some(reply) = inbox.stats.recv() => {
                    let _ = reply.send(self.stats());
                }
                else => break,
            }
        }
        info!("Hub stopped");
    }

    /// Add a client and subscribe it to every room its user belongs to.
    ///
    /// If the memberships cannot be loaded the client gets a `User not found`
    /// error frame and is unregistered again.
    pub async fn register(&mut self, client: ClientHandle) {
        let id = client.id().clone();
        if self.clients.contains_key(&id) {
            warn!(client = %id, "Client already registered");
            return;
        }

        let user_id = client.user_id().to_string();
        self.clients.insert(id.clone(), client);

        match self.memberships.chats_for_user(&user_id).await {
            Ok(rooms) => {
                for room in rooms {
                    self.subscribe(&id, room);
                }
                debug!(
                    client = %id,
                    user = %user_id,
                    rooms = self.clients.get(&id).map_or(0, |c| c.rooms().len()),
                    "Client registered"
                );
            }
            Err(e) => {
                warn!(client = %id, user = %user_id, error = %e, "Could not load memberships");
                self.reply(&id, &ErrorFrame::user_not_found(e.to_string()));
                self.unregister(&id);
            }
        }
    }

    /// Remove a client from the registry and from every room.
    ///
    /// Dropping the registry entry closes the client's outbound queue, which
    /// ends its write task. Returns `false` if the client was not registered.
    pub fn unregister(&mut self, id: &ClientId) -> bool {
        let Some(client) = self.clients.remove(id) else {
            trace!(client = %id, "Unregister for unknown client");
            return false;
        };

        for room in client.rooms().snapshot() {
            client.rooms().remove(&room);
            detach(&mut self.rooms, id, &room);
        }

        debug!(client = %id, user = %client.user_id(), "Client unregistered");
        true
    }

    /// Subscribe a registered client to a room, creating the room if needed.
    ///
    /// Returns `false` if the client is unknown or already subscribed.
    pub fn subscribe(&mut self, id: &ClientId, room: impl Into<RoomId>) -> bool {
        let Some(client) = self.clients.get(id) else {
            return false;
        };

        let room = room.into();
        if !client.rooms().insert(room.clone()) {
            return false;
        }

        self.rooms
            .entry(room.clone())
            .or_insert_with(|| {
                debug!(room = %room, "Creating room");
                Room::new(room.clone())
            })
            .subscribe(id.clone());
        true
    }

    /// Unsubscribe a registered client from a room, deleting the room if it
    /// is left empty.
    ///
    /// Returns `false` if the client is unknown or was not subscribed.
    pub fn unsubscribe(&mut self, id: &ClientId, room: &str) -> bool {
        let Some(client) = self.clients.get(id) else {
            return false;
        };
        if !client.rooms().remove(room) {
            return false;
        }
        detach(&mut self.rooms, id, room);
        true
    }

    /// Persist a message and fan it out to its room.
    pub async fn broadcast(&mut self, request: Broadcast) -> BroadcastOutcome {
        let Broadcast { origin, message } = request;
        let room_id = message.room.clone();

        if self.rooms.get(&room_id).map_or(true, Room::is_empty) {
            trace!(room = %room_id, "Broadcast to empty room dropped");
            return BroadcastOutcome::EmptyRoom;
        }

        let stored = match self.messages.create(message).await {
            Ok(stored) => stored,
            Err(e) => {
                error!(room = %room_id, client = %origin, error = %e, "Could not persist message");
                self.reply(&origin, &ErrorFrame::internal(e.to_string()));
                return BroadcastOutcome::PersistFailed;
            }
        };

        let frame: OutboundFrame = match codec::encode(&stored) {
            Ok(text) => Arc::from(text),
            Err(e) => {
                error!(room = %room_id, error = %e, "Could not encode stored message");
                self.reply(&origin, &ErrorFrame::internal(e.to_string()));
                return BroadcastOutcome::PersistFailed;
            }
        };

        let mut recipients = 0;
        let mut evicted = Vec::new();
        if let Some(room) = self.rooms.get(&room_id) {
            for id in room.subscribers() {
                let delivered = self
                    .clients
                    .get(id)
                    .map_or(false, |client| client.try_send(Arc::clone(&frame)).is_ok());
                if delivered {
                    recipients += 1;
                } else {
                    evicted.push(id.clone());
                }
            }
        }

        for id in &evicted {
            warn!(client = %id, room = %room_id, "Outbound queue full, disconnecting slow consumer");
            self.unregister(id);
            self.slow_consumers_evicted += 1;
        }

        self.messages_relayed += 1;
        trace!(room = %room_id, message = %stored.id, recipients, "Message relayed");

        BroadcastOutcome::Delivered {
            recipients,
            evicted,
        }
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> HubStats {
        HubStats {
            client_count: self.clients.len(),
            room_count: self.rooms.len(),
            total_subscriptions: self.rooms.values().map(Room::subscriber_count).sum(),
            messages_relayed: self.messages_relayed,
            slow_consumers_evicted: self.slow_consumers_evicted,
        }
    }

    /// Check if a client is registered.
    #[must_use]
    pub fn is_registered(&self, id: &ClientId) -> bool {
        self.clients.contains_key(id)
    }

    /// Get a room from the index.
    #[must_use]
    pub fn room(&self, room: &str) -> Option<&Room> {
        self.rooms.get(room)
    }

    /// Send an error frame to one client without waiting.
    ///
    /// A client whose queue cannot take the frame is unregistered.
    fn reply(&mut self, id: &ClientId, frame: &ErrorFrame) {
        let Some(client) = self.clients.get(id) else {
            return;
        };

        let text = match codec::encode(frame) {
            Ok(text) => text,
            Err(e) => {
                error!(client = %id, error = %e, "Could not encode error frame");
                return;
            }
        };

        match client.try_send(Arc::from(text)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(client = %id, "Outbound queue full while reporting an error");
                self.unregister(id);
                self.slow_consumers_evicted += 1;
            }
            Err(TrySendError::Closed(_)) => {
                self.unregister(id);
            }
        }
    }
}

/// Remove `id` from `room` in the index, dropping the room once empty.
fn detach(rooms: &mut HashMap<RoomId, Room>, id: &ClientId, room: &str) {
    if let Some(entry) = rooms.get_mut(room) {
        entry.unsubscribe(id);
        if entry.is_empty() {
            rooms.remove(room);
            debug!(room = %room, "Deleted empty room");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientEndpoint;
    use crate::message::NewMessage;
    use crate::store::MemoryStore;
    use roomcast_protocol::{ErrorKind, ServerFrame, StoredMessage};

    fn hub_with(store: &Arc<MemoryStore>) -> Hub {
        Hub::new(store.clone(), store.clone())
    }

    async fn connect(hub: &mut Hub, user: &str, capacity: usize) -> ClientEndpoint {
        let (handle, endpoint) = ClientHandle::new(user, capacity);
        hub.register(handle).await;
        endpoint
    }

    /// Assert that the index and every client's room set agree.
    fn assert_symmetric(hub: &Hub) {
        for (room_id, room) in &hub.rooms {
            assert!(!room.is_empty(), "empty room {room_id} left in index");
            for id in room.subscribers() {
                let client = hub.clients.get(id).expect("subscriber not registered");
                assert!(client.rooms().contains(room_id));
            }
        }
        for (id, client) in &hub.clients {
            for room_id in client.rooms().snapshot() {
                let room = hub.rooms.get(&room_id).expect("room missing from index");
                assert!(room.is_subscribed(id));
            }
        }
    }

    fn drain(endpoint: &mut ClientEndpoint) -> Vec<ServerFrame> {
        let mut frames = Vec::new();
        while let Ok(text) = endpoint.outbound.try_recv() {
            frames.push(codec::decode_server(&text).unwrap());
        }
        frames
    }

    fn record(frame: &ServerFrame) -> &StoredMessage {
        match frame {
            ServerFrame::Message(message) => message,
            other => panic!("Expected stored message, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_register_subscribes_to_memberships() {
        let store = Arc::new(MemoryStore::new());
        store.add_member("alice", "c1");
        store.add_member("alice", "c2");
        let mut hub = hub_with(&store);

        let alice = connect(&mut hub, "alice", 8).await;

        assert!(hub.is_registered(&alice.id));
        assert!(alice.rooms.contains("c1"));
        assert!(alice.rooms.contains("c2"));
        assert_eq!(hub.room("c1").unwrap().subscriber_count(), 1);
        assert_eq!(hub.stats().room_count, 2);
        assert_symmetric(&hub);
    }

    #[tokio::test]
    async fn test_register_failure_reports_and_tears_down() {
        let store = Arc::new(MemoryStore::new());
        let mut hub = hub_with(&store);

        let mut ghost = connect(&mut hub, "ghost", 8).await;

        assert!(!hub.is_registered(&ghost.id));
        match codec::decode_server(&ghost.outbound.recv().await.unwrap()).unwrap() {
            ServerFrame::Error(frame) => assert_eq!(frame.error, ErrorKind::UserNotFound),
            other => panic!("Expected error frame, got {:?}", other),
        }
        assert!(ghost.outbound.recv().await.is_none());
        assert_eq!(hub.stats(), HubStats::default());
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        store.add_member("alice", "c1");
        store.add_member("bob", "c1");
        store.add_member("bob", "c2");
        let mut hub = hub_with(&store);

        let _alice = connect(&mut hub, "alice", 8).await;
        let mut bob = connect(&mut hub, "bob", 8).await;

        assert!(hub.unregister(&bob.id));
        let after_once = hub.stats();
        assert!(!hub.unregister(&bob.id));

        assert_eq!(hub.stats(), after_once);
        assert_eq!(after_once.client_count, 1);
        assert!(hub.room("c2").is_none());
        assert_eq!(hub.room("c1").unwrap().subscriber_count(), 1);
        assert!(bob.rooms.is_empty());
        assert!(bob.outbound.recv().await.is_none());
        assert_symmetric(&hub);
    }

    #[tokio::test]
    async fn test_subscription_symmetry_across_transitions() {
        let store = Arc::new(MemoryStore::new());
        store.add_member("alice", "c1");
        store.add_member("bob", "c1");
        store.add_member("bob", "c2");
        let mut hub = hub_with(&store);

        let alice = connect(&mut hub, "alice", 8).await;
        let bob = connect(&mut hub, "bob", 8).await;
        assert_symmetric(&hub);

        assert!(hub.subscribe(&alice.id, "c3"));
        assert!(!hub.subscribe(&alice.id, "c3"));
        assert_symmetric(&hub);

        assert!(hub.unsubscribe(&bob.id, "c1"));
        assert!(!hub.unsubscribe(&bob.id, "c1"));
        assert_symmetric(&hub);

        assert!(hub.unsubscribe(&alice.id, "c3"));
        assert!(hub.room("c3").is_none());
        assert_symmetric(&hub);

        hub.unregister(&alice.id);
        assert!(hub.room("c1").is_none());
        assert_symmetric(&hub);

        hub.unregister(&bob.id);
        assert_eq!(hub.stats().room_count, 0);
        assert!(!hub.subscribe(&bob.id, "c1"));
        assert_symmetric(&hub);
    }

    #[tokio::test]
    async fn test_fanout_delivers_identical_record_once() {
        let store = Arc::new(MemoryStore::new());
        for user in ["alice", "bob", "carol"] {
            store.add_member(user, "c1");
        }
        let mut hub = hub_with(&store);

        let mut alice = connect(&mut hub, "alice", 8).await;
        let mut bob = connect(&mut hub, "bob", 8).await;
        let mut carol = connect(&mut hub, "carol", 8).await;

        let outcome = hub
            .broadcast(Broadcast::new(
                alice.id.clone(),
                NewMessage::new("c1", "alice", "Y2lwaGVy", "aXZ2YWx1ZQ=="),
            ))
            .await;
        assert_eq!(
            outcome,
            BroadcastOutcome::Delivered {
                recipients: 3,
                evicted: vec![]
            }
        );

        let persisted = store.messages();
        assert_eq!(persisted.len(), 1);
        for endpoint in [&mut alice, &mut bob, &mut carol] {
            let frames = drain(endpoint);
            assert_eq!(frames.len(), 1);
            assert_eq!(record(&frames[0]), &persisted[0]);
        }
        assert_eq!(persisted[0].content, "Y2lwaGVy");
        assert_eq!(persisted[0].iv, "aXZ2YWx1ZQ==");
        assert_eq!(persisted[0].sender_id, "alice");
    }

    #[tokio::test]
    async fn test_empty_room_broadcast_is_noop() {
        let store = Arc::new(MemoryStore::new());
        store.add_user("alice");
        let mut hub = hub_with(&store);
        let mut alice = connect(&mut hub, "alice", 8).await;

        let outcome = hub
            .broadcast(Broadcast::new(
                alice.id.clone(),
                NewMessage::new("nobody-here", "alice", "x", "y"),
            ))
            .await;

        assert_eq!(outcome, BroadcastOutcome::EmptyRoom);
        assert_eq!(store.create_calls(), 0);
        assert!(drain(&mut alice).is_empty());
        assert!(hub.is_registered(&alice.id));
    }

    #[tokio::test]
    async fn test_persist_failure_reports_to_origin_only() {
        let store = Arc::new(MemoryStore::new());
        store.add_member("alice", "c1");
        store.add_member("bob", "c1");
        let mut hub = hub_with(&store);
        let mut alice = connect(&mut hub, "alice", 8).await;
        let mut bob = connect(&mut hub, "bob", 8).await;

        store.fail_writes(true);
        let outcome = hub
            .broadcast(Broadcast::new(
                alice.id.clone(),
                NewMessage::new("c1", "alice", "x", "y"),
            ))
            .await;

        assert_eq!(outcome, BroadcastOutcome::PersistFailed);
        match drain(&mut alice).as_slice() {
            [ServerFrame::Error(frame)] => assert_eq!(frame.error, ErrorKind::Internal),
            other => panic!("Expected one error frame, got {:?}", other),
        }
        assert!(drain(&mut bob).is_empty());
        assert_eq!(hub.stats().client_count, 2);

        store.fail_writes(false);
        let outcome = hub
            .broadcast(Broadcast::new(
                alice.id.clone(),
                NewMessage::new("c1", "alice", "x", "y"),
            ))
            .await;
        assert!(matches!(outcome, BroadcastOutcome::Delivered { recipients: 2, .. }));
    }

    #[tokio::test]
    async fn test_slow_consumer_is_isolated() {
        let store = Arc::new(MemoryStore::new());
        for user in ["alice", "bob", "slow"] {
            store.add_member(user, "c1");
        }
        store.add_member("slow", "c2");
        let mut hub = hub_with(&store);

        let mut alice = connect(&mut hub, "alice", 8).await;
        let mut bob = connect(&mut hub, "bob", 8).await;
        let mut slow = connect(&mut hub, "slow", 1).await;

        let first = hub
            .broadcast(Broadcast::new(
                alice.id.clone(),
                NewMessage::new("c1", "alice", "one", "iv"),
            ))
            .await;
        assert!(matches!(first, BroadcastOutcome::Delivered { recipients: 3, .. }));

        // `slow` never drains, so its single slot is still taken.
        let second = hub
            .broadcast(Broadcast::new(
                alice.id.clone(),
                NewMessage::new("c1", "alice", "two", "iv"),
            ))
            .await;
        assert_eq!(
            second,
            BroadcastOutcome::Delivered {
                recipients: 2,
                evicted: vec![slow.id.clone()]
            }
        );

        assert!(!hub.is_registered(&slow.id));
        assert!(!hub.room("c1").unwrap().is_subscribed(&slow.id));
        assert!(hub.room("c2").is_none());
        assert!(slow.rooms.is_empty());
        assert_eq!(hub.stats().slow_consumers_evicted, 1);
        assert_symmetric(&hub);

        assert_eq!(drain(&mut alice).len(), 2);
        assert_eq!(drain(&mut bob).len(), 2);
        assert_eq!(record(&drain(&mut slow)[0]).content, "one");
        assert!(slow.outbound.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_event_loop_serves_requests() {
        let store = Arc::new(MemoryStore::new());
        store.add_member("alice", "c1");
        store.add_member("bob", "c1");
        let (hub, task) = Hub::start(&HubConfig::default(), store.clone(), store.clone());

        let (alice, mut alice_end) = ClientHandle::new("alice", 8);
        let (bob, mut bob_end) = ClientHandle::new("bob", 8);
        hub.register(alice).await.unwrap();
        hub.register(bob).await.unwrap();

        let stats = hub.stats().await.unwrap();
        assert_eq!(stats.client_count, 2);
        assert_eq!(stats.total_subscriptions, 2);

        hub.broadcast(Broadcast::new(
            alice_end.id.clone(),
            NewMessage::new("c1", "alice", "hi", "iv"),
        ))
        .await
        .unwrap();

        let a = alice_end.outbound.recv().await.unwrap();
        let b = bob_end.outbound.recv().await.unwrap();
        assert_eq!(a, b);

        hub.unregister(bob_end.id.clone()).await.unwrap();
        hub.unregister(bob_end.id.clone()).await.unwrap();
        assert!(bob_end.outbound.recv().await.is_none());
        assert_eq!(hub.stats().await.unwrap().client_count, 1);

        drop(hub);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_unregister_never_overtakes_register() {
        let store = Arc::new(MemoryStore::new());
        store.add_member("alice", "c1");
        store.add_member("alice", "c2");
        let (hub, task) = Hub::start(&HubConfig::default(), store.clone(), store.clone());

        let mut endpoints = Vec::new();
        for _ in 0..200 {
            let (handle, endpoint) = ClientHandle::new("alice", 4);
            let id = handle.id().clone();
            hub.register(handle).await.unwrap();
            hub.unregister(id).await.unwrap();
            endpoints.push(endpoint);
        }

        let stats = hub.stats().await.unwrap();
        assert_eq!(stats.client_count, 0);
        assert_eq!(stats.room_count, 0);
        assert_eq!(stats.total_subscriptions, 0);
        for mut endpoint in endpoints {
            assert!(endpoint.outbound.recv().await.is_none());
            assert!(endpoint.rooms.is_empty());
        }

        drop(hub);
        task.await.unwrap();
    }
}
