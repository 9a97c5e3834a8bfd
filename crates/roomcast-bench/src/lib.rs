//! Shared fixtures for the Roomcast benchmarks.

use roomcast_core::{
    Broadcast, ClientEndpoint, ClientHandle, ClientId, Hub, MemoryStore, NewMessage,
};
use std::sync::Arc;

/// Room every benchmark client is a member of.
pub const BENCH_ROOM: &str = "bench";

/// Build a hub with `subscribers` clients registered in [`BENCH_ROOM`].
///
/// Each outbound queue holds `capacity` frames; the endpoints are returned so
/// the caller can drain them.
pub async fn hub_with_subscribers(
    subscribers: usize,
    capacity: usize,
) -> (Hub, Vec<ClientEndpoint>) {
    let store = Arc::new(MemoryStore::new());
    let mut hub = Hub::new(store.clone(), store.clone());
    let mut endpoints = Vec::with_capacity(subscribers);

    for i in 0..subscribers {
        let user = format!("user-{}", i);
        store.add_member(user.clone(), BENCH_ROOM);
        let (handle, endpoint) =
            ClientHandle::with_id(ClientId::new(format!("conn-{}", i)), user, capacity);
        hub.register(handle).await;
        endpoints.push(endpoint);
    }

    (hub, endpoints)
}

/// A broadcast from the first client with `payload_len` bytes of content.
#[must_use]
pub fn sample_broadcast(payload_len: usize) -> Broadcast {
    Broadcast::new(
        ClientId::new("conn-0"),
        NewMessage::new(BENCH_ROOM, "user-0", "A".repeat(payload_len), "aXZ2YWx1ZQ=="),
    )
}

/// Empty every outbound queue, returning the number of frames removed.
pub fn drain(endpoints: &mut [ClientEndpoint]) -> usize {
    let mut drained = 0;
    for endpoint in endpoints {
        while endpoint.outbound.try_recv().is_ok() {
            drained += 1;
        }
    }
    drained
}
