//! # roomcast-core
//!
//! Core types and the fan-out hub for the Roomcast chat relay.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **Hub** - Single event loop owning the client registry and room index
//! - **Room** - In-memory fan-out target for one chat
//! - **Client** - Hub-side handle and connection-side endpoint of a client
//! - **Store** - Membership and message store contracts
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐ register    ┌─────────────┐     ┌─────────────┐
//! │  Connection │────────────▶│     Hub     │────▶│    Room     │
//! │ (read task) │ broadcast   │ (one task)  │     └─────────────┘
//! └─────────────┘             └─────────────┘
//!        ▲                      │         │
//!        │ outbound queue       ▼         ▼
//! ┌─────────────┐       ┌────────────┐ ┌────────────┐
//! │ (write task)│◀──────│ Membership │ │  Message   │
//! └─────────────┘       │   Store    │ │   Store    │
//!                       └────────────┘ └────────────┘
//! ```

pub mod client;
pub mod hub;
pub mod message;
pub mod room;
pub mod store;

pub use client::{ClientEndpoint, ClientHandle, ClientId, OutboundFrame, RoomSet};
pub use hub::{BroadcastOutcome, Hub, HubConfig, HubError, HubHandle, HubInbox, HubStats};
pub use message::{Broadcast, NewMessage};
pub use room::{Room, RoomId};
pub use store::{MembershipStore, MemoryStore, MessageStore, StoreError, UserId};
