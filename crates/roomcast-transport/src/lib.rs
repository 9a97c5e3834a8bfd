//! # roomcast-transport
//!
//! The per-connection half of the Roomcast relay.
//!
//! Each WebSocket is served by two tasks:
//!
//! - **Read task** - decodes chat frames, authorizes them against the
//!   client's room set and hands them to the hub
//! - **Write task** - drains the outbound queue onto the socket and sends a
//!   ping on every heartbeat tick
//!
//! ```rust,ignore
//! use roomcast_transport::{run_client, ClientConfig};
//!
//! ws.on_upgrade(move |socket| async move {
//!     let _ = run_client(socket, user_id, hub, &ClientConfig::default()).await;
//! })
//! ```

pub mod client;
pub mod error;

pub use client::{run_client, ClientConfig};
pub use error::TransportError;
