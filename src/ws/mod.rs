//! WebSocket layer: upgrade handling and per-connection tasks.
//!
//! The endpoint at `/ws/{instance}` registers each client with the hub on
//! the `instance` channel and streams hub broadcasts to it.

pub mod connection;
pub mod handler;
pub mod messages;
