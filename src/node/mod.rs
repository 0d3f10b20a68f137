//! Storage node implementation
//!
//! A node keeps chunks on local disk, serves them over HTTP and heartbeats
//! to the coordinator so it stays eligible for placement.

pub mod heartbeat;
pub mod http;
pub mod server;
pub mod store;

pub use server::NodeServer;
pub use store::ChunkStore;
