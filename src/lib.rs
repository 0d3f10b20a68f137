//! # minifs
//!
//! A small distributed file store:
//! - A coordinator splits uploads into fixed-size chunks named by their SHA-256
//! - Chunks are placed round-robin, one copy each, on live storage nodes
//! - Nodes heartbeat to the coordinator; silent nodes are evicted and their
//!   chunk records dropped
//! - Downloads pull chunks back in order and verify every digest
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              Coordinator                │
//! │  registry · metadata · placement        │
//! │  failure sweeper · assembler            │
//! └───────────┬─────────────────────────────┘
//!             │ HTTP (chunks)   ▲ /register heartbeats
//!   ┌─────────┴──────────┬──────┴───────┐
//!   │                    │              │
//! ┌─▼──────────┐   ┌─────▼──────┐   ┌──▼───────────┐
//! │ Node 1     │   │ Node 2     │   │ Node 3       │
//! │ chunks/    │   │ chunks/    │   │ chunks/      │
//! └────────────┘   └────────────┘   └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ### Start a coordinator
//! ```bash
//! minifs-coord --bind 0.0.0.0:5000 --chunk-size 65536
//! ```
//!
//! ### Start a storage node
//! ```bash
//! minifs-node --bind 0.0.0.0:6000 \
//!   --storage ./node-data \
//!   --coordinator http://localhost:5000
//! ```
//!
//! ### Use the CLI
//! ```bash
//! minifs upload ./data.bin --coordinator http://localhost:5000
//! minifs download data.bin --output ./out.bin
//! minifs nodes
//! minifs files
//! ```

#![allow(clippy::result_large_err)]

pub mod common;
pub mod coordinator;
pub mod node;

// Re-export commonly used types
pub use common::{Config, Error, Result};
pub use coordinator::Coordinator;
pub use node::NodeServer;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
