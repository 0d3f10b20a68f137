//! Common utilities and types shared across minifs

pub mod config;
pub mod error;
pub mod hash;
pub mod metrics;
pub mod utils;

pub use config::{Config, CoordinatorConfig, NodeConfig, DEFAULT_CHUNK_SIZE};
pub use error::{Error, Result};
pub use hash::{chunk_id, is_chunk_id, verify_chunk, CHUNK_ID_LEN};
pub use metrics::METRICS;
pub use utils::{
    decode_name, encode_name, format_bytes, node_address, normalize_node_address, timestamp_now,
    validate_name,
};
