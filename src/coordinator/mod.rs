//! Coordinator implementation
//!
//! The coordinator is responsible for:
//! - Node membership (heartbeat registration and eviction)
//! - Chunking uploads and placing chunks round-robin on live nodes
//! - File metadata (file name → ordered chunk records)
//! - Reassembling files on download

pub mod assembler;
pub mod chunker;
pub mod http;
pub mod metadata;
pub mod node_client;
pub mod placement;
pub mod registry;
pub mod server;
pub mod sweeper;

pub use assembler::FileAssembler;
pub use metadata::{ChunkRecord, FileMetadata, FileSummary, MetadataStore};
pub use node_client::{HttpNodeClient, MemoryNodeClient, StorageNodeClient};
pub use placement::{PlacementPlanner, UploadOutcome};
pub use registry::NodeRegistry;
pub use server::Coordinator;
pub use sweeper::{FailureSweeper, ReplicationNeeded};
