//! Blob storage for captured sessions.
//!
//! The recorder talks to durable storage only through [`BlobStore`]. This
//! module also owns the key layout and the gzip codec applied to payloads.

pub mod backend;
pub mod compression;
pub mod filesystem;
pub mod layout;
pub mod memory;

// Re-export commonly used types
pub use backend::BlobStore;
pub use filesystem::FsBlobStore;
pub use layout::DataFileKey;
pub use memory::InMemoryBlobStore;
