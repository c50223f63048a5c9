//! llmrelay Storage
//!
//! This crate provides the persistence collaborators:
//! - Usage store (JSON file, atomically replaced on every save)
//! - Credential stores (owner-only JSON file, in-memory)

pub mod atomic_writer;
pub mod credentials;
pub mod error;
pub mod usage;

pub use atomic_writer::AtomicWriter;
pub use credentials::{FileCredentialStore, MemoryCredentialStore};
pub use error::{StorageError, StorageResult};
pub use usage::FileUsageStore;
