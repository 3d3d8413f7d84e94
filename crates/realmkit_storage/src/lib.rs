//! # realmkit storage
//!
//! Byte-store backends underneath the realmkit commit log.
//!
//! Backends are **opaque**: they append, read back and rewrite bytes, and
//! know nothing about commit records or objects. The core crate owns every
//! format decision.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - ephemeral stores and tests
//! - [`FileBackend`] - persisted stores, with an exclusive advisory lock
//!
//! ## Example
//!
//! ```rust
//! use realmkit_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"commit").unwrap();
//! assert_eq!(backend.read_at(offset, 6).unwrap(), b"commit");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
