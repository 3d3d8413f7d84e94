//! # realmkit core
//!
//! Embedded object store with live query subscriptions.
//!
//! This crate provides:
//! - Schema-less records grouped by class, keyed by optional primary keys
//! - Single-writer transactions with all-or-nothing commits
//! - A small predicate query engine
//! - Live queries that receive a fresh result set after relevant commits
//! - An append-only commit log for file-backed stores
//! - A registry that maps instance identifiers to open realms
//!
//! ## Example
//!
//! ```rust
//! use realmkit_core::{Fields, Query, RealmConfig, RealmRegistry, Value};
//!
//! let registry = RealmRegistry::new();
//! let realm = registry.open("main", RealmConfig::in_memory("docs")).unwrap();
//!
//! let mut fields = Fields::new();
//! fields.insert("name".into(), Value::from("Ada"));
//! fields.insert("age".into(), Value::from(36));
//! realm.create_object("Person", Some("p-1".into()), fields).unwrap();
//!
//! let adults = Query::builder().greater_than("age", 17).build().unwrap();
//! assert_eq!(realm.objects("Person", &adults).unwrap().len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
pub mod log;
pub mod query;
mod realm;
mod record;
mod registry;
mod store;
mod subscription;
pub mod transaction;
mod types;
mod value;

pub use config::{RealmConfig, StorageLocation, StoreKey, StoreOptions};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use query::{Operand, Operator, Query, QueryBuilder};
pub use realm::Realm;
pub use record::{Record, ResultSet};
pub use registry::RealmRegistry;
pub use store::{validate_class_name, Change, ObjectStore};
pub use subscription::ResultsChanged;
pub use transaction::WriteTransaction;
pub use types::{RowId, SequenceNumber, TransactionId};
pub use value::{Fields, PrimaryKey, Value};

/// Crate version, for tooling that reports it.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
