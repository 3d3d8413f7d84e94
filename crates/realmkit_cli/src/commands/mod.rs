//! CLI command implementations.

pub mod compact;
pub mod dump;
pub mod dump_log;
pub mod inspect;
pub mod query;

use realmkit_core::{Realm, RealmConfig, RealmRegistry};
use std::path::Path;
use std::sync::Arc;

/// Opens an existing store file.
///
/// The registry is returned alongside the realm because dropping it closes
/// the realm. Opening runs recovery, so a torn final record is discarded.
pub fn open_store(path: &Path) -> Result<(RealmRegistry, Arc<Realm>), Box<dyn std::error::Error>> {
    let registry = RealmRegistry::new();
    let config = RealmConfig::persisted(path).create_if_missing(false);
    let realm = registry.open("cli", config)?;
    Ok((registry, realm))
}
