//! Realm configuration.

use std::fmt;
use std::path::{Path, PathBuf};

/// File extension used for persisted realms.
pub const REALM_EXTENSION: &str = "realm";

/// Name used by [`RealmConfig::in_directory`] when none is given.
pub const DEFAULT_REALM_NAME: &str = "default";

/// Field name that exposes a record's primary key unless configured otherwise.
pub const DEFAULT_PRIMARY_KEY_FIELD: &str = "uuid";

/// Where a realm keeps its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    /// Volatile store shared by every instance opened with the same identifier.
    InMemory {
        /// Identifier of the shared in-memory store.
        identifier: String,
    },
    /// File-backed store shared by every instance opened on the same path.
    Persisted {
        /// Path of the commit log file.
        path: PathBuf,
    },
}

/// Identity of an engine: instances with equal keys share one store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreKey {
    /// An in-memory identifier.
    Memory(String),
    /// A file path.
    File(PathBuf),
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory(id) => write!(f, "memory:{id}"),
            Self::File(path) => write!(f, "file:{}", path.display()),
        }
    }
}

/// Tunables of a store, fixed by whichever instance opens it first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Field under which a record's primary key is readable.
    pub primary_key_field: String,

    /// Whether to flush the commit log on every commit (safer but slower).
    pub sync_on_commit: bool,

    /// Whether to rewrite the commit log as a single snapshot when opening.
    pub compact_on_open: bool,

    /// Whether to create the store file if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            primary_key_field: DEFAULT_PRIMARY_KEY_FIELD.to_string(),
            sync_on_commit: true,
            compact_on_open: false,
            create_if_missing: true,
        }
    }
}

/// Configuration for opening a realm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealmConfig {
    /// Storage location.
    pub location: StorageLocation,

    /// Store options.
    pub options: StoreOptions,
}

impl Default for RealmConfig {
    fn default() -> Self {
        Self::in_memory(DEFAULT_REALM_NAME)
    }
}

impl RealmConfig {
    /// Configuration for an in-memory realm.
    #[must_use]
    pub fn in_memory(identifier: impl Into<String>) -> Self {
        Self {
            location: StorageLocation::InMemory {
                identifier: identifier.into(),
            },
            options: StoreOptions::default(),
        }
    }

    /// Configuration for a realm persisted at `path`.
    #[must_use]
    pub fn persisted(path: impl Into<PathBuf>) -> Self {
        Self {
            location: StorageLocation::Persisted { path: path.into() },
            options: StoreOptions::default(),
        }
    }

    /// Configuration for a realm persisted as `<dir>/<name>.realm`.
    ///
    /// `name` defaults to `default`.
    #[must_use]
    pub fn in_directory(dir: impl AsRef<Path>, name: Option<&str>) -> Self {
        let name = name.unwrap_or(DEFAULT_REALM_NAME);
        Self::persisted(
            dir.as_ref()
                .join(format!("{name}.{REALM_EXTENSION}")),
        )
    }

    /// Sets the field that exposes primary keys.
    #[must_use]
    pub fn primary_key_field(mut self, field: impl Into<String>) -> Self {
        self.options.primary_key_field = field.into();
        self
    }

    /// Sets whether to flush the commit log on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.options.sync_on_commit = value;
        self
    }

    /// Sets whether to compact the commit log when opening.
    #[must_use]
    pub const fn compact_on_open(mut self, value: bool) -> Self {
        self.options.compact_on_open = value;
        self
    }

    /// Sets whether to create the store file if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.options.create_if_missing = value;
        self
    }

    /// Returns the file path for persisted realms.
    #[must_use]
    pub fn file_path(&self) -> Option<&Path> {
        match &self.location {
            StorageLocation::InMemory { .. } => None,
            StorageLocation::Persisted { path } => Some(path),
        }
    }

    /// Returns the key under which the backing engine is shared.
    #[must_use]
    pub fn store_key(&self) -> StoreKey {
        match &self.location {
            StorageLocation::InMemory { identifier } => StoreKey::Memory(identifier.clone()),
            StorageLocation::Persisted { path } => StoreKey::File(normalize(path)),
        }
    }
}

/// Resolves a path for engine sharing without requiring it to exist.
fn normalize(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => parent
            .canonicalize()
            .map(|dir| dir.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}
