//! Instance registry.

use crate::config::{RealmConfig, StoreKey};
use crate::engine::Engine;
use crate::error::{CoreError, CoreResult};
use crate::realm::Realm;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Maps instance identifiers to open realms.
///
/// Engines are shared by store key: every instance opened on the same
/// in-memory identifier or file path uses the same store. The registry only
/// holds weak references to engines, so a store is closed once the last
/// instance using it is gone.
#[derive(Default)]
pub struct RealmRegistry {
    instances: RwLock<HashMap<String, Arc<Realm>>>,
    engines: Mutex<HashMap<StoreKey, Weak<Engine>>>,
}

impl RealmRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a realm under `instance_id`.
    ///
    /// An instance already registered under the id is closed and replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened or recovered, e.g.
    /// `StoreLocked` or `Corruption`.
    pub fn open(&self, instance_id: impl Into<String>, config: RealmConfig) -> CoreResult<Arc<Realm>> {
        let instance_id = instance_id.into();
        let engine = self.engine_for(&config)?;
        let realm = Arc::new(Realm::new(instance_id.clone(), engine));

        let previous = self
            .instances
            .write()
            .insert(instance_id.clone(), Arc::clone(&realm));
        if let Some(previous) = previous {
            previous.close();
            tracing::debug!(instance = %instance_id, "replaced open realm");
        }
        tracing::info!(instance = %instance_id, store = %realm.store_key(), "realm opened");
        Ok(realm)
    }

    /// Opens a realm under a fresh random identifier.
    ///
    /// # Errors
    ///
    /// See [`RealmRegistry::open`].
    pub fn open_anonymous(&self, config: RealmConfig) -> CoreResult<(String, Arc<Realm>)> {
        let instance_id = uuid::Uuid::new_v4().to_string();
        let realm = self.open(instance_id.clone(), config)?;
        Ok((instance_id, realm))
    }

    fn engine_for(&self, config: &RealmConfig) -> CoreResult<Arc<Engine>> {
        let key = config.store_key();
        let mut engines = self.engines.lock();
        engines.retain(|_, engine| engine.strong_count() > 0);

        if let Some(engine) = engines.get(&key).and_then(Weak::upgrade) {
            if engine.options() != &config.options {
                tracing::debug!(
                    store = %key,
                    "store already open; keeping its original options"
                );
            }
            return Ok(engine);
        }

        let engine = Arc::new(Engine::open(config)?);
        engines.insert(key, Arc::downgrade(&engine));
        Ok(engine)
    }

    /// Returns the realm registered under `instance_id`.
    ///
    /// # Errors
    ///
    /// Returns `InstanceNotFound` if no realm has the id.
    pub fn get(&self, instance_id: &str) -> CoreResult<Arc<Realm>> {
        self.instances
            .read()
            .get(instance_id)
            .cloned()
            .ok_or_else(|| CoreError::instance_not_found(instance_id))
    }

    /// Closes and unregisters a realm.
    ///
    /// # Errors
    ///
    /// Returns `InstanceNotFound` if no realm has the id.
    pub fn close(&self, instance_id: &str) -> CoreResult<()> {
        let realm = self
            .instances
            .write()
            .remove(instance_id)
            .ok_or_else(|| CoreError::instance_not_found(instance_id))?;
        realm.close();
        tracing::info!(instance = %instance_id, "realm closed");
        Ok(())
    }

    /// Closes every realm and empties the registry.
    ///
    /// Persisted data is kept.
    pub fn reset(&self) {
        let drained: Vec<Arc<Realm>> = self.instances.write().drain().map(|(_, r)| r).collect();
        for realm in &drained {
            realm.close();
        }
        tracing::info!(closed = drained.len(), "registry reset");
    }

    /// Returns true if a realm is registered under `instance_id`.
    #[must_use]
    pub fn contains(&self, instance_id: &str) -> bool {
        self.instances.read().contains_key(instance_id)
    }

    /// Returns the registered instance ids, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.instances.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Returns the number of registered realms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.read().len()
    }

    /// Returns true if no realm is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.read().is_empty()
    }
}

impl Drop for RealmRegistry {
    fn drop(&mut self) {
        for realm in self.instances.get_mut().values() {
            realm.close();
        }
    }
}
