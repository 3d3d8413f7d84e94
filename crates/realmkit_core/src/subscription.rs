//! Live queries.
//!
//! A subscription pins a class and an optional predicate to a channel. After
//! every commit that touches the class, the query is re-run against the new
//! committed state and, if the result set differs from the last one seen,
//! a [`ResultsChanged`] message carrying the full new result set is sent.
//!
//! ```rust,ignore
//! let rx = realm.subscribe("people", "Person", None)?;
//! realm.create_object("Person", Some("p-1".into()), Fields::new())?;
//! let change = rx.recv()?;
//! assert_eq!(change.results.len(), 1);
//! ```

use crate::error::{CoreError, CoreResult};
use crate::query::Query;
use crate::record::ResultSet;
use crate::store::{ChangedClasses, ObjectStore};
use crate::types::SequenceNumber;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Weak};

/// A fresh result set for a live query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsChanged {
    /// Instance the subscription belongs to.
    pub instance_id: String,
    /// Subscription that produced this message.
    pub subscription_id: String,
    /// Commit that caused the change.
    pub sequence: SequenceNumber,
    /// The complete new result set.
    pub results: ResultSet,
}

struct LiveQuery {
    class: String,
    query: Query,
    last: ResultSet,
    sender: Sender<ResultsChanged>,
}

/// Live queries of one realm instance.
pub(crate) struct SubscriptionManager {
    instance_id: String,
    live: Mutex<HashMap<String, LiveQuery>>,
}

impl SubscriptionManager {
    pub(crate) fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            live: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a live query. `store` provides the baseline result set,
    /// which is not delivered.
    pub(crate) fn subscribe(
        &self,
        subscription_id: &str,
        class: &str,
        query: Query,
        store: &ObjectStore,
        sender: Sender<ResultsChanged>,
    ) -> CoreResult<()> {
        let mut live = self.live.lock();
        if live.contains_key(subscription_id) {
            return Err(CoreError::already_subscribed(subscription_id));
        }
        let last = store.objects(class, &query);
        live.insert(
            subscription_id.to_string(),
            LiveQuery {
                class: class.to_string(),
                query,
                last,
                sender,
            },
        );
        tracing::debug!(
            instance = %self.instance_id,
            subscription = subscription_id,
            class,
            "subscribed"
        );
        Ok(())
    }

    pub(crate) fn unsubscribe(&self, subscription_id: &str) -> CoreResult<()> {
        match self.live.lock().remove(subscription_id) {
            Some(_) => {
                tracing::debug!(
                    instance = %self.instance_id,
                    subscription = subscription_id,
                    "unsubscribed"
                );
                Ok(())
            }
            None => Err(CoreError::not_subscribed(subscription_id)),
        }
    }

    pub(crate) fn contains(&self, subscription_id: &str) -> bool {
        self.live.lock().contains_key(subscription_id)
    }

    pub(crate) fn len(&self) -> usize {
        self.live.lock().len()
    }

    pub(crate) fn clear(&self) {
        self.live.lock().clear();
    }

    /// Re-evaluates affected live queries after a commit.
    fn on_commit(&self, store: &ObjectStore, changed: &ChangedClasses, sequence: SequenceNumber) {
        let mut live = self.live.lock();
        let mut dead = Vec::new();

        for (id, sub) in live.iter_mut() {
            if !changed.affects(&sub.class) {
                continue;
            }
            let results = store.objects(&sub.class, &sub.query);
            if results == sub.last {
                continue;
            }
            sub.last.clone_from(&results);
            let message = ResultsChanged {
                instance_id: self.instance_id.clone(),
                subscription_id: id.clone(),
                sequence,
                results,
            };
            if sub.sender.send(message).is_err() {
                dead.push(id.clone());
            }
        }

        for id in dead {
            live.remove(&id);
            tracing::debug!(
                instance = %self.instance_id,
                subscription = %id,
                "pruned subscription with dropped receiver"
            );
        }
    }
}

/// Subscription managers attached to one engine.
///
/// Holds weak references so a closed instance detaches by being dropped.
#[derive(Default)]
pub(crate) struct Observers {
    managers: RwLock<Vec<Weak<SubscriptionManager>>>,
}

impl Observers {
    pub(crate) fn attach(&self, manager: &Arc<SubscriptionManager>) {
        self.managers.write().push(Arc::downgrade(manager));
    }

    pub(crate) fn detach(&self, manager: &Arc<SubscriptionManager>) {
        self.managers
            .write()
            .retain(|weak| weak.upgrade().is_some_and(|m| !Arc::ptr_eq(&m, manager)));
    }

    /// Notifies every attached manager. Must run with the writer slot held
    /// so messages leave in commit order.
    pub(crate) fn notify(
        &self,
        store: &ObjectStore,
        changed: &ChangedClasses,
        sequence: SequenceNumber,
    ) {
        let managers: Vec<Arc<SubscriptionManager>> = {
            let mut list = self.managers.write();
            list.retain(|weak| weak.strong_count() > 0);
            list.iter().filter_map(Weak::upgrade).collect()
        };
        for manager in managers {
            manager.on_commit(store, changed, sequence);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.managers.read().len()
    }
}
