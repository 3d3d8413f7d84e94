//! Inbound method calls and outbound notifications.

use crate::convert::results_to_json;
use realmkit_core::ResultsChanged;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

/// Method name of result-change notifications.
pub const RESULTS_CHANGED_METHOD: &str = "onResultsChange";

/// A named call with its argument map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    /// Method name, e.g. `createObject`.
    pub method: String,
    /// Argument map. `null` is treated as an empty map.
    #[serde(default)]
    pub arguments: Json,
}

impl MethodCall {
    /// Creates a call.
    pub fn new(method: impl Into<String>, arguments: Json) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

/// A message pushed from the engine to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Always [`RESULTS_CHANGED_METHOD`].
    pub method: String,
    /// `{realmId, subscriptionId, results}`.
    pub arguments: Json,
}

impl From<ResultsChanged> for Notification {
    fn from(change: ResultsChanged) -> Self {
        Self {
            method: RESULTS_CHANGED_METHOD.to_string(),
            arguments: json!({
                "realmId": change.instance_id,
                "subscriptionId": change.subscription_id,
                "results": results_to_json(&change.results),
            }),
        }
    }
}

/// Receiving end of the bridge's notification channel.
///
/// Every live query opened through the bridge delivers here.
pub struct Notifications {
    rx: Receiver<ResultsChanged>,
}

impl Notifications {
    pub(crate) fn new(rx: Receiver<ResultsChanged>) -> Self {
        Self { rx }
    }

    /// Returns the next pending notification without blocking.
    #[must_use]
    pub fn try_next(&self) -> Option<Notification> {
        match self.rx.try_recv() {
            Ok(change) => Some(change.into()),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Waits up to `timeout` for the next notification.
    #[must_use]
    pub fn next_timeout(&self, timeout: Duration) -> Option<Notification> {
        match self.rx.recv_timeout(timeout) {
            Ok(change) => Some(change.into()),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Drains every pending notification.
    pub fn drain(&self) -> Vec<Notification> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}
