//! Method dispatch.

use crate::convert::{
    fields_from_json, predicate_from_json, primary_key_from_aliases, primary_key_from_json,
    record_to_json, results_to_json, CLASS_KEY,
};
use crate::error::{BridgeError, BridgeResult};
use crate::message::{MethodCall, Notifications};
use realmkit_core::{Realm, RealmConfig, RealmRegistry, ResultsChanged};
use serde_json::{Map, Value as Json};
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;

/// Methods that belong to remote sync and user management. The bridge has
/// no sync service behind it and answers them with `NotImplemented`.
const REMOTE_METHODS: [&str; 5] = [
    "syncOpenWithConfiguration",
    "logInWithCredentials",
    "logOut",
    "currentUser",
    "allUsers",
];

/// Methods addressed to an open instance through `realmId`.
const INSTANCE_METHODS: [&str; 11] = [
    "createObject",
    "updateObject",
    "deleteObject",
    "allObjects",
    "objects",
    "subscribeAllObjects",
    "subscribeObjects",
    "unsubscribe",
    "deleteAllObjects",
    "filePath",
    "close",
];

/// Decodes method calls into engine operations.
///
/// All live queries opened through one bridge deliver into the
/// [`Notifications`] returned by [`Bridge::new`]. Cloning a bridge shares
/// its registry and notification channel.
#[derive(Clone)]
pub struct Bridge {
    registry: Arc<RealmRegistry>,
    outbound: Sender<ResultsChanged>,
    directory: Option<PathBuf>,
}

impl Bridge {
    /// Creates a bridge with its own registry.
    #[must_use]
    pub fn new() -> (Self, Notifications) {
        Self::with_registry(Arc::new(RealmRegistry::new()))
    }

    /// Creates a bridge over an existing registry.
    #[must_use]
    pub fn with_registry(registry: Arc<RealmRegistry>) -> (Self, Notifications) {
        let (outbound, rx) = mpsc::channel();
        let bridge = Self {
            registry,
            outbound,
            directory: None,
        };
        (bridge, Notifications::new(rx))
    }

    /// Sets the directory holding the default store file, used by
    /// `initialize` when neither `inMemoryIdentifier` nor `path` is given.
    #[must_use]
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Returns the registry behind this bridge.
    #[must_use]
    pub fn registry(&self) -> &Arc<RealmRegistry> {
        &self.registry
    }

    /// Handles one call on the current thread.
    ///
    /// # Errors
    ///
    /// Returns the engine's error, `InvalidArgument` for malformed
    /// arguments, or `NotImplemented` for unknown and remote-sync methods.
    pub fn handle(&self, call: &MethodCall) -> BridgeResult<Json> {
        let result = self.dispatch(call);
        if let Err(err) = &result {
            tracing::warn!(method = %call.method, code = err.code(), error = %err, "bridge call failed");
        }
        result
    }

    /// Handles one call on the blocking thread pool.
    ///
    /// Opening a persisted store replays its log, so every call is moved off
    /// the async executor.
    ///
    /// # Errors
    ///
    /// See [`Bridge::handle`]. Returns `Task` if the worker panicked.
    pub async fn handle_async(&self, call: MethodCall) -> BridgeResult<Json> {
        let bridge = self.clone();
        tokio::task::spawn_blocking(move || bridge.handle(&call))
            .await
            .map_err(|e| BridgeError::Task {
                message: e.to_string(),
            })?
    }

    fn dispatch(&self, call: &MethodCall) -> BridgeResult<Json> {
        let args = Args::new(&call.arguments)?;
        let method = call.method.as_str();
        match method {
            "initialize" | "asyncOpenWithConfiguration" => self.open(&args),
            "reset" => {
                self.registry.reset();
                Ok(Json::Null)
            }
            m if REMOTE_METHODS.contains(&m) => Err(BridgeError::not_implemented(m)),
            m if INSTANCE_METHODS.contains(&m) => {
                let realm = self.registry.get(args.required_str("realmId")?)?;
                self.dispatch_instance(&realm, m, &args)
            }
            m => Err(BridgeError::not_implemented(m)),
        }
    }

    fn open(&self, args: &Args<'_>) -> BridgeResult<Json> {
        let realm_id = args.required_str("realmId")?;
        let mut config = if let Some(identifier) = args.optional_str("inMemoryIdentifier")? {
            RealmConfig::in_memory(identifier)
        } else if let Some(path) = args.optional_str("path")? {
            RealmConfig::persisted(path)
        } else if let Some(directory) = &self.directory {
            RealmConfig::in_directory(directory, None)
        } else {
            return Err(BridgeError::invalid_argument(
                "no storage location: pass inMemoryIdentifier or path",
            ));
        };
        if let Some(field) = args.optional_str("primaryKeyField")? {
            config = config.primary_key_field(field);
        }
        self.registry.open(realm_id, config)?;
        Ok(Json::Null)
    }

    fn dispatch_instance(&self, realm: &Realm, method: &str, args: &Args<'_>) -> BridgeResult<Json> {
        match method {
            "createObject" => {
                let class = args.required_str(CLASS_KEY)?;
                let key_field = realm.options().primary_key_field.as_str();
                let key = match args.get(key_field) {
                    Some(json) => Some(primary_key_from_json(json)?),
                    None => primary_key_from_aliases(args.map())?,
                };
                let fields = fields_from_json(args.map())?;
                let record = realm.create_object(class, key, fields)?;
                Ok(record_to_json(&record))
            }
            "updateObject" => {
                let class = args.required_str(CLASS_KEY)?;
                let key = primary_key_from_json(args.required("primaryKey")?)?;
                let fields = fields_from_json(args.required_object("value")?)?;
                let record = realm.update_object(class, &key, fields)?;
                Ok(record_to_json(&record))
            }
            "deleteObject" => {
                let class = args.required_str(CLASS_KEY)?;
                let key = primary_key_from_json(args.required("primaryKey")?)?;
                realm.delete_object(class, &key)?;
                Ok(Json::Null)
            }
            "allObjects" => {
                let results = realm.all_objects(args.required_str(CLASS_KEY)?)?;
                Ok(results_to_json(&results))
            }
            "objects" => {
                let class = args.required_str(CLASS_KEY)?;
                let query = predicate_from_json(args.get("predicate"))?;
                Ok(results_to_json(&realm.objects(class, &query)?))
            }
            "subscribeAllObjects" | "subscribeObjects" => {
                let class = args.required_str(CLASS_KEY)?;
                let subscription_id = args.required_str("subscriptionId")?;
                let query = if method == "subscribeObjects" {
                    Some(predicate_from_json(args.get("predicate"))?)
                } else {
                    None
                };
                realm.subscribe_with_sender(subscription_id, class, query, self.outbound.clone())?;
                Ok(Json::Null)
            }
            "unsubscribe" => {
                realm.unsubscribe(args.required_str("subscriptionId")?)?;
                Ok(Json::Null)
            }
            "deleteAllObjects" => {
                realm.delete_all()?;
                Ok(Json::Null)
            }
            "filePath" => Ok(realm
                .file_path()
                .map_or(Json::Null, |path| Json::String(path.display().to_string()))),
            "close" => {
                self.registry.close(realm.instance_id())?;
                Ok(Json::Null)
            }
            other => Err(BridgeError::not_implemented(other)),
        }
    }
}

/// Read access to a call's argument map. Null members count as absent.
struct Args<'a> {
    map: Option<&'a Map<String, Json>>,
}

impl<'a> Args<'a> {
    fn new(arguments: &'a Json) -> BridgeResult<Self> {
        match arguments {
            Json::Null => Ok(Self { map: None }),
            Json::Object(map) => Ok(Self { map: Some(map) }),
            other => Err(BridgeError::invalid_argument(format!(
                "arguments must be a map, got {other}"
            ))),
        }
    }

    fn map(&self) -> &'a Map<String, Json> {
        static EMPTY: std::sync::OnceLock<Map<String, Json>> = std::sync::OnceLock::new();
        self.map.unwrap_or_else(|| EMPTY.get_or_init(Map::new))
    }

    fn get(&self, key: &str) -> Option<&'a Json> {
        self.map?.get(key).filter(|json| !json.is_null())
    }

    fn required(&self, key: &str) -> BridgeResult<&'a Json> {
        self.get(key)
            .ok_or_else(|| BridgeError::invalid_argument(format!("no argument: {key}")))
    }

    fn required_str(&self, key: &str) -> BridgeResult<&'a str> {
        self.optional_str(key)?
            .ok_or_else(|| BridgeError::invalid_argument(format!("no argument: {key}")))
    }

    fn optional_str(&self, key: &str) -> BridgeResult<Option<&'a str>> {
        match self.get(key) {
            None => Ok(None),
            Some(Json::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(BridgeError::invalid_argument(format!(
                "argument {key} must be a string, got {other}"
            ))),
        }
    }

    fn required_object(&self, key: &str) -> BridgeResult<&'a Map<String, Json>> {
        match self.required(key)? {
            Json::Object(map) => Ok(map),
            other => Err(BridgeError::invalid_argument(format!(
                "argument {key} must be a map, got {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(method: &str, arguments: Json) -> MethodCall {
        MethodCall::new(method, arguments)
    }

    #[test]
    fn non_map_arguments_are_rejected() {
        let (bridge, _rx) = Bridge::new();
        let err = bridge.handle(&call("initialize", json!([1, 2]))).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgument { .. }));
    }

    #[test]
    fn initialize_without_location_needs_directory() {
        let (bridge, _rx) = Bridge::new();
        let err = bridge.handle(&call("initialize", json!({"realmId": "r"}))).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgument { .. }));
    }

    #[test]
    fn unknown_instance() {
        let (bridge, _rx) = Bridge::new();
        let err = bridge
            .handle(&call("allObjects", json!({"realmId": "nope", "$": "Person"})))
            .unwrap_err();
        assert_eq!(err.code(), "InstanceNotFound");
    }

    #[test]
    fn unknown_method_is_not_implemented() {
        let (bridge, _rx) = Bridge::new();
        let err = bridge.handle(&call("frobnicate", Json::Null)).unwrap_err();
        assert!(matches!(err, BridgeError::NotImplemented { .. }));
    }

    #[test]
    fn remote_methods_are_not_implemented() {
        let (bridge, _rx) = Bridge::new();
        for method in REMOTE_METHODS {
            let err = bridge.handle(&call(method, json!({}))).unwrap_err();
            assert_eq!(err.code(), "NotImplemented");
        }
    }

    #[test]
    fn string_argument_type_is_checked() {
        let (bridge, _rx) = Bridge::new();
        let err = bridge
            .handle(&call("initialize", json!({"realmId": 5, "inMemoryIdentifier": "m"})))
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgument { .. }));
    }
}
