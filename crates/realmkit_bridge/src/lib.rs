//! # realmkit bridge
//!
//! Method-call front end for realmkit.
//!
//! Callers send named methods with JSON argument maps and get JSON results
//! back. Live query updates arrive as `onResultsChange` notifications on a
//! separate channel. The bridge has no transport of its own; embedders move
//! [`MethodCall`]s and [`Notification`]s over whatever channel they have.
//!
//! # Argument conventions
//!
//! - `realmId` selects the instance
//! - `$` holds the class name
//! - `createObject` takes its primary key from `uuid`, `localId` or `id`
//! - predicates are term lists, e.g. `[["greaterThan", "age", 20]]`
//!
//! ```rust
//! use realmkit_bridge::{Bridge, MethodCall};
//! use serde_json::json;
//!
//! let (bridge, _notifications) = Bridge::new();
//! bridge
//!     .handle(&MethodCall::new("initialize", json!({"realmId": "r", "inMemoryIdentifier": "doc"})))
//!     .unwrap();
//! let created = bridge
//!     .handle(&MethodCall::new(
//!         "createObject",
//!         json!({"realmId": "r", "$": "Person", "uuid": "p1", "age": 30}),
//!     ))
//!     .unwrap();
//! assert_eq!(created, json!({"uuid": "p1", "age": 30}));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod convert;
mod error;
mod handler;
mod message;

pub use error::{BridgeError, BridgeResult, ErrorPayload};
pub use handler::Bridge;
pub use message::{MethodCall, Notification, Notifications, RESULTS_CHANGED_METHOD};
