//! Core traits for the Nimbus state boundary.
//!
//! Resource payloads live in an external key/value store that the
//! relationship graph never inspects. [`StateStore`] abstracts that store;
//! request handlers and the resource manager are written against it so the
//! concrete backend can be swapped without touching graph code.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::Result;

/// Key/value persistence for resource payloads.
///
/// Keys are opaque strings; by convention they are the canonical
/// `service:type:id` form of a [`ResourceId`](crate::ResourceId).
///
/// # Bounds
///
/// - `Send + Sync`: the store is shared across request-handling threads
///
/// Implementations are expected to be fast and synchronous: the resource
/// manager calls them while holding the graph's write lock.
///
/// # Example
///
/// ```
/// use nimbus_core::{MemoryStateStore, StateStore, StateStoreExt};
///
/// let store = MemoryStateStore::new();
/// store.set_json("ec2:vpc:vpc-1", &serde_json::json!({"cidr": "10.0.0.0/16"})).unwrap();
///
/// assert!(store.exists("ec2:vpc:vpc-1"));
/// assert_eq!(store.list("ec2:vpc:").unwrap(), vec!["ec2:vpc:vpc-1".to_string()]);
/// ```
pub trait StateStore: Send + Sync {
    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: serde_json::Value) -> Result<()>;

    /// Returns the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyNotFound`](crate::Error::KeyNotFound) if nothing
    /// is stored under the key.
    fn get(&self, key: &str) -> Result<serde_json::Value>;

    /// Removes `key`.
    fn delete(&self, key: &str) -> Result<()>;

    /// Whether a value is stored under `key`.
    fn exists(&self, key: &str) -> bool;

    /// All keys starting with `prefix`, sorted.
    fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Typed helpers over any [`StateStore`].
pub trait StateStoreExt: StateStore {
    /// Serializes `value` to JSON and stores it under `key`.
    fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_value(value)?;
        self.set(key, json)
    }

    /// Loads the value under `key` and deserializes it into `T`.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let json = self.get(key)?;
        Ok(serde_json::from_value(json)?)
    }
}

impl<S: StateStore + ?Sized> StateStoreExt for S {}
