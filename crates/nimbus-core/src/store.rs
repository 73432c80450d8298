//! In-memory state store.
//!
//! [`MemoryStateStore`] is the store an embedded emulator uses when no
//! external backend is configured, and the one tests build on.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use crate::traits::StateStore;
use crate::{Error, Result};

/// Thread-safe map-backed [`StateStore`].
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: RwLock<BTreeMap<String, serde_json::Value>>,
}

impl MemoryStateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StateStore for MemoryStateStore {
    fn set(&self, key: &str, value: serde_json::Value) -> Result<()> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<serde_json::Value> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    /// Deleting a missing key is a no-op.
    fn delete(&self, key: &str) -> Result<()> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    fn exists(&self, key: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

// ============================================================================
// Failure-injecting store for testing
// ============================================================================

/// A store wrapper that fails on demand.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Wraps a [`MemoryStateStore`] and fails `set`/`delete` when told to.
    #[derive(Debug, Default)]
    pub struct FailingStateStore {
        inner: MemoryStateStore,
        fail_set: AtomicBool,
        fail_delete: AtomicBool,
        set_calls: AtomicUsize,
        delete_calls: AtomicUsize,
    }

    impl FailingStateStore {
        /// Creates a store that does not fail yet.
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes subsequent `set` calls fail (or succeed again).
        pub fn fail_sets(&self, fail: bool) {
            self.fail_set.store(fail, Ordering::SeqCst);
        }

        /// Makes subsequent `delete` calls fail (or succeed again).
        pub fn fail_deletes(&self, fail: bool) {
            self.fail_delete.store(fail, Ordering::SeqCst);
        }

        /// Number of `set` calls seen, including failed ones.
        pub fn set_calls(&self) -> usize {
            self.set_calls.load(Ordering::SeqCst)
        }

        /// Number of `delete` calls seen, including failed ones.
        pub fn delete_calls(&self) -> usize {
            self.delete_calls.load(Ordering::SeqCst)
        }
    }

    impl StateStore for FailingStateStore {
        fn set(&self, key: &str, value: serde_json::Value) -> Result<()> {
            self.set_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_set.load(Ordering::SeqCst) {
                return Err(Error::state_store(key, "injected set failure"));
            }
            self.inner.set(key, value)
        }

        fn get(&self, key: &str) -> Result<serde_json::Value> {
            self.inner.get(key)
        }

        fn delete(&self, key: &str) -> Result<()> {
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(Error::state_store(key, "injected delete failure"));
            }
            self.inner.delete(key)
        }

        fn exists(&self, key: &str) -> bool {
            self.inner.exists(key)
        }

        fn list(&self, prefix: &str) -> Result<Vec<String>> {
            self.inner.list(prefix)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::StateStoreExt;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct VpcData {
        cidr: String,
        default: bool,
    }

    #[test]
    fn test_set_get_delete() {
        let store = MemoryStateStore::new();
        store.set("ec2:vpc:vpc-1", json!({"cidr": "10.0.0.0/16"})).unwrap();

        assert!(store.exists("ec2:vpc:vpc-1"));
        assert_eq!(
            store.get("ec2:vpc:vpc-1").unwrap(),
            json!({"cidr": "10.0.0.0/16"})
        );

        store.delete("ec2:vpc:vpc-1").unwrap();
        assert!(!store.exists("ec2:vpc:vpc-1"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_get_missing_key() {
        let store = MemoryStateStore::new();
        let err = store.get("ec2:vpc:nope").unwrap_err();
        assert!(matches!(err, Error::KeyNotFound(ref k) if k == "ec2:vpc:nope"));
    }

    #[test]
    fn test_delete_missing_key_is_noop() {
        let store = MemoryStateStore::new();
        assert!(store.delete("ec2:vpc:nope").is_ok());
    }

    #[test]
    fn test_list_by_prefix_is_sorted() {
        let store = MemoryStateStore::new();
        store.set("ec2:subnet:b", json!(1)).unwrap();
        store.set("ec2:subnet:a", json!(2)).unwrap();
        store.set("ec2:vpc:a", json!(3)).unwrap();

        assert_eq!(
            store.list("ec2:subnet:").unwrap(),
            vec!["ec2:subnet:a".to_string(), "ec2:subnet:b".to_string()]
        );
        assert_eq!(store.list("").unwrap().len(), 3);
        assert!(store.list("iam:").unwrap().is_empty());
    }

    #[test]
    fn test_typed_helpers() {
        let store = MemoryStateStore::new();
        let data = VpcData {
            cidr: "10.0.0.0/16".to_string(),
            default: false,
        };
        store.set_json("ec2:vpc:vpc-1", &data).unwrap();

        let loaded: VpcData = store.get_json("ec2:vpc:vpc-1").unwrap();
        assert_eq!(loaded, data);
        assert!(store.get_json::<u32>("ec2:vpc:vpc-1").is_err());
    }

    #[test]
    fn test_failing_store_injection() {
        let store = mock::FailingStateStore::new();
        store.set("k", json!(1)).unwrap();

        store.fail_deletes(true);
        let err = store.delete("k").unwrap_err();
        assert!(err.is_state_store());
        assert!(store.exists("k"));

        store.fail_deletes(false);
        store.delete("k").unwrap();
        assert!(!store.exists("k"));
        assert_eq!(store.delete_calls(), 2);

        store.fail_sets(true);
        assert!(store.set("k", json!(2)).is_err());
        assert_eq!(store.set_calls(), 2);
    }
}
