use std::collections::HashMap;
use std::sync::Mutex;

use keyring::Entry;
use tracing::debug;

use super::storage::{CredentialStorage, StorageError};

/// Keychain service name all entries are filed under.
pub const SERVICE_NAME: &str = "agromyth";

/// Session credentials kept in the OS keychain, one entry per key.
pub struct KeyringStorage {
    service: String,
    entries: Mutex<HashMap<String, Entry>>,
}

impl KeyringStorage {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    /// Use a different service name, e.g. one per API host.
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn with_entry<T>(
        &self,
        key: &str,
        f: impl FnOnce(&Entry) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        if !entries.contains_key(key) {
            let entry = Entry::new(&self.service, key)?;
            entries.insert(key.to_string(), entry);
        }
        match entries.get(key) {
            Some(entry) => f(entry),
            None => Err(StorageError::Poisoned),
        }
    }
}

impl Default for KeyringStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStorage for KeyringStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.with_entry(key, |entry| match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.with_entry(key, |entry| {
            entry.set_password(value)?;
            debug!(service = %self.service, key, "Stored credential in keychain");
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.with_entry(key, |entry| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_storage() -> KeyringStorage {
        keyring::set_default_credential_builder(keyring::mock::default_credential_builder());
        KeyringStorage::with_service("agromyth-test")
    }

    #[test]
    fn test_missing_entry_is_none() {
        let storage = mock_storage();
        assert_eq!(storage.get("access_token").unwrap(), None);
    }

    #[test]
    fn test_set_get_remove() {
        let storage = mock_storage();
        storage.set("access_token", "T1").unwrap();
        assert_eq!(storage.get("access_token").unwrap().as_deref(), Some("T1"));

        storage.remove("access_token").unwrap();
        assert_eq!(storage.get("access_token").unwrap(), None);

        // Second delete hits NoEntry and is still fine
        storage.remove("access_token").unwrap();
    }

    // Talks to the real OS keychain: run with `cargo test -- --ignored` on a
    // desktop session. The other tests here swap in the process-wide mock.
    #[test]
    #[ignore = "needs an OS keychain"]
    fn test_native_store_survives_new_instance() {
        let writer = KeyringStorage::with_service("agromyth-native-test");
        writer.set("access_token", "T1").unwrap();

        let reader = KeyringStorage::with_service("agromyth-native-test");
        assert_eq!(reader.get("access_token").unwrap().as_deref(), Some("T1"));

        reader.remove("access_token").unwrap();
        assert_eq!(writer.get("access_token").unwrap(), None);
    }

    #[test]
    fn test_default_service_name() {
        assert_eq!(KeyringStorage::new().service(), SERVICE_NAME);
    }
}
