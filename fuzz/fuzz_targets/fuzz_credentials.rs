//! Fuzz target: `POST /wifi` form → `CredentialStore` round trip
//!
//! Arbitrary bodies go through the submission parser. Whatever it accepts
//! must satisfy the credential bounds and survive a save/load cycle
//! through an in-memory store unchanged.
//!
//! cargo fuzz run fuzz_credentials

#![no_main]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use libfuzzer_sys::fuzz_target;
use relaynode::adapters::http::parse_wifi_form;
use relaynode::app::credentials::{CredentialStore, PASSWORD_MAX_LEN, SSID_MAX_LEN};
use relaynode::app::ports::{StorageError, StoragePort};

// ── In-memory StoragePort for fuzz testing ────────────────────

#[derive(Default)]
struct MemStore {
    data: Mutex<HashMap<String, Vec<u8>>>,
}

impl StoragePort for MemStore {
    fn read(&self, ns: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        match self.data.lock().unwrap().get(&format!("{ns}::{key}")) {
            Some(v) => {
                let n = v.len().min(buf.len());
                buf[..n].copy_from_slice(&v[..n]);
                Ok(v.len())
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&self, ns: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.data
            .lock()
            .unwrap()
            .insert(format!("{ns}::{key}"), data.to_vec());
        Ok(())
    }

    fn delete(&self, ns: &str, key: &str) -> Result<(), StorageError> {
        self.data.lock().unwrap().remove(&format!("{ns}::{key}"));
        Ok(())
    }

    fn exists(&self, ns: &str, key: &str) -> bool {
        self.data.lock().unwrap().contains_key(&format!("{ns}::{key}"))
    }
}

fuzz_target!(|data: &[u8]| {
    let Ok(creds) = parse_wifi_form(data) else {
        return;
    };

    assert!(!creds.ssid.is_empty() && creds.ssid.len() <= SSID_MAX_LEN);
    assert!(creds.password.len() <= PASSWORD_MAX_LEN);

    let store = CredentialStore::new(Arc::new(MemStore::default()));
    store.save(&creds).expect("in-memory save cannot fail");
    assert_eq!(store.load(), Some(creds));
});
