//! Network credentials and their durable store.
//!
//! The last credentials a user submitted live in NVS under the
//! `wifi_config` namespace as two string entries, `ssid` and `password`. The record
//! exists iff the `ssid` key exists; "no record" is a valid state that the
//! bootstrap treats as "skip this tier", distinct from a stored record with
//! empty strings.
//!
//! Read failures never escape [`CredentialStore::load`]: they are logged
//! and reported as "no credentials".

use core::fmt;
use std::sync::Arc;

use log::{info, warn};

use crate::app::ports::{StorageError, StoragePort};

pub const SSID_MAX_LEN: usize = 32;
pub const PASSWORD_MAX_LEN: usize = 64;

pub const CREDENTIAL_NAMESPACE: &str = "wifi_config";
pub const SSID_KEY: &str = "ssid";
pub const PASSWORD_KEY: &str = "password";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkCredentials {
    pub ssid: heapless::String<SSID_MAX_LEN>,
    /// Empty for an open network.
    pub password: heapless::String<PASSWORD_MAX_LEN>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialError {
    /// SSID empty, longer than 32 bytes, or contains control characters.
    InvalidSsid,
    /// Password longer than 64 bytes.
    InvalidPassword,
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "SSID must be 1-32 printable characters"),
            Self::InvalidPassword => write!(f, "password must be at most 64 characters"),
        }
    }
}

impl NetworkCredentials {
    /// Validated constructor for user-supplied credentials.
    pub fn new(ssid: &str, password: &str) -> Result<Self, CredentialError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        Self::from_stored(ssid, password).ok_or(CredentialError::InvalidSsid)
    }

    /// Capacity-checked only. Stored records are attempted as-is.
    pub fn from_stored(ssid: &str, password: &str) -> Option<Self> {
        Some(Self {
            ssid: heapless::String::try_from(ssid).ok()?,
            password: heapless::String::try_from(password).ok()?,
        })
    }

    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }
}

/// SSID: 1–32 bytes of printable ASCII or UTF-8 without control characters.
pub fn validate_ssid(ssid: &str) -> Result<(), CredentialError> {
    if ssid.is_empty() || ssid.len() > SSID_MAX_LEN || ssid.chars().any(char::is_control) {
        return Err(CredentialError::InvalidSsid);
    }
    Ok(())
}

/// Password: at most 64 bytes. Empty means an open network; anything the
/// radio rejects surfaces as a failed connection attempt.
pub fn validate_password(password: &str) -> Result<(), CredentialError> {
    if password.len() > PASSWORD_MAX_LEN {
        return Err(CredentialError::InvalidPassword);
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
//  Durable store
// ═══════════════════════════════════════════════════════════════

pub struct CredentialStore {
    storage: Arc<dyn StoragePort>,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn StoragePort>) -> Self {
        Self { storage }
    }

    /// Persisted credentials, or `None` when absent or unreadable.
    pub fn load(&self) -> Option<NetworkCredentials> {
        match self.try_load() {
            Ok(creds) => creds,
            Err(e) => {
                warn!("Credentials: read failed ({}), treating as absent", e);
                None
            }
        }
    }

    pub fn try_load(&self) -> Result<Option<NetworkCredentials>, StorageError> {
        if !self.storage.exists(CREDENTIAL_NAMESPACE, SSID_KEY) {
            return Ok(None);
        }
        let ssid = self.read_str(SSID_KEY, SSID_MAX_LEN)?;
        let password = match self.read_str(PASSWORD_KEY, PASSWORD_MAX_LEN) {
            Err(StorageError::NotFound) => return Err(StorageError::Corrupted),
            other => other?,
        };
        let creds = NetworkCredentials::from_stored(&ssid, &password)
            .ok_or(StorageError::Corrupted)?;
        Ok(Some(creds))
    }

    /// Persist `creds`, replacing any previous record.
    pub fn save(&self, creds: &NetworkCredentials) -> Result<(), StorageError> {
        // Password first: the record only "exists" once the ssid key lands.
        self.storage
            .write_str(CREDENTIAL_NAMESPACE, PASSWORD_KEY, &creds.password)?;
        self.storage
            .write_str(CREDENTIAL_NAMESPACE, SSID_KEY, &creds.ssid)?;
        info!("Credentials: saved for '{}'", creds.ssid);
        Ok(())
    }

    /// Forget the stored record.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.storage.delete(CREDENTIAL_NAMESPACE, SSID_KEY)?;
        self.storage.delete(CREDENTIAL_NAMESPACE, PASSWORD_KEY)
    }

    fn read_str(&self, key: &str, max_len: usize) -> Result<String, StorageError> {
        let mut buf = [0u8; PASSWORD_MAX_LEN + 1];
        let len = self.storage.read_str(CREDENTIAL_NAMESPACE, key, &mut buf)?;
        if len > max_len {
            return Err(StorageError::Corrupted);
        }
        core::str::from_utf8(&buf[..len])
            .map(str::to_owned)
            .map_err(|_| StorageError::Corrupted)
    }
}
