//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`StoragePort`] for the relay node.
//!
//! - Config validation: every field is range-checked before persistence.
//! - Namespace isolation: network credentials live in `wifi_config` as
//!   string entries, the system config blob in `relaynode`.
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`.
//!
//! The simulation backend is a mutex-guarded map so the adapter can be
//! shared between threads the same way the flash-backed one is.

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::SystemConfig;
use log::info;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;
#[cfg(not(target_os = "espidf"))]
use std::sync::{Mutex, PoisonError};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::warn;

const CONFIG_NAMESPACE: &str = "relaynode";
const CONFIG_KEY: &str = "syscfg";

/// Largest blob the adapter will read back.
const MAX_BLOB_SIZE: usize = 4000;

/// NVS keys and namespaces are limited to 15 bytes plus NUL.
#[cfg(target_os = "espidf")]
const NVS_NAME_LEN: usize = 16;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: Mutex<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the NVS partition is
    /// erased and re-initialised automatically.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any other NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: Mutex::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    #[cfg(not(target_os = "espidf"))]
    fn map(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// NUL-terminated copy of a namespace or key name.
    #[cfg(target_os = "espidf")]
    fn c_name(name: &str) -> [u8; NVS_NAME_LEN] {
        let mut buf = [0u8; NVS_NAME_LEN];
        let bytes = name.as_bytes();
        let len = bytes.len().min(NVS_NAME_LEN - 1);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns = Self::c_name(namespace);
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    /// Size query followed by a bounded read. Returns the full stored length.
    #[cfg(target_os = "espidf")]
    fn get_blob(namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, i32> {
        let key = Self::c_name(key);
        Self::with_nvs_handle(namespace, false, |handle| {
            let mut size: usize = 0;
            let ret = unsafe {
                nvs_get_blob(handle, key.as_ptr() as *const _, core::ptr::null_mut(), &mut size)
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            if size > buf.len() {
                return Ok(size);
            }
            let mut got = size;
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    key.as_ptr() as *const _,
                    buf.as_mut_ptr() as *mut _,
                    &mut got,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(size)
        })
    }

    #[cfg(target_os = "espidf")]
    fn set_blob(namespace: &str, key: &str, data: &[u8]) -> Result<(), i32> {
        let key = Self::c_name(key);
        Self::with_nvs_handle(namespace, true, |handle| {
            let ret = unsafe {
                nvs_set_blob(
                    handle,
                    key.as_ptr() as *const _,
                    data.as_ptr() as *const _,
                    data.len(),
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(())
        })
    }

    /// Same contract as [`Self::get_blob`] for a string-typed entry. The
    /// returned length excludes the NUL terminator.
    #[cfg(target_os = "espidf")]
    fn get_str(namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, i32> {
        let key = Self::c_name(key);
        Self::with_nvs_handle(namespace, false, |handle| {
            let mut size: usize = 0;
            let ret = unsafe {
                nvs_get_str(handle, key.as_ptr() as *const _, core::ptr::null_mut(), &mut size)
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            let len = size.saturating_sub(1);
            if len > buf.len() {
                return Ok(len);
            }
            let mut raw = vec![0u8; size];
            let mut got = size;
            let ret = unsafe {
                nvs_get_str(
                    handle,
                    key.as_ptr() as *const _,
                    raw.as_mut_ptr() as *mut _,
                    &mut got,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            buf[..len].copy_from_slice(&raw[..len]);
            Ok(len)
        })
    }

    #[cfg(target_os = "espidf")]
    fn set_str(namespace: &str, key: &str, value: &str) -> Result<(), i32> {
        if value.as_bytes().contains(&0) {
            return Err(ESP_ERR_INVALID_ARG);
        }
        let key = Self::c_name(key);
        let mut raw = Vec::with_capacity(value.len() + 1);
        raw.extend_from_slice(value.as_bytes());
        raw.push(0);
        Self::with_nvs_handle(namespace, true, |handle| {
            let ret = unsafe {
                nvs_set_str(handle, key.as_ptr() as *const _, raw.as_ptr() as *const _)
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(())
        })
    }

    #[cfg(target_os = "espidf")]
    fn storage_error(code: i32) -> StorageError {
        if code == ESP_ERR_NVS_NOT_FOUND {
            StorageError::NotFound
        } else if code == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
            StorageError::Full
        } else {
            StorageError::IoError
        }
    }
}

fn validate_config(cfg: &SystemConfig) -> Result<(), ConfigError> {
    if !(1_000..=120_000).contains(&cfg.network.connect_timeout_ms) {
        return Err(ConfigError::ValidationFailed(
            "network.connect_timeout_ms must be 1000-120000",
        ));
    }
    if cfg.network.max_retries > 100 {
        return Err(ConfigError::ValidationFailed(
            "network.max_retries must be 0-100",
        ));
    }
    if cfg.access_point.ssid.is_empty() {
        return Err(ConfigError::ValidationFailed("access_point.ssid must not be empty"));
    }
    let ap_pw = cfg.access_point.password.len();
    if ap_pw != 0 && ap_pw < 8 {
        return Err(ConfigError::ValidationFailed(
            "access_point.password must be empty or at least 8 characters",
        ));
    }
    if !(1..=13).contains(&cfg.access_point.channel) {
        return Err(ConfigError::ValidationFailed("access_point.channel must be 1-13"));
    }
    if !(1..=10).contains(&cfg.access_point.max_connections) {
        return Err(ConfigError::ValidationFailed(
            "access_point.max_connections must be 1-10",
        ));
    }
    if !(cfg.mqtt.broker_url.starts_with("mqtt://") || cfg.mqtt.broker_url.starts_with("mqtts://"))
    {
        return Err(ConfigError::ValidationFailed(
            "mqtt.broker_url must start with mqtt:// or mqtts://",
        ));
    }
    if cfg.mqtt.topic_root.is_empty() || cfg.mqtt.topic_root.ends_with('/') {
        return Err(ConfigError::ValidationFailed(
            "mqtt.topic_root must be non-empty without a trailing '/'",
        ));
    }
    if !(256..=8192).contains(&cfg.mqtt.buffer_size) {
        return Err(ConfigError::ValidationFailed("mqtt.buffer_size must be 256-8192"));
    }
    if !(64..=8192).contains(&cfg.http.max_body_bytes) {
        return Err(ConfigError::ValidationFailed("http.max_body_bytes must be 64-8192"));
    }
    if !(100..=5000).contains(&cfg.loop_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "loop_interval_ms must be 100-5000",
        ));
    }
    if !(5..=3600).contains(&cfg.status_interval_secs) {
        return Err(ConfigError::ValidationFailed(
            "status_interval_secs must be 5-3600",
        ));
    }
    Ok(())
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let mut buf = vec![0u8; MAX_BLOB_SIZE];
        let len = match self.read(CONFIG_NAMESPACE, CONFIG_KEY, &mut buf) {
            Ok(len) if len <= MAX_BLOB_SIZE => len,
            Ok(_) => return Err(ConfigError::Corrupted),
            Err(StorageError::NotFound) => {
                info!("NvsAdapter: no stored config, using defaults");
                return Ok(SystemConfig::default());
            }
            Err(_) => return Err(ConfigError::IoError),
        };
        let cfg: SystemConfig =
            postcard::from_bytes(&buf[..len]).map_err(|_| ConfigError::Corrupted)?;
        info!("NvsAdapter: loaded config ({} bytes)", len);
        Ok(cfg)
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        match self.write(CONFIG_NAMESPACE, CONFIG_KEY, &bytes) {
            Ok(()) => {
                info!("NvsAdapter: config saved ({} bytes)", bytes.len());
                Ok(())
            }
            Err(StorageError::Full) => Err(ConfigError::StorageFull),
            Err(_) => Err(ConfigError::IoError),
        }
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            match self.map().get(&Self::composite_key(namespace, key)) {
                Some(data) => {
                    let len = data.len().min(buf.len());
                    buf[..len].copy_from_slice(&data[..len]);
                    Ok(data.len())
                }
                None => Err(StorageError::NotFound),
            }
        }

        #[cfg(target_os = "espidf")]
        {
            Self::get_blob(namespace, key, buf).map_err(Self::storage_error)
        }
    }

    fn write(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.map()
                .insert(Self::composite_key(namespace, key), data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            Self::set_blob(namespace, key, data).map_err(|e| {
                warn!("NvsAdapter: write {}::{} failed ({})", namespace, key, e);
                Self::storage_error(e)
            })
        }
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.map().remove(&Self::composite_key(namespace, key));
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                let ret = unsafe { nvs_erase_key(handle, key.as_ptr() as *const _) };
                if ret != ESP_OK && ret != ESP_ERR_NVS_NOT_FOUND {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            match result {
                // A namespace that was never written cannot be opened; nothing to delete.
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Ok(()),
                other => other.map_err(Self::storage_error),
            }
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        #[cfg(not(target_os = "espidf"))]
        {
            self.map().contains_key(&Self::composite_key(namespace, key))
        }

        #[cfg(target_os = "espidf")]
        {
            let key = Self::c_name(key);
            Self::with_nvs_handle(namespace, false, |handle| {
                let ret = unsafe {
                    nvs_find_key(handle, key.as_ptr() as *const _, core::ptr::null_mut())
                };
                Ok(ret == ESP_OK)
            })
            .unwrap_or(false)
        }
    }

    #[cfg(target_os = "espidf")]
    fn read_str(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        Self::get_str(namespace, key, buf).map_err(Self::storage_error)
    }

    #[cfg(target_os = "espidf")]
    fn write_str(&self, namespace: &str, key: &str, value: &str) -> Result<(), StorageError> {
        Self::set_str(namespace, key, value).map_err(|e| {
            warn!("NvsAdapter: write {}::{} failed ({})", namespace, key, e);
            Self::storage_error(e)
        })
    }
}

impl Default for NvsAdapter {
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| Self {
            #[cfg(not(target_os = "espidf"))]
            store: Mutex::new(HashMap::new()),
        })
    }
}
