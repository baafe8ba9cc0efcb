//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`] for [`PowerConfig`]: one postcard blob under
//! namespace `powerwatch`, key `pwrcfg`.
//!
//! - Validation: every save goes through [`PowerConfig::validate`] first.
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`.
//! - Simulation: a `HashMap` keyed by `namespace::key`.

use crate::app::ports::{ConfigError, ConfigPort, CredentialStore};
use crate::config::PowerConfig;
use log::{info, warn};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "powerwatch";
#[cfg(not(target_os = "espidf"))]
const CONFIG_KEY: &str = "pwrcfg";

#[cfg(target_os = "espidf")]
const CONFIG_KEY_C: &[u8] = b"pwrcfg\0";

/// Written by the ESP-IDF Wi-Fi driver once credentials are provisioned.
const WIFI_NAMESPACE: &str = "nvs.net80211";
#[cfg(not(target_os = "espidf"))]
const WIFI_SSID_KEY: &str = "sta.ssid";
#[cfg(target_os = "espidf")]
const WIFI_SSID_KEY_C: &[u8] = b"sta.ssid\0";

#[cfg(target_os = "espidf")]
const MAX_BLOB_SIZE: usize = 512;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::sync::Mutex<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Create the adapter and initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the partition is erased and
    /// re-initialised. Returns `Err(ConfigError::IoError)` if that fails.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from main before any worker exists.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES as i32 || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as i32 {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK as i32 {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK as i32 {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK as i32 {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::sync::Mutex::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key() -> String {
        format!("{}::{}", CONFIG_NAMESPACE, CONFIG_KEY)
    }

    #[cfg(not(target_os = "espidf"))]
    fn sim_store(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        match self.store.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Overwrite the stored blob without validation (simulates a corrupted
    /// or foreign partition).
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_write_raw(&self, bytes: &[u8]) {
        self.sim_store().insert(Self::composite_key(), bytes.to_vec());
    }

    /// Whether Wi-Fi station credentials are stored, i.e. the node was
    /// provisioned on an earlier boot.
    #[cfg(target_os = "espidf")]
    fn has_station_credentials(&self) -> bool {
        // wifi_ssid_t: u32 length followed by 32 bytes of SSID.
        let mut ssid = [0u8; 36];
        let result = Self::with_nvs_handle(WIFI_NAMESPACE, false, |handle| {
            let mut size = ssid.len();
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    WIFI_SSID_KEY_C.as_ptr() as *const _,
                    ssid.as_mut_ptr() as *mut _,
                    &mut size,
                )
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            Ok(size)
        });
        match result {
            Ok(size) if size >= 4 => u32::from_le_bytes([ssid[0], ssid[1], ssid[2], ssid[3]]) > 0,
            _ => false,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn has_station_credentials(&self) -> bool {
        self.sim_store().contains_key(&format!("{}::{}", WIFI_NAMESPACE, WIFI_SSID_KEY))
    }

    /// Pretend station credentials were (or were not) stored.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_wifi_provisioned(&self, provisioned: bool) {
        let key = format!("{}::{}", WIFI_NAMESPACE, WIFI_SSID_KEY);
        if provisioned {
            self.sim_store().insert(key, b"sim-ssid".to_vec());
        } else {
            self.sim_store().remove(&key);
        }
    }

    /// Open a namespace, execute a closure with the handle, then
    /// close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut ns_buf = [0u8; 16];
        let ns_bytes = namespace.as_bytes();
        let len = ns_bytes.len().min(15);
        ns_buf[..len].copy_from_slice(&ns_bytes[..len]);

        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns_buf.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK as i32 {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    #[cfg(target_os = "espidf")]
    fn read_blob() -> Result<Option<Vec<u8>>, i32> {
        let result = Self::with_nvs_handle(CONFIG_NAMESPACE, false, |handle| {
            let mut size: usize = 0;
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    CONFIG_KEY_C.as_ptr() as *const _,
                    core::ptr::null_mut(),
                    &mut size,
                )
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH as i32);
            }
            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    CONFIG_KEY_C.as_ptr() as *const _,
                    buf.as_mut_ptr() as *mut _,
                    &mut size,
                )
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            Ok(buf)
        });
        match result {
            Ok(buf) => Ok(Some(buf)),
            // Namespace is only created by the first save.
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND as i32 => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_blob(&self) -> Option<Vec<u8>> {
        self.sim_store().get(&Self::composite_key()).cloned()
    }
}

fn decode(bytes: &[u8]) -> Result<PowerConfig, ConfigError> {
    let cfg: PowerConfig = postcard::from_bytes(bytes).map_err(|_| ConfigError::Corrupted)?;
    // A blob that decodes but holds nonsense is as bad as a broken one.
    cfg.validate().map_err(|e| {
        warn!("NvsAdapter: stored config rejected ({})", e);
        ConfigError::Corrupted
    })?;
    Ok(cfg)
}

impl CredentialStore for NvsAdapter {
    fn wifi_provisioned(&self) -> bool {
        self.has_station_credentials()
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<PowerConfig, ConfigError> {
        #[cfg(not(target_os = "espidf"))]
        let stored = self.read_blob();

        #[cfg(target_os = "espidf")]
        let stored = Self::read_blob().map_err(|e| {
            warn!("NvsAdapter: NVS read error {}", e);
            ConfigError::IoError
        })?;

        match stored {
            Some(bytes) => {
                let cfg = decode(&bytes)?;
                info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
                Ok(cfg)
            }
            None => {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(PowerConfig::default())
            }
        }
    }

    fn save(&self, config: &PowerConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;

        #[cfg(not(target_os = "espidf"))]
        {
            self.sim_store().insert(Self::composite_key(), bytes);
            info!("NvsAdapter: config saved (simulation)");
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(CONFIG_NAMESPACE, true, |handle| {
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        CONFIG_KEY_C.as_ptr() as *const _,
                        bytes.as_ptr() as *const _,
                        bytes.len(),
                    )
                };
                if ret != ESP_OK as i32 {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK as i32 {
                    return Err(ret);
                }
                Ok(())
            });
            match result {
                Ok(()) => {
                    info!("NvsAdapter: config saved to NVS ({} bytes)", bytes.len());
                    Ok(())
                }
                Err(e) => {
                    warn!("NvsAdapter: NVS write error {}", e);
                    Err(ConfigError::IoError)
                }
            }
        }
    }
}
