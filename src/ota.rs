//! Firmware update session backed by the `esp-ota` crate.
//!
//! Flow: `begin` → N × `write` → `finish` → reboot.
//!
//! The HTTP `/ota` routes are placeholders today; this session is the
//! [`FirmwareUpdatePort`] a future upload handler streams into. On boot,
//! [`mark_running_valid`] cancels the bootloader rollback for the image
//! that just started.

use log::{info, warn};

use crate::app::ports::{FirmwareUpdatePort, UpdateError};

/// Largest image accepted (one OTA slot on the 16 MB layout).
pub const MAX_IMAGE_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaState {
    Idle,
    Receiving { bytes_written: usize },
    ReadyToReboot,
    Failed,
}

pub struct OtaSession {
    state: OtaState,
    #[cfg(target_os = "espidf")]
    update: Option<esp_ota::OtaUpdate>,
}

impl OtaSession {
    pub fn new() -> Self {
        Self {
            state: OtaState::Idle,
            #[cfg(target_os = "espidf")]
            update: None,
        }
    }

    pub fn state(&self) -> OtaState {
        self.state
    }

    /// Soft-reset into the newly flashed firmware.
    #[cfg(target_os = "espidf")]
    pub fn reboot(&self) -> ! {
        info!("OTA: rebooting into new firmware");
        esp_ota::restart();
    }

    fn fail(&mut self, err: UpdateError) -> UpdateError {
        #[cfg(target_os = "espidf")]
        {
            // Dropping the handle aborts the partition write.
            self.update.take();
        }
        self.state = OtaState::Failed;
        warn!("OTA: {}", err);
        err
    }
}

impl Default for OtaSession {
    fn default() -> Self {
        Self::new()
    }
}

impl FirmwareUpdatePort for OtaSession {
    fn begin(&mut self) -> Result<(), UpdateError> {
        if matches!(self.state, OtaState::Receiving { .. }) {
            return Err(UpdateError::AlreadyInProgress);
        }

        #[cfg(target_os = "espidf")]
        {
            let update = esp_ota::OtaUpdate::begin().map_err(|e| {
                warn!("esp-ota begin failed: {:?}", e);
                UpdateError::NoPartition
            })?;
            self.update = Some(update);
        }

        self.state = OtaState::Receiving { bytes_written: 0 };
        info!("OTA: begin");
        Ok(())
    }

    fn write(&mut self, chunk: &[u8]) -> Result<usize, UpdateError> {
        let OtaState::Receiving { bytes_written } = self.state else {
            return Err(UpdateError::NotStarted);
        };
        if bytes_written + chunk.len() > MAX_IMAGE_BYTES {
            return Err(self.fail(UpdateError::WriteFailed));
        }

        #[cfg(target_os = "espidf")]
        {
            let Some(update) = self.update.as_mut() else {
                return Err(self.fail(UpdateError::NotStarted));
            };
            if let Err(e) = update.write(chunk) {
                warn!("esp-ota write failed: {:?}", e);
                return Err(self.fail(UpdateError::WriteFailed));
            }
        }

        let total = bytes_written + chunk.len();
        self.state = OtaState::Receiving {
            bytes_written: total,
        };
        Ok(total)
    }

    fn finish(&mut self) -> Result<(), UpdateError> {
        let OtaState::Receiving { bytes_written } = self.state else {
            return Err(UpdateError::NotStarted);
        };
        if bytes_written == 0 {
            return Err(self.fail(UpdateError::VerifyFailed));
        }

        #[cfg(target_os = "espidf")]
        {
            let Some(update) = self.update.take() else {
                return Err(self.fail(UpdateError::NotStarted));
            };
            let mut completed = match update.finalize() {
                Ok(c) => c,
                Err(e) => {
                    warn!("esp-ota finalize failed: {:?}", e);
                    return Err(self.fail(UpdateError::VerifyFailed));
                }
            };
            if let Err(e) = completed.set_as_boot_partition() {
                warn!("esp-ota set_as_boot_partition failed: {:?}", e);
                return Err(self.fail(UpdateError::BootSetFailed));
            }
        }

        self.state = OtaState::ReadyToReboot;
        info!("OTA: {} bytes verified, ready to reboot", bytes_written);
        Ok(())
    }

    fn abort(&mut self) {
        #[cfg(target_os = "espidf")]
        {
            self.update.take();
        }
        if self.state != OtaState::Idle {
            warn!("OTA: aborted");
        }
        self.state = OtaState::Idle;
    }
}

// ── Boot validation ───────────────────────────────────────────

/// Mark the running image valid so the bootloader keeps it.
#[cfg(target_os = "espidf")]
pub fn mark_running_valid() {
    match esp_ota::mark_app_valid() {
        Ok(()) => info!("OTA: firmware marked valid (rollback cancelled)"),
        Err(e) => warn!("OTA: mark_app_valid failed: {:?}", e),
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn mark_running_valid() {
    info!("OTA: rollback check (simulation) skipped");
}
