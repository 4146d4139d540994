//! AVD (Android Virtual Device) provisioning
//!
//! Detects whether the AVD was already created on a previous run and, if
//! not, creates it with avdmanager and tunes its config.ini.

use std::path::{Path, PathBuf};
use avd_node_core::EnvironmentConfig;
use tracing::{info, warn};

use crate::config_file::{AvdConfigFile, HardwareTuning, DEFAULT_PATCH_RULES};
use crate::process::{CommandSpec, ProcessError, ProcessRunner};

/// Device names containing this (case-insensitive) ship a custom profile
pub const CUSTOM_PROFILE_VENDOR: &str = "samsung";

/// AVD Manager errors
#[derive(Debug, thiserror::Error)]
pub enum AvdError {
    #[error("Failed to create AVD: {0}")]
    CreateFailed(#[from] ProcessError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Line that marks an AVD as created for `device`
pub fn device_marker(device: &str) -> String {
    format!("hw.device.name={}", device)
}

/// Whether the AVD config at `config_path` was created for `device`.
///
/// A missing file means a new device. Otherwise any line containing
/// `hw.device.name=<device>` counts.
pub async fn is_initialized(config_path: &Path, device: &str) -> Result<bool, AvdError> {
    let config = AvdConfigFile::new(config_path);

    if !config.exists() {
        info!(
            "No config file was found at {}. Assuming new device.",
            config_path.display()
        );
        return Ok(false);
    }

    info!("Found existing config file at {}.", config_path.display());
    if config.contains_line(&device_marker(device)).await? {
        info!(
            "Existing config file references {}. Assuming device was previously initialized.",
            device
        );
        Ok(true)
    } else {
        info!(
            "Existing config file does not reference {}. Assuming new device.",
            device
        );
        Ok(false)
    }
}

/// Custom hardware profile linked into the emulator's device list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareProfile {
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl HardwareProfile {
    /// Profile for devices that need one, `None` otherwise
    pub fn for_device(config: &EnvironmentConfig) -> Option<Self> {
        let device = &config.device.device;
        if !device.to_lowercase().contains(CUSTOM_PROFILE_VENDOR) {
            return None;
        }

        Some(Self {
            source: config.paths.profile_source(&config.device.skin_name()),
            destination: config.paths.profile_destination(),
        })
    }

    /// Point `destination` at `source`, replacing any existing link.
    ///
    /// The new link is created under a temporary name and renamed over the
    /// destination, so the destination never goes missing.
    #[cfg(unix)]
    pub async fn link(&self) -> std::io::Result<()> {
        if let Some(parent) = self.destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let staging = self.destination.with_extension("xml.link");
        match tokio::fs::remove_file(&staging).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e),
            _ => {}
        }

        tokio::fs::symlink(&self.source, &staging).await?;
        if let Err(e) = tokio::fs::rename(&staging, &self.destination).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e);
        }
        Ok(())
    }

    #[cfg(not(unix))]
    pub async fn link(&self) -> std::io::Result<()> {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "hardware profile links require a unix host",
        ))
    }
}

/// Creates and tunes the AVD
pub struct AvdManager<'a, R: ProcessRunner> {
    config: &'a EnvironmentConfig,
    runner: &'a R,
}

impl<'a, R: ProcessRunner> AvdManager<'a, R> {
    pub fn new(config: &'a EnvironmentConfig, runner: &'a R) -> Self {
        Self { config, runner }
    }

    /// The AVD's persisted config file
    pub fn config_file(&self) -> AvdConfigFile {
        AvdConfigFile::new(self.config.paths.avd_config())
    }

    /// Whether the configured device was provisioned on an earlier run
    pub async fn is_initialized(&self) -> Result<bool, AvdError> {
        is_initialized(&self.config.paths.avd_config(), &self.config.device.device).await
    }

    /// `avdmanager create avd` invocation for the configured device
    pub fn create_command(&self) -> CommandSpec {
        let image = &self.config.image;
        let device = &self.config.device;

        CommandSpec::new("avdmanager")
            .args(["create", "avd", "-f"])
            .arg("-n")
            .arg(device.avd_name.as_str())
            .arg("-b")
            .arg(image.tag_abi())
            .arg("-k")
            .arg(image.package())
            .arg("-d")
            .arg(device.device.as_str())
            .arg("-p")
            .arg(self.config.paths.avd_dir().to_string_lossy())
    }

    /// Values appended to config.ini after creation
    pub fn tuning(&self) -> HardwareTuning {
        let device = &self.config.device;
        HardwareTuning {
            skin_path: self.config.paths.skin_dir(&device.skin_name()),
            data_partition_size: device.data_partition.clone(),
            ram_size: device.config_ram().to_string(),
        }
    }

    /// Create the AVD and tune its config.ini.
    ///
    /// A failing avdmanager aborts before the config is touched. A failure
    /// after that may leave the file partially patched.
    pub async fn prepare_avd(&self) -> Result<(), AvdError> {
        if let Some(profile) = HardwareProfile::for_device(self.config) {
            info!("Hardware profile resource path: {}", profile.source.display());
            info!("Hardware profile destination path: {}", profile.destination.display());
            if let Err(e) = profile.link().await {
                warn!(
                    "Could not link hardware profile {}: {}",
                    profile.source.display(),
                    e
                );
            }
        }

        let command = self.create_command();
        info!("Command to create avd: {}", command);
        self.runner.check_call(&command).await?;

        let config_file = self.config_file();
        config_file.append_tuning(&self.tuning()).await?;
        config_file.patch(DEFAULT_PATCH_RULES).await?;

        match config_file.summary().await {
            Ok(summary) => info!(
                "AVD {} ready: device={:?}, skin={:?}, ram={:?}, data partition={:?}, lcd density={:?}",
                self.config.device.avd_name,
                summary.device_name,
                summary.skin_path,
                summary.ram_size,
                summary.data_partition_size,
                summary.lcd_density,
            ),
            Err(e) => warn!(
                "AVD {} ready, but {} could not be read back: {}",
                self.config.device.avd_name,
                config_file.path().display(),
                e
            ),
        }

        Ok(())
    }
}
