//! Launcher Configuration
//!
//! Immutable snapshot of every setting the launcher reads from the
//! environment, grouped by concern:
//! - system image (required)
//! - device and emulator settings
//! - Appium server settings
//! - Selenium Grid registration settings
//! - filesystem layout

use std::path::{Path, PathBuf};
use tracing::info;

use crate::env::EnvSource;
use crate::error::Result;

/// Root of the SDK and emulator files inside the image
pub const DEFAULT_ANDROID_HOME: &str = "/root";

/// Device profile used when `DEVICE` is unset
pub const DEFAULT_DEVICE: &str = "Nexus 5";

/// Data partition size (MB) when `DATAPARTITION` is unset
pub const DEFAULT_DATA_PARTITION: &str = "16384";

/// `hw.ramSize` written to config.ini when `RAM` is unset
pub const DEFAULT_CONFIG_RAM: &str = "8192m";

/// Emulator `-memory` value when `RAM` is unset
pub const DEFAULT_EMULATOR_MEMORY: &str = "8192";

/// Emulator console port when `UDID` is unset
pub const DEFAULT_EMULATOR_PORT: &str = "5554";

/// Default Appium server port
pub const DEFAULT_APPIUM_PORT: u16 = 4723;

/// Default Selenium hub host (docker bridge gateway)
pub const DEFAULT_SELENIUM_HOST: &str = "172.17.0.1";

/// Default Selenium hub port
pub const DEFAULT_SELENIUM_PORT: u16 = 4444;

/// Default Selenium session timeout in seconds
pub const DEFAULT_SELENIUM_TIMEOUT: u32 = 30;

/// Browser advertised to the grid for native app sessions
pub const NATIVE_BROWSER_NAME: &str = "android";

/// Android system image selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemImage {
    pub android_version: String,
    pub api_level: String,
    pub processor: String,
    pub sys_img: String,
    pub img_type: String,
}

impl SystemImage {
    /// Resolve from the required image variables
    pub fn resolve(env: &EnvSource) -> Result<Self> {
        Ok(Self {
            android_version: env.resolve_required("ANDROID_VERSION")?,
            api_level: env.resolve_required("API_LEVEL")?,
            processor: env.resolve_required("PROCESSOR")?,
            sys_img: env.resolve_required("SYS_IMG")?,
            img_type: env.resolve_required("IMG_TYPE")?,
        })
    }

    /// Package id understood by avdmanager / sdkmanager
    pub fn package(&self) -> String {
        format!(
            "system-images;android-{};{};{}",
            self.api_level, self.img_type, self.sys_img
        )
    }

    /// `<tag>/<abi>` pair passed to `avdmanager -b`
    pub fn tag_abi(&self) -> String {
        format!("{}/{}", self.img_type, self.sys_img)
    }
}

/// Device and emulator settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSettings {
    /// Device profile name, e.g. `Nexus 5` or `Samsung Galaxy S10`
    pub device: String,
    pub avd_name: String,
    /// Extra emulator arguments, whitespace separated
    pub emulator_args: String,
    pub data_partition: String,
    /// Raw `RAM` value; the two consumers apply different defaults
    pub ram: Option<String>,
    pub emulator_port: String,
}

impl DeviceSettings {
    fn resolve(env: &EnvSource, android_version: &str) -> Self {
        let device = env.get_or("DEVICE", DEFAULT_DEVICE);
        let avd_name = env
            .get("AVD_NAME")
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}_{}", skin_name(&device), android_version));

        Self {
            avd_name,
            emulator_args: env.get_or("EMULATOR_ARGS", ""),
            data_partition: env.get_or("DATAPARTITION", DEFAULT_DATA_PARTITION),
            ram: env.get("RAM").map(str::to_string),
            emulator_port: env.resolve_port_from_device_id(DEFAULT_EMULATOR_PORT),
            device,
        }
    }

    /// Skin / profile name derived from the device name
    pub fn skin_name(&self) -> String {
        skin_name(&self.device)
    }

    /// `hw.ramSize` value for config.ini
    pub fn config_ram(&self) -> &str {
        self.ram.as_deref().unwrap_or(DEFAULT_CONFIG_RAM)
    }

    /// `-memory` value for the emulator
    pub fn emulator_memory(&self) -> &str {
        self.ram.as_deref().unwrap_or(DEFAULT_EMULATOR_MEMORY)
    }

    /// Custom emulator arguments split into an argument vector
    pub fn extra_args(&self) -> Vec<String> {
        self.emulator_args
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}

/// Appium server settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppiumSettings {
    pub enabled: bool,
    pub port: u16,
    pub log_path: String,
    pub default_capabilities: Option<String>,
    pub relaxed_security: bool,
}

impl AppiumSettings {
    fn resolve(env: &EnvSource) -> Self {
        let port = env.resolve_int("APPIUM_PORT", DEFAULT_APPIUM_PORT);
        let log_path = env
            .get("APPIUM_LOG")
            .map(str::to_string)
            .unwrap_or_else(|| default_appium_log(port));

        Self {
            enabled: env.resolve_bool("APPIUM", false),
            port,
            log_path,
            default_capabilities: env.get_non_empty("DEFAULT_CAPABILITIES"),
            relaxed_security: env.resolve_bool("RELAXED_SECURITY", true),
        }
    }
}

/// Selenium Grid registration settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridSettings {
    pub connect: bool,
    pub mobile_web_test: bool,
    pub browser: Option<String>,
    /// Host advertised to the hub; detected when unset
    pub appium_host: Option<String>,
    pub selenium_host: String,
    pub selenium_port: u16,
    pub selenium_timeout: u32,
}

impl GridSettings {
    fn resolve(env: &EnvSource) -> Self {
        Self {
            connect: env.resolve_bool("CONNECT_TO_GRID", false),
            mobile_web_test: env.resolve_bool("MOBILE_WEB_TEST", false),
            browser: env.get_non_empty("BROWSER"),
            appium_host: env.get_non_empty("APPIUM_HOST"),
            selenium_host: env.get_or("SELENIUM_HOST", DEFAULT_SELENIUM_HOST),
            selenium_port: env.resolve_int("SELENIUM_PORT", DEFAULT_SELENIUM_PORT),
            selenium_timeout: env.resolve_int("SELENIUM_TIMEOUT", DEFAULT_SELENIUM_TIMEOUT),
        }
    }

    /// Browser advertised in the node capabilities, if configured.
    ///
    /// `None` means mobile web testing was requested without `BROWSER`.
    pub fn browser_name(&self) -> Option<&str> {
        if self.mobile_web_test {
            self.browser.as_deref()
        } else {
            Some(NATIVE_BROWSER_NAME)
        }
    }
}

/// Filesystem layout of the emulator image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    root: PathBuf,
}

impl Paths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the AVD
    pub fn avd_dir(&self) -> PathBuf {
        self.root.join("android_emulator")
    }

    /// Persisted AVD configuration
    pub fn avd_config(&self) -> PathBuf {
        self.avd_dir().join("config.ini")
    }

    pub fn skin_dir(&self, skin: &str) -> PathBuf {
        self.root.join("devices").join("skins").join(skin)
    }

    /// Hardware profile resource for a skin
    pub fn profile_source(&self, skin: &str) -> PathBuf {
        self.root
            .join("devices")
            .join("profiles")
            .join(format!("{}.xml", skin))
    }

    /// Where the emulator looks for custom hardware profiles
    pub fn profile_destination(&self) -> PathBuf {
        self.root.join(".android").join("devices.xml")
    }

    /// Generated Selenium Grid node config
    pub fn node_config(&self) -> PathBuf {
        self.root.join("src").join("nodeconfig.json")
    }

    pub fn emulator_binary(&self) -> PathBuf {
        self.root.join("emulator").join("emulator")
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new(DEFAULT_ANDROID_HOME)
    }
}

/// Complete launcher configuration, resolved once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentConfig {
    pub image: SystemImage,
    pub device: DeviceSettings,
    pub appium: AppiumSettings,
    pub grid: GridSettings,
    pub paths: Paths,
}

impl EnvironmentConfig {
    /// Resolve from the process environment
    pub fn from_env() -> Result<Self> {
        Self::resolve(&EnvSource::from_process())
    }

    /// Resolve from an environment snapshot.
    ///
    /// Fails only if a required image variable is missing.
    pub fn resolve(env: &EnvSource) -> Result<Self> {
        let image = SystemImage::resolve(env)?;
        info!(
            "Android version: {}, API level: {}, processor: {}, system image: {}, image type: {}",
            image.android_version, image.api_level, image.processor, image.sys_img, image.img_type
        );

        let device = DeviceSettings::resolve(env, &image.android_version);
        let paths = env
            .get_non_empty("ANDROID_HOME")
            .map(Paths::new)
            .unwrap_or_default();

        Ok(Self {
            device,
            appium: AppiumSettings::resolve(env),
            grid: GridSettings::resolve(env),
            paths,
            image,
        })
    }
}

/// Lowercased device name with spaces replaced by underscores
pub fn skin_name(device: &str) -> String {
    device.replace(' ', "_").to_lowercase()
}

/// Appium log location for a port
pub fn default_appium_log(port: u16) -> String {
    format!("/var/log/supervisor/appium_logs/appium_{}.log", port)
}
