//! Android Emulator Bridge
//!
//! Provisions the AVD, builds emulator and Appium command lines and
//! writes the Selenium Grid node config.

pub mod appium;
pub mod avd;
pub mod config_file;
pub mod emulator;
pub mod node_config;
pub mod process;

pub use appium::AppiumOptions;
pub use avd::{is_initialized, AvdError, AvdManager, HardwareProfile};
pub use config_file::{AvdConfigFile, HardwareTuning, PatchRule, DEFAULT_PATCH_RULES};
pub use emulator::{emulator_command, EmulatorOptions};
pub use node_config::{create_node_config, NodeConfig, NodeConfigError, NodeRegistration};
pub use process::{CommandSpec, ProcessError, ProcessRunner, SystemRunner};
