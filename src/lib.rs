//! AVD Node - Android emulator launcher for Selenium Grid
//!
//! Reads its settings from the environment, provisions an Android Virtual
//! Device on first run, starts the emulator and optionally an Appium server
//! registered as a Selenium Grid node.
//!
//! ## Architecture
//!
//! - `avd-node-core`: environment resolution and the configuration snapshot
//! - `avd-node-emulator-bridge`: AVD provisioning, emulator/Appium command
//!   lines, node config and process execution
//! - [`launcher`]: the sequential launch pipeline tying them together

#![warn(clippy::all)]

pub mod launcher;

pub use avd_node_core as core;
pub use avd_node_emulator_bridge as emulator;
pub use launcher::Launcher;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::launcher::Launcher;
    pub use avd_node_core::{EnvSource, EnvironmentConfig};
    pub use avd_node_emulator_bridge::{ProcessRunner, SystemRunner};
}
