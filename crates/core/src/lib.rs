//! AVD Node Core - environment resolution and shared configuration
//!
//! Every environment variable the launcher reads is resolved here, once,
//! into an immutable [`EnvironmentConfig`] that the other crates consume.

pub mod config;
pub mod env;
pub mod error;

pub use config::{AppiumSettings, DeviceSettings, EnvironmentConfig, GridSettings, Paths, SystemImage};
pub use env::{parse_bool, EnvSource};
pub use error::{ConfigError, Result};

/// Launcher version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "AVD Node";
