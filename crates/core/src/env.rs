//! Environment Resolver
//!
//! Captures the process environment once and exposes typed lookups with
//! the fallback rules the launcher relies on:
//! - required variables fail fast when absent or empty
//! - booleans and integers fall back to a default, never fail
//! - the emulator port is derived from the device serial in `UDID`

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use tracing::warn;

use crate::error::{ConfigError, Result};

/// Serial prefix the emulator uses for its console port (`emulator-5554`)
pub const EMULATOR_SERIAL_PREFIX: &str = "emulator-";

/// Variable holding the device serial
pub const UDID_VAR: &str = "UDID";

/// Values accepted as `true`, compared case-insensitively
const TRUTHY: &[&str] = &["yes", "true", "t", "1"];

/// Snapshot of environment variables
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    vars: HashMap<String, String>,
}

impl EnvSource {
    /// Capture the current process environment.
    ///
    /// Variables whose name or value is not valid unicode are skipped.
    pub fn from_process() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect();

        Self { vars }
    }

    /// Build a snapshot from explicit pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    /// Set or replace a variable
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Raw value, `None` when unset
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Raw value or `default` when unset. An empty value is returned as is.
    pub fn get_or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or(default).to_string()
    }

    /// Value that is treated as absent when empty
    pub fn get_non_empty(&self, name: &str) -> Option<String> {
        self.get(name)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }

    /// Value of a variable the launcher cannot start without
    pub fn resolve_required(&self, name: &str) -> Result<String> {
        self.get_non_empty(name)
            .ok_or_else(|| ConfigError::MissingConfiguration(name.to_string()))
    }

    /// Boolean flag, `default` when unset
    pub fn resolve_bool(&self, name: &str, default: bool) -> bool {
        self.get(name).map(parse_bool).unwrap_or(default)
    }

    /// Integer value, `default` when unset or unparsable
    pub fn resolve_int<T>(&self, name: &str, default: T) -> T
    where
        T: FromStr + Display,
    {
        let Some(raw) = self.get(name) else {
            return default;
        };

        match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(
                    "Invalid integer value for {}: {}, using default: {}",
                    name, raw, default
                );
                default
            }
        }
    }

    /// Emulator console port taken from the device serial.
    ///
    /// `emulator-5556` yields `5556`. A serial without the prefix is used
    /// unchanged; an unset serial yields `default`. Both fallbacks warn.
    pub fn resolve_port_from_device_id(&self, default: &str) -> String {
        match self.get(UDID_VAR) {
            None => {
                warn!(
                    "{} environment variable not set, using default port: {}",
                    UDID_VAR, default
                );
                default.to_string()
            }
            Some(udid) if udid.contains(EMULATOR_SERIAL_PREFIX) => {
                udid.replace(EMULATOR_SERIAL_PREFIX, "")
            }
            Some(udid) => {
                warn!(
                    "{} does not contain '{}' prefix: {}, using as-is",
                    UDID_VAR, EMULATOR_SERIAL_PREFIX, udid
                );
                udid.to_string()
            }
        }
    }
}

/// Parse a boolean flag. Never fails: anything not truthy is `false`.
pub fn parse_bool(raw: &str) -> bool {
    let lowered = raw.to_lowercase();
    TRUTHY.contains(&lowered.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Run `f` with a scoped subscriber and return what it logged
    fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .finish();

        let result = tracing::subscriber::with_default(subscriber, f);
        let logs = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        (result, logs)
    }

    #[test]
    fn test_required_variable() {
        let env = EnvSource::from_pairs([("ANDROID_VERSION", "11.0"), ("API_LEVEL", "")]);

        assert_eq!(env.resolve_required("ANDROID_VERSION").unwrap(), "11.0");
        assert_eq!(
            env.resolve_required("API_LEVEL"),
            Err(ConfigError::MissingConfiguration("API_LEVEL".into()))
        );
        assert_eq!(
            env.resolve_required("PROCESSOR").unwrap_err().variable(),
            "PROCESSOR"
        );
    }

    #[test]
    fn test_parse_bool() {
        for raw in ["yes", "TRUE", "True", "t", "1"] {
            assert!(parse_bool(raw), "{raw} should be true");
        }
        for raw in ["no", "false", "False", "0", "", "y", "on", " yes"] {
            assert!(!parse_bool(raw), "{raw} should be false");
        }
    }

    #[test]
    fn test_resolve_bool_defaults() {
        let env = EnvSource::from_pairs([("APPIUM", "True"), ("CONNECT_TO_GRID", "nope")]);

        assert!(env.resolve_bool("APPIUM", false));
        assert!(!env.resolve_bool("CONNECT_TO_GRID", true));
        assert!(env.resolve_bool("RELAXED_SECURITY", true));
        assert!(!env.resolve_bool("MOBILE_WEB_TEST", false));
    }

    #[test]
    fn test_resolve_int_valid_and_unset() {
        let env = EnvSource::from_pairs([("APPIUM_PORT", "4725")]);

        let (port, logs) = capture_logs(|| env.resolve_int("APPIUM_PORT", 4723u16));
        assert_eq!(port, 4725);
        assert!(logs.is_empty());

        let (timeout, logs) = capture_logs(|| env.resolve_int("SELENIUM_TIMEOUT", 30u32));
        assert_eq!(timeout, 30);
        assert!(logs.is_empty());
    }

    #[test]
    fn test_resolve_int_invalid_warns() {
        let env = EnvSource::from_pairs([("APPIUM_PORT", "test"), ("SELENIUM_PORT", "70000")]);

        let (port, logs) = capture_logs(|| env.resolve_int("APPIUM_PORT", 4723u16));
        assert_eq!(port, 4723);
        assert!(logs.contains("WARN"));
        assert!(logs.contains("Invalid integer value for APPIUM_PORT: test"));

        let (port, logs) = capture_logs(|| env.resolve_int("SELENIUM_PORT", 4444u16));
        assert_eq!(port, 4444);
        assert!(logs.contains("Invalid integer value for SELENIUM_PORT"));
    }

    #[test]
    fn test_port_from_emulator_serial() {
        let env = EnvSource::from_pairs([("UDID", "emulator-5556")]);
        let (port, logs) = capture_logs(|| env.resolve_port_from_device_id("5554"));
        assert_eq!(port, "5556");
        assert!(logs.is_empty());
    }

    #[test]
    fn test_port_without_serial() {
        let env = EnvSource::default();
        let (port, logs) = capture_logs(|| env.resolve_port_from_device_id("5554"));
        assert_eq!(port, "5554");
        assert!(logs.contains("WARN"));
        assert!(logs.contains("UDID environment variable not set"));
    }

    #[test]
    fn test_port_from_unprefixed_serial() {
        let env = EnvSource::from_pairs([("UDID", "abc")]);
        let (port, logs) = capture_logs(|| env.resolve_port_from_device_id("5554"));
        assert_eq!(port, "abc");
        assert!(logs.contains("WARN"));
        assert!(logs.contains("using as-is"));
    }
}
