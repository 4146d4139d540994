//! Appium server command line

use std::path::PathBuf;
use avd_node_core::AppiumSettings;

use crate::node_config::WD_HUB_PATH;
use crate::process::CommandSpec;

/// Plugins the server is started with
pub const APPIUM_PLUGINS: &str = "relaxed-caps,images";

/// Title of the terminal window hosting the server
pub const TERMINAL_TITLE: &str = "Appium Server";

/// Terminal emulator the server is foregrounded in
pub const TERMINAL_PROGRAM: &str = "xterm";

/// Appium launch options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppiumOptions {
    pub port: u16,
    pub log_path: String,
    pub relaxed_security: bool,
    pub default_capabilities: Option<String>,
    /// Grid node config to register with
    pub node_config: Option<PathBuf>,
}

impl AppiumOptions {
    pub fn from_settings(settings: &AppiumSettings) -> Self {
        Self {
            port: settings.port,
            log_path: settings.log_path.clone(),
            relaxed_security: settings.relaxed_security,
            default_capabilities: settings.default_capabilities.clone(),
            node_config: None,
        }
    }

    /// Register with a Selenium Grid using `path`
    pub fn with_node_config(mut self, path: PathBuf) -> Self {
        self.node_config = Some(path);
        self
    }

    /// Convert to command line arguments
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "--log".to_string(),
            self.log_path.clone(),
            "-p".to_string(),
            self.port.to_string(),
            "--log-timestamp".to_string(),
            "--local-timezone".to_string(),
            "--session-override".to_string(),
            "--base-path".to_string(),
            WD_HUB_PATH.to_string(),
            format!("--use-plugins={}", APPIUM_PLUGINS),
        ];

        if self.relaxed_security {
            args.push("--relaxed-security".to_string());
        }

        if let Some(ref caps) = self.default_capabilities {
            args.push("--default-capabilities".to_string());
            args.push(caps.clone());
        }

        if let Some(ref path) = self.node_config {
            args.push("--nodeconfig".to_string());
            args.push(path.to_string_lossy().into_owned());
        }

        args
    }

    /// Bare `appium` invocation
    pub fn command(&self) -> CommandSpec {
        CommandSpec::new("appium").args(self.to_args())
    }

    /// `appium` running in its own terminal window
    pub fn terminal_command(&self) -> CommandSpec {
        let server = self.command();
        CommandSpec::new(TERMINAL_PROGRAM)
            .args(["-T", TERMINAL_TITLE, "-n", TERMINAL_TITLE, "-e"])
            .arg(server.program)
            .args(server.args)
    }
}
