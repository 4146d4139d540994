//! Launcher
//!
//! Provisions the AVD on first run, starts the emulator and, when enabled,
//! the Appium server registered with a Selenium Grid.

use anyhow::{Context, Result};
use tracing::{info, warn};

use avd_node_core::config::NATIVE_BROWSER_NAME;
use avd_node_core::EnvironmentConfig;
use avd_node_emulator_bridge::node_config::advertised_host;
use avd_node_emulator_bridge::{
    create_node_config, emulator_command, AppiumOptions, AvdManager, CommandSpec, NodeRegistration,
    ProcessRunner,
};

/// Sequential launch pipeline over a resolved configuration
pub struct Launcher<R: ProcessRunner> {
    config: EnvironmentConfig,
    runner: R,
}

impl<R: ProcessRunner> Launcher<R> {
    pub fn new(config: EnvironmentConfig, runner: R) -> Self {
        Self { config, runner }
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn avd_manager(&self) -> AvdManager<'_, R> {
        AvdManager::new(&self.config, &self.runner)
    }

    /// Run the whole pipeline
    pub async fn run(&self) -> Result<()> {
        let device = &self.config.device;
        info!("Device: {}", device.device);
        info!("Custom Args: {}", device.emulator_args);
        info!("AVD name: {}", device.avd_name);

        let first_run = !self
            .avd_manager()
            .is_initialized()
            .await
            .context("Failed to inspect AVD config")?;

        if first_run {
            info!("Preparing emulator...");
            self.avd_manager()
                .prepare_avd()
                .await
                .context("Failed to prepare AVD")?;
            info!("Emulator was not previously initialized. Preparing a new one...");
        } else {
            info!("Using previously initialized AVD...");
        }

        let emulator = emulator_command(&self.config, first_run);
        info!("Run emulator: {}", emulator);

        if self.config.appium.enabled {
            self.runner.spawn(&emulator).await?;
            info!("Run appium server...");
            self.appium_run().await
        } else {
            self.runner.run_to_completion(&emulator).await?;
            Ok(())
        }
    }

    /// Start the Appium server in its own terminal.
    ///
    /// With grid registration on, the node config is written first and
    /// passed via `--nodeconfig`.
    pub async fn appium_run(&self) -> Result<()> {
        let command = self.appium_command().await?;
        self.runner
            .check_call(&command)
            .await
            .context("Appium server failed")?;
        Ok(())
    }

    async fn appium_command(&self) -> Result<CommandSpec> {
        let appium = &self.config.appium;
        info!("Relaxed security? {}", appium.relaxed_security);

        let mut options = AppiumOptions::from_settings(appium);
        info!("appium command: {}", options.command());

        info!("Connect to selenium grid? {}", self.config.grid.connect);
        if self.config.grid.connect {
            let path = self.config.paths.node_config();
            let registration = self.registration().await;
            create_node_config(&path, &registration)
                .await
                .context("Failed to write node config")?;
            options = options.with_node_config(path);
        }

        Ok(options.terminal_command())
    }

    async fn registration(&self) -> NodeRegistration {
        let grid = &self.config.grid;

        let browser_name = grid.browser_name().unwrap_or_else(|| {
            warn!(
                "MOBILE_WEB_TEST is set but BROWSER is not, using {}",
                NATIVE_BROWSER_NAME
            );
            NATIVE_BROWSER_NAME
        });

        let appium_host = match &grid.appium_host {
            Some(host) => host.clone(),
            None => advertised_host(&grid.selenium_host, grid.selenium_port).await,
        };

        NodeRegistration {
            android_version: self.config.image.android_version.clone(),
            avd_name: self.config.device.avd_name.clone(),
            browser_name: browser_name.to_string(),
            appium_host,
            appium_port: self.config.appium.port,
            selenium_host: grid.selenium_host.clone(),
            selenium_port: grid.selenium_port,
            selenium_timeout: grid.selenium_timeout,
        }
    }
}
