//! Emulator command line
//!
//! Builds the `emulator @<avd>` invocation for a first boot (wipes user
//! data) or for resuming a previously initialized AVD.

use std::path::Path;
use avd_node_core::EnvironmentConfig;

use crate::process::CommandSpec;

/// Timezone the emulator clock is pinned to
pub const EMULATOR_TIMEZONE: &str = "Asia/Shanghai";

/// DNS servers handed to the emulator's virtual network
pub const EMULATOR_DNS_SERVERS: &str = "10.32.51.10,10.32.51.12";

/// Emulator launch options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmulatorOptions {
    /// Console port
    pub port: String,
    pub timezone: String,
    pub no_boot_anim: bool,
    /// GPU mode (auto, host, swiftshader_indirect, etc.)
    pub gpu: String,
    pub accel: String,
    /// Wipe user data on launch
    pub wipe_data: bool,
    pub writable_system: bool,
    /// Memory size in MB
    pub memory: String,
    /// System partition size in MB
    pub partition_size: String,
    pub dns_servers: String,
    pub verbose: bool,
    /// Additional arguments
    pub extra_args: Vec<String>,
}

impl EmulatorOptions {
    /// Options shared by both launch modes
    fn base(config: &EnvironmentConfig) -> Self {
        let device = &config.device;
        Self {
            port: device.emulator_port.clone(),
            timezone: EMULATOR_TIMEZONE.to_string(),
            no_boot_anim: true,
            gpu: "auto".to_string(),
            accel: "on".to_string(),
            wipe_data: false,
            writable_system: true,
            memory: device.emulator_memory().to_string(),
            partition_size: device.data_partition.clone(),
            dns_servers: EMULATOR_DNS_SERVERS.to_string(),
            verbose: true,
            extra_args: device.extra_args(),
        }
    }

    /// First launch of a freshly created AVD
    pub fn first_boot(config: &EnvironmentConfig) -> Self {
        Self {
            wipe_data: true,
            ..Self::base(config)
        }
    }

    /// Launch of an AVD initialized on an earlier run
    pub fn resume(config: &EnvironmentConfig) -> Self {
        Self::base(config)
    }

    /// Convert to command line arguments
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "-port".to_string(),
            self.port.clone(),
            "-timezone".to_string(),
            self.timezone.clone(),
        ];

        if self.no_boot_anim {
            args.push("-no-boot-anim".to_string());
        }

        args.extend([
            "-gpu".to_string(),
            self.gpu.clone(),
            "-accel".to_string(),
            self.accel.clone(),
        ]);

        if self.wipe_data {
            args.push("-wipe-data".to_string());
        }

        if self.writable_system {
            args.push("-writable-system".to_string());
        }

        args.extend([
            "-memory".to_string(),
            self.memory.clone(),
            "-partition-size".to_string(),
            self.partition_size.clone(),
            "-dns-server".to_string(),
            self.dns_servers.clone(),
        ]);

        if self.verbose {
            args.push("-verbose".to_string());
        }

        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Full invocation of `emulator` for `avd_name`
    pub fn command(&self, emulator: &Path, avd_name: &str) -> CommandSpec {
        CommandSpec::from_path(emulator)
            .arg(format!("@{}", avd_name))
            .args(self.to_args())
    }
}

/// Emulator command for the configured AVD
pub fn emulator_command(config: &EnvironmentConfig, first_run: bool) -> CommandSpec {
    let options = if first_run {
        EmulatorOptions::first_boot(config)
    } else {
        EmulatorOptions::resume(config)
    };

    options.command(&config.paths.emulator_binary(), &config.device.avd_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use avd_node_core::EnvSource;

    fn config(extra: &[(&str, &str)]) -> EnvironmentConfig {
        let mut env = EnvSource::from_pairs([
            ("ANDROID_VERSION", "11.0"),
            ("API_LEVEL", "30"),
            ("PROCESSOR", "x86"),
            ("SYS_IMG", "x86_64"),
            ("IMG_TYPE", "google_apis"),
            ("UDID", "emulator-5556"),
        ]);
        for (key, value) in extra {
            env.set(*key, *value);
        }
        EnvironmentConfig::resolve(&env).unwrap()
    }

    #[test]
    fn test_first_boot_command() {
        let cmd = emulator_command(&config(&[]), true);

        assert_eq!(cmd.program, "/root/emulator/emulator");
        assert_eq!(
            cmd.args,
            vec![
                "@nexus_5_11.0",
                "-port",
                "5556",
                "-timezone",
                "Asia/Shanghai",
                "-no-boot-anim",
                "-gpu",
                "auto",
                "-accel",
                "on",
                "-wipe-data",
                "-writable-system",
                "-memory",
                "8192",
                "-partition-size",
                "16384",
                "-dns-server",
                "10.32.51.10,10.32.51.12",
                "-verbose",
            ]
        );
    }

    #[test]
    fn test_resume_keeps_data() {
        let cmd = emulator_command(&config(&[]), false);

        assert!(!cmd.has_arg("-wipe-data"));
        assert!(cmd.has_arg("-writable-system"));
        assert!(cmd.has_arg("-verbose"));
        assert_eq!(cmd.value_of("-port"), Some("5556"));
    }

    #[test]
    fn test_custom_args_and_memory() {
        let cmd = emulator_command(
            &config(&[("EMULATOR_ARGS", "-no-window -camera-back none"), ("RAM", "4096")]),
            false,
        );

        assert_eq!(cmd.value_of("-memory"), Some("4096"));
        assert_eq!(
            &cmd.args[cmd.args.len() - 4..],
            ["-verbose", "-no-window", "-camera-back", "none"]
        );
    }
}
