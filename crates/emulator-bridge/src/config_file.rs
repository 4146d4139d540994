//! AVD config.ini handling
//!
//! The file is never rewritten from scratch: provisioning appends a tuning
//! block and then rewrites individual lines through an ordered rule list.

use std::borrow::Cow;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use configparser::ini::Ini;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info};

/// Section configparser assigns to keys outside any `[section]`
const DEFAULT_SECTION: &str = "default";

/// Hardware features switched off on every new AVD
pub const DISABLED_FEATURES: &[&str] = &[
    "hw.audioOutput",
    "hw.sensors.light",
    "hw.sensors.pressure",
    "hw.sensors.humidity",
    "hw.sensors.magnetic_field",
    "hw.sensors.magnetic_field_uncalibrated",
    "hw.sensors.gyroscope_uncalibrated",
    "hw.sensors.temperature",
    "hw.sensors.hinge",
];

/// Rewrites a line containing `pattern` by replacing it with `replacement`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchRule {
    pub pattern: &'static str,
    pub replacement: &'static str,
}

impl PatchRule {
    pub const fn new(pattern: &'static str, replacement: &'static str) -> Self {
        Self { pattern, replacement }
    }

    pub fn matches(&self, line: &str) -> bool {
        line.contains(self.pattern)
    }
}

/// Defaults written by avdmanager that are turned off or lowered
pub const DEFAULT_PATCH_RULES: &[PatchRule] = &[
    PatchRule::new("hw.audioInput=yes", "hw.audioInput=no"),
    PatchRule::new("hw.battery=yes", "hw.battery=no"),
    PatchRule::new("hw.sdCard=yes", "hw.sdCard=no"),
    PatchRule::new("hw.sensors.orientation=yes", "hw.sensors.orientation=no"),
    PatchRule::new("hw.sensors.proximity=yes", "hw.sensors.proximity=no"),
    PatchRule::new("hw.lcd.density=480", "hw.lcd.density=420"),
];

/// Apply the first matching rule to a line; unmatched lines pass through
pub fn patch_line<'a>(line: &'a str, rules: &[PatchRule]) -> Cow<'a, str> {
    match rules.iter().find(|rule| rule.matches(line)) {
        Some(rule) => Cow::Owned(line.replace(rule.pattern, rule.replacement)),
        None => Cow::Borrowed(line),
    }
}

/// Apply rules to every line, keeping order and line endings
pub fn patch_contents(contents: &str, rules: &[PatchRule]) -> String {
    contents
        .split_inclusive('\n')
        .map(|line| patch_line(line, rules))
        .collect()
}

/// Per-device values appended ahead of the disabled features
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareTuning {
    pub skin_path: PathBuf,
    pub data_partition_size: String,
    pub ram_size: String,
}

impl HardwareTuning {
    /// `key=value` lines in the order they are appended
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("skin.path={}", self.skin_path.display()),
            format!("disk.dataPartition.size={}", self.data_partition_size),
            format!("hw.ramSize={}", self.ram_size),
        ];
        lines.extend(DISABLED_FEATURES.iter().map(|key| format!("{}=no", key)));
        lines
    }
}

/// Selected settings read back from config.ini
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvdSummary {
    pub device_name: Option<String>,
    pub skin_path: Option<String>,
    pub ram_size: Option<String>,
    pub data_partition_size: Option<String>,
    pub lcd_density: Option<String>,
}

/// The persisted configuration of one AVD
#[derive(Debug, Clone)]
pub struct AvdConfigFile {
    path: PathBuf,
}

impl AvdConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// True if any line contains `marker`
    pub async fn contains_line(&self, marker: &str) -> std::io::Result<bool> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        Ok(contents.lines().any(|line| line.contains(marker)))
    }

    /// Append the tuning block, starting on a fresh line.
    ///
    /// Existing content is left untouched; a missing file is created.
    pub async fn append_tuning(&self, tuning: &HardwareTuning) -> std::io::Result<()> {
        let mut block = String::new();
        if self.needs_line_break().await? {
            block.push('\n');
        }
        for line in tuning.lines() {
            block.push_str(&line);
            block.push('\n');
        }

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .await?;
        file.write_all(block.as_bytes()).await?;
        file.flush().await?;

        info!("Skin was added in {}", self.path.display());
        Ok(())
    }

    /// True when the file has content not terminated by a newline
    async fn needs_line_break(&self) -> std::io::Result<bool> {
        let mut file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };

        if file.metadata().await?.len() == 0 {
            return Ok(false);
        }
        file.seek(SeekFrom::End(-1)).await?;
        Ok(file.read_u8().await? != b'\n')
    }

    /// Rewrite lines in place according to `rules`
    pub async fn patch(&self, rules: &[PatchRule]) -> std::io::Result<()> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        let patched = patch_contents(&contents, rules);

        if patched != contents {
            debug!("Patched defaults in {}", self.path.display());
        }
        tokio::fs::write(&self.path, patched).await
    }

    /// Read back the settings provisioning touches
    pub async fn summary(&self) -> std::io::Result<AvdSummary> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        let mut ini = Ini::new_cs();
        ini.read(contents)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        Ok(AvdSummary {
            device_name: ini.get(DEFAULT_SECTION, "hw.device.name"),
            skin_path: ini.get(DEFAULT_SECTION, "skin.path"),
            ram_size: ini.get(DEFAULT_SECTION, "hw.ramSize"),
            data_partition_size: ini.get(DEFAULT_SECTION, "disk.dataPartition.size"),
            lcd_density: ini.get(DEFAULT_SECTION, "hw.lcd.density"),
        })
    }
}
