//! Configuration for the status bar
//!
//! Loads configuration from TOML file at `~/.config/statusbar/config.toml`
//! Auto-generates default config file on first run if missing.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub clock: ClockConfig,
    pub battery: BatteryConfig,
    pub bar: BarConfig,
    pub menu: MenuConfig,
    pub activity: ActivityConfig,
    pub colors: BarColors,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            clock: ClockConfig::default(),
            battery: BatteryConfig::default(),
            bar: BarConfig::default(),
            menu: MenuConfig::default(),
            activity: ActivityConfig::default(),
            colors: BarColors::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, or use defaults if file doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            info!("Config file not found at {:?}, using defaults", config_path);
            let config = Self::default();
            if let Err(e) = config.save_to(config_path) {
                warn!("Failed to create default config file: {}", e);
            }
            return Ok(config);
        }

        let content = fs::read_to_string(config_path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Configuration loaded from {:?}", config_path);
        debug!("Config: {:?}", config);

        Ok(config)
    }

    /// Write the current settings back, used when they change over D-Bus
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Get the path to the config file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("statusbar");

        Ok(config_dir.join("config.toml"))
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, toml_string).context("Failed to write config file")?;

        debug!("Wrote config file at {:?}", path);
        Ok(())
    }
}

/// Clock configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// 24-hour clock instead of AM/PM
    pub twenty_four_time: bool,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            twenty_four_time: false,
        }
    }
}

/// Battery configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatteryConfig {
    /// Stored for the settings application; there is no battery applet
    pub show_battery_percentage: bool,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            show_battery_percentage: false,
        }
    }
}

/// Bar geometry and text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarConfig {
    /// Bar height in pixels
    pub height: u32,
    /// Core X font name
    pub font: String,
    /// Horizontal padding around each item
    pub padding: u32,
}

impl Default for BarConfig {
    fn default() -> Self {
        Self {
            height: 25,
            font: "fixed".to_string(),
            padding: 8,
        }
    }
}

/// Global menu configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuConfig {
    /// How often the active window's menu properties are re-read
    pub poll_interval_ms: u64,
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 400,
        }
    }
}

/// Active window tracking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityConfig {
    /// WM_CLASS of the launcher; the bar drops below while it is focused
    pub launcher_class: String,
    /// Classes never reported as the active application
    pub block_list: Vec<String>,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            launcher_class: "cutefish-launcher".to_string(),
            block_list: vec![
                "cutefish-launcher".to_string(),
                "cutefish-statusbar".to_string(),
            ],
        }
    }
}

/// Bar colors configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarColors {
    /// Background color (hex: 0xRRGGBB)
    pub background: u32,
    /// Text color (hex: 0xRRGGBB)
    pub foreground: u32,
    /// Disabled menu item text (hex: 0xRRGGBB)
    pub disabled: u32,
    /// Pressed / open menu item background (hex: 0xRRGGBB)
    pub highlight: u32,
}

impl Default for BarColors {
    fn default() -> Self {
        Self {
            background: 0xf3f3f3,
            foreground: 0x31363b,
            disabled: 0x9a9a9a,
            highlight: 0xd5d9de,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("statusbar").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());

        // and it reads back the same
        assert_eq!(Config::load_from(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[clock]\ntwenty_four_time = true\n\n[bar]\nheight = 30\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!(config.clock.twenty_four_time);
        assert_eq!(config.bar.height, 30);
        assert_eq!(config.bar.font, "fixed");
        assert_eq!(config.menu.poll_interval_ms, 400);
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.clock.twenty_four_time = true;
        config.save_to(&path).unwrap();

        assert!(Config::load_from(&path).unwrap().clock.twenty_four_time);
    }

    #[test]
    fn test_broken_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[bar\nheight = ").unwrap();

        assert!(Config::load_from(&path).is_err());
    }
}
