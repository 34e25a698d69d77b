//! Configuration handling for the chip8 CLI

use anyhow::{Context, Result};
use chip8_vm::VmConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub machine: VmConfig,

    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Render the framebuffer to the terminal
    #[serde(default)]
    pub render: bool,

    /// Ring the terminal bell while the sound timer runs
    #[serde(default)]
    pub bell: bool,
}

/// Default config location: `~/.chip8jit/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".chip8jit").join("config.toml"))
}

/// Load configuration from file or use defaults
pub fn load_config(path: Option<PathBuf>) -> Result<Config> {
    if let Some(path) = path {
        read_config(&path)
    } else if let Some(default_path) = default_config_path().filter(|p| p.exists()) {
        read_config(&default_path)
    } else {
        Ok(Config::default())
    }
}

fn read_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    parse_config(&content).with_context(|| format!("parsing config {}", path.display()))
}

fn parse_config(content: &str) -> Result<Config> {
    Ok(toml::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(parse_config("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_config_keeps_other_defaults() {
        let config = parse_config(
            r#"
            [machine]
            clock_hz = 1000

            [machine.jit]
            hot_threshold = 3

            [display]
            bell = true
            "#,
        )
        .unwrap();

        assert_eq!(config.machine.clock_hz, 1000);
        assert_eq!(config.machine.timer_hz, 60);
        assert!(config.machine.pace);
        assert_eq!(config.machine.jit.hot_threshold, 3);
        assert!(config.machine.jit.enabled);
        assert_eq!(config.machine.jit.loop_budget, 4096);
        assert!(config.display.bell);
        assert!(!config.display.render);
    }

    #[test]
    fn test_unknown_types_are_rejected() {
        assert!(parse_config("[machine]\nclock_hz = \"fast\"\n").is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let path = std::env::temp_dir().join("chip8jit-no-such-config.toml");
        assert!(load_config(Some(path)).is_err());
    }
}
