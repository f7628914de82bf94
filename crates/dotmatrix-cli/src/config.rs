use std::path::{Path, PathBuf};

use dotmatrix_core::apu::{DEFAULT_MAX_BUFFER_SECONDS, DEFAULT_SAMPLE_RATE};
use dotmatrix_core::gameboy::EmulatorConfig;
use dotmatrix_core::hardware::EmulationMode;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::RuntimeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ModeSetting {
    #[default]
    Auto,
    ForceDmg,
    ForceCgb,
}

impl From<ModeSetting> for EmulationMode {
    fn from(mode: ModeSetting) -> Self {
        match mode {
            ModeSetting::Auto => EmulationMode::Auto,
            ModeSetting::ForceDmg => EmulationMode::ForceDmg,
            ModeSetting::ForceCgb => EmulationMode::ForceCgb,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub mode: ModeSetting,
    pub sample_rate: u32,
    pub max_buffer_seconds: f32,
    /// Write battery saves whenever cartridge RAM changes, not just on exit.
    pub autosave: bool,
    /// Where `.sav`/`.rtc` files live. Next to the ROM when unset.
    pub save_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: ModeSetting::Auto,
            sample_rate: DEFAULT_SAMPLE_RATE,
            max_buffer_seconds: DEFAULT_MAX_BUFFER_SECONDS,
            autosave: true,
            save_dir: None,
        }
    }
}

impl Config {
    pub fn emulator_config(&self) -> EmulatorConfig {
        EmulatorConfig {
            mode: self.mode.into(),
            sample_rate: self.sample_rate,
            max_buffer_seconds: self.max_buffer_seconds,
        }
    }
}

pub fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("dotmatrix").join("config.toml");
        }
    }

    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("dotmatrix").join("config.toml");
    }

    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join("dotmatrix")
            .join("config.toml");
    }

    PathBuf::from("config.toml")
}

/// Missing files give the defaults silently; unparsable ones with a warning.
pub fn load_from_file(path: &Path) -> Config {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => return Config::default(),
    };

    match toml::from_str::<Config>(&text) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(
                "Failed to parse config {}: {e}; using defaults",
                path.display()
            );
            Config::default()
        }
    }
}

pub fn save_to_file(path: &Path, cfg: &Config) -> Result<(), RuntimeError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| RuntimeError::io(parent, e))?;
    }

    let text = toml::to_string_pretty(cfg)?;
    std::fs::write(path, text).map_err(|e| RuntimeError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let cfg: Config = toml::from_str("mode = \"force-cgb\"\nsave-dir = \"/tmp/saves\"\n").unwrap();
        assert_eq!(cfg.mode, ModeSetting::ForceCgb);
        assert_eq!(cfg.save_dir, Some(PathBuf::from("/tmp/saves")));
        assert_eq!(cfg.sample_rate, DEFAULT_SAMPLE_RATE);
        assert!(cfg.autosave);
        assert_eq!(cfg.emulator_config().mode, EmulationMode::ForceCgb);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "sample-rate = \"fast\"").unwrap();
        assert_eq!(load_from_file(&path), Config::default());
        assert_eq!(load_from_file(&dir.path().join("missing.toml")), Config::default());
    }

    #[test]
    fn saved_config_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let cfg = Config {
            mode: ModeSetting::ForceDmg,
            sample_rate: 44_100,
            autosave: false,
            ..Config::default()
        };
        save_to_file(&path, &cfg).unwrap();
        assert_eq!(load_from_file(&path), cfg);
    }
}
