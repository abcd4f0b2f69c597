//! Settings persistence using TOML
//!
//! Stored in ~/.config/tetrs-arena/settings.toml (or platform equivalent),
//! unless an explicit path is given on the command line.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Server settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where to listen
    pub server: ServerSettings,
    /// Board and rules
    pub game: GameSettings,
}

/// Network settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Board size, tick rate and scoring
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    pub rows: usize,
    pub cols: usize,
    /// Time between two gravity steps
    pub step_interval_ms: u64,
    pub points_per_line: i64,
    /// Fixed seed for the shape sequence, random when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            rows: 20,
            cols: 10,
            step_interval_ms: 1000,
            points_per_line: 10,
            seed: None,
        }
    }
}

impl ServerSettings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        self.addr()
            .parse()
            .map_err(|e| format!("Invalid listen address {}: {}", self.addr(), e))
    }
}

impl GameSettings {
    pub fn step_interval(&self) -> Duration {
        Duration::from_millis(self.step_interval_ms.max(1))
    }
}

impl Settings {
    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("com", "tetrs", "tetrs-arena").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the default settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("settings.toml"))
    }

    /// Load settings from the given file, or the default location.
    /// Falls back to defaults when the file is missing or invalid.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::settings_path) else {
            return Self::default();
        };

        match fs::read_to_string(&path) {
            Ok(contents) => Self::parse(&contents).unwrap_or_else(|e| {
                warn!("Ignoring invalid settings in {}: {}", path.display(), e);
                Self::default()
            }),
            Err(e) => {
                debug!("No settings at {} ({}), using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, String> {
        toml::from_str(contents).map_err(|e| format!("Failed to parse settings: {}", e))
    }

    /// Save settings to the given file, or the default location
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf, String> {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::settings_path) else {
            return Err("Could not determine settings path".to_string());
        };

        // Create directory if needed
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| format!("Failed to create config dir: {}", e))?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize: {}", e))?;

        fs::write(&path, contents).map_err(|e| format!("Failed to write settings: {}", e))?;

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 3000);
        assert_eq!((settings.game.rows, settings.game.cols), (20, 10));
        assert_eq!(settings.game.step_interval(), Duration::from_secs(1));
        assert_eq!(settings.game.points_per_line, 10);
        assert_eq!(settings.game.seed, None);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings = Settings::parse("[game]\ncols = 12\n").unwrap();
        assert_eq!(settings.game.cols, 12);
        assert_eq!(settings.game.rows, 20);
        assert_eq!(settings.server, ServerSettings::default());
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut settings = Settings::default();
        settings.server.port = 4100;
        settings.game.step_interval_ms = 250;
        settings.game.seed = Some(99);
        let text = toml::to_string_pretty(&settings).unwrap();
        assert_eq!(Settings::parse(&text).unwrap(), settings);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        assert!(Settings::parse("game = 3").is_err());
    }

    #[test]
    fn test_socket_addr() {
        assert!(ServerSettings::default().socket_addr().is_ok());
        let bad = ServerSettings {
            host: "not a host".to_string(),
            port: 1,
        };
        assert!(bad.socket_addr().is_err());
    }

    #[test]
    fn test_save_and_load_explicit_path() {
        let dir = std::env::temp_dir().join(format!("tetrs-arena-test-{}", std::process::id()));
        let path = dir.join("settings.toml");
        let mut settings = Settings::default();
        settings.game.rows = 8;
        settings.save(Some(&path)).unwrap();
        assert_eq!(Settings::load(Some(&path)), settings);
        let _ = fs::remove_dir_all(&dir);
    }
}
