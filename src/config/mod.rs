//! Configuration management
//!
//! Handles loading, parsing, and hot-reloading of the YAML configuration.

pub mod watcher;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::fs;

use crate::handshake::DEFAULT_REQUEST_DELAY;

pub use watcher::ConfigWatcher;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    pub midi: MidiConfig,
    #[serde(default)]
    pub handshake: HandshakeConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub skin: SkinConfig,
    /// Control table override; the embedded table is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controls_csv: Option<String>,
}

/// MIDI port configuration (case-insensitive substrings of port names)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MidiConfig {
    pub input_port: String,
    pub output_port: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HandshakeConfig {
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
}

impl HandshakeConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: default_request_delay_ms(),
        }
    }
}

/// Initial DAW session shape
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SessionConfig {
    #[serde(default = "default_return_tracks")]
    pub return_tracks: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            return_tracks: default_return_tracks(),
        }
    }
}

/// Pad velocities used for mode button LEDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct SkinConfig {
    #[serde(default = "default_mode_selected")]
    pub mode_selected: u8,
    #[serde(default = "default_mode_available")]
    pub mode_available: u8,
    #[serde(default)]
    pub mode_disabled: u8,
}

impl Default for SkinConfig {
    fn default() -> Self {
        Self {
            mode_selected: default_mode_selected(),
            mode_available: default_mode_available(),
            mode_disabled: 0,
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::from_yaml(&contents).with_context(|| format!("Failed to parse YAML config: {}", path))
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("mode_selected", self.skin.mode_selected),
            ("mode_available", self.skin.mode_available),
            ("mode_disabled", self.skin.mode_disabled),
        ] {
            anyhow::ensure!(value < 128, "skin.{} must be 0-127, got {}", name, value);
        }
        Ok(())
    }

    /// Whether switching to `other` needs the ports reopened
    pub fn ports_changed(&self, other: &AppConfig) -> bool {
        self.midi != other.midi
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            midi: MidiConfig {
                input_port: "Launchkey".to_string(),
                output_port: "Launchkey".to_string(),
            },
            handshake: HandshakeConfig::default(),
            session: SessionConfig::default(),
            skin: SkinConfig::default(),
            controls_csv: None,
        }
    }
}

fn default_request_delay_ms() -> u64 {
    DEFAULT_REQUEST_DELAY.as_millis() as u64
}

fn default_return_tracks() -> usize {
    2
}

fn default_mode_selected() -> u8 {
    21
}

fn default_mode_available() -> u8 {
    23
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = AppConfig::from_yaml(
            r#"
midi:
  input_port: "Launchkey MK2 49 MIDI 2"
  output_port: "Launchkey MK2 49 MIDI 2"
"#,
        )
        .unwrap();

        assert_eq!(config.handshake.request_delay(), Duration::from_millis(500));
        assert_eq!(config.session.return_tracks, 2);
        assert_eq!(config.skin, SkinConfig::default());
        assert!(config.controls_csv.is_none());
    }

    #[test]
    fn test_full_config() {
        let config = AppConfig::from_yaml(
            r#"
midi:
  input_port: "in"
  output_port: "out"
handshake:
  request_delay_ms: 250
session:
  return_tracks: 0
skin:
  mode_selected: 5
  mode_available: 7
  mode_disabled: 1
controls_csv: "my-controls.csv"
"#,
        )
        .unwrap();

        assert_eq!(config.handshake.request_delay_ms, 250);
        assert_eq!(config.session.return_tracks, 0);
        assert_eq!(config.skin.mode_disabled, 1);
        assert_eq!(config.controls_csv.as_deref(), Some("my-controls.csv"));
    }

    #[test]
    fn test_missing_midi_section_fails() {
        assert!(AppConfig::from_yaml("session:\n  return_tracks: 1\n").is_err());
    }

    #[test]
    fn test_skin_out_of_range_fails() {
        let yaml = "midi:\n  input_port: a\n  output_port: b\nskin:\n  mode_selected: 200\n";
        assert!(AppConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_ports_changed() {
        let a = AppConfig::default();
        let mut b = a.clone();
        b.skin.mode_selected = 3;
        assert!(!a.ports_changed(&b));
        b.midi.output_port = "Other".to_string();
        assert!(a.ports_changed(&b));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "midi:\n  input_port: a\n  output_port: b\n").unwrap();

        let config = AppConfig::load(&path.to_string_lossy()).await.unwrap();
        assert_eq!(config.midi.input_port, "a");

        assert!(AppConfig::load("does/not/exist.yaml").await.is_err());
    }
}
