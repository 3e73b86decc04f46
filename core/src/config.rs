//! Configuration management (playcast.toml)
//!
//! Every section and field has a default, so an empty or missing file
//! reproduces the stock behaviour.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::driver::CycleConfig;
use crate::encode::EncoderConfig;
use crate::idle::IdleConfig;
use crate::recording::RecordingConfig;
use crate::wasm::CoreOptions;

/// Default config file name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "playcast.toml";

/// Application configuration, one section per component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PlaycastConfig {
    /// Frame sampling
    #[serde(default)]
    pub recording: RecordingConfig,
    /// Idle detection rounds
    #[serde(default)]
    pub idle: IdleConfig,
    /// Press, settle and cool-down windows of a cycle
    #[serde(default)]
    pub cycle: CycleConfig,
    /// Emulation core toggles
    #[serde(default)]
    pub core: CoreOptions,
    /// Animation output
    #[serde(default)]
    pub encoder: EncoderConfig,
}

impl PlaycastConfig {
    /// Parse and validate TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, or defaults if it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content)
                .with_context(|| format!("Failed to load config {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => {
                Err(e).with_context(|| format!("Failed to read config {}", path.display()))
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.recording.max_framerate > 0,
            "recording.max_framerate must be positive"
        );
        anyhow::ensure!(
            self.recording.tick_rate > 0,
            "recording.tick_rate must be positive"
        );
        anyhow::ensure!(
            self.recording.increment_ticks > 0,
            "recording.increment_ticks must be positive"
        );
        anyhow::ensure!(
            self.cycle.max_multiplier > 0,
            "cycle.max_multiplier must be positive"
        );
        self.idle.validate()?;
        self.encoder.validate()?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{EncoderKind, PaletteMode};
    use crate::idle::ProbeStrategy;
    use crate::input::Button;

    // =============================================================
    // Default value tests
    // =============================================================

    #[test]
    fn test_config_deserialize_empty() {
        let config = PlaycastConfig::from_toml("").unwrap();
        assert_eq!(config, PlaycastConfig::default());
        assert_eq!(config.recording.max_framerate, 12);
        assert_eq!(config.idle.max_rounds, 30);
        assert_eq!(config.cycle.cooldown_ticks, 240);
        assert_eq!(config.encoder.max_colors, 56);
        assert!(config.core.prefer_gbc);
    }

    // =============================================================
    // TOML tests
    // =============================================================

    #[test]
    fn test_config_partial_sections() {
        let config = PlaycastConfig::from_toml(
            r#"
[idle]
strategy = "parallel"
candidates = ["start", "a"]

[encoder]
kind = "ffmpeg"
palette = "per_frame"
"#,
        )
        .unwrap();

        assert_eq!(config.idle.strategy, ProbeStrategy::Parallel);
        assert_eq!(config.idle.candidates, vec![Button::Start, Button::A]);
        assert_eq!(config.idle.round_ticks, 60);
        assert_eq!(config.encoder.kind, EncoderKind::Ffmpeg);
        assert_eq!(config.encoder.palette, PaletteMode::PerFrame);
        assert_eq!(config.encoder.scale, 2);
    }

    #[test]
    fn test_config_serialize_roundtrip() {
        let mut config = PlaycastConfig::default();
        config.cycle.settle_ticks = 10;
        config.recording.max_framerate = 15;

        let parsed = PlaycastConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    // =============================================================
    // Validation tests
    // =============================================================

    #[test]
    fn test_config_rejects_probe_longer_than_round() {
        let err = PlaycastConfig::from_toml("[idle]\nround_ticks = 4\nprobe_ticks = 8\n").unwrap_err();
        assert!(format!("{:#}", err).contains("probe_ticks"));
    }

    #[test]
    fn test_config_rejects_unknown_button() {
        assert!(PlaycastConfig::from_toml("[idle]\ncandidates = [\"turbo\"]\n").is_err());
    }

    #[test]
    fn test_config_rejects_empty_candidates() {
        let err = PlaycastConfig::from_toml("[idle]\ncandidates = []\n").unwrap_err();
        assert!(format!("{:#}", err).contains("candidates"));
    }

    #[test]
    fn test_config_rejects_zero_max_multiplier() {
        assert!(PlaycastConfig::from_toml("[cycle]\nmax_multiplier = 0\n").is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = PlaycastConfig::load(&dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(config, PlaycastConfig::default());
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[recording]\nmax_framerate = 20\n").unwrap();
        assert_eq!(PlaycastConfig::load(&path).unwrap().recording.max_framerate, 20);
    }
}
