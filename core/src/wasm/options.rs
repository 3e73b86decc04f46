//! Core behaviour toggles passed to the core's `config` export

use serde::{Deserialize, Serialize};

/// Engine toggles applied to every instance (primary and forks alike)
///
/// Field order matches the argument order of the core's `config` export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreOptions {
    pub enable_boot_rom: bool,
    pub prefer_gbc: bool,
    pub audio_batch_processing: bool,
    pub graphics_batch_processing: bool,
    pub timers_batch_processing: bool,
    pub graphics_disable_scanline_rendering: bool,
    pub audio_accumulate_samples: bool,
    pub tile_rendering: bool,
    pub tile_caching: bool,
    pub enable_audio_debugging: bool,
}

impl Default for CoreOptions {
    fn default() -> Self {
        Self {
            enable_boot_rom: false,
            prefer_gbc: true,
            audio_batch_processing: true,
            graphics_batch_processing: false,
            timers_batch_processing: false,
            graphics_disable_scanline_rendering: false,
            audio_accumulate_samples: true,
            tile_rendering: false,
            tile_caching: false,
            enable_audio_debugging: false,
        }
    }
}

impl CoreOptions {
    /// Arguments for the `config` export
    #[allow(clippy::type_complexity)]
    pub fn to_config_args(self) -> (i32, i32, i32, i32, i32, i32, i32, i32, i32, i32) {
        (
            self.enable_boot_rom as i32,
            self.prefer_gbc as i32,
            self.audio_batch_processing as i32,
            self.graphics_batch_processing as i32,
            self.timers_batch_processing as i32,
            self.graphics_disable_scanline_rendering as i32,
            self.audio_accumulate_samples as i32,
            self.tile_rendering as i32,
            self.tile_caching as i32,
            self.enable_audio_debugging as i32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_headless_profile() {
        assert_eq!(
            CoreOptions::default().to_config_args(),
            (0, 1, 1, 0, 0, 0, 1, 0, 0, 0)
        );
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let options: CoreOptions = toml::from_str("enable_boot_rom = true").unwrap();
        assert!(options.enable_boot_rom);
        assert!(options.prefer_gbc);
        assert!(!options.tile_caching);
    }
}
