//! Turning a finished recording into a shareable animation
//!
//! # Module Organization
//!
//! - [`gif`] - In-process GIF encoder
//! - [`ffmpeg`] - Encoder that shells out to `ffmpeg`
//! - [`palette`] - Global palette construction for the GIF encoder

pub mod ffmpeg;
pub mod gif;
pub mod palette;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::recording::Recording;

pub use self::ffmpeg::FfmpegEncoder;
pub use self::gif::GifEncoder;
pub use self::palette::Palette;

/// Which encoder backend to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderKind {
    #[default]
    Gif,
    Ffmpeg,
}

/// Colour quantization strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaletteMode {
    /// One palette for the whole animation, built from every frame
    #[default]
    Global,
    /// Each frame quantized on its own
    PerFrame,
}

/// How display time is assigned to frames
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameTiming {
    /// Each frame stays up until the next sample was taken
    #[default]
    Variable,
    /// Every frame lasts `1 / max_framerate`
    Fixed,
}

/// Encoder settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub kind: EncoderKind,
    /// Integer upscale factor (nearest neighbour)
    pub scale: u32,
    pub palette: PaletteMode,
    /// Palette size cap for global palettes
    pub max_colors: usize,
    pub timing: FrameTiming,
    /// Explicit ffmpeg binary; looked up on PATH when unset
    pub ffmpeg: Option<PathBuf>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            kind: EncoderKind::Gif,
            scale: 2,
            palette: PaletteMode::Global,
            max_colors: 56,
            timing: FrameTiming::Variable,
            ffmpeg: None,
        }
    }
}

impl EncoderConfig {
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.scale > 0, "encoder.scale must be positive");
        anyhow::ensure!(
            (2..=256).contains(&self.max_colors),
            "encoder.max_colors must be between 2 and 256, got {}",
            self.max_colors
        );
        Ok(())
    }
}

/// A finished, published-ready animation file
#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    pub path: PathBuf,
    pub frame_count: usize,
    /// Playback length
    pub duration: Duration,
}

/// Consumes a finished recording and produces an animation file.
///
/// Blocks until the file is completely written.
pub trait Encoder {
    fn encode(&mut self, recording: Recording) -> Result<Animation>;
}

impl<E: Encoder + ?Sized> Encoder for Box<E> {
    fn encode(&mut self, recording: Recording) -> Result<Animation> {
        (**self).encode(recording)
    }
}

/// Build the configured encoder writing into `output_dir`
pub fn from_config(
    config: &EncoderConfig,
    output_dir: &Path,
    name: &str,
) -> Result<Box<dyn Encoder + Send>> {
    config.validate()?;
    Ok(match config.kind {
        EncoderKind::Gif => Box::new(GifEncoder::new(config.clone(), output_dir, name)),
        EncoderKind::Ffmpeg => Box::new(FfmpegEncoder::new(config.clone(), output_dir, name)?),
    })
}

/// Per-frame display times in centiseconds.
///
/// Variable timing rounds the cumulative end time of each frame, so rounding
/// error never accumulates over a long recording.
pub fn frame_delays(recording: &Recording, timing: FrameTiming) -> Vec<u16> {
    let timed = recording.timed_frames();
    match timing {
        FrameTiming::Fixed => {
            let delay = (100 / recording.max_framerate()).max(1) as u16;
            vec![delay; timed.len()]
        }
        FrameTiming::Variable => {
            let tick_rate = recording.tick_rate() as u64;
            let to_cs = |ticks: u64| (ticks * 100 + tick_rate / 2) / tick_rate;

            let mut end = 0u64;
            let mut shown = 0u64;
            timed
                .iter()
                .map(|frame| {
                    end += frame.ticks;
                    let until = to_cs(end);
                    let delay = until.saturating_sub(shown).max(1);
                    shown += delay;
                    delay.min(u16::MAX as u64) as u16
                })
                .collect()
        }
    }
}

/// Total playback time of `delays`
pub fn total_duration(delays: &[u16]) -> Duration {
    Duration::from_millis(delays.iter().map(|&d| d as u64 * 10).sum())
}

/// Nearest-neighbour integer upscale of an RGBA8 image
pub fn scale_nearest(pixels: &[u8], width: u32, height: u32, scale: u32) -> Result<Vec<u8>> {
    if scale <= 1 {
        return Ok(pixels.to_vec());
    }
    let image = image::RgbaImage::from_raw(width, height, pixels.to_vec())
        .with_context(|| format!("Frame buffer does not match {}x{}", width, height))?;
    let scaled = image::imageops::resize(
        &image,
        width * scale,
        height * scale,
        image::imageops::FilterType::Nearest,
    );
    Ok(scaled.into_raw())
}

/// Sanitize a name for use in filenames.
///
/// Replaces anything but ASCII letters and digits with single underscores
/// and lowercases the rest.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect::<String>()
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Generate a timestamped filename with a name prefix.
pub fn timestamped_filename(name: &str, suffix: &str, extension: &str) -> String {
    let now = chrono::Local::now();
    format!(
        "{}_{}_{}.{}",
        sanitize_filename(name),
        suffix,
        now.format("%Y-%m-%d_%H-%M-%S"),
        extension
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::emulator::EmulatorFactory;
    use crate::input::ControllerState;
    use crate::recording::{RecordingConfig, execute_and_record};
    use crate::test_utils::ScriptedFactory;

    /// Recording of the scripted core whose picture steps every `period` ticks
    pub(crate) fn stepping_recording(period: u64, ticks: u32) -> Recording {
        let factory = ScriptedFactory::new(move |tick, _| (tick / period) as u8);
        let mut core = factory.create().unwrap();
        let mut recording = Recording::new(&RecordingConfig::default());
        execute_and_record(&mut core, ControllerState::NONE, ticks, &mut recording).unwrap();
        recording
    }

    #[test]
    fn variable_delays_follow_tick_stamps() {
        // Picture changes after ticks 24 and 48, seen by the increments that
        // start at 20 and 44
        let recording = stepping_recording(24, 60);
        let stamps: Vec<u64> = recording
            .frames()
            .iter()
            .map(|f| f.executed_frame_count())
            .collect();
        assert_eq!(stamps, vec![0, 20, 44]);

        // Frame ends at 20, 44, 60 ticks = 33.3, 73.3, 100 cs
        let delays = frame_delays(&recording, FrameTiming::Variable);
        assert_eq!(delays, vec![33, 40, 27]);
        assert_eq!(total_duration(&delays), Duration::from_secs(1));
    }

    #[test]
    fn variable_delays_do_not_drift() {
        // 8-tick frames are 13.33cs each; cumulative rounding keeps the total
        let recording = stepping_recording(8, 600);
        let delays = frame_delays(&recording, FrameTiming::Variable);
        let total: u64 = delays.iter().map(|&d| d as u64).sum();
        assert_eq!(total, 1000);
    }

    #[test]
    fn fixed_delays_use_max_framerate() {
        let recording = stepping_recording(24, 60);
        assert_eq!(frame_delays(&recording, FrameTiming::Fixed), vec![8, 8, 8]);
    }

    #[test]
    fn scale_nearest_duplicates_pixels() {
        let pixels = [1, 1, 1, 255, 2, 2, 2, 255];
        let scaled = scale_nearest(&pixels, 2, 1, 2).unwrap();
        assert_eq!(scaled.len(), 4 * 2 * 4);
        let firsts: Vec<u8> = scaled.chunks_exact(4).map(|p| p[0]).collect();
        assert_eq!(firsts, vec![1, 1, 2, 2, 1, 1, 2, 2]);
        assert_eq!(scale_nearest(&pixels, 2, 1, 1).unwrap(), pixels.to_vec());
    }

    #[test]
    fn scale_nearest_rejects_short_buffers() {
        let pixels = [1, 1, 1, 255];
        assert!(scale_nearest(&pixels, 2, 2, 3).is_err());
    }

    #[test]
    fn sanitize_filename_collapses_separators() {
        assert_eq!(sanitize_filename("Pokemon - Red (UE) [S].gb"), "pokemon_red_ue_s_gb");
        assert_eq!(sanitize_filename("tetris"), "tetris");
    }

    #[test]
    fn timestamped_filename_has_prefix_and_extension() {
        let name = timestamped_filename("My Game", "cycle0001", "gif");
        assert!(name.starts_with("my_game_cycle0001_"));
        assert!(name.ends_with(".gif"));
    }

    #[test]
    fn config_rejects_oversized_palette() {
        let config = EncoderConfig {
            max_colors: 300,
            ..EncoderConfig::default()
        };
        assert!(config.validate().is_err());
        EncoderConfig::default().validate().unwrap();
    }
}
