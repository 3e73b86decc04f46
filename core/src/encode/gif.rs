//! In-process GIF encoder

use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::{
    Animation, Encoder, EncoderConfig, PaletteMode, frame_delays, scale_nearest,
    timestamped_filename, total_duration,
};
use crate::encode::palette::Palette;
use crate::recording::Recording;

/// Quantizer speed for per-frame palettes (1 = best, 30 = fastest)
const PER_FRAME_SPEED: i32 = 10;

/// Writes each recording as a looping GIF with per-frame delays
pub struct GifEncoder {
    config: EncoderConfig,
    output_dir: PathBuf,
    name: String,
    sequence: u64,
}

impl GifEncoder {
    pub fn new(config: EncoderConfig, output_dir: &Path, name: &str) -> Self {
        Self {
            config,
            output_dir: output_dir.to_path_buf(),
            name: name.to_string(),
            sequence: 0,
        }
    }
}

impl Encoder for GifEncoder {
    fn encode(&mut self, recording: Recording) -> Result<Animation> {
        anyhow::ensure!(!recording.is_empty(), "Recording has no frames to encode");

        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create output directory {}", self.output_dir.display())
        })?;

        self.sequence += 1;
        let suffix = format!("cycle{:04}", self.sequence);
        let path = self
            .output_dir
            .join(timestamped_filename(&self.name, &suffix, "gif"));
        let tmp_path = path.with_extension("gif.tmp");

        let file = File::create(&tmp_path).context("Failed to create GIF file")?;
        let mut writer = BufWriter::new(file);
        let duration = write_gif(&mut writer, &recording, &self.config)?;
        writer.flush().context("Failed to flush GIF file")?;
        drop(writer);
        fs::rename(&tmp_path, &path).context("Failed to move GIF into place")?;

        tracing::info!("GIF saved: {}", path.display());

        Ok(Animation {
            path,
            frame_count: recording.frames().len(),
            duration: std::time::Duration::from_millis(duration),
        })
    }
}

/// Encode `recording` into `writer`, returning playback length in milliseconds
pub fn write_gif<W: Write>(
    writer: W,
    recording: &Recording,
    config: &EncoderConfig,
) -> Result<u64> {
    let (width, height) = recording
        .dimensions()
        .context("Recording has no frame dimensions")?;
    let scale = config.scale.max(1);
    let out_w = u16::try_from(width * scale).context("Scaled GIF width exceeds 65535")?;
    let out_h = u16::try_from(height * scale).context("Scaled GIF height exceeds 65535")?;

    let delays = frame_delays(recording, config.timing);

    let mut palette = match config.palette {
        PaletteMode::Global => Some(Palette::build(
            recording.frames().iter().map(|f| f.pixels()),
            config.max_colors,
        )),
        PaletteMode::PerFrame => None,
    };
    let global_table = palette
        .as_ref()
        .map(Palette::to_rgb_table)
        .unwrap_or_default();

    let mut encoder = ::gif::Encoder::new(writer, out_w, out_h, &global_table)
        .context("Failed to create GIF encoder")?;

    // Set repeat count (0 = infinite loop)
    encoder
        .set_repeat(::gif::Repeat::Infinite)
        .context("Failed to set GIF repeat")?;

    for (sample, delay) in recording.frames().iter().zip(&delays) {
        let mut pixels = scale_nearest(sample.pixels(), width, height, scale)?;

        let mut frame = match palette.as_mut() {
            Some(palette) => ::gif::Frame {
                width: out_w,
                height: out_h,
                buffer: Cow::Owned(palette.index_frame(&pixels)),
                ..::gif::Frame::default()
            },
            None => ::gif::Frame::from_rgba_speed(out_w, out_h, &mut pixels, PER_FRAME_SPEED),
        };
        frame.delay = *delay;

        encoder
            .write_frame(&frame)
            .context("Failed to write GIF frame")?;
    }
    encoder.into_inner().context("Failed to finish GIF")?;

    Ok(total_duration(&delays).as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::tests::stepping_recording;
    use crate::encode::FrameTiming;

    fn decode(bytes: &[u8]) -> Vec<(u16, u16, u16)> {
        let mut options = ::gif::DecodeOptions::new();
        options.set_color_output(::gif::ColorOutput::RGBA);
        let mut decoder = options.read_info(bytes).unwrap();
        let mut frames = Vec::new();
        while let Some(frame) = decoder.read_next_frame().unwrap() {
            frames.push((frame.width, frame.height, frame.delay));
        }
        frames
    }

    #[test]
    fn global_palette_gif_has_variable_delays() {
        let recording = stepping_recording(24, 60);
        let mut bytes = Vec::new();
        let millis = write_gif(&mut bytes, &recording, &EncoderConfig::default()).unwrap();

        assert_eq!(millis, 1000);
        let frames = decode(&bytes);
        assert_eq!(frames, vec![(8, 4, 33), (8, 4, 40), (8, 4, 27)]);
    }

    #[test]
    fn per_frame_palette_with_fixed_timing() {
        let recording = stepping_recording(24, 60);
        let config = EncoderConfig {
            palette: PaletteMode::PerFrame,
            timing: FrameTiming::Fixed,
            scale: 1,
            ..EncoderConfig::default()
        };
        let mut bytes = Vec::new();
        write_gif(&mut bytes, &recording, &config).unwrap();

        let frames = decode(&bytes);
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|&(w, h, delay)| (w, h, delay) == (4, 2, 8)));
    }

    #[test]
    fn encode_writes_file_and_reports_animation() {
        let dir = tempfile::tempdir().unwrap();
        let mut encoder = GifEncoder::new(EncoderConfig::default(), dir.path(), "Test Game");

        let animation = encoder.encode(stepping_recording(24, 60)).unwrap();
        assert_eq!(animation.frame_count, 3);
        assert_eq!(animation.duration, std::time::Duration::from_secs(1));
        assert!(animation.path.exists());
        let name = animation.path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("test_game_cycle0001_"));

        // Only the finished GIF remains
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn empty_recording_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut encoder = GifEncoder::new(EncoderConfig::default(), dir.path(), "empty");
        let recording = Recording::new(&crate::recording::RecordingConfig::default());
        assert!(encoder.encode(recording).is_err());
    }
}
