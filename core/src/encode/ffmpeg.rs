//! GIF encoding through an external `ffmpeg` process
//!
//! Frames are written as numbered PNGs into a scratch directory. With fixed
//! timing ffmpeg reads them as an image sequence at the recording's maximum
//! framerate; with variable timing an `ffconcat` list carries each frame's
//! display time. Both run ffmpeg's two-pass `palettegen`/`paletteuse`.

use std::ffi::OsString;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};

use super::{
    Animation, Encoder, EncoderConfig, FrameTiming, PaletteMode, frame_delays, scale_nearest,
    timestamped_filename, total_duration,
};
use crate::recording::Recording;

const FRAME_PATTERN: &str = "frame_%05d.png";
const CONCAT_LIST: &str = "frames.ffconcat";

fn frame_file_name(index: usize) -> String {
    format!("frame_{:05}.png", index)
}

/// Encodes recordings by running ffmpeg over a PNG sequence
pub struct FfmpegEncoder {
    config: EncoderConfig,
    output_dir: PathBuf,
    name: String,
    program: PathBuf,
    sequence: u64,
}

impl FfmpegEncoder {
    /// Uses `config.ffmpeg` if set, otherwise finds `ffmpeg` on PATH
    pub fn new(config: EncoderConfig, output_dir: &Path, name: &str) -> Result<Self> {
        let program = match &config.ffmpeg {
            Some(path) => path.clone(),
            None => which::which("ffmpeg").context("ffmpeg not found on PATH")?,
        };
        Ok(Self {
            config,
            output_dir: output_dir.to_path_buf(),
            name: name.to_string(),
            program,
            sequence: 0,
        })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Encoder for FfmpegEncoder {
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

        let scratch = tempfile::tempdir().context("Failed to create frame directory")?;
        let files = write_frames(scratch.path(), &recording, self.config.scale)?;
        let delays = frame_delays(&recording, self.config.timing);

        let input = match self.config.timing {
            FrameTiming::Fixed => FfmpegInput::Sequence {
                pattern: scratch.path().join(FRAME_PATTERN),
                framerate: recording.max_framerate(),
            },
            FrameTiming::Variable => {
                let list = scratch.path().join(CONCAT_LIST);
                fs::write(&list, concat_list(&files, &delays))
                    .context("Failed to write ffconcat list")?;
                FfmpegInput::Concat { list }
            }
        };

        let output = Command::new(&self.program)
            .args(ffmpeg_args(&input, &self.config, &tmp_path))
            .output()
            .with_context(|| format!("Failed to run {}", self.program.display()))?;

        if !output.status.success() {
            let _ = fs::remove_file(&tmp_path);
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("ffmpeg failed ({}): {}", output.status, stderr.trim());
        }

        fs::rename(&tmp_path, &path).context("Failed to move GIF into place")?;
        tracing::info!("GIF saved: {}", path.display());

        Ok(Animation {
            path,
            frame_count: files.len(),
            duration: match self.config.timing {
                FrameTiming::Variable => total_duration(&delays),
                FrameTiming::Fixed => Duration::from_secs_f64(
                    files.len() as f64 / recording.max_framerate() as f64,
                ),
            },
        })
    }
}

/// Where ffmpeg reads frames from
#[derive(Debug, Clone, PartialEq)]
pub enum FfmpegInput {
    /// Numbered images at a fixed rate
    Sequence { pattern: PathBuf, framerate: u32 },
    /// `ffconcat` list with per-file durations
    Concat { list: PathBuf },
}

/// Write every sample as a scaled PNG named `frame_NNNNN.png`
pub fn write_frames(dir: &Path, recording: &Recording, scale: u32) -> Result<Vec<String>> {
    let (width, height) = recording
        .dimensions()
        .context("Recording has no frame dimensions")?;
    let scale = scale.max(1);

    recording
        .frames()
        .iter()
        .enumerate()
        .map(|(i, sample)| {
            let name = frame_file_name(i);
            let pixels = scale_nearest(sample.pixels(), width, height, scale)?;
            let image = image::RgbaImage::from_raw(width * scale, height * scale, pixels)
                .context("Frame buffer does not match recording dimensions")?;
            image
                .save(dir.join(&name))
                .with_context(|| format!("Failed to write {}", name))?;
            Ok(name)
        })
        .collect()
}

/// `ffconcat` list giving each file its delay.
///
/// The concat demuxer ignores the duration of the final entry, so the last
/// file is listed once more.
pub fn concat_list(files: &[String], delays_cs: &[u16]) -> String {
    let mut list = String::from("ffconcat version 1.0\n");
    for (file, delay) in files.iter().zip(delays_cs) {
        let _ = writeln!(list, "file '{}'", file);
        let _ = writeln!(list, "duration {:.2}", *delay as f64 / 100.0);
    }
    if let Some(last) = files.last() {
        let _ = writeln!(list, "file '{}'", last);
    }
    list
}

/// Full ffmpeg argument list writing a GIF to `output`
pub fn ffmpeg_args(input: &FfmpegInput, config: &EncoderConfig, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-y".into(), "-loglevel".into(), "error".into()];

    match input {
        FfmpegInput::Sequence { pattern, framerate } => {
            args.extend(["-framerate".into(), framerate.to_string().into()]);
            args.extend(["-i".into(), pattern.as_os_str().to_owned()]);
        }
        FfmpegInput::Concat { list } => {
            args.extend(["-f".into(), "concat".into(), "-safe".into(), "0".into()]);
            args.extend(["-i".into(), list.as_os_str().to_owned()]);
            args.extend(["-fps_mode".into(), "vfr".into()]);
        }
    }

    args.extend(["-filter_complex".into(), filter_graph(config).into()]);
    args.extend(["-f".into(), "gif".into(), output.as_os_str().to_owned()]);
    args
}

/// Two-pass palette filter graph
fn filter_graph(config: &EncoderConfig) -> String {
    let (gen_opts, use_opts) = match config.palette {
        PaletteMode::Global => (String::new(), ""),
        PaletteMode::PerFrame => (":stats_mode=single".to_string(), "=new=1"),
    };
    format!(
        "[0:v]split[a][b];[a]palettegen=max_colors={}{}[p];[b][p]paletteuse{}",
        config.max_colors, gen_opts, use_opts
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::tests::stepping_recording;

    fn args_string(args: &[OsString]) -> String {
        args.iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn concat_list_repeats_last_file() {
        let files = vec![frame_file_name(0), frame_file_name(1)];
        let list = concat_list(&files, &[33, 40]);
        assert_eq!(
            list,
            "ffconcat version 1.0\n\
             file 'frame_00000.png'\nduration 0.33\n\
             file 'frame_00001.png'\nduration 0.40\n\
             file 'frame_00001.png'\n"
        );
    }

    #[test]
    fn sequence_args_use_max_framerate() {
        let input = FfmpegInput::Sequence {
            pattern: PathBuf::from("/tmp/x/frame_%05d.png"),
            framerate: 12,
        };
        let args = args_string(&ffmpeg_args(&input, &EncoderConfig::default(), Path::new("out.gif")));
        assert!(args.contains("-framerate 12 -i /tmp/x/frame_%05d.png"));
        assert!(args.contains("palettegen=max_colors=56[p]"));
        assert!(args.ends_with("-f gif out.gif"));
    }

    #[test]
    fn concat_args_with_per_frame_palette() {
        let input = FfmpegInput::Concat {
            list: PathBuf::from("list.ffconcat"),
        };
        let config = EncoderConfig {
            palette: PaletteMode::PerFrame,
            ..EncoderConfig::default()
        };
        let args = args_string(&ffmpeg_args(&input, &config, Path::new("out.gif")));
        assert!(args.contains("-f concat -safe 0 -i list.ffconcat -fps_mode vfr"));
        assert!(args.contains("stats_mode=single"));
        assert!(args.contains("paletteuse=new=1"));
    }

    #[test]
    fn frames_are_written_as_scaled_pngs() {
        let dir = tempfile::tempdir().unwrap();
        let recording = stepping_recording(24, 60);

        let files = write_frames(dir.path(), &recording, 3).unwrap();
        assert_eq!(files, vec!["frame_00000.png", "frame_00001.png", "frame_00002.png"]);

        let image = image::open(dir.path().join(&files[1])).unwrap().to_rgba8();
        assert_eq!(image.dimensions(), (12, 6));
        assert_eq!(image.get_pixel(0, 0).0, [1, 1, 1, 1]);
    }

    #[test]
    fn missing_program_fails_the_encode() {
        let dir = tempfile::tempdir().unwrap();
        let config = EncoderConfig {
            kind: crate::encode::EncoderKind::Ffmpeg,
            ffmpeg: Some(dir.path().join("no-such-ffmpeg")),
            ..EncoderConfig::default()
        };
        let mut encoder = FfmpegEncoder::new(config, dir.path(), "game").unwrap();
        assert!(encoder.encode(stepping_recording(24, 60)).is_err());
    }
}
