//! Deduplicating frame recorder
//!
//! The core is always advanced in small fixed increments. After each
//! increment the recorder may sample the screen, but a sample is only kept
//! when it differs from the previously kept one. Static scenes therefore
//! collapse into one long-lived frame, and the real display time of each
//! frame is recovered from the tick stamps of consecutive samples.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::emulator::Emulator;
use crate::input::ControllerState;

/// Recording settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Highest rate at which samples are taken (frames per second)
    pub max_framerate: u32,
    /// Core ticks per second
    pub tick_rate: u32,
    /// Ticks executed between sampling opportunities
    pub increment_ticks: u32,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            max_framerate: 12,
            tick_rate: 60,
            increment_ticks: 4,
        }
    }
}

/// One kept screen sample
#[derive(Debug, Clone)]
pub struct FrameSample {
    executed_frame_count: u64,
    pixels: Vec<u8>,
    digest: u64,
}

impl FrameSample {
    /// Recording cursor value when this sample was taken
    pub fn executed_frame_count(&self) -> u64 {
        self.executed_frame_count
    }

    /// RGBA8 pixels
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// True if `pixels` are bitwise identical to this sample's
    fn same_picture(&self, pixels: &[u8], digest: u64) -> bool {
        self.digest == digest && self.pixels == pixels
    }
}

/// A kept sample together with how long it stays on screen
#[derive(Debug, Clone, Copy)]
pub struct TimedFrame<'a> {
    pub sample: &'a FrameSample,
    /// Display time in core ticks
    pub ticks: u64,
}

impl TimedFrame<'_> {
    pub fn seconds(&self, tick_rate: u32) -> f64 {
        self.ticks as f64 / tick_rate.max(1) as f64
    }
}

/// Deduplicated, tick-stamped frame samples for one cycle
#[derive(Debug, Clone)]
pub struct Recording {
    max_framerate: u32,
    tick_rate: u32,
    increment_ticks: u32,
    executed_frame_count: u64,
    ticks_since_sample: u64,
    dimensions: Option<(u32, u32)>,
    frames: Vec<FrameSample>,
}

impl Recording {
    pub fn new(config: &RecordingConfig) -> Self {
        Self {
            max_framerate: config.max_framerate.max(1),
            tick_rate: config.tick_rate.max(1),
            increment_ticks: config.increment_ticks.max(1),
            executed_frame_count: 0,
            ticks_since_sample: 0,
            dimensions: None,
            frames: Vec::new(),
        }
    }

    pub fn max_framerate(&self) -> u32 {
        self.max_framerate
    }

    pub fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    /// Total ticks executed through this recording
    pub fn executed_frame_count(&self) -> u64 {
        self.executed_frame_count
    }

    pub fn frames(&self) -> &[FrameSample] {
        &self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame size in pixels, known once the first sample is kept
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    /// Minimum ticks between samples: `ceil(tick_rate / max_framerate)`
    pub fn sample_interval(&self) -> u64 {
        (self.tick_rate as u64).div_ceil(self.max_framerate as u64)
    }

    /// Total recorded time in seconds
    pub fn duration_secs(&self) -> f64 {
        self.executed_frame_count as f64 / self.tick_rate as f64
    }

    fn due_for_sample(&self) -> bool {
        self.frames.is_empty() || self.ticks_since_sample >= self.sample_interval()
    }

    /// Keep `pixels` stamped at `at` unless they repeat the last kept sample.
    ///
    /// Returns true if the sample was kept.
    fn offer(&mut self, at: u64, pixels: Vec<u8>) -> bool {
        let digest = xxhash_rust::xxh3::xxh3_64(&pixels);
        if let Some(last) = self.frames.last()
            && last.same_picture(&pixels, digest)
        {
            return false;
        }
        self.frames.push(FrameSample {
            executed_frame_count: at,
            pixels,
            digest,
        });
        self.ticks_since_sample = 0;
        true
    }

    /// Samples with their display durations.
    ///
    /// Each sample lasts until the next one was taken; the last one lasts
    /// until the end of the recording.
    pub fn timed_frames(&self) -> Vec<TimedFrame<'_>> {
        let ends = self
            .frames
            .iter()
            .skip(1)
            .map(FrameSample::executed_frame_count)
            .chain(std::iter::once(self.executed_frame_count));

        self.frames
            .iter()
            .zip(ends)
            .map(|(sample, end)| TimedFrame {
                sample,
                ticks: end.saturating_sub(sample.executed_frame_count),
            })
            .collect()
    }
}

/// Run `session` for `ticks` ticks holding `input`, sampling into `recording`.
///
/// The session advances in increments of the recording's increment size (the
/// last one shortened if needed). The recording cursor always moves by the
/// full `ticks`, whether or not anything was kept.
pub fn execute_and_record<E: Emulator>(
    session: &mut E,
    input: ControllerState,
    ticks: u32,
    recording: &mut Recording,
) -> Result<()> {
    session.set_input(input)?;

    let mut remaining = ticks;
    while remaining > 0 {
        let step = remaining.min(recording.increment_ticks);
        session.advance(step)?;
        recording.ticks_since_sample += step as u64;

        if recording.due_for_sample() {
            let pixels = session.capture_frame()?;
            if recording.dimensions.is_none() {
                recording.dimensions = Some(session.dimensions());
            }
            recording.offer(recording.executed_frame_count, pixels);
        }

        recording.executed_frame_count += step as u64;
        remaining -= step;
    }

    Ok(())
}
