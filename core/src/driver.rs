//! Playback driver: the per-cycle orchestrator
//!
//! A cycle runs strictly in order:
//!
//! 1. Apply queued presses (press window, then settle window, both recorded)
//! 2. Wait with the [`IdleDetector`] until the game wants input
//! 3. Cool down (recorded)
//! 4. Persist the primary's state to the save slot
//! 5. Drain the core's audio buffer
//! 6. Encode the recording
//! 7. Publish it and wait for the audience's next selection
//!
//! Errors end the cycle, never the loop. Emulation failures on the primary
//! additionally rebuild it from the save slot.

use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::audience::Audience;
use crate::config::PlaycastConfig;
use crate::emulator::{Emulator, EmulatorFactory, SnapshotOf};
use crate::encode::{Animation, Encoder};
use crate::idle::{IdleDetector, IdleReport};
use crate::input::{ControllerState, Selection};
use crate::recording::{Recording, RecordingConfig, execute_and_record};
use crate::save_store::{SaveStore, SaveStoreError};

/// Tick windows of one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Ticks a queued press is held
    pub press_ticks: u32,
    /// Ticks of no input after each press
    pub settle_ticks: u32,
    /// Recorded ticks after idle detection stops
    pub cooldown_ticks: u32,
    /// Ticks run right after the primary is (re)built
    pub warmup_ticks: u32,
    /// Largest repeat count an audience multiplier can ask for
    pub max_multiplier: u32,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            press_ticks: 4,
            settle_ticks: 26,
            cooldown_ticks: 240,
            warmup_ticks: 1,
            max_multiplier: 9,
        }
    }
}

/// Cycle step that touches the primary session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStep {
    Inputs,
    Idle,
    Cooldown,
    Snapshot,
    ClearAudio,
}

impl fmt::Display for CycleStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleStep::Inputs => "queued inputs",
            CycleStep::Idle => "idle detection",
            CycleStep::Cooldown => "cool-down",
            CycleStep::Snapshot => "snapshot",
            CycleStep::ClearAudio => "audio drain",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("emulation failed during {step}: {source:#}")]
    Emulation {
        step: CycleStep,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to persist state: {0}")]
    Persist(#[from] SaveStoreError),
    #[error("encoding failed: {0:#}")]
    Encode(#[source] anyhow::Error),
    #[error("publishing failed: {0:#}")]
    Publish(#[source] anyhow::Error),
    #[error("audience input failed: {0:#}")]
    Audience(#[source] anyhow::Error),
    #[error("audience closed")]
    AudienceClosed,
}

impl CycleError {
    fn emulation(step: CycleStep) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| CycleError::Emulation { step, source }
    }
}

/// What a completed cycle did
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    pub idle: IdleReport,
    pub animation: Animation,
    /// Presses queued for the next cycle
    pub queued: usize,
}

/// Owns the primary session and runs playthrough cycles
pub struct PlaybackDriver<F: EmulatorFactory, E, A> {
    factory: F,
    primary: F::Emulator,
    save_store: SaveStore,
    encoder: E,
    audience: A,
    idle: IdleDetector,
    recording: RecordingConfig,
    cycle: CycleConfig,
    queue: VecDeque<ControllerState>,
    multiplier: u32,
    cycles: u64,
}

impl<F, E, A> PlaybackDriver<F, E, A>
where
    F: EmulatorFactory,
    SnapshotOf<F>: Serialize + DeserializeOwned,
    E: Encoder,
    A: Audience,
{
    /// Build the primary session, restoring the save slot if it holds a state.
    ///
    /// A corrupt save slot is an error.
    pub fn start(
        factory: F,
        save_store: SaveStore,
        encoder: E,
        audience: A,
        config: &PlaycastConfig,
    ) -> Result<Self> {
        let primary = build_primary(&factory, &save_store, &config.cycle)?;
        Ok(Self {
            factory,
            primary,
            save_store,
            encoder,
            audience,
            idle: IdleDetector::new(config.idle.clone()),
            recording: config.recording.clone(),
            cycle: config.cycle.clone(),
            queue: VecDeque::new(),
            multiplier: 1,
            cycles: 0,
        })
    }

    /// Queue presses for the next cycle
    pub fn queue_inputs(&mut self, inputs: impl IntoIterator<Item = ControllerState>) {
        self.queue.extend(inputs);
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    /// Completed or abandoned cycles so far
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn primary(&self) -> &F::Emulator {
        &self.primary
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    pub fn audience(&self) -> &A {
        &self.audience
    }

    /// Run cycles until the audience closes or `max_cycles` have run.
    ///
    /// Only a failure to rebuild the primary ends the loop with an error.
    pub fn run(&mut self, max_cycles: Option<u64>) -> Result<()> {
        loop {
            if let Some(max) = max_cycles
                && self.cycles >= max
            {
                tracing::info!("Stopping after {} cycles", self.cycles);
                return Ok(());
            }

            let started = Instant::now();
            let result = self.run_cycle();
            self.cycles += 1;

            match result {
                Ok(report) => {
                    tracing::info!(
                        "Cycle {} finished in {:.1?}: {} frames over {:.1}s, {} press(es) queued",
                        report.cycle,
                        started.elapsed(),
                        report.animation.frame_count,
                        report.animation.duration.as_secs_f64(),
                        report.queued
                    );
                }
                Err(CycleError::AudienceClosed) => {
                    tracing::info!("Audience closed, stopping");
                    return Ok(());
                }
                Err(e @ CycleError::Emulation { .. }) => {
                    tracing::error!("Cycle {} abandoned: {}", self.cycles, e);
                    self.reset()?;
                }
                Err(e) => {
                    tracing::error!("Cycle {} abandoned: {}", self.cycles, e);
                }
            }
        }
    }

    /// Run one full cycle
    pub fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        let cycle = self.cycles + 1;
        let mut recording = Recording::new(&self.recording);

        self.apply_queue(&mut recording)
            .map_err(CycleError::emulation(CycleStep::Inputs))?;

        let idle = self
            .idle
            .run(&self.factory, &mut self.primary, &mut recording)
            .map_err(CycleError::emulation(CycleStep::Idle))?;
        tracing::debug!("Idle detection: {:?} after {} rounds", idle.outcome, idle.rounds);

        execute_and_record(
            &mut self.primary,
            ControllerState::NONE,
            self.cycle.cooldown_ticks,
            &mut recording,
        )
        .map_err(CycleError::emulation(CycleStep::Cooldown))?;

        let snapshot = self
            .primary
            .snapshot()
            .map_err(CycleError::emulation(CycleStep::Snapshot))?;
        self.save_store.save(&snapshot)?;

        self.primary
            .clear_audio()
            .map_err(CycleError::emulation(CycleStep::ClearAudio))?;

        let encode_started = Instant::now();
        let frames = recording.frames().len();
        let animation = self.encoder.encode(recording).map_err(CycleError::Encode)?;
        tracing::info!("Encoded {} frames in {:.1?}", frames, encode_started.elapsed());

        self.audience
            .publish(&animation)
            .map_err(CycleError::Publish)?;
        self.await_selection()?;

        Ok(CycleReport {
            cycle,
            idle,
            animation,
            queued: self.queue.len(),
        })
    }

    /// Presses stay queued until all of them ran, so a reset replays them
    fn apply_queue(&mut self, recording: &mut Recording) -> Result<()> {
        for &input in &self.queue {
            tracing::debug!("Pressing {}", input);
            execute_and_record(&mut self.primary, input, self.cycle.press_ticks, recording)?;
            execute_and_record(
                &mut self.primary,
                ControllerState::NONE,
                self.cycle.settle_ticks,
                recording,
            )?;
        }
        self.queue.clear();
        Ok(())
    }

    /// Block until a button is chosen; multipliers only change the repeat count.
    fn await_selection(&mut self) -> Result<(), CycleError> {
        loop {
            let selection = self
                .audience
                .next_selection()
                .map_err(CycleError::Audience)?;

            match selection {
                None => return Err(CycleError::AudienceClosed),
                Some(Selection::Multiplier(n)) => {
                    self.multiplier = n.clamp(1, self.cycle.max_multiplier.max(1));
                    if self.multiplier != n {
                        tracing::warn!("Multiplier {} clamped to {}", n, self.multiplier);
                    }
                    tracing::info!("Next press repeats {} time(s)", self.multiplier);
                }
                Some(Selection::Press(button)) => {
                    let count = self.multiplier as usize;
                    tracing::info!("Selected {} x{}", button, count);
                    self.queue
                        .extend(std::iter::repeat_n(ControllerState::pressing(button), count));
                    self.multiplier = 1;
                    return Ok(());
                }
            }
        }
    }

    /// Rebuild the primary from the save slot
    fn reset(&mut self) -> Result<()> {
        tracing::warn!("Rebuilding primary session from {}", self.save_store.path().display());
        self.primary = build_primary(&self.factory, &self.save_store, &self.cycle)?;
        Ok(())
    }
}

fn build_primary<F>(factory: &F, save_store: &SaveStore, cycle: &CycleConfig) -> Result<F::Emulator>
where
    F: EmulatorFactory,
    SnapshotOf<F>: DeserializeOwned,
{
    let mut primary = factory.create()?;
    if let Some(snapshot) = save_store.load::<SnapshotOf<F>>()? {
        primary.restore(&snapshot)?;
        tracing::info!("Restored state from {}", save_store.path().display());
    }
    primary.advance(cycle.warmup_ticks)?;
    Ok(primary)
}
