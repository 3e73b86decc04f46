//! Speculative idle detection
//!
//! Decides, without any knowledge of the game, whether it is waiting for the
//! player. Each round lets the primary session run (recorded) and then asks:
//! "if someone pressed a button right now, would the next few ticks look any
//! different from pressing nothing?"
//!
//! - The primary advances a short probe window with no input. This is the
//!   control frame, and the advance is kept as real progress.
//! - For every candidate button, a fresh fork restored from the pre-probe
//!   snapshot advances the same window holding that button.
//! - Any fork whose frame differs from the control means the game reacts to
//!   input right now, so waiting stops. Scripted animation changes the control
//!   too, which is why it never counts as a reaction.
//!
//! The per-candidate results are OR-ed. Forks share nothing but a read-only
//! snapshot, so they may be evaluated in any order or in parallel.

use anyhow::Result;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::emulator::{Emulator, EmulatorFactory, SnapshotOf};
use crate::input::{Button, ControllerState};
use crate::recording::{Recording, execute_and_record};

/// How candidate probes are evaluated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStrategy {
    /// One fork at a time, stopping at the first divergence
    #[default]
    Sequential,
    /// All forks at once on the rayon pool, results OR-ed
    Parallel,
}

/// Idle detector settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdleConfig {
    /// Length of one round in ticks (recorded wait plus probe window)
    pub round_ticks: u32,
    /// Ticks each probe runs before frames are compared
    pub probe_ticks: u32,
    /// Rounds after which waiting stops regardless of outcome
    pub max_rounds: u32,
    /// Buttons tried in every round
    pub candidates: Vec<Button>,
    pub strategy: ProbeStrategy,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            round_ticks: 60,
            probe_ticks: 4,
            max_rounds: 30,
            candidates: vec![
                Button::A,
                Button::B,
                Button::Up,
                Button::Down,
                Button::Left,
                Button::Right,
            ],
            strategy: ProbeStrategy::Sequential,
        }
    }
}

impl IdleConfig {
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.probe_ticks > 0, "idle.probe_ticks must be positive");
        anyhow::ensure!(
            self.probe_ticks <= self.round_ticks,
            "idle.probe_ticks ({}) must not exceed idle.round_ticks ({})",
            self.probe_ticks,
            self.round_ticks
        );
        anyhow::ensure!(self.max_rounds > 0, "idle.max_rounds must be positive");
        anyhow::ensure!(
            !self.candidates.is_empty(),
            "idle.candidates must name at least one button"
        );
        Ok(())
    }

    /// Recorded ticks at the start of each round
    pub fn wait_ticks(&self) -> u32 {
        self.round_ticks.saturating_sub(self.probe_ticks)
    }
}

/// Why a round counted as divergent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Divergence {
    /// Holding this input produced a different frame than the control
    Changed(ControllerState),
    /// The fork for this input could not be created or run
    ProbeFailed(ControllerState),
}

impl Divergence {
    pub fn input(&self) -> ControllerState {
        match self {
            Divergence::Changed(input) | Divergence::ProbeFailed(input) => *input,
        }
    }
}

/// How the waiting loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleOutcome {
    /// The game reacts to input (1-based round number)
    Responsive { round: u32, divergence: Divergence },
    /// `max_rounds` passed without any divergence
    Exhausted,
}

/// Result of [`IdleDetector::run`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleReport {
    pub outcome: IdleOutcome,
    pub rounds: u32,
    /// Ticks executed on the primary session
    pub ticks: u64,
}

/// Runs idle rounds against a primary session
#[derive(Debug, Clone)]
pub struct IdleDetector {
    config: IdleConfig,
    candidates: Vec<ControllerState>,
}

impl IdleDetector {
    pub fn new(config: IdleConfig) -> Self {
        let candidates = config
            .candidates
            .iter()
            .copied()
            .map(ControllerState::pressing)
            .collect();
        Self { config, candidates }
    }

    pub fn config(&self) -> &IdleConfig {
        &self.config
    }

    /// Wait (recording) until the game reacts to input or rounds run out
    pub fn run<F: EmulatorFactory>(
        &self,
        factory: &F,
        primary: &mut F::Emulator,
        recording: &mut Recording,
    ) -> Result<IdleReport> {
        let mut ticks = 0u64;

        for round in 1..=self.config.max_rounds {
            let wait = self.config.wait_ticks();
            execute_and_record(primary, ControllerState::NONE, wait, recording)?;
            let snapshot = primary.snapshot()?;
            let control = primary.probe(ControllerState::NONE, self.config.probe_ticks)?;
            ticks += (wait + self.config.probe_ticks) as u64;

            if let Some(divergence) = self.probe_round(factory, &snapshot, &control) {
                tracing::debug!("idle round {}: diverged ({:?})", round, divergence);
                return Ok(IdleReport {
                    outcome: IdleOutcome::Responsive { round, divergence },
                    rounds: round,
                    ticks,
                });
            }
            tracing::debug!(
                "idle round {}/{}: no divergence",
                round,
                self.config.max_rounds
            );
        }

        Ok(IdleReport {
            outcome: IdleOutcome::Exhausted,
            rounds: self.config.max_rounds,
            ticks,
        })
    }

    /// Probe every candidate from `snapshot` and compare against `control`.
    ///
    /// Returns the first divergence in candidate order, if any.
    pub fn probe_round<F: EmulatorFactory>(
        &self,
        factory: &F,
        snapshot: &SnapshotOf<F>,
        control: &[u8],
    ) -> Option<Divergence> {
        let ticks = self.config.probe_ticks;
        match self.config.strategy {
            ProbeStrategy::Sequential => self
                .candidates
                .iter()
                .find_map(|input| probe_candidate(factory, snapshot, *input, ticks, control)),
            ProbeStrategy::Parallel => {
                let results: Vec<Option<Divergence>> = self
                    .candidates
                    .par_iter()
                    .map(|input| probe_candidate(factory, snapshot, *input, ticks, control))
                    .collect();
                results.into_iter().flatten().next()
            }
        }
    }
}

/// Run one candidate on its own fork. The fork is dropped before returning.
fn probe_candidate<F: EmulatorFactory>(
    factory: &F,
    snapshot: &SnapshotOf<F>,
    input: ControllerState,
    ticks: u32,
    control: &[u8],
) -> Option<Divergence> {
    let frame = factory
        .fork(snapshot)
        .and_then(|mut fork| fork.probe(input, ticks));

    match frame {
        Ok(frame) => (frame != control).then_some(Divergence::Changed(input)),
        Err(e) => {
            tracing::warn!("probe for {} failed, treating as divergent: {:#}", input, e);
            Some(Divergence::ProbeFailed(input))
        }
    }
}
