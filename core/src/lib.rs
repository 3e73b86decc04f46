//! Playcast Core - Automated Game Boy playthroughs
//!
//! This crate drives a WebAssembly Game Boy core through audience-chosen
//! inputs, records what happens as a deduplicated animation, and decides on
//! its own when the game is waiting for the next input.
//!
//! # Architecture
//!
//! - [`Emulator`] / [`EmulatorFactory`] - Session traits; [`WasmBoy`] is the real core
//! - [`Recording`] - Deduplicated, tick-stamped frame samples
//! - [`IdleDetector`] - Forks the session to test whether any input would matter
//! - [`PlaybackDriver`] - Runs cycles: inputs, idle wait, persist, encode, publish
//! - [`Encoder`] / [`Audience`] - Where finished recordings go and selections come from

pub mod audience;
pub mod config;
pub mod driver;
pub mod emulator;
pub mod encode;
pub mod idle;
pub mod input;
pub mod recording;
pub mod save_store;
#[cfg(test)]
pub mod test_utils;
pub mod wasm;

pub use audience::{Audience, ChannelAudience};
pub use config::{CONFIG_FILE_NAME, PlaycastConfig};
pub use driver::{CycleConfig, CycleError, CycleReport, CycleStep, PlaybackDriver};
pub use emulator::{Emulator, EmulatorFactory, SnapshotOf};
pub use encode::{Animation, Encoder, EncoderConfig, EncoderKind, FrameTiming, PaletteMode};
pub use idle::{Divergence, IdleConfig, IdleDetector, IdleOutcome, IdleReport, ProbeStrategy};
pub use input::{Button, ControllerState, ParseInputError, Selection};
pub use recording::{FrameSample, Recording, RecordingConfig, TimedFrame, execute_and_record};
pub use save_store::{SaveStore, SaveStoreError};
pub use wasm::{
    CoreLayout, CoreOptions, LayoutError, SCREEN_HEIGHT, SCREEN_WIDTH, SaveState, WasmBoy,
    WasmBoyFactory, WasmEngine,
};
