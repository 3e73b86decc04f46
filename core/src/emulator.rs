//! Emulator traits
//!
//! The recording buffer, idle detector and playback driver only talk to the
//! emulation core through these traits. [`crate::wasm::WasmBoy`] is the real
//! implementation; tests use a scripted double.
//!
//! - [`Emulator`] - one independent, running copy of the core
//! - [`EmulatorFactory`] - creates fresh copies with the program loaded and
//!   configured, and forks copies from a snapshot

use anyhow::Result;

use crate::input::ControllerState;

/// One independent emulation session
///
/// Every instance owns its memory outright. Advancing or restoring one
/// session never affects another.
pub trait Emulator {
    /// Full-state capture sufficient to resume or fork execution
    type Snapshot: Clone + Send + Sync;

    /// Frame dimensions in pixels (width, height)
    fn dimensions(&self) -> (u32, u32);

    /// Set the buttons held from now on
    fn set_input(&mut self, input: ControllerState) -> Result<()>;

    /// Execute `ticks` frames with the current input
    fn advance(&mut self, ticks: u32) -> Result<()>;

    /// Read the current frame as tightly packed RGBA8
    fn capture_frame(&self) -> Result<Vec<u8>>;

    /// Capture the complete session state
    fn snapshot(&mut self) -> Result<Self::Snapshot>;

    /// Replace the session state with a previous capture
    fn restore(&mut self, snapshot: &Self::Snapshot) -> Result<()>;

    /// Drop audio samples accumulated by the core
    ///
    /// The core never drains its own audio buffer; owners must call this
    /// periodically to keep memory bounded.
    fn clear_audio(&mut self) -> Result<()>;

    /// Set `input`, advance `ticks`, and capture the resulting frame
    fn probe(&mut self, input: ControllerState, ticks: u32) -> Result<Vec<u8>> {
        self.set_input(input)?;
        self.advance(ticks)?;
        self.capture_frame()
    }
}

/// Creates emulation sessions that share a program image and configuration
///
/// Factories are shared between threads when probes run in parallel, so the
/// program image and configuration they hold must be read-only.
pub trait EmulatorFactory: Sync {
    type Emulator: Emulator;

    /// Create a fresh session with the program loaded and configured
    fn create(&self) -> Result<Self::Emulator>;

    /// Create a fresh session and restore it from `snapshot`
    fn fork(
        &self,
        snapshot: &<Self::Emulator as Emulator>::Snapshot,
    ) -> Result<Self::Emulator> {
        let mut emulator = self.create()?;
        emulator.restore(snapshot)?;
        Ok(emulator)
    }
}

/// Snapshot type produced by a factory's sessions
pub type SnapshotOf<F> = <<F as EmulatorFactory>::Emulator as Emulator>::Snapshot;
