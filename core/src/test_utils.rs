//! Shared test utilities for unit tests

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::emulator::{Emulator, EmulatorFactory};
use crate::input::ControllerState;

/// Picture function: (ticks executed so far, held input) -> fill byte
pub type RenderFn = Arc<dyn Fn(u64, ControllerState) -> u8 + Send + Sync>;

/// A solid frame of the scripted core's size
pub fn solid(value: u8) -> Vec<u8> {
    let (w, h) = ScriptedFactory::DIMENSIONS;
    vec![value; (w * h * 4) as usize]
}

// ============================================================================
// Scripted Core
// ============================================================================

/// Deterministic stand-in for the emulation core.
///
/// Its whole state is the tick counter and the held input; the picture is
/// whatever the render function says for that state.
pub struct ScriptedCore {
    tick: u64,
    input: ControllerState,
    render: RenderFn,
    fail_at: Option<u64>,
    pub audio_clears: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedSnapshot {
    pub tick: u64,
    pub input: ControllerState,
}

impl ScriptedCore {
    pub fn tick(&self) -> u64 {
        self.tick
    }
}

impl Emulator for ScriptedCore {
    type Snapshot = ScriptedSnapshot;

    fn dimensions(&self) -> (u32, u32) {
        ScriptedFactory::DIMENSIONS
    }

    fn set_input(&mut self, input: ControllerState) -> Result<()> {
        self.input = input;
        Ok(())
    }

    fn advance(&mut self, ticks: u32) -> Result<()> {
        if let Some(limit) = self.fail_at
            && self.tick + ticks as u64 > limit
        {
            anyhow::bail!("scripted core crashed past tick {}", limit);
        }
        self.tick += ticks as u64;
        Ok(())
    }

    fn capture_frame(&self) -> Result<Vec<u8>> {
        Ok(solid((self.render)(self.tick, self.input)))
    }

    fn snapshot(&mut self) -> Result<ScriptedSnapshot> {
        Ok(ScriptedSnapshot {
            tick: self.tick,
            input: self.input,
        })
    }

    fn restore(&mut self, snapshot: &ScriptedSnapshot) -> Result<()> {
        self.tick = snapshot.tick;
        self.input = snapshot.input;
        Ok(())
    }

    fn clear_audio(&mut self) -> Result<()> {
        self.audio_clears += 1;
        Ok(())
    }
}

/// Factory for [`ScriptedCore`]s that counts what it hands out
pub struct ScriptedFactory {
    render: RenderFn,
    fail_forks: bool,
    fail_at: Option<u64>,
    created: AtomicUsize,
    forked: AtomicUsize,
}

impl ScriptedFactory {
    pub const DIMENSIONS: (u32, u32) = (4, 2);

    pub fn new(render: impl Fn(u64, ControllerState) -> u8 + Send + Sync + 'static) -> Self {
        Self {
            render: Arc::new(render),
            fail_forks: false,
            fail_at: None,
            created: AtomicUsize::new(0),
            forked: AtomicUsize::new(0),
        }
    }

    /// Make every fork fail to restore
    pub fn failing_forks(mut self) -> Self {
        self.fail_forks = true;
        self
    }

    /// Make every core fail to advance beyond `tick`
    pub fn failing_at(mut self, tick: u64) -> Self {
        self.fail_at = Some(tick);
        self
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn forked(&self) -> usize {
        self.forked.load(Ordering::SeqCst)
    }
}

impl EmulatorFactory for ScriptedFactory {
    type Emulator = ScriptedCore;

    fn create(&self) -> Result<ScriptedCore> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedCore {
            tick: 0,
            input: ControllerState::NONE,
            render: self.render.clone(),
            fail_at: self.fail_at,
            audio_clears: 0,
        })
    }

    fn fork(&self, snapshot: &ScriptedSnapshot) -> Result<ScriptedCore> {
        self.forked.fetch_add(1, Ordering::SeqCst);
        anyhow::ensure!(!self.fail_forks, "scripted fork failure");
        let mut core = self.create()?;
        core.restore(snapshot)?;
        Ok(core)
    }
}
