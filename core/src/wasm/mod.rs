//! WASM emulation core wrapper
//!
//! Hosts the WasmBoy core with wasmtime. Each [`WasmBoy`] owns its own
//! `Store` and linear memory, so sessions created from the same compiled
//! module never alias.
//!
//! # Module Organization
//!
//! - [`layout`] - Memory region locations read from core globals
//! - [`state`] - Serializable save state record
//! - [`options`] - Engine toggles for the core's `config` export
//! - [`imports`] - Host functions for the core's logging imports
//!
//! # Key Types
//!
//! - [`WasmEngine`] - Shared WASM engine (one per application)
//! - [`WasmBoy`] - One instantiated core (the unit of forking)
//! - [`WasmBoyFactory`] - Creates loaded, configured instances

pub mod imports;
pub mod layout;
pub mod options;
pub mod state;

use std::sync::Arc;

use anyhow::{Context, Result};
use wasmtime::{Engine, Instance, Memory, Module, Store, TypedFunc};

use crate::emulator::{Emulator, EmulatorFactory};
use crate::input::ControllerState;

pub use imports::CoreContext;
pub use layout::{CoreLayout, LayoutError, SCREEN_HEIGHT, SCREEN_WIDTH};
pub use options::CoreOptions;
pub use state::{SaveState, SaveStateMemory};

/// Shared WASM engine (one per application)
#[derive(Clone)]
pub struct WasmEngine {
    engine: Engine,
}

impl WasmEngine {
    /// Create a new WASM engine with default configuration
    pub fn new() -> Result<Self> {
        let engine = Engine::default();
        Ok(Self { engine })
    }

    /// Get a reference to the underlying wasmtime engine
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Compile a core module from bytes
    pub fn load_module(&self, bytes: &[u8]) -> Result<Module> {
        Module::new(&self.engine, bytes).context("Failed to compile core WASM module")
    }
}

type ConfigFn = TypedFunc<(i32, i32, i32, i32, i32, i32, i32, i32, i32, i32), ()>;
type JoypadFn = TypedFunc<(i32, i32, i32, i32, i32, i32, i32, i32), ()>;

/// Exported core functions, looked up once at instantiation
struct CoreExports {
    config: ConfigFn,
    execute_multiple_frames: TypedFunc<i32, i32>,
    set_joypad_state: JoypadFn,
    save_state: TypedFunc<(), ()>,
    load_state: TypedFunc<(), ()>,
    clear_audio_buffer: TypedFunc<(), ()>,
}

impl CoreExports {
    fn lookup(store: &mut Store<CoreContext>, instance: &Instance) -> Result<Self> {
        macro_rules! export {
            ($name:literal) => {
                instance
                    .get_typed_func(&mut *store, $name)
                    .map_err(|_| LayoutError::MissingFunction($name))?
            };
        }

        Ok(Self {
            config: export!("config"),
            execute_multiple_frames: export!("executeMultipleFrames"),
            set_joypad_state: export!("setJoypadState"),
            save_state: export!("saveState"),
            load_state: export!("loadState"),
            clear_audio_buffer: export!("clearAudioBuffer"),
        })
    }
}

/// One instantiated WasmBoy core
pub struct WasmBoy {
    store: Store<CoreContext>,
    /// Kept alive for the lifetime of the exported functions and memory.
    #[allow(dead_code)]
    instance: Instance,
    memory: Memory,
    layout: CoreLayout,
    exports: CoreExports,
}

impl WasmBoy {
    /// Instantiate a fresh core with its own linear memory
    pub fn new(engine: &WasmEngine, module: &Module) -> Result<Self> {
        let linker = imports::build_linker(module)?;
        let mut store = Store::new(engine.engine(), CoreContext::default());

        let instance = linker
            .instantiate(&mut store, module)
            .context("Failed to instantiate core WASM module")?;

        let memory = instance
            .get_memory(&mut store, "memory")
            .ok_or(LayoutError::MissingMemory)?;
        let layout = CoreLayout::read(&mut store, &instance, &memory)?;
        let exports = CoreExports::lookup(&mut store, &instance)?;

        Ok(Self {
            store,
            instance,
            memory,
            layout,
            exports,
        })
    }

    /// Memory layout published by the core
    pub fn layout(&self) -> &CoreLayout {
        &self.layout
    }

    /// Copy a program image into cartridge ROM
    pub fn load_rom(&mut self, rom: &[u8]) -> Result<()> {
        anyhow::ensure!(!rom.is_empty(), "ROM image is empty");
        let start = self.layout.cartridge_rom;
        let data = self.memory.data_mut(&mut self.store);
        let memory_size = data.len();
        let dst = data.get_mut(start..start + rom.len()).with_context(|| {
            format!(
                "ROM of {} bytes does not fit at {:#x} in {} bytes of core memory",
                rom.len(),
                start,
                memory_size
            )
        })?;
        dst.copy_from_slice(rom);
        Ok(())
    }

    /// Apply engine toggles
    pub fn configure(&mut self, options: &CoreOptions) -> Result<()> {
        self.exports
            .config
            .call(&mut self.store, options.to_config_args())
            .context("core config() failed")
    }

    fn region(&self, range: &std::ops::Range<usize>) -> Vec<u8> {
        self.memory.data(&self.store)[range.clone()].to_vec()
    }

    /// Length-checked copy of every region; nothing is written unless all fit
    fn write_regions(&mut self, regions: &[(&str, &std::ops::Range<usize>, &[u8])]) -> Result<()> {
        for (name, range, bytes) in regions {
            anyhow::ensure!(
                bytes.len() == range.len(),
                "Save state region '{}' is {} bytes, core expects {}",
                name,
                bytes.len(),
                range.len()
            );
        }
        let data = self.memory.data_mut(&mut self.store);
        for (_, range, bytes) in regions {
            data[(*range).clone()].copy_from_slice(bytes);
        }
        Ok(())
    }
}

impl Emulator for WasmBoy {
    type Snapshot = SaveState;

    fn dimensions(&self) -> (u32, u32) {
        (SCREEN_WIDTH, SCREEN_HEIGHT)
    }

    fn set_input(&mut self, input: ControllerState) -> Result<()> {
        self.exports
            .set_joypad_state
            .call(&mut self.store, input.to_joypad_args())
            .context("core setJoypadState() failed")
    }

    fn advance(&mut self, ticks: u32) -> Result<()> {
        if ticks == 0 {
            return Ok(());
        }
        let ticks = i32::try_from(ticks).context("tick count too large")?;
        let response = self
            .exports
            .execute_multiple_frames
            .call(&mut self.store, ticks)
            .context("core executeMultipleFrames() failed")?;
        anyhow::ensure!(
            response >= 0,
            "core executeMultipleFrames({}) returned error code {}",
            ticks,
            response
        );
        Ok(())
    }

    fn capture_frame(&self) -> Result<Vec<u8>> {
        let rgb = &self.memory.data(&self.store)[self.layout.frame.clone()];
        let mut rgba = Vec::with_capacity(rgb.len() / 3 * 4);
        for pixel in rgb.chunks_exact(3) {
            rgba.extend_from_slice(pixel);
            rgba.push(255);
        }
        Ok(rgba)
    }

    fn snapshot(&mut self) -> Result<SaveState> {
        self.exports
            .save_state
            .call(&mut self.store, ())
            .context("core saveState() failed")?;

        Ok(SaveState {
            memory: SaveStateMemory {
                cartridge_ram: self.region(&self.layout.cartridge_ram),
                game_boy_memory: self.region(&self.layout.internal_memory),
                palette_memory: self.region(&self.layout.palette),
                internal_state: self.region(&self.layout.internal_state),
            },
            framebuffer: Some(self.region(&self.layout.frame)),
        })
    }

    fn restore(&mut self, snapshot: &SaveState) -> Result<()> {
        let layout = self.layout.clone();
        let memory = &snapshot.memory;
        if let Some(framebuffer) = &snapshot.framebuffer {
            anyhow::ensure!(
                framebuffer.len() == layout.frame.len(),
                "Save state region 'framebuffer' is {} bytes, core expects {}",
                framebuffer.len(),
                layout.frame.len()
            );
        }
        self.write_regions(&[
            ("cartridgeRam", &layout.cartridge_ram, memory.cartridge_ram.as_slice()),
            ("gameBoyMemory", &layout.internal_memory, memory.game_boy_memory.as_slice()),
            ("wasmBoyPaletteMemory", &layout.palette, memory.palette_memory.as_slice()),
            ("wasmBoyInternalState", &layout.internal_state, memory.internal_state.as_slice()),
        ])?;

        self.exports
            .load_state
            .call(&mut self.store, ())
            .context("core loadState() failed")?;

        if let Some(framebuffer) = &snapshot.framebuffer {
            self.write_regions(&[("framebuffer", &layout.frame, framebuffer.as_slice())])?;
        }
        Ok(())
    }

    fn clear_audio(&mut self) -> Result<()> {
        self.exports
            .clear_audio_buffer
            .call(&mut self.store, ())
            .context("core clearAudioBuffer() failed")
    }
}

/// Creates WasmBoy instances sharing one compiled module, ROM and options
#[derive(Clone)]
pub struct WasmBoyFactory {
    engine: WasmEngine,
    module: Module,
    rom: Arc<[u8]>,
    options: CoreOptions,
}

impl WasmBoyFactory {
    /// Compile the core and keep the ROM for every instance
    pub fn new(core_wasm: &[u8], rom: impl Into<Arc<[u8]>>, options: CoreOptions) -> Result<Self> {
        let engine = WasmEngine::new()?;
        let module = engine.load_module(core_wasm)?;
        Ok(Self::from_module(engine, module, rom, options))
    }

    pub fn from_module(
        engine: WasmEngine,
        module: Module,
        rom: impl Into<Arc<[u8]>>,
        options: CoreOptions,
    ) -> Self {
        Self {
            engine,
            module,
            rom: rom.into(),
            options,
        }
    }

    pub fn options(&self) -> &CoreOptions {
        &self.options
    }
}

impl EmulatorFactory for WasmBoyFactory {
    type Emulator = WasmBoy;

    fn create(&self) -> Result<WasmBoy> {
        let mut core = WasmBoy::new(&self.engine, &self.module)?;
        core.load_rom(&self.rom)?;
        core.configure(&self.options)?;
        Ok(core)
    }
}
