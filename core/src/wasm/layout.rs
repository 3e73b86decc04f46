//! Core memory layout
//!
//! The WasmBoy core publishes the location of every memory region it uses as
//! immutable i32 globals. They are read once per instance and validated
//! against the size of the exported linear memory.

use std::ops::Range;

use wasmtime::{Instance, Memory, Store};

/// Game Boy screen width in pixels
pub const SCREEN_WIDTH: u32 = 160;
/// Game Boy screen height in pixels
pub const SCREEN_HEIGHT: u32 = 144;
/// Size of the core's RGB frame buffer
pub const FRAME_RGB_SIZE: usize = (SCREEN_WIDTH * SCREEN_HEIGHT * 3) as usize;

/// Problems with the exports of a core module
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("core does not export linear memory 'memory'")]
    MissingMemory,

    #[error("core does not export global '{0}'")]
    MissingGlobal(&'static str),

    #[error("core global '{name}' has invalid value {value}")]
    InvalidGlobal { name: &'static str, value: i64 },

    #[error("core region '{name}' ({start:#x}..{end:#x}) lies outside linear memory ({memory_size} bytes)")]
    OutOfBounds {
        name: &'static str,
        start: usize,
        end: usize,
        memory_size: usize,
    },

    #[error("core does not export function '{0}' with the expected signature")]
    MissingFunction(&'static str),
}

/// Byte ranges of the core's memory regions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreLayout {
    pub cartridge_rom: usize,
    pub cartridge_ram: Range<usize>,
    pub internal_memory: Range<usize>,
    pub palette: Range<usize>,
    pub internal_state: Range<usize>,
    pub frame: Range<usize>,
}

impl CoreLayout {
    /// Read the layout globals from an instance
    pub fn read<T>(
        store: &mut Store<T>,
        instance: &Instance,
        memory: &Memory,
    ) -> Result<Self, LayoutError> {
        let mut global = |name: &'static str| -> Result<usize, LayoutError> {
            let value = instance
                .get_global(&mut *store, name)
                .ok_or(LayoutError::MissingGlobal(name))?
                .get(&mut *store);
            let raw = value.i32().ok_or(LayoutError::MissingGlobal(name))?;
            usize::try_from(raw).map_err(|_| LayoutError::InvalidGlobal {
                name,
                value: raw as i64,
            })
        };

        let cartridge_rom = global("CARTRIDGE_ROM_LOCATION")?;
        let cartridge_ram = region(
            global("CARTRIDGE_RAM_LOCATION")?,
            global("CARTRIDGE_RAM_SIZE")?,
        );
        let internal_memory = region(
            global("GAMEBOY_INTERNAL_MEMORY_LOCATION")?,
            global("GAMEBOY_INTERNAL_MEMORY_SIZE")?,
        );
        let palette = region(global("GBC_PALETTE_LOCATION")?, global("GBC_PALETTE_SIZE")?);
        let internal_state = region(
            global("WASMBOY_STATE_LOCATION")?,
            global("WASMBOY_STATE_SIZE")?,
        );
        let frame = region(global("FRAME_LOCATION")?, FRAME_RGB_SIZE);

        let layout = Self {
            cartridge_rom,
            cartridge_ram,
            internal_memory,
            palette,
            internal_state,
            frame,
        };
        layout.validate(memory.data_size(&*store))?;
        Ok(layout)
    }

    fn validate(&self, memory_size: usize) -> Result<(), LayoutError> {
        let regions = [
            ("CARTRIDGE_ROM_LOCATION", self.cartridge_rom..self.cartridge_rom),
            ("CARTRIDGE_RAM", self.cartridge_ram.clone()),
            ("GAMEBOY_INTERNAL_MEMORY", self.internal_memory.clone()),
            ("GBC_PALETTE", self.palette.clone()),
            ("WASMBOY_STATE", self.internal_state.clone()),
            ("FRAME", self.frame.clone()),
        ];
        for (name, range) in regions {
            if range.end > memory_size {
                return Err(LayoutError::OutOfBounds {
                    name,
                    start: range.start,
                    end: range.end,
                    memory_size,
                });
            }
        }
        Ok(())
    }
}

fn region(start: usize, len: usize) -> Range<usize> {
    start..start.saturating_add(len)
}
