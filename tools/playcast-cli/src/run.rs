//! Run command - play cycles until input ends
//!
//! Orchestrates: load config → find ROM → build core → restore save → cycle

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};

use playcast_core::{
    Button, CONFIG_FILE_NAME, ControllerState, PlaybackDriver, PlaycastConfig, SaveStore,
    WasmBoyFactory, encode,
};

use crate::stdin;

/// ROM file extensions picked up by discovery
const ROM_EXTENSIONS: [&str; 2] = ["gb", "gbc"];

/// Arguments for the run command
#[derive(Args)]
pub struct RunArgs {
    /// ROM to play (defaults to the first ROM in --rom-dir)
    #[arg(short, long)]
    pub rom: Option<PathBuf>,

    /// Directory searched for a ROM when --rom is not given
    #[arg(long, default_value = "roms")]
    pub rom_dir: PathBuf,

    /// Compiled WasmBoy core module
    #[arg(long, default_value = "wasmboy.wasm")]
    pub core: PathBuf,

    /// Directory holding save slots
    #[arg(long, default_value = "saves")]
    pub saves: PathBuf,

    /// Directory receiving animations
    #[arg(short, long, default_value = "out")]
    pub output: PathBuf,

    /// Configuration file
    #[arg(short, long, default_value = CONFIG_FILE_NAME)]
    pub config: PathBuf,

    /// Stop after this many cycles
    #[arg(long)]
    pub cycles: Option<u64>,

    /// Buttons pressed before the first cycle
    pub inputs: Vec<Button>,
}

/// Execute the run command
pub fn execute(args: RunArgs) -> Result<()> {
    let config = PlaycastConfig::load(&args.config)?;

    let rom_path = match args.rom.clone() {
        Some(path) => path,
        None => find_rom(&args.rom_dir)?,
    };
    let rom = std::fs::read(&rom_path)
        .with_context(|| format!("Failed to read ROM {}", rom_path.display()))?;
    anyhow::ensure!(!rom.is_empty(), "ROM {} is empty", rom_path.display());
    tracing::info!("Loaded ROM {} ({} bytes)", rom_path.display(), rom.len());

    let core = std::fs::read(&args.core)
        .with_context(|| format!("Failed to read core {}", args.core.display()))?;
    let factory = WasmBoyFactory::new(&core, rom, config.core)?;

    let name = rom_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "playcast".to_string());
    let encoder = encode::from_config(&config.encoder, &args.output, &name)?;
    let save_store = SaveStore::for_rom(&args.saves, &rom_path);

    let (audience, _reader) = stdin::spawn_reader(std::io::BufReader::new(std::io::stdin()));

    let mut driver = PlaybackDriver::start(factory, save_store, encoder, audience, &config)?;
    driver.queue_inputs(args.inputs.iter().copied().map(ControllerState::pressing));

    driver.run(args.cycles)
}

/// First ROM in `dir`, in file name order
fn find_rom(dir: &Path) -> Result<PathBuf> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("No ROM given and cannot read {}", dir.display()))?;

    let mut roms: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| {
                        ROM_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known))
                    })
        })
        .collect();
    roms.sort();

    roms.into_iter()
        .next()
        .with_context(|| format!("No .gb or .gbc ROM found in {}", dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_rom_picks_first_by_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("zelda.gbc"), b"x").unwrap();
        std::fs::write(dir.path().join("Alleyway.GB"), b"x").unwrap();

        let rom = find_rom(dir.path()).unwrap();
        assert_eq!(rom.file_name().unwrap(), "Alleyway.GB");
    }

    #[test]
    fn find_rom_without_roms_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("readme.md"), b"x").unwrap();
        assert!(find_rom(dir.path()).is_err());
        assert!(find_rom(&dir.path().join("missing")).is_err());
    }
}
