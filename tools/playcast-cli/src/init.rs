//! Init command - write a default configuration file

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use playcast_core::{CONFIG_FILE_NAME, PlaycastConfig};

/// Arguments for the init command
#[derive(Args)]
pub struct InitArgs {
    /// Where to write the config
    #[arg(short, long, default_value = CONFIG_FILE_NAME)]
    pub output: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

/// Execute the init command
pub fn execute(args: InitArgs) -> Result<()> {
    if args.output.exists() && !args.force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            args.output.display()
        );
    }

    let content = PlaycastConfig::default().to_toml()?;
    std::fs::write(&args.output, content)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    println!("Created {}", args.output.display());
    Ok(())
}
