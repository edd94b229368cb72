//! stripelayout CLI
//!
//! Command-line tool for inspecting and checking the striped block layout.
//!
//! # Commands
//! - `locate` - Show the physical location of logical file offsets
//! - `split` - Show the internal blocks of a block group
//! - `verify` - Write, read back and verify a generated file
//! - `config` - Show or initialize configuration
//!
//! # Configuration
//! Config file: ~/.stripelayout/config.toml

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;

mod commands;
mod config;

use commands::split::SplitConfig;
use commands::verify::VerifyConfig;

#[derive(Parser)]
#[command(name = "stripelayout")]
#[command(about = "Striped erasure-coding layout inspector")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.stripelayout/config.toml)
    #[arg(long, global = true, env = "STRIPELAYOUT_CONFIG")]
    config: Option<PathBuf>,

    /// Bytes per cell (overrides config file)
    #[arg(long, global = true)]
    cell_size: Option<u64>,

    /// Data blocks per group (overrides config file)
    #[arg(long, global = true)]
    data_blocks: Option<usize>,

    /// Parity blocks per group (overrides config file)
    #[arg(long, global = true)]
    parity_blocks: Option<usize>,

    /// Cells per block (overrides config file)
    #[arg(long, global = true)]
    stripes_per_block: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show where logical file offsets are stored
    Locate {
        /// Logical file offsets
        #[arg(required = true)]
        offsets: Vec<u64>,
    },

    /// Show the internal blocks of a block group
    Split {
        /// Logical bytes held by the group
        #[arg(short, long)]
        group_bytes: u64,

        /// Id of internal block 0
        #[arg(long, default_value = "1048576")]
        block_id: u64,
    },

    /// Write a generated file, read every block back and verify it
    Verify {
        /// File length in bytes
        #[arg(short, long)]
        write_bytes: u64,

        /// Report every mismatched byte instead of stopping at the first
        #[arg(short, long)]
        all_mismatches: bool,

        /// Zero the stored byte at these file offsets before reading back
        #[arg(long)]
        corrupt: Vec<u64>,
    },

    /// Show or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Show config file path
    Path,

    /// Initialize config file with defaults
    Init {
        /// Overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let mut cfg = config::load_config(cli.config.as_deref())?;

    // CLI args override config file
    if let Some(v) = cli.cell_size {
        cfg.striping.cell_size = v;
    }
    if let Some(v) = cli.data_blocks {
        cfg.striping.data_blocks = v;
    }
    if let Some(v) = cli.parity_blocks {
        cfg.striping.parity_blocks = v;
    }
    if let Some(v) = cli.stripes_per_block {
        cfg.striping.stripes_per_block = v;
    }

    match cli.command {
        Commands::Locate { offsets } => {
            commands::locate(&cfg.striping_config()?, &offsets)?;
        }

        Commands::Split {
            group_bytes,
            block_id,
        } => {
            commands::split(
                &cfg.striping_config()?,
                SplitConfig {
                    group_bytes,
                    block_id,
                },
            )?;
        }

        Commands::Verify {
            write_bytes,
            all_mismatches,
            corrupt,
        } => {
            commands::verify(
                cfg.striping_config()?,
                cfg.byte_oracle()?,
                VerifyConfig {
                    write_bytes,
                    all_mismatches,
                    corrupt,
                },
            )
            .await?;
        }

        Commands::Config { command } => {
            handle_config_command(command, &cfg, cli.config)?;
        }
    }

    Ok(())
}

/// Handle config subcommands
fn handle_config_command(
    command: Option<ConfigCommands>,
    cfg: &config::CliConfig,
    path: Option<PathBuf>,
) -> Result<()> {
    let path = match path {
        Some(p) => p,
        None => config::config_file_path()?,
    };

    match command {
        None | Some(ConfigCommands::Show) => {
            let striping = cfg.striping_config()?;
            println!();
            println!("{}", style("stripelayout Configuration").bold().underlined());
            println!();
            println!("{}", style("[striping]").cyan());
            println!("  cell_size = {}", striping.cell_size());
            println!("  data_blocks = {}", striping.data_blocks());
            println!("  parity_blocks = {}", striping.parity_blocks());
            println!("  stripes_per_block = {}", striping.stripes_per_block());
            println!(
                "  {}",
                style(format!(
                    "# block capacity {} B, group capacity {} B",
                    striping.block_capacity(),
                    striping.group_data_capacity()
                ))
                .dim()
            );
            println!();
            println!("{}", style("[oracle]").cyan());
            println!("  modulus = {}", cfg.oracle.modulus);
            println!();

            println!("{} {}", style("Config file:").dim(), path.display());
            if !path.exists() {
                println!(
                    "{} Run '{}' to create it",
                    style("(not created yet)").yellow(),
                    style("stripelayout config init").green()
                );
            }
        }

        Some(ConfigCommands::Path) => {
            println!("{}", path.display());
        }

        Some(ConfigCommands::Init { force }) => {
            if path.exists() && !force {
                println!(
                    "{} Config file already exists at {}",
                    style("!").yellow(),
                    path.display()
                );
                println!("  Use --force to overwrite");
                return Ok(());
            }
            // validate before writing
            cfg.striping_config()?;
            cfg.byte_oracle()?;
            config::save_config(cfg, &path)?;
            println!(
                "{} Created config file at {}",
                style("✓").green(),
                path.display()
            );
        }
    }

    Ok(())
}
