//! rnand - Raw NAND page/block tool
//!
//! Drives the page/block engine of `rnand-core` against an emulated
//! HY27UF081G-style chip. The chip contents live in a raw image file
//! (`--image`) so that successive invocations see each other's writes, and
//! the partitions come from a TOML table (`--table`).
//!
//! All page and block numbers on the command line are relative to the
//! selected partition, exactly as a block-device layer would address them.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use rnand_core::registry::{ChipConfig, NandChip, PartitionTable};
use rnand_dummy::{DummyConfig, DummyNand};
use std::fs;
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let table = match &cli.table {
        Some(path) => PartitionTable::from_toml_file(path)?,
        None => PartitionTable::default(),
    };

    if let Commands::Table = cli.command {
        print!("{}", table.to_toml_string());
        return Ok(());
    }

    let mut chip = table.open(open_dummy(&table.chip, cli.image.as_deref())?);
    table.register_all(&mut chip)?;

    let modifies = cli.command.modifies_chip();
    let result = match cli.command {
        Commands::Probe => commands::run_probe(&mut chip),
        Commands::List => {
            commands::list_partitions(&chip);
            Ok(())
        }
        Commands::Table => Ok(()),
        Commands::Read {
            partition,
            page,
            output,
            spare_only,
        } => commands::page::run_read(&mut chip, &partition, page, output.as_deref(), spare_only),
        Commands::Write {
            partition,
            page,
            input,
            spare,
        } => commands::page::run_write(&mut chip, &partition, page, &input, spare.as_deref()),
        Commands::Erase { partition, block } => {
            commands::page::run_erase(&mut chip, &partition, block)
        }
        Commands::Copy {
            partition,
            src,
            dst,
        } => commands::page::run_copy(&mut chip, &partition, src, dst),
        Commands::Dump {
            partition,
            output,
            with_spare,
        } => commands::dump::run_dump(&mut chip, &partition, &output, with_spare),
    };

    // A failed program or erase still changed the chip
    if modifies {
        if let Some(path) = &cli.image {
            save_image(&chip, path)?;
        }
    }

    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Emulated chip matching the table's chip description
fn open_dummy(
    chip: &ChipConfig,
    image: Option<&Path>,
) -> Result<DummyNand, Box<dyn std::error::Error>> {
    let config = DummyConfig {
        page_size: chip.page_size as usize,
        oob_size: chip.oob_size as usize,
        pages_per_block: chip.pages_per_block,
        blocks: chip.blocks,
        row_cycles: chip.row_cycles,
        ..DummyConfig::default()
    };

    match image {
        Some(path) if path.exists() => {
            let data = fs::read(path)?;
            let expected = config.raw_page_size() * config.total_pages() as usize;
            if data.len() != expected {
                log::warn!(
                    "Image {} is {} bytes, chip has {} bytes",
                    path.display(),
                    data.len(),
                    expected
                );
            }
            log::debug!("Loaded chip image from {}", path.display());
            Ok(DummyNand::with_image(config, &data))
        }
        _ => Ok(DummyNand::new(config)),
    }
}

fn save_image(chip: &NandChip<DummyNand>, path: &Path) -> std::io::Result<()> {
    fs::write(path, chip.bus().image())?;
    log::debug!("Saved chip image to {}", path.display());
    Ok(())
}
