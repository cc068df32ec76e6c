//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

#[derive(Parser)]
#[command(name = "rnand")]
#[command(author, version, about = "Raw NAND page/block tool", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Partition table (TOML format)
    /// Defaults to a HY27UF081G with one "nand0" partition over blocks 0..=511
    #[arg(long, global = true)]
    pub table: Option<PathBuf>,

    /// Raw chip image backing the emulated chip (data + OOB per page)
    /// Loaded if it exists, written back after commands that modify the chip
    #[arg(long, global = true)]
    pub image: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read the chip ID and show the registered partitions
    Probe,

    /// List the registered partitions
    List,

    /// Print the partition table in use (TOML format)
    Table,

    /// Read one page
    Read {
        /// Partition name
        #[arg(short, long, default_value = "nand0")]
        partition: String,

        /// Partition-relative page (hex or decimal)
        #[arg(value_parser = parse_hex_u32)]
        page: u32,

        /// Write the page data to this file instead of printing a hex dump
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only read the spare bytes
        #[arg(long)]
        spare_only: bool,
    },

    /// Program one page
    Write {
        /// Partition name
        #[arg(short, long, default_value = "nand0")]
        partition: String,

        /// Partition-relative page (hex or decimal)
        #[arg(value_parser = parse_hex_u32)]
        page: u32,

        /// Page data; a short file is padded with 0xFF
        #[arg(short, long)]
        input: PathBuf,

        /// Spare bytes to store in the free OOB area
        #[arg(short, long)]
        spare: Option<PathBuf>,
    },

    /// Erase one block
    Erase {
        /// Partition name
        #[arg(short, long, default_value = "nand0")]
        partition: String,

        /// Partition-relative block (hex or decimal)
        #[arg(value_parser = parse_hex_u32)]
        block: u32,
    },

    /// Copy a page inside the chip (copy-back)
    Copy {
        /// Partition name
        #[arg(short, long, default_value = "nand0")]
        partition: String,

        /// Source page (hex or decimal)
        #[arg(value_parser = parse_hex_u32)]
        src: u32,

        /// Destination page (hex or decimal)
        #[arg(value_parser = parse_hex_u32)]
        dst: u32,
    },

    /// Read a whole partition to a file
    Dump {
        /// Partition name
        #[arg(short, long, default_value = "nand0")]
        partition: String,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Append the free spare bytes after each page
        #[arg(long)]
        with_spare: bool,
    },
}

impl Commands {
    /// Whether the command can change the chip contents
    #[allow(dead_code)]
    pub fn modifies_chip(&self) -> bool {
        matches!(
            self,
            Commands::Write { .. } | Commands::Erase { .. } | Commands::Copy { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_hex_u32() {
        assert_eq!(parse_hex_u32("0x40"), Ok(64));
        assert_eq!(parse_hex_u32("0X1ff"), Ok(511));
        assert_eq!(parse_hex_u32("12"), Ok(12));
        assert!(parse_hex_u32("0xZZ").is_err());
        assert!(parse_hex_u32("-1").is_err());
    }

    #[test]
    fn test_parse_read() {
        let cli = Cli::parse_from(["rnand", "-v", "read", "0x41", "-o", "page.bin"]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Read {
                partition,
                page,
                output,
                spare_only,
            } => {
                assert_eq!(partition, "nand0");
                assert_eq!(page, 0x41);
                assert_eq!(output, Some(PathBuf::from("page.bin")));
                assert!(!spare_only);
            }
            _ => panic!("expected read"),
        }
    }

    #[test]
    fn test_modifying_commands() {
        let cli = Cli::parse_from(["rnand", "erase", "3"]);
        assert!(cli.command.modifies_chip());
        let cli = Cli::parse_from(["rnand", "dump", "-o", "out.bin"]);
        assert!(!cli.command.modifies_chip());
    }
}
