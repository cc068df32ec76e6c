//! TOML partition table
//!
//! Describes a chip and the partitions to register on it:
//!
//! ```toml
//! [chip]
//! page_size = 2048
//! pages_per_block = 64
//! oob_size = 64
//! blocks = 1024
//! ecc = "hamming256"
//!
//! [[partition]]
//! name = "nand0"
//! block_start = 0
//! block_end = 511
//! ```
//!
//! `oob_free` defaults to the OOB bytes not used by the codec and
//! `row_cycles` to 2. An optional `[timeouts]` table overrides the polling
//! budget.

use std::fs;
use std::path::Path;
use std::string::String;
use std::vec::Vec;

use thiserror::Error;

use super::{NandChip, PartitionId};
use crate::bus::NandBus;
use crate::ecc::EccMode;
use crate::nand::{Geometry, Timeouts};

/// Errors that can occur when loading or applying a partition table
#[derive(Debug, Error)]
pub enum TableError {
    /// Failed to read the table file
    #[error("failed to read partition table: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a valid partition table
    #[error("failed to parse partition table: {0}")]
    Parse(#[from] toml::de::Error),

    /// The chip description is inconsistent
    #[error("invalid chip description: {0}")]
    InvalidChip(&'static str),

    /// A partition ends beyond the last block of the chip
    #[error("partition '{name}' ends at block {block_end} but the chip has {blocks} blocks")]
    PartitionBeyondChip {
        /// Partition name
        name: String,
        /// Last block of the partition
        block_end: u32,
        /// Blocks on the chip
        blocks: u32,
    },

    /// Registering a partition failed
    #[error("failed to register partition '{name}': {source}")]
    Register {
        /// Partition name
        name: String,
        /// Registry error
        #[source]
        source: crate::Error,
    },
}

/// Physical chip description
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct ChipConfig {
    /// Data bytes per page
    #[serde(deserialize_with = "deserialize_hex_u32")]
    pub page_size: u32,
    /// Pages per erase block
    #[serde(deserialize_with = "deserialize_hex_u32")]
    pub pages_per_block: u32,
    /// OOB bytes per page
    #[serde(deserialize_with = "deserialize_hex_u32")]
    pub oob_size: u32,
    /// OOB bytes visible to the caller (default: everything ECC leaves)
    #[serde(default, deserialize_with = "deserialize_opt_hex_u32")]
    pub oob_free: Option<u32>,
    /// Total blocks on the chip
    #[serde(deserialize_with = "deserialize_hex_u32")]
    pub blocks: u32,
    /// Row address cycles
    #[serde(default = "default_row_cycles")]
    pub row_cycles: u8,
    /// ECC codec
    #[serde(default)]
    pub ecc: EccMode,
}

/// One partition entry
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct PartitionConfig {
    /// Name to register the partition under
    pub name: String,
    /// First block (inclusive)
    #[serde(deserialize_with = "deserialize_hex_u32")]
    pub block_start: u32,
    /// Last block (inclusive)
    #[serde(deserialize_with = "deserialize_hex_u32")]
    pub block_end: u32,
}

/// A chip description plus its partitions
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct PartitionTable {
    /// The physical chip
    pub chip: ChipConfig,
    /// Polling budget
    #[serde(default)]
    pub timeouts: Timeouts,
    /// Partitions, registered in file order
    #[serde(default, rename = "partition")]
    pub partitions: Vec<PartitionConfig>,
}

fn default_row_cycles() -> u8 {
    2
}

/// Deserialize a u32 that can be hex (0x...) or decimal
fn deserialize_hex_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    // Try to deserialize as a number first, then as a string
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HexOrInt {
        Int(u32),
        Str(String),
    }

    match HexOrInt::deserialize(deserializer)? {
        HexOrInt::Int(n) => Ok(n),
        HexOrInt::Str(s) => parse_number(&s).map_err(serde::de::Error::custom),
    }
}

fn deserialize_opt_hex_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    deserialize_hex_u32(deserializer).map(Some)
}

/// Parse a number that can be hex (0x...) or decimal
pub fn parse_number(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| std::format!("invalid hex: {}", e))
    } else {
        s.parse().map_err(|e| std::format!("invalid number: {}", e))
    }
}

impl Default for PartitionTable {
    /// A Hynix HY27UF081G2A with Hamming ECC and a single partition
    /// "nand0" covering blocks 0..=511
    fn default() -> Self {
        let geometry = Geometry::hy27uf081g(0, 511);
        Self {
            chip: ChipConfig {
                page_size: geometry.page_size as u32,
                pages_per_block: geometry.pages_per_block,
                oob_size: geometry.oob_size as u32,
                oob_free: Some(geometry.oob_free as u32),
                blocks: 1024,
                row_cycles: geometry.row_cycles,
                ecc: EccMode::Hamming256,
            },
            timeouts: Timeouts::default(),
            partitions: std::vec![PartitionConfig {
                name: String::from("nand0"),
                block_start: geometry.block_start,
                block_end: geometry.block_end,
            }],
        }
    }
}

impl PartitionTable {
    /// Load a partition table from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, TableError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse a partition table from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, TableError> {
        let table: PartitionTable = toml::from_str(content)?;
        table.chip_oob_free()?;
        Ok(table)
    }

    /// Convert the table to a TOML string
    pub fn to_toml_string(&self) -> String {
        let mut output = String::new();

        output.push_str("[chip]\n");
        output.push_str(&std::format!("page_size = {}\n", self.chip.page_size));
        output.push_str(&std::format!("pages_per_block = {}\n", self.chip.pages_per_block));
        output.push_str(&std::format!("oob_size = {}\n", self.chip.oob_size));
        if let Some(oob_free) = self.chip.oob_free {
            output.push_str(&std::format!("oob_free = {}\n", oob_free));
        }
        output.push_str(&std::format!("blocks = {}\n", self.chip.blocks));
        output.push_str(&std::format!("row_cycles = {}\n", self.chip.row_cycles));
        output.push_str(&std::format!("ecc = \"{}\"\n", self.chip.ecc));
        output.push('\n');

        if self.timeouts != Timeouts::default() {
            let t = &self.timeouts;
            output.push_str("[timeouts]\n");
            output.push_str(&std::format!("busy_edge_polls = {}\n", t.busy_edge_polls));
            output.push_str(&std::format!("ready_polls = {}\n", t.ready_polls));
            output.push_str(&std::format!("status_polls = {}\n", t.status_polls));
            output.push_str(&std::format!("poll_delay_us = {}\n", t.poll_delay_us));
            output.push_str(&std::format!("reset_delay_us = {}\n", t.reset_delay_us));
            output.push('\n');
        }

        for partition in &self.partitions {
            output.push_str("[[partition]]\n");
            // quoted and escaped as a TOML basic string
            let name = toml::Value::String(partition.name.clone());
            output.push_str(&std::format!("name = {}\n", name));
            output.push_str(&std::format!("block_start = {}\n", partition.block_start));
            output.push_str(&std::format!("block_end = {}\n", partition.block_end));
            output.push('\n');
        }

        output
    }

    /// Free OOB bytes per page, derived from the codec when not given
    fn chip_oob_free(&self) -> Result<u32, TableError> {
        let ecc_len = self
            .chip
            .ecc
            .ecc_len(self.chip.page_size as usize)
            .ok_or(TableError::InvalidChip(
                "page size not supported by the ECC codec",
            ))? as u32;
        if ecc_len > self.chip.oob_size {
            return Err(TableError::InvalidChip("ECC does not fit the OOB area"));
        }
        Ok(self.chip.oob_free.unwrap_or(self.chip.oob_size - ecc_len))
    }

    /// Geometry of one partition entry
    pub fn geometry(&self, partition: &PartitionConfig) -> Result<Geometry, TableError> {
        if partition.block_end >= self.chip.blocks {
            return Err(TableError::PartitionBeyondChip {
                name: partition.name.clone(),
                block_end: partition.block_end,
                blocks: self.chip.blocks,
            });
        }

        Ok(Geometry {
            page_size: self.chip.page_size as usize,
            pages_per_block: self.chip.pages_per_block,
            oob_size: self.chip.oob_size as usize,
            oob_free: self.chip_oob_free()? as usize,
            block_start: partition.block_start,
            block_end: partition.block_end,
            row_cycles: self.chip.row_cycles,
        })
    }

    /// Build a chip on `bus` with this table's codec and timeouts
    pub fn open<B: NandBus>(&self, bus: B) -> NandChip<B> {
        NandChip::new(bus, self.chip.ecc).with_timeouts(self.timeouts)
    }

    /// Register every partition of the table on `chip`, in file order
    pub fn register_all<B: NandBus>(
        &self,
        chip: &mut NandChip<B>,
    ) -> Result<Vec<PartitionId>, TableError> {
        self.partitions
            .iter()
            .map(|partition| {
                let geometry = self.geometry(partition)?;
                chip.register(&partition.name, geometry)
                    .map_err(|source| TableError::Register {
                        name: partition.name.clone(),
                        source,
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"
[chip]
page_size = 2048
pages_per_block = 64
oob_size = 64
blocks = "0x400"
ecc = "hamming256"

[timeouts]
ready_polls = 500

[[partition]]
name = "boot"
block_start = 0
block_end = 0x3F

[[partition]]
name = "data"
block_start = 0x40
block_end = 1023
"#;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("4096").unwrap(), 4096);
        assert_eq!(parse_number("0x1000").unwrap(), 4096);
        assert_eq!(parse_number(" 0X40 ").unwrap(), 64);
        assert!(parse_number("forty").is_err());
    }

    #[test]
    fn test_parse_table() {
        let table = PartitionTable::from_toml_str(TABLE).unwrap();
        assert_eq!(table.chip.blocks, 1024);
        assert_eq!(table.chip.ecc, EccMode::Hamming256);
        assert_eq!(table.chip.row_cycles, 2);
        assert_eq!(table.timeouts.ready_polls, 500);
        assert_eq!(table.timeouts.status_polls, Timeouts::default().status_polls);
        assert_eq!(table.partitions.len(), 2);
        assert_eq!(table.partitions[0].block_end, 63);

        let geometry = table.geometry(&table.partitions[1]).unwrap();
        assert_eq!(geometry.oob_free, 40);
        assert_eq!(geometry.block_start, 64);
        assert_eq!(geometry.block_total(), 1023 - 64);
    }

    #[test]
    fn test_oob_free_without_ecc() {
        let table = PartitionTable::from_toml_str(
            r#"
[chip]
page_size = 512
pages_per_block = 32
oob_size = 16
blocks = 4096
row_cycles = 3
ecc = "none"
"#,
        )
        .unwrap();
        assert_eq!(table.chip_oob_free().unwrap(), 16);
        assert!(table.partitions.is_empty());
    }

    #[test]
    fn test_partition_beyond_chip() {
        let mut table = PartitionTable::default();
        table.partitions[0].block_end = 1024;
        let partition = table.partitions[0].clone();
        assert!(matches!(
            table.geometry(&partition),
            Err(TableError::PartitionBeyondChip { blocks: 1024, .. })
        ));
    }

    #[test]
    fn test_rejects_unsupported_page_size() {
        let err = PartitionTable::from_toml_str(
            r#"
[chip]
page_size = 300
pages_per_block = 64
oob_size = 64
blocks = 16
"#,
        )
        .unwrap_err();
        assert!(matches!(err, TableError::InvalidChip(_)));
    }

    #[test]
    fn test_toml_round_trip_of_default() {
        let table = PartitionTable::default();
        let text = table.to_toml_string();
        assert!(!text.contains("[timeouts]"));
        let parsed = PartitionTable::from_toml_str(&text).unwrap();
        assert_eq!(parsed.chip, table.chip);
        assert_eq!(parsed.partitions, table.partitions);
    }

    #[test]
    fn test_toml_round_trip_keeps_timeouts() {
        let table = PartitionTable::from_toml_str(TABLE).unwrap();
        let parsed = PartitionTable::from_toml_str(&table.to_toml_string()).unwrap();
        assert_eq!(parsed.timeouts.ready_polls, 500);
        assert_eq!(parsed.timeouts, table.timeouts);
        assert_eq!(parsed, table);
    }

    #[test]
    fn test_toml_round_trip_escapes_names() {
        let mut table = PartitionTable::default();
        table.partitions[0].name = String::from("fs \"main\" \\ data");
        let parsed = PartitionTable::from_toml_str(&table.to_toml_string()).unwrap();
        assert_eq!(parsed.partitions[0].name, "fs \"main\" \\ data");
    }
}
