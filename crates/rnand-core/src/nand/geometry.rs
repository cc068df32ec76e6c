//! Partition geometry and address translation

use crate::error::{Error, Result};

/// Largest OOB area the engine buffers on the stack
pub const MAX_OOB_SIZE: usize = 1024;

/// Geometry of one registered partition
///
/// Page size, pages per block, OOB size and row cycles describe the
/// physical chip and must match it exactly. `block_start..=block_end` is the
/// partition's inclusive block range within the chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Data bytes per page
    pub page_size: usize,
    /// Pages per erase block
    pub pages_per_block: u32,
    /// OOB (spare) bytes per page
    pub oob_size: usize,
    /// OOB bytes not consumed by ECC, visible to the caller
    pub oob_free: usize,
    /// First block of the partition (inclusive)
    pub block_start: u32,
    /// Last block of the partition (inclusive)
    pub block_end: u32,
    /// Number of row address bytes the chip expects (2 or 3)
    pub row_cycles: u8,
}

impl Geometry {
    /// Geometry of a Hynix HY27UF081G2A (1 Gbit, 2 KiB + 64 B pages,
    /// 64 pages per block) with Hamming ECC
    pub const fn hy27uf081g(block_start: u32, block_end: u32) -> Self {
        Self {
            page_size: 2048,
            pages_per_block: 64,
            oob_size: 64,
            oob_free: 64 - 2048 * 3 / 256,
            block_start,
            block_end,
            row_cycles: 2,
        }
    }

    /// Number of blocks in the partition as the block-device layer counts
    /// them (`block_end - block_start`)
    pub fn block_total(&self) -> u32 {
        self.block_end - self.block_start
    }

    /// Blocks covered by the inclusive `block_start..=block_end` range
    pub fn block_count(&self) -> u32 {
        self.block_end - self.block_start + 1
    }

    /// Pages covered by the partition
    pub fn page_count(&self) -> u32 {
        self.block_count() * self.pages_per_block
    }

    /// Bytes per block, data area only
    pub fn block_size(&self) -> usize {
        self.page_size * self.pages_per_block as usize
    }

    /// Check that the geometry is internally consistent
    ///
    /// `ecc_len` is the number of OOB bytes the configured codec writes per
    /// page (0 without ECC).
    pub fn validate(&self, ecc_len: usize) -> core::result::Result<(), &'static str> {
        if self.page_size == 0 || self.pages_per_block == 0 || self.oob_size == 0 {
            return Err("page size, pages per block and OOB size must be non-zero");
        }
        if self.oob_size > MAX_OOB_SIZE {
            return Err("OOB area is larger than the engine supports");
        }
        if self.page_size + self.oob_size > 0x1_0000 {
            return Err("page does not fit a 16-bit column address");
        }
        if self.block_start > self.block_end {
            return Err("block_start is after block_end");
        }
        if self.oob_free + ecc_len > self.oob_size {
            return Err("free OOB bytes and ECC bytes exceed the OOB size");
        }
        let row_bits = match self.row_cycles {
            2 => 16,
            3 => 24,
            _ => return Err("row address must be 2 or 3 cycles"),
        };
        let last_row = (self.block_end as u64 + 1) * self.pages_per_block as u64 - 1;
        if last_row >> row_bits != 0 {
            return Err("partition end does not fit the row address");
        }
        Ok(())
    }

    /// Translate a partition-relative page into an absolute page address
    ///
    /// Fails with `Error::OutOfRange` if the page lies beyond `block_end`.
    pub fn resolve_page(&self, page: u32) -> Result<PageAddress> {
        let absolute = self
            .block_start
            .checked_mul(self.pages_per_block)
            .and_then(|base| base.checked_add(page))
            .ok_or(Error::OutOfRange {
                block: u32::MAX,
                block_end: self.block_end,
            })?;

        let block = absolute / self.pages_per_block;
        if block > self.block_end {
            return Err(Error::OutOfRange {
                block,
                block_end: self.block_end,
            });
        }

        Ok(PageAddress {
            block,
            page: absolute % self.pages_per_block,
            column: 0,
        })
    }

    /// Translate a partition-relative block into an absolute block index
    ///
    /// Fails with `Error::OutOfRange` if the block lies beyond `block_end`.
    pub fn resolve_block(&self, block: u32) -> Result<u32> {
        let absolute = self.block_start.saturating_add(block);
        if absolute > self.block_end {
            return Err(Error::OutOfRange {
                block: absolute,
                block_end: self.block_end,
            });
        }
        Ok(absolute)
    }

    /// Absolute row (page number) of a resolved address
    pub fn row(&self, addr: &PageAddress) -> u32 {
        addr.block * self.pages_per_block + addr.page
    }

    /// Absolute row of the first page of an absolute block
    pub fn block_row(&self, block: u32) -> u32 {
        block * self.pages_per_block
    }

    /// Whether two partitions share at least one block
    pub fn overlaps(&self, other: &Geometry) -> bool {
        self.block_start <= other.block_end && other.block_start <= self.block_end
    }

    /// Whether two geometries describe the same physical page layout
    pub fn same_layout(&self, other: &Geometry) -> bool {
        self.page_size == other.page_size
            && self.pages_per_block == other.pages_per_block
            && self.oob_size == other.oob_size
            && self.row_cycles == other.row_cycles
    }
}

/// A resolved absolute page address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageAddress {
    /// Absolute block index
    pub block: u32,
    /// Page offset within the block
    pub page: u32,
    /// Byte offset within the page (data area followed by OOB)
    pub column: u16,
}

impl PageAddress {
    /// Same page, different column
    pub fn with_column(self, column: u16) -> Self {
        Self { column, ..self }
    }
}
