//! Device and partition registry
//!
//! A [`NandChip`] owns one physical chip's bus together with its ECC codec
//! and polling budget, and holds the partitions registered on it. Holding
//! `&mut NandChip` is what serializes access to the shared
//! command/address/data bus: one page or block operation at a time.
//!
//! The block-device layer addresses a partition through its
//! [`PartitionId`] (or its name) and the [`PageDevice`] operations, always
//! with partition-relative page and block indices.

#[cfg(feature = "std")]
mod table;

#[cfg(feature = "std")]
pub use table::{ChipConfig, PartitionConfig, PartitionTable, TableError};

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use crate::bus::NandBus;
use crate::ecc::{EccCodec, EccMode};
use crate::error::{Error, RegistryError, Result};
use crate::nand::protocol::{self, OpContext};
use crate::nand::{Geometry, PageStatus, Timeouts};

/// Handle of a registered partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartitionId(usize);

/// A registered partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionInfo {
    /// Name the partition was registered under
    pub name: String,
    /// Partition geometry
    pub geometry: Geometry,
}

/// Page/block operations on one partition
///
/// This is the interface the external block-device or flash translation
/// layer consumes. All indices are partition-relative.
pub trait PageDevice {
    /// Geometry of the partition
    fn geometry(&self) -> &Geometry;

    /// Read the chip's two identification bytes
    fn read_id(&mut self) -> Result<[u8; 2]>;

    /// Read a page and/or its spare bytes
    ///
    /// See [`protocol::read_page`] for the transfer shapes.
    fn read_page(
        &mut self,
        page: u32,
        data: Option<&mut [u8]>,
        spare: Option<&mut [u8]>,
    ) -> Result<PageStatus>;

    /// Program a page with optional spare bytes
    fn write_page(&mut self, page: u32, data: Option<&[u8]>, spare: Option<&[u8]>) -> Result<()>;

    /// Erase a block
    fn erase_block(&mut self, block: u32) -> Result<()>;

    /// Copy a page to another page of the same partition inside the chip
    fn copy_back(&mut self, src_page: u32, dst_page: u32) -> Result<()>;
}

/// One physical NAND chip and the partitions registered on it
pub struct NandChip<B> {
    bus: B,
    ecc: Option<Box<dyn EccCodec + Send>>,
    timeouts: Timeouts,
    partitions: Vec<PartitionInfo>,
}

impl<B: NandBus> NandChip<B> {
    /// Create a chip with the codec selected by `ecc` and default timeouts
    pub fn new(bus: B, ecc: EccMode) -> Self {
        Self::with_codec(bus, ecc.codec())
    }

    /// Create a chip with a caller-provided codec (or none)
    pub fn with_codec(bus: B, ecc: Option<Box<dyn EccCodec + Send>>) -> Self {
        Self {
            bus,
            ecc,
            timeouts: Timeouts::default(),
            partitions: Vec::new(),
        }
    }

    /// Replace the polling budget
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Polling budget in use
    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// Name of the configured ECC codec, if any
    pub fn ecc_name(&self) -> Option<&'static str> {
        self.ecc.as_ref().map(|codec| codec.name())
    }

    /// Access the underlying bus
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Mutable access to the underlying bus
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Consume the chip and return the bus
    pub fn into_bus(self) -> B {
        self.bus
    }

    /// Register a partition
    ///
    /// The geometry must be valid for the configured codec, share the page
    /// layout of every partition already registered, use a name not yet
    /// taken (case-insensitive) and not overlap any registered block range.
    pub fn register(&mut self, name: &str, geometry: Geometry) -> Result<PartitionId> {
        let ecc_len = match &self.ecc {
            None => 0,
            Some(codec) => codec
                .ecc_len(geometry.page_size)
                .ok_or(RegistryError::InvalidGeometry(
                    "page size not supported by the ECC codec",
                ))?,
        };
        geometry
            .validate(ecc_len)
            .map_err(RegistryError::InvalidGeometry)?;

        for existing in &self.partitions {
            if existing.name.eq_ignore_ascii_case(name) {
                return Err(RegistryError::DuplicateName.into());
            }
            if !existing.geometry.same_layout(&geometry) {
                return Err(RegistryError::LayoutMismatch.into());
            }
            if existing.geometry.overlaps(&geometry) {
                let block = existing.geometry.block_start.max(geometry.block_start);
                return Err(RegistryError::OverlappingPartitions { block }.into());
            }
        }

        log::info!(
            "Registered {}: blocks {}..={}, {} + {} bytes/page, {} pages/block",
            name,
            geometry.block_start,
            geometry.block_end,
            geometry.page_size,
            geometry.oob_size,
            geometry.pages_per_block
        );

        self.partitions.push(PartitionInfo {
            name: String::from(name),
            geometry,
        });
        Ok(PartitionId(self.partitions.len() - 1))
    }

    /// Look up a partition by name (case-insensitive)
    pub fn find(&self, name: &str) -> Option<PartitionId> {
        self.partitions
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(name))
            .map(PartitionId)
    }

    /// Registered partitions in registration order
    pub fn partitions(&self) -> &[PartitionInfo] {
        &self.partitions
    }

    /// Information about a registered partition
    pub fn info(&self, id: PartitionId) -> Result<&PartitionInfo> {
        self.partitions
            .get(id.0)
            .ok_or(Error::Registry(RegistryError::NotFound))
    }

    /// Read the chip's two identification bytes
    pub fn read_id(&mut self) -> [u8; 2] {
        protocol::read_id(&mut self.bus)
    }

    /// Reset the chip
    pub fn reset(&mut self) {
        protocol::reset(&mut self.bus, &self.timeouts)
    }

    /// Borrow a partition for page/block operations
    ///
    /// Fails with `RegistryError::NotFound` if `id` was not returned by this
    /// chip's [`NandChip::register`].
    pub fn partition(&mut self, id: PartitionId) -> Result<Partition<'_, B>> {
        let geometry = self.info(id)?.geometry;
        Ok(Partition {
            chip: self,
            geometry,
        })
    }

    /// Borrow a partition by name
    pub fn partition_by_name(&mut self, name: &str) -> Result<Partition<'_, B>> {
        let id = self
            .find(name)
            .ok_or(Error::Registry(RegistryError::NotFound))?;
        self.partition(id)
    }
}

/// A partition of a [`NandChip`], borrowed for exclusive use
pub struct Partition<'a, B> {
    chip: &'a mut NandChip<B>,
    geometry: Geometry,
}

impl<B: NandBus> Partition<'_, B> {
    fn split(&mut self) -> (&mut B, OpContext<'_>) {
        let chip = &mut *self.chip;
        let ctx = OpContext {
            geometry: &self.geometry,
            ecc: chip.ecc.as_deref().map(|codec| codec as &dyn EccCodec),
            timeouts: &chip.timeouts,
        };
        (&mut chip.bus, ctx)
    }
}

impl<B: NandBus> PageDevice for Partition<'_, B> {
    fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    fn read_id(&mut self) -> Result<[u8; 2]> {
        Ok(self.chip.read_id())
    }

    fn read_page(
        &mut self,
        page: u32,
        data: Option<&mut [u8]>,
        spare: Option<&mut [u8]>,
    ) -> Result<PageStatus> {
        let (bus, ctx) = self.split();
        protocol::read_page(bus, ctx, page, data, spare)
    }

    fn write_page(&mut self, page: u32, data: Option<&[u8]>, spare: Option<&[u8]>) -> Result<()> {
        let (bus, ctx) = self.split();
        protocol::write_page(bus, ctx, page, data, spare)
    }

    fn erase_block(&mut self, block: u32) -> Result<()> {
        let (bus, ctx) = self.split();
        protocol::erase_block(bus, ctx, block)
    }

    fn copy_back(&mut self, src_page: u32, dst_page: u32) -> Result<()> {
        let (bus, ctx) = self.split();
        protocol::copy_back(bus, ctx, src_page, dst_page)
    }
}
