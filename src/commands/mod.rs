//! CLI command implementations
//!
//! Every command works on a [`rnand_core::registry::NandChip`] whose
//! partitions were registered from the partition table, and addresses pages
//! and blocks relative to the partition named on the command line.

pub mod dump;
mod list;
pub mod page;
mod probe;

pub use list::list_partitions;
pub use probe::run_probe;

/// Format a byte count for display
pub(crate) fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{} MiB", bytes / (1024 * 1024))
    } else if bytes >= 1024 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}
