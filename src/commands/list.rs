//! List command implementation

use super::format_size;
use rnand_core::bus::NandBus;
use rnand_core::registry::NandChip;

/// List the partitions registered on the chip
pub fn list_partitions<B: NandBus>(chip: &NandChip<B>) {
    println!("Registered partitions:");
    println!();
    println!(
        "{:<12} {:>7} {:>7} {:>8} {:>10}",
        "Name", "Start", "End", "Pages", "Size"
    );
    println!("{}", "-".repeat(48));

    for info in chip.partitions() {
        let g = &info.geometry;
        let pages = g.page_count() as u64;
        println!(
            "{:<12} {:>7} {:>7} {:>8} {:>10}",
            info.name,
            g.block_start,
            g.block_end,
            pages,
            format_size(pages * g.page_size as u64)
        );
    }
}
