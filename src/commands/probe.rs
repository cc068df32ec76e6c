//! Probe command implementation

use rnand_core::bus::NandBus;
use rnand_core::registry::NandChip;

/// Known (manufacturer, device) ID pairs
const KNOWN_CHIPS: &[([u8; 2], &str, &str)] = &[
    ([0xAD, 0xF1], "Hynix", "HY27UF081G2A"),
    ([0xAD, 0xDA], "Hynix", "HY27UF082G2B"),
    ([0xEC, 0xF1], "Samsung", "K9F1G08U0B"),
    ([0xEC, 0xDA], "Samsung", "K9F2G08U0A"),
];

fn lookup(id: [u8; 2]) -> Option<(&'static str, &'static str)> {
    KNOWN_CHIPS
        .iter()
        .find(|(known, _, _)| *known == id)
        .map(|(_, vendor, name)| (*vendor, *name))
}

/// Read the chip ID and show what is registered on the chip
pub fn run_probe<B: NandBus>(chip: &mut NandChip<B>) -> Result<(), Box<dyn std::error::Error>> {
    chip.reset();
    let id = chip.read_id();
    log::info!("NAND ID: {:02X} {:02X}", id[0], id[1]);

    match lookup(id) {
        Some((vendor, name)) => {
            println!("Found NAND chip:");
            println!("  Vendor: {}", vendor);
            println!("  Name:   {}", name);
        }
        None => println!("Unknown NAND chip"),
    }
    println!("  ID:     {:02X} {:02X}", id[0], id[1]);
    println!("  ECC:    {}", chip.ecc_name().unwrap_or("none"));

    if let Some(info) = chip.partitions().first() {
        let g = &info.geometry;
        println!(
            "  Page:   {} + {} bytes ({} free spare), {} pages/block",
            g.page_size, g.oob_size, g.oob_free, g.pages_per_block
        );
    }
    println!();
    super::list_partitions(chip);

    Ok(())
}
