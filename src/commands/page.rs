//! Single page and block commands

use rnand_core::bus::NandBus;
use rnand_core::registry::{NandChip, PageDevice};
use rnand_core::PageStatus;
use std::fs;
use std::path::Path;

type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Read one page, or only its spare bytes
pub fn run_read<B: NandBus>(
    chip: &mut NandChip<B>,
    partition: &str,
    page: u32,
    output: Option<&Path>,
    spare_only: bool,
) -> CmdResult {
    let mut part = chip.partition_by_name(partition)?;
    let geometry = *part.geometry();
    let mut spare = vec![0u8; geometry.oob_free.max(1)];

    if spare_only {
        part.read_page(page, None, Some(&mut spare))?;
        println!("Spare: {}", hex_line(&spare));
        return Ok(());
    }

    let mut data = vec![0u8; geometry.page_size];
    let status = part.read_page(page, Some(&mut data), Some(&mut spare))?;

    match output {
        Some(path) => {
            fs::write(path, &data)?;
            println!("Wrote {} bytes to {}", data.len(), path.display());
        }
        None => print_hex_dump(&data),
    }
    println!("Spare: {}", hex_line(&spare));

    match status {
        PageStatus::Ok => {
            println!("ECC: ok");
            Ok(())
        }
        PageStatus::EccMismatch => {
            println!("ECC: mismatch");
            let addr = geometry.resolve_page(page)?;
            Ok(status.check(&addr)?)
        }
    }
}

/// Program one page from a file, with optional spare bytes
pub fn run_write<B: NandBus>(
    chip: &mut NandChip<B>,
    partition: &str,
    page: u32,
    input: &Path,
    spare: Option<&Path>,
) -> CmdResult {
    let mut part = chip.partition_by_name(partition)?;
    let geometry = *part.geometry();

    let data = pad_page(fs::read(input)?, geometry.page_size)?;
    let spare = match spare {
        Some(path) => {
            let bytes = fs::read(path)?;
            if bytes.len() > geometry.oob_free {
                return Err(format!(
                    "spare file is {} bytes, only {} spare bytes are free",
                    bytes.len(),
                    geometry.oob_free
                )
                .into());
            }
            Some(bytes)
        }
        None => None,
    };

    part.write_page(page, Some(&data), spare.as_deref())?;
    println!("Programmed page {}", page);
    Ok(())
}

/// Erase one block
pub fn run_erase<B: NandBus>(chip: &mut NandChip<B>, partition: &str, block: u32) -> CmdResult {
    chip.partition_by_name(partition)?.erase_block(block)?;
    println!("Erased block {}", block);
    Ok(())
}

/// Copy a page inside the chip
pub fn run_copy<B: NandBus>(
    chip: &mut NandChip<B>,
    partition: &str,
    src: u32,
    dst: u32,
) -> CmdResult {
    chip.partition_by_name(partition)?.copy_back(src, dst)?;
    println!("Copied page {} to page {}", src, dst);
    Ok(())
}

/// Pad file contents to a full page with the erased value
fn pad_page(mut data: Vec<u8>, page_size: usize) -> Result<Vec<u8>, String> {
    if data.len() > page_size {
        return Err(format!(
            "input is {} bytes, larger than the {} byte page",
            data.len(),
            page_size
        ));
    }
    data.resize(page_size, 0xFF);
    Ok(data)
}

fn hex_line(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_hex_dump(data: &[u8]) {
    for (i, line) in data.chunks(16).enumerate() {
        println!("{:04X}: {}", i * 16, hex_line(line));
    }
}
