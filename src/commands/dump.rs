//! Whole-partition dump

use super::format_size;
use indicatif::{ProgressBar, ProgressStyle};
use rnand_core::bus::NandBus;
use rnand_core::registry::{NandChip, PageDevice};
use rnand_core::PageStatus;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

fn create_progress_bar_style() -> Result<ProgressStyle, Box<dyn std::error::Error>> {
    Ok(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")?
        .progress_chars("#>-"))
}

/// Read every page of a partition into `output`
///
/// Pages with an ECC mismatch are written as read and counted; the dump
/// carries on and reports them at the end.
pub fn run_dump<B: NandBus>(
    chip: &mut NandChip<B>,
    partition: &str,
    output: &Path,
    with_spare: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut part = chip.partition_by_name(partition)?;
    let geometry = *part.geometry();
    let pages = geometry.page_count();
    let spare_len = if with_spare { geometry.oob_free } else { 0 };
    let record = geometry.page_size + spare_len;
    let total_bytes = pages as u64 * record as u64;

    println!(
        "Dumping {}: {} pages ({})",
        partition,
        pages,
        format_size(total_bytes)
    );

    let mut writer = BufWriter::new(File::create(output)?);
    let mut data = vec![0u8; geometry.page_size];
    let mut spare = vec![0u8; spare_len];

    let pb = ProgressBar::new(total_bytes);
    pb.set_style(create_progress_bar_style()?);

    let mut ecc_errors = Vec::new();
    for page in 0..pages {
        let spare_buf = if with_spare && spare_len > 0 {
            Some(spare.as_mut_slice())
        } else {
            None
        };
        if part.read_page(page, Some(&mut data), spare_buf)? == PageStatus::EccMismatch {
            ecc_errors.push(page);
        }

        writer.write_all(&data)?;
        if with_spare {
            writer.write_all(&spare)?;
        }
        pb.inc(record as u64);
    }
    writer.flush()?;

    pb.finish_with_message("Dump complete");
    println!("Wrote {} bytes to {:?}", total_bytes, output);

    if !ecc_errors.is_empty() {
        log::warn!(
            "{} page(s) with ECC mismatch: {:?}",
            ecc_errors.len(),
            ecc_errors
        );
        return Err(format!("{} page(s) failed ECC verification", ecc_errors.len()).into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rnand_core::{EccMode, Geometry};
    use rnand_dummy::{DummyConfig, DummyNand};

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("rnand-{}-{}", std::process::id(), name))
    }

    fn small_chip() -> NandChip<DummyNand> {
        let geometry = Geometry::hy27uf081g(0, 1);
        let mut chip = NandChip::new(
            DummyNand::new(DummyConfig::for_geometry(&geometry)),
            EccMode::Hamming256,
        );
        chip.register("nand0", geometry).unwrap();
        chip
    }

    #[test]
    fn test_dump_with_spare() {
        let mut chip = small_chip();
        let data = vec![0x5Au8; 2048];
        let spare = [0x01u8, 0x02, 0x03];
        chip.partition_by_name("nand0")
            .unwrap()
            .write_page(65, Some(&data), Some(&spare))
            .unwrap();
        // last page of the last block
        chip.partition_by_name("nand0")
            .unwrap()
            .write_page(127, Some(&data), None)
            .unwrap();

        let path = temp_path("dump-spare.bin");
        run_dump(&mut chip, "nand0", &path, true).unwrap();
        let dump = std::fs::read(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        let record = 2048 + 40;
        assert_eq!(dump.len(), 128 * record);
        let page = &dump[65 * record..66 * record];
        assert_eq!(&page[..2048], &data[..]);
        assert_eq!(&page[2048..2051], &spare);
        assert!(page[2051..].iter().all(|&b| b == 0xFF));
        assert!(dump[..record].iter().all(|&b| b == 0xFF));
        assert_eq!(&dump[127 * record..127 * record + 2048], &data[..]);
    }

    #[test]
    fn test_dump_reports_ecc_errors() {
        let mut chip = small_chip();
        let data = vec![0x00u8; 2048];
        chip.partition_by_name("nand0")
            .unwrap()
            .write_page(3, Some(&data), None)
            .unwrap();
        chip.bus_mut().corrupt(3, 17, 0x10);

        let path = temp_path("dump-ecc.bin");
        let result = run_dump(&mut chip, "nand0", &path, false);
        let dump = std::fs::read(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert!(result.is_err());
        assert_eq!(dump.len(), 128 * 2048);
        assert_eq!(dump[3 * 2048 + 17], 0x10);
    }
}
