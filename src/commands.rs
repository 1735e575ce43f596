//! Command implementations

use std::fs;
use std::path::Path;

use b003flash_core::{B003Flasher, HaltMode, Transport};
use indicatif::{ProgressBar, ProgressStyle};

/// Image bytes handed to the engine per progress tick.
const WRITE_CHUNK_SIZE: usize = 1024;

/// Run the info command
pub fn run_info<T: Transport>(dev: &mut B003Flasher<T>) -> Result<(), Box<dyn std::error::Error>> {
    let info = dev.chip_info()?;
    println!("{}", info);
    Ok(())
}

/// Run the read command
pub fn run_read<T: Transport>(
    dev: &mut B003Flasher<T>,
    address: u32,
    length: u32,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = dev.read_bytes(address, length)?;
    match output {
        Some(path) => {
            fs::write(path, &data)?;
            println!("Wrote {} bytes to {:?}", data.len(), path);
        }
        None => hexdump(address, &data),
    }
    Ok(())
}

/// Run the write command
pub fn run_write<T: Transport>(
    dev: &mut B003Flasher<T>,
    input: &Path,
    offset: u32,
    reboot: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let image = fs::read(input)?;
    println!("Writing {} bytes at 0x{:08X}", image.len(), offset);

    let pb = ProgressBar::new(image.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")?
            .progress_chars("#>-"),
    );

    let mut written = 0usize;
    while written < image.len() {
        let chunk_size = std::cmp::min(WRITE_CHUNK_SIZE, image.len() - written);
        dev.write_image(&image[written..written + chunk_size], offset + written as u32)?;
        written += chunk_size;
        pb.set_position(written as u64);
    }
    pb.finish();

    println!("Done");

    if reboot {
        run_reboot(dev)?;
    }
    Ok(())
}

/// Run the erase command
pub fn run_erase<T: Transport>(
    dev: &mut B003Flasher<T>,
    address: u32,
    length: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(format!("Erasing {} bytes at 0x{:08X}", length, address));

    dev.erase(address, length)?;

    pb.finish_with_message("Erase done");
    Ok(())
}

/// Run the reboot command
pub fn run_reboot<T: Transport>(
    dev: &mut B003Flasher<T>,
) -> Result<(), Box<dyn std::error::Error>> {
    dev.set_halt_mode(HaltMode::Reboot)?;
    println!("Rebooted into application");
    Ok(())
}

/// Print a classic address/hex/ascii dump to stdout
fn hexdump(base: u32, data: &[u8]) {
    for (row, chunk) in data.chunks(16).enumerate() {
        print!("{:08x} |", base as usize + row * 16);
        for col in 0..16 {
            match chunk.get(col) {
                Some(b) => print!(" {:02x}", b),
                None => print!("   "),
            }
        }
        print!("   ");
        for b in chunk {
            let c = if (0x20..0x7F).contains(b) {
                *b as char
            } else {
                '.'
            };
            print!("{}", c);
        }
        println!();
    }
    println!("dumped {} bytes", data.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use b003flash_dummy::DummyBootloader;

    fn dev() -> B003Flasher<DummyBootloader> {
        B003Flasher::new(DummyBootloader::new())
    }

    #[test]
    fn test_info_and_erase_run_against_emulator() {
        let mut dev = dev();
        run_info(&mut dev).unwrap();
        run_erase(&mut dev, 0x0800_0000, 128).unwrap();
    }

    #[test]
    fn test_write_round_trips_through_file() {
        let mut dev = dev();
        let path = std::env::temp_dir().join("b003flash-cmd-test.bin");
        let image: Vec<u8> = (0..128u8).collect();
        fs::write(&path, &image).unwrap();
        run_write(&mut dev, &path, 0x0800_0000, false).unwrap();
        let back = dev.read_bytes(0x0800_0000, 128).unwrap();
        assert_eq!(back, image);
        fs::remove_file(&path).ok();
    }
}
