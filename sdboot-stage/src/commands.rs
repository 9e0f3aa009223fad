// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command implementations for card staging and dry runs.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use crc::{Crc, CRC_32_ISO_HDLC};
use indicatif::{ProgressBar, ProgressStyle};

use sdboot_common::error::UpdateError;
use sdboot_common::layout::PROGRAM_REGION_SIZE;
use sdboot_common::status::StatusReporter;
use sdboot_common::update::{Outcome, UpdateAttempt, UpdateConfig};
use sdboot_common::ErrorCode;

use crate::card::{find_image, DirFilesystem};
use crate::sim::{SimulatedRegion, Stdout, VirtualLed};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);
const CHUNK_SIZE: usize = 64 * 1024;

fn check_fits(len: usize) -> Result<()> {
    if len > PROGRAM_REGION_SIZE as usize {
        bail!(
            "Image is {} bytes, the program region holds {} bytes",
            len,
            PROGRAM_REGION_SIZE
        );
    }
    Ok(())
}

/// Copy an image onto the card root under `name`.
pub fn stage(file: &Path, card: &Path, name: &str) -> Result<()> {
    let firmware = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    check_fits(firmware.len())?;
    if !card.is_dir() {
        bail!("Card directory {} does not exist", card.display());
    }

    // Replace an image staged under another letter case
    if let Some(existing) = find_image(card, name)? {
        fs::remove_file(&existing)
            .with_context(|| format!("Failed to remove {}", existing.display()))?;
    }

    let size = firmware.len();
    let crc32 = CRC32.checksum(&firmware);
    println!(
        "Firmware: {} ({} bytes, CRC32: 0x{:08x})",
        file.display(),
        size,
        crc32
    );

    let target = card.join(name);
    let mut out =
        File::create(&target).with_context(|| format!("Failed to create {}", target.display()))?;

    let pb = ProgressBar::new(size as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )?
            .progress_chars("#>-"),
    );

    let mut written = 0usize;
    for chunk in firmware.chunks(CHUNK_SIZE) {
        if let Err(e) = out.write_all(chunk) {
            pb.abandon();
            return Err(e).with_context(|| format!("Write failed at offset {}", written));
        }
        written += chunk.len();
        pb.set_position(written as u64);
    }
    out.sync_all().context("Failed to flush the card")?;
    pb.finish_with_message("Copy complete");

    let readback = fs::read(&target).context("Failed to read the staged image back")?;
    if CRC32.checksum(&readback) != crc32 || readback.len() != size {
        bail!("Read-back of {} does not match the image", target.display());
    }

    println!();
    println!("Staged as {}.", target.display());
    println!("Insert the card and reset the device to apply it.");
    Ok(())
}

/// Describe what is staged on the card.
pub fn status(card: &Path, name: &str) -> Result<()> {
    let Some(path) = find_image(card, name)
        .with_context(|| format!("Failed to list {}", card.display()))?
    else {
        println!("No {} on {}.", name, card.display());
        return Ok(());
    };

    let image = fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
    println!("Card Status:");
    println!("  Image:    {}", path.display());
    println!("  Size:     {} bytes", image.len());
    println!("  CRC32:    0x{:08x}", CRC32.checksum(&image));
    println!(
        "  Fits:     {} ({} bytes available)",
        if image.len() <= PROGRAM_REGION_SIZE as usize { "yes" } else { "no" },
        PROGRAM_REGION_SIZE
    );
    Ok(())
}

/// Result of one attempt against the card and a simulated region.
pub struct Simulation {
    pub result: Result<Outcome, UpdateError>,
    pub region: SimulatedRegion,
    pub step: VirtualLed,
    pub progress: VirtualLed,
}

/// Run the update sequence exactly as the device would, logging to `console`.
pub fn simulate_attempt<W: std::fmt::Write>(
    card: &Path,
    name: &str,
    region: SimulatedRegion,
    console: W,
) -> Simulation {
    let mut region = region;
    let mut fs = DirFilesystem::new(card);
    let mut status = StatusReporter::new(
        console,
        VirtualLed::new("step"),
        VirtualLed::new("progress"),
    );
    let config = UpdateConfig {
        image_name: name,
        ..UpdateConfig::default()
    };

    let result = UpdateAttempt::new(&config, &mut status).run(&mut fs, &mut region);
    let (_, step, progress) = status.release();
    Simulation {
        result,
        region,
        step,
        progress,
    }
}

/// Dry-run the device's update against the card.
pub fn simulate(card: &Path, name: &str, keep: bool) -> Result<()> {
    // A missing card is reported by the attempt itself
    let staged = match find_image(card, name).ok().flatten() {
        Some(path) if keep => {
            let image =
                fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
            Some((image, path))
        }
        _ => None,
    };

    println!("Simulating update from {}", card.display());
    let sim = simulate_attempt(card, name, SimulatedRegion::new(), Stdout);

    if let Some((image, path)) = &staged {
        if !path.exists() {
            fs::write(path, image)
                .with_context(|| format!("Failed to restore {}", path.display()))?;
            println!("Restored {}.", path.display());
        }
    }

    println!();
    println!("{}", sim.step);
    println!("{}", sim.progress);
    println!(
        "Flash: {} erase(s), {} unit(s) programmed, {} word(s) verified",
        sim.region.erases, sim.region.units_written, sim.region.words_read
    );

    let code = ErrorCode::of(&sim.result);
    match sim.result {
        Ok(Outcome::NoImage) => println!("Result: {} (nothing to update)", code),
        Ok(Outcome::Updated { size }) => {
            println!("Result: {} ({} bytes applied)", code, size);
            if let Some((image, _)) = &staged {
                if sim.region.contents()[..image.len()] != image[..] {
                    bail!("Simulated region does not match the image");
                }
            }
        }
        Err(e) => bail!("Update failed with {}: {}", code, e),
    }
    Ok(())
}
