// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! SD-card firmware update sequence.
//!
//! One attempt runs these phases in order, each with one success edge:
//! - Mounting: mount the SD card
//! - Locating: open the image; a missing file ends the attempt successfully
//! - SizeCheck: reject images larger than the program region
//! - Erasing: erase the whole program region
//! - Programming: write the image in 8-byte units
//! - ReopeningForVerify / Verifying: read the image again in 4-byte units
//!   and compare against flash
//! - Closing / Deleting: remove the consumed image
//! - Ejected: unmount, always exactly once
//!
//! Any failure closes the open file, switches the LEDs off and ejects the
//! card before the error is returned. Nothing is retried.

use core::fmt::Write;

use embedded_hal::digital::StatefulOutputPin;

use crate::error::{ErrorCode, FsError, UpdateError};
use crate::layout::{ERASED_BYTE, IMAGE_FILENAME, PROGRAM_UNIT, PROGRESS_INTERVAL, VERIFY_UNIT};
use crate::program::{ProgramMemory, ProgramWriter};
use crate::status::{StatusReporter, TAG_APP, TAG_BOOT, TAG_FLASH, TAG_SD, TAG_VERIFY};
use crate::storage::{Filesystem, ImageFile, StorageSession};

/// Step of the update sequence.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Mounting,
    Locating,
    SizeCheck,
    Erasing,
    Programming,
    ReopeningForVerify,
    Verifying,
    Closing,
    Deleting,
    Ejected,
}

impl Phase {
    /// Console tag used for lines emitted during this phase.
    pub fn tag(self) -> &'static str {
        match self {
            Phase::SizeCheck => TAG_APP,
            Phase::Erasing | Phase::Programming => TAG_FLASH,
            Phase::Verifying => TAG_VERIFY,
            Phase::Idle => TAG_BOOT,
            _ => TAG_SD,
        }
    }
}

/// Successful end of an attempt.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No image on the card.
    NoImage,
    /// Image programmed, verified and deleted.
    Updated { size: u32 },
}

#[derive(Debug, Clone, Copy)]
pub struct UpdateConfig<'a> {
    pub image_name: &'a str,
    /// Units between progress reports; 0 disables them.
    pub progress_interval: u32,
}

impl Default for UpdateConfig<'_> {
    fn default() -> Self {
        Self {
            image_name: IMAGE_FILENAME,
            progress_interval: PROGRESS_INTERVAL,
        }
    }
}

/// Run one update attempt and return its outcome code.
pub fn run_update<F, P, W, S, G>(
    config: &UpdateConfig<'_>,
    fs: &mut F,
    flash: &mut P,
    status: &mut StatusReporter<W, S, G>,
) -> ErrorCode
where
    F: Filesystem,
    P: ProgramMemory,
    W: Write,
    S: StatefulOutputPin,
    G: StatefulOutputPin,
{
    let result = UpdateAttempt::new(config, status).run(fs, flash);
    ErrorCode::of(&result)
}

/// A single pass over the update sequence.
pub struct UpdateAttempt<'a, W, S, G> {
    config: &'a UpdateConfig<'a>,
    status: &'a mut StatusReporter<W, S, G>,
    phase: Phase,
    image_size: Option<u32>,
    bytes_processed: u32,
}

impl<'a, W, S, G> UpdateAttempt<'a, W, S, G>
where
    W: Write,
    S: StatefulOutputPin,
    G: StatefulOutputPin,
{
    pub fn new(config: &'a UpdateConfig<'a>, status: &'a mut StatusReporter<W, S, G>) -> Self {
        Self {
            config,
            status,
            phase: Phase::Idle,
            image_size: None,
            bytes_processed: 0,
        }
    }

    pub fn run<F, P>(mut self, fs: &mut F, flash: &mut P) -> Result<Outcome, UpdateError>
    where
        F: Filesystem,
        P: ProgramMemory,
    {
        self.enter(Phase::Mounting);
        let mut session = match StorageSession::mount(fs) {
            Ok(session) => session,
            Err(e) => {
                let error = UpdateError::StorageMount(e);
                self.report_failure(&error);
                return Err(error);
            }
        };
        self.status.phase_result(TAG_SD, "SD mounted.");

        let mut writer = ProgramWriter::new(flash);
        let result = self.apply(&mut session, &mut writer);

        if let Err(error) = &result {
            self.report_failure(error);
        }

        self.enter(Phase::Ejected);
        if let Some(e) = session.eject() {
            self.status.line(TAG_SD, format_args!("Eject: {}", e));
        }
        self.status.phase_result(TAG_SD, "SD ejected.");

        result
    }

    fn apply<F, P>(
        &mut self,
        session: &mut StorageSession<'_, F>,
        writer: &mut ProgramWriter<'_, P>,
    ) -> Result<Outcome, UpdateError>
    where
        F: Filesystem,
        P: ProgramMemory,
    {
        let name = self.config.image_name;

        self.enter(Phase::Locating);
        let image = match session.open_image(name) {
            Ok(image) => image,
            Err(FsError::NotFound) => {
                self.status.phase_result(TAG_SD, "No file to flash.");
                return Ok(Outcome::NoImage);
            }
            Err(e) => return Err(UpdateError::ImageOpen(e)),
        };
        self.status.phase_result(TAG_SD, "Software found on SD.");

        let size = image.size();
        self.image_size = Some(size);

        self.enter(Phase::SizeCheck);
        writer.check_size(size)?;
        self.status
            .line(TAG_APP, format_args!("App size OK ({} bytes).", size));

        self.enter(Phase::Erasing);
        self.status.phase_start(TAG_FLASH, "Erasing flash");
        self.status.erase_started();
        writer.erase().map_err(UpdateError::Erase)?;
        self.status.erase_finished();
        self.status.phase_result(TAG_FLASH, "Flash erase finished.");

        self.program(image, writer)?;

        self.enter(Phase::ReopeningForVerify);
        let mut image = session.open_image(name).map_err(UpdateError::ImageReopen)?;

        self.verify(&mut image, writer)?;

        self.enter(Phase::Closing);
        image.close().map_err(UpdateError::FileClose)?;

        self.enter(Phase::Deleting);
        self.status.phase_start(TAG_SD, "Erasing firmware file");
        session.delete(name).map_err(UpdateError::FileDelete)?;

        Ok(Outcome::Updated { size })
    }

    fn program<F, P>(
        &mut self,
        mut image: ImageFile<'_, F>,
        writer: &mut ProgramWriter<'_, P>,
    ) -> Result<(), UpdateError>
    where
        F: Filesystem,
        P: ProgramMemory,
    {
        self.enter(Phase::Programming);
        self.status.phase_start(TAG_FLASH, "Starting programming");
        self.status.programming_started();
        writer.begin();

        let total = image.size();
        let mut units: u32 = 0;
        loop {
            let offset = units * PROGRAM_UNIT as u32;
            let mut unit = [ERASED_BYTE; PROGRAM_UNIT];
            let n = image
                .read_chunk(&mut unit)
                .map_err(|error| UpdateError::ImageRead {
                    phase: Phase::Programming,
                    offset,
                    error,
                })?;
            if n == 0 {
                break;
            }

            writer
                .write_next(u64::from_le_bytes(unit))
                .map_err(|error| UpdateError::Program { offset, error })?;
            units += 1;
            self.bytes_processed += n as u32;

            if self.is_tick(units) {
                self.status.program_tick(self.bytes_processed, total);
            }
        }

        writer.end().map_err(|error| UpdateError::Program {
            offset: units * PROGRAM_UNIT as u32,
            error,
        })?;
        // Not fatal, the verify pass reopens the image
        if let Err(e) = image.close() {
            self.status.line(TAG_SD, format_args!("Close: {}", e));
        }

        self.status.programming_finished();
        self.status.phase_result(TAG_FLASH, "Programming finished.");
        self.status
            .line(TAG_FLASH, format_args!("Flashed: {} bytes.", self.bytes_processed));
        Ok(())
    }

    fn verify<F, P>(
        &mut self,
        image: &mut ImageFile<'_, F>,
        writer: &mut ProgramWriter<'_, P>,
    ) -> Result<(), UpdateError>
    where
        F: Filesystem,
        P: ProgramMemory,
    {
        self.enter(Phase::Verifying);
        self.status.phase_start(TAG_VERIFY, "Verifying flash");

        let total = image.size();
        let mut units: u32 = 0;
        loop {
            let offset = units * VERIFY_UNIT as u32;
            let mut word = [ERASED_BYTE; VERIFY_UNIT];
            let n = image
                .read_chunk(&mut word)
                .map_err(|error| UpdateError::ImageRead {
                    phase: Phase::Verifying,
                    offset,
                    error,
                })?;
            if n == 0 {
                break;
            }

            // Only the real image bytes of a short tail word are compared.
            let mask = if n >= VERIFY_UNIT {
                u32::MAX
            } else {
                (1u32 << (n * 8)) - 1
            };
            let expected = u32::from_le_bytes(word) & mask;
            let found = writer.read_back(offset) & mask;
            if expected != found {
                return Err(UpdateError::Verify {
                    offset,
                    address: writer.base() + offset,
                    expected,
                    found,
                });
            }

            units += 1;
            self.bytes_processed += n as u32;

            if self.is_tick(units) {
                self.status.verify_tick(self.bytes_processed, total);
            }
        }

        self.status.verify_finished();
        self.status.phase_result(TAG_VERIFY, "Verification passed.");
        Ok(())
    }

    fn enter(&mut self, phase: Phase) {
        #[cfg(feature = "defmt")]
        defmt::debug!("update phase: {}", phase);
        if matches!(phase, Phase::Programming | Phase::Verifying) {
            self.bytes_processed = 0;
        }
        self.phase = phase;
    }

    fn is_tick(&self, units: u32) -> bool {
        let interval = self.config.progress_interval;
        interval != 0 && units % interval == 0
    }

    fn report_failure(&mut self, error: &UpdateError) {
        let tag = error.phase().tag();
        self.status.line(tag, format_args!("{}", error));
        if let Some(size) = self.image_size {
            if matches!(self.phase, Phase::Programming | Phase::Verifying) {
                self.status.line(
                    tag,
                    format_args!("Processed {} of {} bytes.", self.bytes_processed, size),
                );
            }
        }
        self.status.fault(error.code());
    }
}
