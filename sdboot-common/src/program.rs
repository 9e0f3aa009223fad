// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Program memory: the flash driver seam and the sequential writer used by
//! the update sequence.

use crate::error::{FlashError, UpdateError};
use crate::layout::{PROGRAM_UNIT, VERIFY_UNIT};

/// Flash driver for the application region.
///
/// Offsets are relative to `base()`.
pub trait ProgramMemory {
    /// Absolute address of the first byte of the region.
    fn base(&self) -> u32;
    /// Size of the region in bytes. Only whole program units of it are
    /// usable, see [`ProgramWriter::usable_capacity`].
    fn capacity(&self) -> u32;

    /// Prepare the controller for erase/program operations.
    fn init(&mut self);
    /// Erase the whole region.
    fn erase(&mut self) -> Result<(), FlashError>;

    fn begin(&mut self);
    /// Program one unit at `offset`. Offsets arrive in increasing order.
    fn write_unit(&mut self, offset: u32, unit: [u8; PROGRAM_UNIT]) -> Result<(), FlashError>;
    /// Commit anything still buffered.
    fn end(&mut self) -> Result<(), FlashError>;

    fn read_word(&mut self, offset: u32) -> u32;
}

/// Erase-then-append writer over a [`ProgramMemory`].
///
/// Units are written back to back from the region base. Nothing can be
/// programmed until the region has been erased through this writer.
pub struct ProgramWriter<'p, P: ProgramMemory> {
    flash: &'p mut P,
    erased: bool,
    next_offset: u32,
}

impl<'p, P: ProgramMemory> ProgramWriter<'p, P> {
    pub fn new(flash: &'p mut P) -> Self {
        Self {
            flash,
            erased: false,
            next_offset: 0,
        }
    }

    pub fn base(&self) -> u32 {
        self.flash.base()
    }

    pub fn capacity(&self) -> u32 {
        self.flash.capacity()
    }

    /// Bytes that whole program units can cover.
    pub fn usable_capacity(&self) -> u32 {
        let capacity = self.flash.capacity();
        capacity - capacity % PROGRAM_UNIT as u32
    }

    /// Reject images that do not fit the region once padded to whole units.
    pub fn check_size(&self, len: u32) -> Result<(), UpdateError> {
        let capacity = self.usable_capacity();
        if len > capacity {
            return Err(UpdateError::ImageTooLarge {
                size: len,
                capacity,
            });
        }
        Ok(())
    }

    pub fn erase(&mut self) -> Result<(), FlashError> {
        self.flash.init();
        self.flash.erase()?;
        self.erased = true;
        self.next_offset = 0;
        Ok(())
    }

    pub fn begin(&mut self) {
        self.flash.begin();
    }

    /// Program the next unit. `word` holds the image bytes in little-endian order.
    pub fn write_next(&mut self, word: u64) -> Result<(), FlashError> {
        if !self.erased {
            return Err(FlashError::NotErased);
        }
        let end = self.next_offset as u64 + PROGRAM_UNIT as u64;
        if end > self.flash.capacity() as u64 {
            return Err(FlashError::OutOfBounds);
        }

        self.flash.write_unit(self.next_offset, word.to_le_bytes())?;
        self.next_offset += PROGRAM_UNIT as u32;
        Ok(())
    }

    pub fn end(&mut self) -> Result<(), FlashError> {
        self.flash.end()
    }

    /// Bytes programmed so far, padding included.
    pub fn written(&self) -> u32 {
        self.next_offset
    }

    /// Read back one verification word at `offset`.
    pub fn read_back(&mut self, offset: u32) -> u32 {
        debug_assert_eq!(offset as usize % VERIFY_UNIT, 0);
        self.flash.read_word(offset)
    }
}
