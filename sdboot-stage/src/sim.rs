// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Simulated program region and status LEDs for dry runs on the host.

use std::convert::Infallible;
use std::fmt;

use embedded_hal::digital::{ErrorType, OutputPin, StatefulOutputPin};
use sdboot_common::error::FlashError;
use sdboot_common::layout::{APP_ADDR, ERASED_BYTE, PROGRAM_REGION_SIZE, PROGRAM_UNIT};
use sdboot_common::program::ProgramMemory;

/// Contents of flash before the first erase; not a valid vector table.
const UNKNOWN_BYTE: u8 = 0x00;

/// In-memory copy of the device's program region.
///
/// Programming follows NOR rules: it can only clear bits, so writing over
/// unerased data shows up as a verification failure.
pub struct SimulatedRegion {
    mem: Vec<u8>,
    pub erases: u32,
    pub units_written: u32,
    pub words_read: u32,
}

impl SimulatedRegion {
    pub fn new() -> Self {
        Self::with_capacity(PROGRAM_REGION_SIZE as usize)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            mem: vec![UNKNOWN_BYTE; capacity],
            erases: 0,
            units_written: 0,
            words_read: 0,
        }
    }

    pub fn contents(&self) -> &[u8] {
        &self.mem
    }
}

impl Default for SimulatedRegion {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramMemory for SimulatedRegion {
    fn base(&self) -> u32 {
        APP_ADDR
    }

    fn capacity(&self) -> u32 {
        self.mem.len() as u32
    }

    fn init(&mut self) {}

    fn erase(&mut self) -> Result<(), FlashError> {
        self.mem.fill(ERASED_BYTE);
        self.erases += 1;
        Ok(())
    }

    fn begin(&mut self) {}

    fn write_unit(&mut self, offset: u32, unit: [u8; PROGRAM_UNIT]) -> Result<(), FlashError> {
        let start = offset as usize;
        let cells = self
            .mem
            .get_mut(start..start + PROGRAM_UNIT)
            .ok_or(FlashError::OutOfBounds)?;
        for (cell, byte) in cells.iter_mut().zip(unit) {
            *cell &= byte;
        }
        if cells[..] != unit[..] {
            return Err(FlashError::WriteMismatch(offset));
        }
        self.units_written += 1;
        Ok(())
    }

    fn end(&mut self) -> Result<(), FlashError> {
        Ok(())
    }

    fn read_word(&mut self, offset: u32) -> u32 {
        self.words_read += 1;
        let i = offset as usize;
        match self.mem.get(i..i + 4) {
            Some(b) => u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            None => u32::MAX,
        }
    }
}

/// Status LED that remembers its level and how often it changed.
pub struct VirtualLed {
    pub name: &'static str,
    pub high: bool,
    pub changes: u32,
}

impl VirtualLed {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            high: false,
            changes: 0,
        }
    }

    fn set(&mut self, high: bool) {
        if self.high != high {
            self.changes += 1;
        }
        self.high = high;
    }
}

impl fmt::Display for VirtualLed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = if self.high { "on" } else { "off" };
        write!(f, "{} LED {} ({} changes)", self.name, level, self.changes)
    }
}

impl ErrorType for VirtualLed {
    type Error = Infallible;
}

impl OutputPin for VirtualLed {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.set(true);
        Ok(())
    }
}

impl StatefulOutputPin for VirtualLed {
    fn is_set_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.high)
    }

    fn is_set_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.high)
    }
}

/// Console sink printing device lines on stdout.
pub struct Stdout;

impl fmt::Write for Stdout {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        print!("{}", s.replace("\r\n", "\n"));
        Ok(())
    }
}
