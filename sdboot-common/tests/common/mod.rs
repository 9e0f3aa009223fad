// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! In-memory collaborators for driving the update sequence on the host.

#![allow(dead_code)]

use std::collections::HashMap;
use std::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin, StatefulOutputPin};
use sdboot_common::error::{FlashError, FsError, UpdateError};
use sdboot_common::layout::{ERASED_BYTE, IMAGE_FILENAME, PROGRAM_UNIT};
use sdboot_common::program::ProgramMemory;
use sdboot_common::status::StatusReporter;
use sdboot_common::storage::Filesystem;
use sdboot_common::update::{Outcome, UpdateAttempt, UpdateConfig};

// =============================================================================
// Filesystem
// =============================================================================

pub struct MockFile {
    name: String,
    pos: usize,
    /// 1-based number of the `open` call that produced this handle.
    open_number: u32,
}

#[derive(Default)]
pub struct MockFs {
    pub files: HashMap<String, Vec<u8>>,
    /// Largest number of bytes a single `read` returns (0 = unlimited).
    pub max_read: usize,

    pub fail_mount: Option<FsError>,
    /// Fail the n-th `open` call (1-based).
    pub fail_open: Option<(u32, FsError)>,
    /// Fail reads of the handle from the n-th `open` once it reaches `pos`.
    pub fail_read: Option<(u32, usize, FsError)>,
    /// Fail closing the handle from the n-th `open`.
    pub fail_close: Option<(u32, FsError)>,
    pub fail_delete: Option<FsError>,

    pub mounted: bool,
    pub mounts: u32,
    pub unmounts: u32,
    pub opens: u32,
    pub closes: u32,
    pub deletes: u32,
    /// Handles handed out and not yet closed.
    pub open_handles: u32,
}

impl MockFs {
    pub fn with_image(data: &[u8]) -> Self {
        let mut fs = Self::default();
        fs.files.insert(IMAGE_FILENAME.to_string(), data.to_vec());
        fs
    }

    pub fn has_image(&self) -> bool {
        self.files.contains_key(IMAGE_FILENAME)
    }
}

impl Filesystem for MockFs {
    type File = MockFile;

    fn mount(&mut self) -> Result<(), FsError> {
        self.mounts += 1;
        if let Some(e) = self.fail_mount {
            return Err(e);
        }
        self.mounted = true;
        Ok(())
    }

    fn unmount(&mut self) -> Result<(), FsError> {
        self.unmounts += 1;
        self.mounted = false;
        Ok(())
    }

    fn open(&mut self, name: &str) -> Result<MockFile, FsError> {
        assert!(self.mounted, "open on unmounted medium");
        self.opens += 1;
        if let Some((n, e)) = self.fail_open {
            if n == self.opens {
                return Err(e);
            }
        }
        if !self.files.contains_key(name) {
            return Err(FsError::NotFound);
        }
        self.open_handles += 1;
        Ok(MockFile {
            name: name.to_string(),
            pos: 0,
            open_number: self.opens,
        })
    }

    fn size(&self, file: &MockFile) -> u32 {
        self.files[&file.name].len() as u32
    }

    fn read(&mut self, file: &mut MockFile, buf: &mut [u8]) -> Result<usize, FsError> {
        if let Some((n, pos, e)) = self.fail_read {
            if n == file.open_number && file.pos >= pos {
                return Err(e);
            }
        }
        let data = &self.files[&file.name];
        let mut len = buf.len().min(data.len() - file.pos);
        if self.max_read != 0 {
            len = len.min(self.max_read);
        }
        buf[..len].copy_from_slice(&data[file.pos..file.pos + len]);
        file.pos += len;
        Ok(len)
    }

    fn close(&mut self, file: MockFile) -> Result<(), FsError> {
        self.closes += 1;
        self.open_handles -= 1;
        match self.fail_close {
            Some((n, e)) if n == file.open_number => Err(e),
            _ => Ok(()),
        }
    }

    fn delete(&mut self, name: &str) -> Result<(), FsError> {
        assert!(self.mounted, "delete on unmounted medium");
        assert_eq!(self.open_handles, 0, "delete with an open handle");
        self.deletes += 1;
        if let Some(e) = self.fail_delete {
            return Err(e);
        }
        self.files.remove(name).map(|_| ()).ok_or(FsError::NotFound)
    }
}

// =============================================================================
// Program memory
// =============================================================================

/// NOR-style simulated flash: programming can only clear bits.
pub struct SimFlash {
    pub mem: Vec<u8>,
    pub inits: u32,
    pub erases: u32,
    pub begins: u32,
    pub ends: u32,
    /// Offsets passed to `write_unit`, in call order.
    pub writes: Vec<u32>,
    /// Offsets passed to `read_word`, in call order.
    pub reads: Vec<u32>,
    pub fail_erase: bool,
    /// Fail the n-th `write_unit` call (0-based).
    pub fail_write: Option<usize>,
    /// Flip the bits of this byte once it has been programmed.
    pub corrupt_at: Option<u32>,
}

pub const SIM_BASE: u32 = 0x1001_0000;

impl SimFlash {
    pub fn new(capacity: usize) -> Self {
        Self {
            mem: vec![0xA5; capacity],
            inits: 0,
            erases: 0,
            begins: 0,
            ends: 0,
            writes: Vec::new(),
            reads: Vec::new(),
            fail_erase: false,
            fail_write: None,
            corrupt_at: None,
        }
    }
}

impl ProgramMemory for SimFlash {
    fn base(&self) -> u32 {
        SIM_BASE
    }

    fn capacity(&self) -> u32 {
        self.mem.len() as u32
    }

    fn init(&mut self) {
        self.inits += 1;
    }

    fn erase(&mut self) -> Result<(), FlashError> {
        self.erases += 1;
        if self.fail_erase {
            return Err(FlashError::EraseIncomplete);
        }
        self.mem.fill(ERASED_BYTE);
        Ok(())
    }

    fn begin(&mut self) {
        self.begins += 1;
    }

    fn write_unit(&mut self, offset: u32, unit: [u8; PROGRAM_UNIT]) -> Result<(), FlashError> {
        if self.fail_write == Some(self.writes.len()) {
            return Err(FlashError::WriteMismatch(offset));
        }
        self.writes.push(offset);
        let start = offset as usize;
        for (cell, byte) in self.mem[start..start + PROGRAM_UNIT].iter_mut().zip(unit) {
            *cell &= byte;
        }
        if let Some(at) = self.corrupt_at {
            if (offset..offset + PROGRAM_UNIT as u32).contains(&at) {
                self.mem[at as usize] ^= 0xFF;
            }
        }
        Ok(())
    }

    fn end(&mut self) -> Result<(), FlashError> {
        self.ends += 1;
        Ok(())
    }

    fn read_word(&mut self, offset: u32) -> u32 {
        self.reads.push(offset);
        let i = offset as usize;
        u32::from_le_bytes([self.mem[i], self.mem[i + 1], self.mem[i + 2], self.mem[i + 3]])
    }
}

// =============================================================================
// Indicators and delay
// =============================================================================

/// Output pin that remembers every level it was driven to.
#[derive(Default)]
pub struct MockPin {
    pub high: bool,
    pub history: Vec<bool>,
    pub toggles: u32,
}

impl ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.high = false;
        self.history.push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.high = true;
        self.history.push(true);
        Ok(())
    }
}

impl StatefulOutputPin for MockPin {
    fn is_set_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.high)
    }

    fn is_set_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.high)
    }

    fn toggle(&mut self) -> Result<(), Infallible> {
        self.toggles += 1;
        if self.high {
            self.set_low()
        } else {
            self.set_high()
        }
    }
}

#[derive(Default)]
pub struct CountingDelay {
    pub total_ns: u64,
}

impl DelayNs for CountingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += ns as u64;
    }
}

// =============================================================================
// Helpers
// =============================================================================

pub type Reporter = StatusReporter<String, MockPin, MockPin>;

pub fn reporter() -> Reporter {
    StatusReporter::new(String::new(), MockPin::default(), MockPin::default())
}

/// Deterministic, non-repeating-looking image content.
pub fn image(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 + 7) as u8 ^ (i >> 8) as u8).collect()
}

pub struct Run {
    pub result: Result<Outcome, UpdateError>,
    pub log: String,
    pub step: MockPin,
    pub progress: MockPin,
}

pub fn run_with(config: &UpdateConfig<'_>, fs: &mut MockFs, flash: &mut SimFlash) -> Run {
    let mut status = reporter();
    let result = UpdateAttempt::new(config, &mut status).run(fs, flash);
    let (log, step, progress) = status.release();
    Run {
        result,
        log,
        step,
        progress,
    }
}

pub fn run(fs: &mut MockFs, flash: &mut SimFlash) -> Run {
    run_with(&UpdateConfig::default(), fs, flash)
}
