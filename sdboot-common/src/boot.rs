// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! What to do after the update attempt - pure logic without hardware
//! dependencies.
//!
//! The bootloader reads the application's vector table and the attempt's
//! outcome code; everything deciding between jumping, resetting and blinking
//! lives here so it can be tested on the host.

use crate::error::ErrorCode;
use crate::layout::{APP_ADDR, PROGRAM_REGION_SIZE, RAM_END, RAM_START};

/// Final action of the boot sequence.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootAction {
    /// Hand control to the resident application.
    JumpToApplication,
    /// The update failed: report and reset the device.
    FatalReset(ErrorCode),
    /// Nothing to run: blink forever.
    NoApplication,
}

/// First two words of an application image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VectorTable {
    pub initial_sp: u32,
    pub reset_vector: u32,
}

impl VectorTable {
    /// Decode the first 8 bytes of an image (little-endian words).
    pub fn from_bytes(bytes: &[u8; 8]) -> Self {
        Self {
            initial_sp: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            reset_vector: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }

    /// An application is present when its stack starts in RAM and its reset
    /// handler is a Thumb address inside the program region.
    pub fn is_valid_application(&self) -> bool {
        is_in_ram(self.initial_sp)
            && self.reset_vector & 1 == 1
            && is_in_program_region(self.reset_vector & !1)
    }
}

pub fn is_in_ram(addr: u32) -> bool {
    (RAM_START..=RAM_END).contains(&addr)
}

pub fn is_in_program_region(addr: u32) -> bool {
    (APP_ADDR..APP_ADDR + PROGRAM_REGION_SIZE).contains(&addr)
}

/// Decide the final boot action.
pub fn next_action(code: ErrorCode, application: &VectorTable) -> BootAction {
    if !code.is_ok() {
        return BootAction::FatalReset(code);
    }
    if application.is_valid_application() {
        BootAction::JumpToApplication
    } else {
        BootAction::NoApplication
    }
}
