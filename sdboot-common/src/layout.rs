// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Flash layout and update constants shared by the bootloader and host tools.

// --- Flash layout constants ---

pub const FLASH_BASE: u32 = 0x1000_0000;
pub const FLASH_SIZE: u32 = 2 * 1024 * 1024; // 2MB QSPI flash

pub const BOOTLOADER_SIZE: u32 = 64 * 1024; // includes the 256-byte boot2 stage
pub const APP_ADDR: u32 = FLASH_BASE + BOOTLOADER_SIZE;
pub const PROGRAM_REGION_SIZE: u32 = FLASH_SIZE - BOOTLOADER_SIZE;

pub const FLASH_BLOCK_SIZE: u32 = 64 * 1024;
pub const FLASH_PAGE_SIZE: u32 = 256;

pub const RAM_START: u32 = 0x2000_0000;
pub const RAM_END: u32 = 0x2004_2000; // initial SP may sit one past the last word

/// Value of an erased flash byte, also used to pad the last programming unit.
pub const ERASED_BYTE: u8 = 0xFF;

// --- Update sequence constants ---

/// Bytes per programming call.
pub const PROGRAM_UNIT: usize = 8;
/// Bytes per verification read-back.
pub const VERIFY_UNIT: usize = 4;

/// Firmware image looked up at the root of the SD card.
pub const IMAGE_FILENAME: &str = "FIRMWARE.BIN";

/// Units (programming or verification words) between progress reports.
pub const PROGRESS_INTERVAL: u32 = 256;

// --- Status signaling ---

pub const BLINK_FAST_MS: u32 = 100;
pub const BLINK_SLOW_MS: u32 = 500;
pub const FATAL_RESET_DELAY_MS: u32 = 5000;
