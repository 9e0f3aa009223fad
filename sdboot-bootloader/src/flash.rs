// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Application-region flash driver using RP2040 ROM routines.
//!
//! On RP2040, flash operations (erase/program) require disabling XIP first.
//! The full sequence is:
//!   1. connect_internal_flash()
//!   2. flash_exit_xip()
//!   3. flash_range_erase() or flash_range_program()
//!   4. flash_flush_cache()
//!   5. flash_enter_cmd_xip()
//!
//! All code executing during steps 1-5 must run from RAM, not flash.
//! We use `#[link_section = ".data"]` to place critical functions in RAM,
//! and pre-resolve all ROM function pointers at init time.
//!
//! The chip programs whole 256-byte pages, so 8-byte units from the update
//! sequence are collected into a page buffer and each full page is programmed
//! and read back in one go.

use sdboot_common::error::FlashError;
use sdboot_common::layout::{
    APP_ADDR, ERASED_BYTE, FLASH_BASE, FLASH_BLOCK_SIZE, FLASH_PAGE_SIZE, PROGRAM_REGION_SIZE,
    PROGRAM_UNIT,
};
use sdboot_common::program::ProgramMemory;

/// 64 KiB block erase command.
const BLOCK_ERASE_CMD: u8 = 0xD8;

const PAGE_LEN: usize = FLASH_PAGE_SIZE as usize;

// ROM function pointer types
type RomFnVoid = unsafe extern "C" fn();
type RomFnErase = unsafe extern "C" fn(u32, usize, u32, u8);
type RomFnProgram = unsafe extern "C" fn(u32, *const u8, usize);

/// ROM function pointers, resolved once at init from the ROM table.
/// Stored in static RAM so RAM-resident functions can call them without
/// accessing flash-based code.
static mut ROM_CONNECT_INTERNAL_FLASH: RomFnVoid = dummy_void;
static mut ROM_FLASH_EXIT_XIP: RomFnVoid = dummy_void;
static mut ROM_FLASH_RANGE_ERASE: RomFnErase = dummy_erase;
static mut ROM_FLASH_RANGE_PROGRAM: RomFnProgram = dummy_program;
static mut ROM_FLASH_FLUSH_CACHE: RomFnVoid = dummy_void;
static mut ROM_FLASH_ENTER_CMD_XIP: RomFnVoid = dummy_void;

unsafe extern "C" fn dummy_void() {}
unsafe extern "C" fn dummy_erase(_: u32, _: usize, _: u32, _: u8) {}
unsafe extern "C" fn dummy_program(_: u32, _: *const u8, _: usize) {}

/// Look up a ROM function by its two-character tag.
/// ROM table pointer at 0x14 and lookup function at 0x18 are 16-bit halfword pointers.
unsafe fn rom_func_lookup(tag: &[u8; 2]) -> usize {
    let fn_table = *(0x14 as *const u16) as *const u16;
    let lookup: unsafe extern "C" fn(*const u16, u32) -> usize =
        core::mem::transmute::<usize, unsafe extern "C" fn(*const u16, u32) -> usize>(
            *(0x18 as *const u16) as usize,
        );
    let code = u16::from_le_bytes(*tag) as u32;
    lookup(fn_table, code)
}

/// Resolve the ROM flash function pointers. Requires XIP to be active.
fn resolve_rom_functions() {
    unsafe {
        ROM_CONNECT_INTERNAL_FLASH =
            core::mem::transmute::<usize, RomFnVoid>(rom_func_lookup(b"IF"));
        ROM_FLASH_EXIT_XIP = core::mem::transmute::<usize, RomFnVoid>(rom_func_lookup(b"EX"));
        ROM_FLASH_RANGE_ERASE =
            core::mem::transmute::<usize, RomFnErase>(rom_func_lookup(b"RE"));
        ROM_FLASH_RANGE_PROGRAM =
            core::mem::transmute::<usize, RomFnProgram>(rom_func_lookup(b"RP"));
        ROM_FLASH_FLUSH_CACHE = core::mem::transmute::<usize, RomFnVoid>(rom_func_lookup(b"FC"));
        ROM_FLASH_ENTER_CMD_XIP =
            core::mem::transmute::<usize, RomFnVoid>(rom_func_lookup(b"CX"));
    }
}

/// Convert an absolute XIP flash address to a flash-relative offset.
fn addr_to_offset(abs_addr: u32) -> u32 {
    abs_addr - FLASH_BASE
}

/// Erase flash in 64 KiB blocks at the given flash-relative offset.
/// Runs entirely from RAM with proper XIP teardown/setup.
///
/// # Safety
/// ROM functions must have been resolved and the range must not cover the
/// bootloader.
#[link_section = ".data"]
#[inline(never)]
unsafe fn flash_erase(offset: u32, size: u32) {
    cortex_m::interrupt::disable();
    ROM_CONNECT_INTERNAL_FLASH();
    ROM_FLASH_EXIT_XIP();
    ROM_FLASH_RANGE_ERASE(offset, size as usize, FLASH_BLOCK_SIZE, BLOCK_ERASE_CMD);
    ROM_FLASH_FLUSH_CACHE();
    ROM_FLASH_ENTER_CMD_XIP();
    cortex_m::interrupt::enable();
}

/// Program flash at the given flash-relative offset.
/// Runs entirely from RAM with proper XIP teardown/setup.
///
/// # Safety
/// ROM functions must have been resolved and the range must not cover the
/// bootloader.
#[link_section = ".data"]
#[inline(never)]
unsafe fn flash_program(offset: u32, data: *const u8, len: usize) {
    cortex_m::interrupt::disable();
    ROM_CONNECT_INTERNAL_FLASH();
    ROM_FLASH_EXIT_XIP();
    ROM_FLASH_RANGE_PROGRAM(offset, data, len);
    ROM_FLASH_FLUSH_CACHE();
    ROM_FLASH_ENTER_CMD_XIP();
    cortex_m::interrupt::enable();
}

fn read_byte(abs_addr: u32) -> u8 {
    unsafe { (abs_addr as *const u8).read_volatile() }
}

fn read_u32(abs_addr: u32) -> u32 {
    unsafe { (abs_addr as *const u32).read_volatile() }
}

/// The application region of the on-chip QSPI flash.
pub struct InternalFlash {
    ready: bool,
    page: [u8; PAGE_LEN],
    /// Region offset of the page being collected.
    page_offset: Option<u32>,
}

impl InternalFlash {
    pub const fn new() -> Self {
        Self {
            ready: false,
            page: [ERASED_BYTE; PAGE_LEN],
            page_offset: None,
        }
    }

    /// Program the buffered page and check it through XIP.
    fn flush(&mut self) -> Result<(), FlashError> {
        let Some(start) = self.page_offset.take() else {
            return Ok(());
        };
        if !self.ready {
            return Err(FlashError::NotErased);
        }

        let abs = APP_ADDR + start;
        unsafe { flash_program(addr_to_offset(abs), self.page.as_ptr(), PAGE_LEN) };

        for (i, &expected) in self.page.iter().enumerate() {
            if read_byte(abs + i as u32) != expected {
                defmt::println!("Page at 0x{:08x} differs at byte {}", abs, i);
                return Err(FlashError::WriteMismatch(start + i as u32));
            }
        }
        self.page.fill(ERASED_BYTE);
        Ok(())
    }
}

impl ProgramMemory for InternalFlash {
    fn base(&self) -> u32 {
        APP_ADDR
    }

    fn capacity(&self) -> u32 {
        PROGRAM_REGION_SIZE
    }

    fn init(&mut self) {
        if !self.ready {
            resolve_rom_functions();
            self.ready = true;
        }
    }

    fn erase(&mut self) -> Result<(), FlashError> {
        if !self.ready {
            return Err(FlashError::EraseIncomplete);
        }
        defmt::println!(
            "Erasing 0x{:08x}..0x{:08x}",
            APP_ADDR,
            APP_ADDR + PROGRAM_REGION_SIZE
        );
        unsafe { flash_erase(addr_to_offset(APP_ADDR), PROGRAM_REGION_SIZE) };

        for addr in (APP_ADDR..APP_ADDR + PROGRAM_REGION_SIZE).step_by(4) {
            if read_u32(addr) != u32::MAX {
                defmt::println!("Erase left data at 0x{:08x}", addr);
                return Err(FlashError::EraseIncomplete);
            }
        }
        self.page_offset = None;
        self.page.fill(ERASED_BYTE);
        Ok(())
    }

    fn begin(&mut self) {
        self.page_offset = None;
        self.page.fill(ERASED_BYTE);
    }

    fn write_unit(&mut self, offset: u32, unit: [u8; PROGRAM_UNIT]) -> Result<(), FlashError> {
        if offset as u64 + PROGRAM_UNIT as u64 > PROGRAM_REGION_SIZE as u64 {
            return Err(FlashError::OutOfBounds);
        }

        let page_start = offset & !(FLASH_PAGE_SIZE - 1);
        if self.page_offset != Some(page_start) {
            self.flush()?;
            self.page_offset = Some(page_start);
        }

        let at = (offset - page_start) as usize;
        self.page[at..at + PROGRAM_UNIT].copy_from_slice(&unit);

        if at + PROGRAM_UNIT == PAGE_LEN {
            self.flush()?;
        }
        Ok(())
    }

    fn end(&mut self) -> Result<(), FlashError> {
        self.flush()
    }

    fn read_word(&mut self, offset: u32) -> u32 {
        read_u32(APP_ADDR + offset)
    }
}
