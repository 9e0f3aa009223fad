// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Application check and hand-off.

use sdboot_common::boot::VectorTable;
use sdboot_common::layout::APP_ADDR;

/// Read the vector table at the start of the program region.
pub fn application_vector_table() -> VectorTable {
    unsafe {
        VectorTable {
            initial_sp: (APP_ADDR as *const u32).read_volatile(),
            reset_vector: (APP_ADDR as *const u32).offset(1).read_volatile(),
        }
    }
}

/// Hand control to the application in place (XIP).
///
/// # Safety
/// `vt` must be the validated vector table found at `APP_ADDR`.
pub unsafe fn jump_to_application(vt: &VectorTable) -> ! {
    // Reset peripherals before jumping so the application can reinitialize cleanly
    prepare_for_application_handoff();

    relocate_vector_table(APP_ADDR);

    jump(vt.initial_sp, vt.reset_vector);
}

/// Clocks are left configured; the application's runtime switches away from
/// the PLLs before reconfiguring them.
unsafe fn prepare_for_application_handoff() {
    // Disable all interrupts
    cortex_m::interrupt::disable();

    // Clear all pending interrupts in NVIC
    const NVIC_ICPR: *mut u32 = 0xE000_E280 as *mut u32;
    NVIC_ICPR.write_volatile(0xFFFF_FFFF);

    // Disable all NVIC interrupts
    const NVIC_ICER: *mut u32 = 0xE000_E180 as *mut u32;
    NVIC_ICER.write_volatile(0xFFFF_FFFF);

    // Put the SD card bus and the console UART back into reset
    const RESETS_RESET: *mut u32 = 0x4000_C000 as *mut u32;
    const SPI0_RESET_BIT: u32 = 1 << 16;
    const UART0_RESET_BIT: u32 = 1 << 22;
    let reset = RESETS_RESET.read_volatile();
    RESETS_RESET.write_volatile(reset | SPI0_RESET_BIT | UART0_RESET_BIT);

    cortex_m::asm::dsb();
    cortex_m::asm::isb();
}

unsafe fn relocate_vector_table(table: u32) {
    const SCB_VTOR: *mut u32 = 0xE000_ED08 as *mut u32;
    SCB_VTOR.write_volatile(table);

    cortex_m::asm::dsb();
    cortex_m::asm::isb();
}

unsafe fn jump(initial_sp: u32, reset_vector: u32) -> ! {
    core::arch::asm!(
        "msr msp, {sp}",
        "cpsie i",  // Applications expect PRIMASK=0 on entry
        "bx {reset}",
        sp = in(reg) initial_sp,
        reset = in(reg) reset_vector,
        options(noreturn)
    );
}
