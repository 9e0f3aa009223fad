// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! SD-card update bootloader for RP2040.
//!
//! On every reset: apply `FIRMWARE.BIN` from the SD card if present, then
//! start the application resident in flash.

#![no_std]
#![no_main]

mod boot;
mod console;
mod flash;
mod peripherals;
mod sd;

use defmt_rtt as _;
use embedded_hal::delay::DelayNs;
use panic_probe as _;
use sdboot_common::layout::{APP_ADDR, FATAL_RESET_DELAY_MS};
use sdboot_common::status::TAG_BOOT;
use sdboot_common::{next_action, run_update, BootAction, StatusReporter, UpdateConfig};

defmt::timestamp!("{=u64:us}", { 0 });

use cortex_m_rt::entry;

#[unsafe(link_section = ".boot2")]
#[used]
pub static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_GENERIC_03H;

const PRODUCT: &str = "SD card bootloader";
const CHIP: &str = "RP2040";
const COMM: &str = "UART0 115200 8N1";
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[entry]
fn main() -> ! {
    defmt::println!("Bootloader init");

    let peripherals::Peripherals {
        console,
        step_led,
        progress_led,
        sd_card,
        mut timer,
        peripheral_freq,
    } = peripherals::init();

    let mut status = StatusReporter::new(console, step_led, progress_led);
    status.banner(PRODUCT, CHIP, COMM, VERSION);

    peripherals::prepare_sd_card(&sd_card, peripheral_freq);
    let mut fs = sd::SdFilesystem::new(sd_card, sd::FixedClock);
    let mut flash = flash::InternalFlash::new();

    let code = run_update(&UpdateConfig::default(), &mut fs, &mut flash, &mut status);
    defmt::println!("Update attempt finished: {}", code);

    let application = boot::application_vector_table();
    match next_action(code, &application) {
        BootAction::JumpToApplication => {
            status.line(TAG_BOOT, format_args!("Jumping to app at 0x{:08x}", APP_ADDR));
            // Let the UART drain
            timer.delay_ms(10);
            unsafe { boot::jump_to_application(&application) }
        }
        BootAction::FatalReset(code) => {
            status.signal_code(code, &mut timer);
            timer.delay_ms(FATAL_RESET_DELAY_MS);
            cortex_m::peripheral::SCB::sys_reset()
        }
        BootAction::NoApplication => status.no_application_loop(&mut timer),
    }
}
