// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Console lines and the two status LEDs.
//!
//! Every line goes out as `[TAG   ] message\r\n` in a single write. The *step*
//! LED is lit while erasing and toggles while programming; the *progress* LED
//! is lit while programming and toggles while verifying. Both go dark on any
//! failure.

use core::fmt::{self, Write};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::StatefulOutputPin;
use heapless::String;

use crate::error::ErrorCode;
use crate::layout::{BLINK_FAST_MS, BLINK_SLOW_MS};

pub const TAG_BOOT: &str = "BOOT";
pub const TAG_SD: &str = "SD";
pub const TAG_APP: &str = "APP";
pub const TAG_FLASH: &str = "FLASH";
pub const TAG_VERIFY: &str = "VERIFY";

const TAG_WIDTH: usize = 6;
const LINE_LEN: usize = 128;
const VBAR: &str = "========================================";

/// Line buffer that drops whatever does not fit, keeping room for CRLF.
struct Clipped(String<LINE_LEN>);

impl Write for Clipped {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.0.len() + c.len_utf8() > LINE_LEN - 2 {
                break;
            }
            let _ = self.0.push(c);
        }
        Ok(())
    }
}

pub struct StatusReporter<W, S, P> {
    console: W,
    step: S,
    progress: P,
}

impl<W, S, P> StatusReporter<W, S, P>
where
    W: Write,
    S: StatefulOutputPin,
    P: StatefulOutputPin,
{
    pub fn new(console: W, mut step: S, mut progress: P) -> Self {
        step.set_low().ok();
        progress.set_low().ok();
        Self {
            console,
            step,
            progress,
        }
    }

    /// Give back the console and both LEDs.
    pub fn release(self) -> (W, S, P) {
        (self.console, self.step, self.progress)
    }

    /// Print the boot banner.
    pub fn banner(&mut self, product: &str, chip: &str, comm: &str, version: &str) {
        self.raw(format_args!("{}", product));
        self.line("CHIP", format_args!("{}", chip));
        self.line("COMM", format_args!("{}", comm));
        self.line("VER", format_args!("{}", version));
        self.raw(format_args!("{}", VBAR));
    }

    /// Emit one tagged line.
    pub fn line(&mut self, tag: &str, args: fmt::Arguments<'_>) {
        let mut line = Clipped(String::new());
        let _ = write!(line, "[{:<width$}] ", tag, width = TAG_WIDTH);
        let _ = line.write_fmt(args);
        self.send(line);
    }

    fn raw(&mut self, args: fmt::Arguments<'_>) {
        let mut line = Clipped(String::new());
        let _ = line.write_fmt(args);
        self.send(line);
    }

    fn send(&mut self, Clipped(mut line): Clipped) {
        let _ = line.push_str("\r\n");
        let _ = self.console.write_str(&line);
    }

    pub fn phase_start(&mut self, tag: &str, message: &str) {
        self.line(tag, format_args!("{}...", message));
    }

    pub fn phase_result(&mut self, tag: &str, message: &str) {
        self.line(tag, format_args!("{}", message));
    }

    /// Periodic progress line: percentage and byte counters.
    pub fn report_progress(&mut self, tag: &str, done: u32, total: u32) {
        let percent = if total == 0 {
            100
        } else {
            (done as u64 * 100 / total as u64).min(100)
        };
        let done = done.min(total);
        self.line(tag, format_args!("{:>3}% ({}/{} bytes)", percent, done, total));
    }

    pub fn erase_started(&mut self) {
        self.step.set_high().ok();
    }

    pub fn erase_finished(&mut self) {
        self.step.set_low().ok();
    }

    pub fn programming_started(&mut self) {
        self.progress.set_high().ok();
    }

    pub fn program_tick(&mut self, done: u32, total: u32) {
        self.step.toggle().ok();
        self.report_progress(TAG_FLASH, done, total);
    }

    pub fn programming_finished(&mut self) {
        self.all_off();
    }

    pub fn verify_tick(&mut self, done: u32, total: u32) {
        self.progress.toggle().ok();
        self.report_progress(TAG_VERIFY, done, total);
    }

    pub fn verify_finished(&mut self) {
        self.progress.set_low().ok();
    }

    /// Terminal failure: report the code and force both LEDs off.
    pub fn fault(&mut self, code: ErrorCode) {
        self.all_off();
        self.line(TAG_BOOT, format_args!("Error code: {}", code));
    }

    /// Blink the progress LED `code` times with the step LED dark.
    pub fn signal_code(&mut self, code: ErrorCode, delay: &mut impl DelayNs) {
        self.all_off();
        for _ in 0..code.as_u8() {
            self.progress.set_high().ok();
            delay.delay_ms(BLINK_SLOW_MS);
            self.progress.set_low().ok();
            delay.delay_ms(BLINK_SLOW_MS);
        }
    }

    /// Terminal state when there is nothing to boot.
    pub fn no_application_loop(&mut self, delay: &mut impl DelayNs) -> ! {
        self.line(TAG_APP, format_args!("No application in flash."));
        self.step.toggle().ok();
        loop {
            self.progress.toggle().ok();
            delay.delay_ms(BLINK_FAST_MS);
        }
    }

    fn all_off(&mut self) {
        self.step.set_low().ok();
        self.progress.set_low().ok();
    }
}
