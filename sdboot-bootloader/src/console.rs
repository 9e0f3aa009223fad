// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! UART status console, mirrored to the defmt log.

use core::fmt::{self, Write};

pub struct Console<W> {
    uart: W,
}

impl<W: Write> Console<W> {
    pub fn new(uart: W) -> Self {
        Self { uart }
    }
}

impl<W: Write> Write for Console<W> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        defmt::println!("{=str}", s.trim_end());
        self.uart.write_str(s)
    }
}
