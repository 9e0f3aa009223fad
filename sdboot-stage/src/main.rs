// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Host tool for the SD-card bootloader.
//!
//! Usage:
//!   sdboot-stage --card /media/sdcard stage firmware.bin
//!   sdboot-stage --card /media/sdcard status
//!   sdboot-stage --card /media/sdcard simulate --keep

mod card;
mod cli;
mod commands;
mod sim;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    cli::run(args)
}
