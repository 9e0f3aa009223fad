// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command-line interface definitions.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use sdboot_common::layout::IMAGE_FILENAME;

use crate::commands;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "sdboot-stage")]
#[command(about = "Stage firmware images for the SD-card bootloader")]
pub struct Cli {
    /// Mount point of the SD card (e.g., /media/sdcard)
    #[arg(short, long)]
    pub card: PathBuf,

    /// Image file name at the card root
    #[arg(short, long, default_value = IMAGE_FILENAME)]
    pub name: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Show the image staged on the card
    Status,

    /// Copy a firmware image onto the card
    Stage {
        /// Firmware binary file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Run the bootloader's update sequence against the card, with flash simulated
    Simulate {
        /// Put the image back afterwards so the device still finds it
        #[arg(short, long)]
        keep: bool,
    },
}

/// Execute the parsed CLI command.
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Status => commands::status(&cli.card, &cli.name),
        Commands::Stage { file } => commands::stage(&file, &cli.card, &cli.name),
        Commands::Simulate { keep } => commands::simulate(&cli.card, &cli.name, keep),
    }
}
