// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Common types and logic for the SD-card update bootloader.
//!
//! This crate supports both `no_std` (embedded) and `std` (host) environments:
//! - Default: `no_std` mode for embedded targets
//! - `std` feature: Enables `std` support for host tools
//! - `defmt` feature: `defmt::Format` on public types and phase tracing

#![cfg_attr(not(any(feature = "std", test)), no_std)]

pub mod boot;
pub mod error;
pub mod layout;
pub mod program;
pub mod status;
pub mod storage;
pub mod update;

// Re-export commonly used types
pub use boot::{next_action, BootAction, VectorTable};
pub use error::{ErrorCode, FlashError, FsError, UpdateError};
pub use layout::{APP_ADDR, IMAGE_FILENAME, PROGRAM_REGION_SIZE, PROGRAM_UNIT, VERIFY_UNIT};
pub use program::{ProgramMemory, ProgramWriter};
pub use status::StatusReporter;
pub use storage::{Filesystem, ImageFile, StorageSession};
pub use update::{run_update, Outcome, Phase, UpdateAttempt, UpdateConfig};
