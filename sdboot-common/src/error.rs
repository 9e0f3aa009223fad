// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Outcome codes of an update attempt and the errors behind them.

use core::fmt;

use thiserror::Error;

use crate::update::Phase;

/// Terminal outcome of one update attempt.
///
/// Numeric values are what the status LED blinks and what the console prints,
/// so they must stay stable across releases.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    /// Image applied, or nothing to update.
    Ok = 0,
    StorageMountFailed = 3,
    ImageOpenFailed = 4,
    ImageTooLarge = 5,
    FlashProgramFailed = 6,
    VerifyFailed = 7,
    FileCloseFailed = 8,
    FileDeleteFailed = 9,
    EraseFailed = 11,
}

impl ErrorCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn is_ok(self) -> bool {
        self == ErrorCode::Ok
    }

    /// Map the result of an attempt onto its outcome code.
    pub fn of<T>(result: &Result<T, UpdateError>) -> Self {
        match result {
            Ok(_) => ErrorCode::Ok,
            Err(e) => e.code(),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::Ok => "OK",
            ErrorCode::StorageMountFailed => "SD_MOUNT",
            ErrorCode::ImageOpenFailed => "SD_FILE",
            ErrorCode::ImageTooLarge => "APP_LARGE",
            ErrorCode::FlashProgramFailed => "FLASH",
            ErrorCode::VerifyFailed => "VERIFY",
            ErrorCode::FileCloseFailed => "FILE_CLOSE",
            ErrorCode::FileDeleteFailed => "FILE_DELETE",
            ErrorCode::EraseFailed => "ERASE",
        };
        write!(f, "{} ({})", name, self.as_u8())
    }
}

/// Error reported by a filesystem driver.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FsError {
    #[error("no such file")]
    NotFound,
    /// Driver-specific status code, logged verbatim.
    #[error("filesystem error code: {0}")]
    Status(u8),
}

/// Error reported by the program memory driver.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FlashError {
    #[error("write outside the program region")]
    OutOfBounds,
    #[error("write before erase")]
    NotErased,
    #[error("erase did not complete")]
    EraseIncomplete,
    #[error("read-back mismatch after program at offset {0:#x}")]
    WriteMismatch(u32),
}

/// Why an update attempt failed.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UpdateError {
    #[error("SD card cannot be mounted: {0}")]
    StorageMount(FsError),
    #[error("file cannot be opened: {0}")]
    ImageOpen(FsError),
    #[error("file cannot be reopened for verification: {0}")]
    ImageReopen(FsError),
    #[error("file read failed at {offset} byte: {error}")]
    ImageRead {
        phase: Phase,
        offset: u32,
        error: FsError,
    },
    #[error("app on SD card is too large: {size} bytes, {capacity} available")]
    ImageTooLarge { size: u32, capacity: u32 },
    #[error("flash erase failed: {0}")]
    Erase(FlashError),
    #[error("programming error at {offset} byte: {error}")]
    Program { offset: u32, error: FlashError },
    #[error(
        "verification error at {offset} byte ({address:#010x}): expected {expected:#010x}, found {found:#010x}"
    )]
    Verify {
        offset: u32,
        address: u32,
        expected: u32,
        found: u32,
    },
    #[error("failed to close file: {0}")]
    FileClose(FsError),
    #[error("failed to erase file: {0}")]
    FileDelete(FsError),
}

impl UpdateError {
    pub fn code(&self) -> ErrorCode {
        match self {
            UpdateError::StorageMount(_) => ErrorCode::StorageMountFailed,
            UpdateError::ImageOpen(_)
            | UpdateError::ImageReopen(_)
            | UpdateError::ImageRead { .. } => ErrorCode::ImageOpenFailed,
            UpdateError::ImageTooLarge { .. } => ErrorCode::ImageTooLarge,
            UpdateError::Erase(_) => ErrorCode::EraseFailed,
            UpdateError::Program { .. } => ErrorCode::FlashProgramFailed,
            UpdateError::Verify { .. } => ErrorCode::VerifyFailed,
            UpdateError::FileClose(_) => ErrorCode::FileCloseFailed,
            UpdateError::FileDelete(_) => ErrorCode::FileDeleteFailed,
        }
    }

    /// Phase in which the attempt failed.
    pub fn phase(&self) -> Phase {
        match self {
            UpdateError::StorageMount(_) => Phase::Mounting,
            UpdateError::ImageOpen(_) => Phase::Locating,
            UpdateError::ImageTooLarge { .. } => Phase::SizeCheck,
            UpdateError::Erase(_) => Phase::Erasing,
            UpdateError::Program { .. } => Phase::Programming,
            UpdateError::ImageReopen(_) => Phase::ReopeningForVerify,
            UpdateError::ImageRead { phase, .. } => *phase,
            UpdateError::Verify { .. } => Phase::Verifying,
            UpdateError::FileClose(_) => Phase::Closing,
            UpdateError::FileDelete(_) => Phase::Deleting,
        }
    }
}
