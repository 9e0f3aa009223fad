// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! A mounted SD card seen as a host directory.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use sdboot_common::error::FsError;
use sdboot_common::storage::Filesystem;

/// Status code for I/O errors without an OS error number.
const STATUS_IO: u8 = 0xFF;
const STATUS_NOT_A_DIRECTORY: u8 = 0xFE;
const STATUS_NOT_MOUNTED: u8 = 0xFD;

fn fs_error(e: io::Error) -> FsError {
    if e.kind() == io::ErrorKind::NotFound {
        return FsError::NotFound;
    }
    let status = e
        .raw_os_error()
        .and_then(|code| u8::try_from(code).ok())
        .unwrap_or(STATUS_IO);
    FsError::Status(status)
}

/// Find `name` at the root of the card. FAT names are case-insensitive.
pub fn find_image(root: &Path, name: &str) -> io::Result<Option<PathBuf>> {
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_file() && entry.file_name().eq_ignore_ascii_case(name) {
            return Ok(Some(entry.path()));
        }
    }
    Ok(None)
}

pub struct CardFile {
    file: File,
    len: u32,
}

/// The card root as seen by the update sequence.
pub struct DirFilesystem {
    root: PathBuf,
    mounted: bool,
}

impl DirFilesystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            mounted: false,
        }
    }

    fn locate(&self, name: &str) -> Result<PathBuf, FsError> {
        if !self.mounted {
            return Err(FsError::Status(STATUS_NOT_MOUNTED));
        }
        find_image(&self.root, name)
            .map_err(fs_error)?
            .ok_or(FsError::NotFound)
    }
}

impl Filesystem for DirFilesystem {
    type File = CardFile;

    fn mount(&mut self) -> Result<(), FsError> {
        let meta = fs::metadata(&self.root).map_err(|e| match fs_error(e) {
            // A missing card is a mount failure, not a missing image
            FsError::NotFound => FsError::Status(STATUS_NOT_A_DIRECTORY),
            other => other,
        })?;
        if !meta.is_dir() {
            return Err(FsError::Status(STATUS_NOT_A_DIRECTORY));
        }
        self.mounted = true;
        Ok(())
    }

    fn unmount(&mut self) -> Result<(), FsError> {
        self.mounted = false;
        Ok(())
    }

    fn open(&mut self, name: &str) -> Result<CardFile, FsError> {
        let path = self.locate(name)?;
        let file = File::open(path).map_err(fs_error)?;
        let len = file.metadata().map_err(fs_error)?.len();
        Ok(CardFile {
            file,
            // FAT32 caps files at 4 GiB - 1
            len: u32::try_from(len).unwrap_or(u32::MAX),
        })
    }

    fn size(&self, file: &CardFile) -> u32 {
        file.len
    }

    fn read(&mut self, file: &mut CardFile, buf: &mut [u8]) -> Result<usize, FsError> {
        file.file.read(buf).map_err(fs_error)
    }

    fn close(&mut self, file: CardFile) -> Result<(), FsError> {
        drop(file);
        Ok(())
    }

    fn delete(&mut self, name: &str) -> Result<(), FsError> {
        let path = self.locate(name)?;
        fs::remove_file(path).map_err(fs_error)
    }
}
