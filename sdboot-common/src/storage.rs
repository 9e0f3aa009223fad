// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Removable storage: the filesystem driver seam, the mount session and the
//! firmware image handle.
//!
//! The session owns the mounted medium for one update attempt. The image
//! handle borrows the session mutably, so a file must be closed (or dropped)
//! before it can be deleted or the medium ejected.

use crate::error::FsError;

/// Filesystem driver for the removable medium.
///
/// Operations are synchronous. `read` may return fewer bytes than requested
/// anywhere in the file; `Ok(0)` means end of file.
pub trait Filesystem {
    type File;

    fn mount(&mut self) -> Result<(), FsError>;
    fn unmount(&mut self) -> Result<(), FsError>;

    fn open(&mut self, name: &str) -> Result<Self::File, FsError>;
    fn size(&self, file: &Self::File) -> u32;
    fn read(&mut self, file: &mut Self::File, buf: &mut [u8]) -> Result<usize, FsError>;
    fn close(&mut self, file: Self::File) -> Result<(), FsError>;

    fn delete(&mut self, name: &str) -> Result<(), FsError>;
}

/// A mounted medium. Unmounted exactly once, by `eject` or on drop.
///
/// A failed mount still releases the driver, so every attempt unmounts once.
pub struct StorageSession<'f, F: Filesystem> {
    fs: &'f mut F,
    mounted: bool,
}

impl<'f, F: Filesystem> StorageSession<'f, F> {
    pub fn mount(fs: &'f mut F) -> Result<Self, FsError> {
        if let Err(e) = fs.mount() {
            let _ = fs.unmount();
            return Err(e);
        }
        Ok(Self { fs, mounted: true })
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Open a file on the medium for sequential reading.
    pub fn open_image(&mut self, name: &str) -> Result<ImageFile<'_, F>, FsError> {
        let file = self.fs.open(name)?;
        let size = self.fs.size(&file);
        Ok(ImageFile {
            fs: &mut *self.fs,
            file: Some(file),
            size,
            position: 0,
        })
    }

    pub fn delete(&mut self, name: &str) -> Result<(), FsError> {
        self.fs.delete(name)
    }

    /// Unmount the medium.
    ///
    /// Returns the driver's complaint, if any, the first time; later calls are
    /// no-ops. The session is unusable afterwards either way.
    pub fn eject(&mut self) -> Option<FsError> {
        if !self.mounted {
            return None;
        }
        self.mounted = false;
        self.fs.unmount().err()
    }
}

impl<F: Filesystem> Drop for StorageSession<'_, F> {
    fn drop(&mut self) {
        let _ = self.eject();
    }
}

/// The open firmware image.
pub struct ImageFile<'s, F: Filesystem> {
    fs: &'s mut F,
    file: Option<F::File>,
    size: u32,
    position: u32,
}

impl<F: Filesystem> ImageFile<'_, F> {
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> u32 {
        self.position
    }

    /// Fill `buf` from the stream.
    ///
    /// Keeps reading across short driver reads, so a result smaller than
    /// `buf.len()` only happens at the end of the file. `Ok(0)` is end of file.
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, FsError> {
        let Some(file) = self.file.as_mut() else {
            return Ok(0);
        };

        let mut filled = 0;
        while filled < buf.len() {
            let n = self.fs.read(file, &mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        self.position += filled as u32;
        Ok(filled)
    }

    pub fn close(mut self) -> Result<(), FsError> {
        match self.file.take() {
            Some(file) => self.fs.close(file),
            None => Ok(()),
        }
    }
}

impl<F: Filesystem> Drop for ImageFile<'_, F> {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = self.fs.close(file);
        }
    }
}
