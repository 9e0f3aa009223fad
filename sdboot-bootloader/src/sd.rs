// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! FAT volume on the SD card, through `embedded-sdmmc`'s raw handle API.

use core::fmt::Debug;

use embedded_sdmmc::{
    BlockDevice, Error, Mode, RawDirectory, RawFile, RawVolume, TimeSource, Timestamp, VolumeIdx,
    VolumeManager,
};
use sdboot_common::error::FsError;
use sdboot_common::storage::Filesystem;

/// The bootloader has no RTC; nothing it writes carries a meaningful date.
pub struct FixedClock;

impl TimeSource for FixedClock {
    fn get_timestamp(&self) -> Timestamp {
        Timestamp {
            year_since_1970: 56,
            zero_indexed_month: 0,
            zero_indexed_day: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }
}

pub struct SdFile {
    raw: RawFile,
    length: u32,
}

pub struct SdFilesystem<D: BlockDevice, T: TimeSource> {
    volumes: VolumeManager<D, T>,
    /// First partition and its root directory while mounted.
    root: Option<(RawVolume, RawDirectory)>,
}

impl<D: BlockDevice, T: TimeSource> SdFilesystem<D, T>
where
    D::Error: Debug,
{
    pub fn new(card: D, clock: T) -> Self {
        Self {
            volumes: VolumeManager::new(card, clock),
            root: None,
        }
    }

    fn root_dir(&self) -> Result<RawDirectory, FsError> {
        self.root.map(|(_, dir)| dir).ok_or(FsError::Status(STATUS_NOT_MOUNTED))
    }
}

const STATUS_NOT_MOUNTED: u8 = 0x80;

/// Collapse a driver error into the code logged next to the outcome.
fn fs_error<E: Debug>(e: Error<E>) -> FsError {
    let status = match e {
        Error::NotFound => return FsError::NotFound,
        Error::DeviceError(_) => 1,
        Error::FormatError(_) => 2,
        Error::NoSuchVolume => 3,
        Error::FilenameError(_) => 4,
        Error::TooManyOpenVolumes | Error::TooManyOpenDirs | Error::TooManyOpenFiles => 5,
        Error::BadHandle => 6,
        Error::FileAlreadyOpen | Error::DirAlreadyOpen | Error::VolumeAlreadyOpen => 7,
        Error::ReadOnly => 8,
        Error::EndOfFile => 9,
        Error::BadCluster => 10,
        Error::Unsupported => 11,
        _ => 0xFF,
    };
    defmt::println!("SD driver error: {}", defmt::Debug2Format(&e));
    FsError::Status(status)
}

impl<D: BlockDevice, T: TimeSource> Filesystem for SdFilesystem<D, T>
where
    D::Error: Debug,
{
    type File = SdFile;

    fn mount(&mut self) -> Result<(), FsError> {
        let volume = self.volumes.open_raw_volume(VolumeIdx(0)).map_err(fs_error)?;
        match self.volumes.open_root_dir(volume) {
            Ok(dir) => {
                self.root = Some((volume, dir));
                Ok(())
            }
            Err(e) => {
                let _ = self.volumes.close_volume(volume);
                Err(fs_error(e))
            }
        }
    }

    fn unmount(&mut self) -> Result<(), FsError> {
        let Some((volume, dir)) = self.root.take() else {
            return Ok(());
        };
        let dir_result = self.volumes.close_dir(dir).map_err(fs_error);
        self.volumes.close_volume(volume).map_err(fs_error)?;
        dir_result
    }

    fn open(&mut self, name: &str) -> Result<SdFile, FsError> {
        let dir = self.root_dir()?;
        let raw = self
            .volumes
            .open_file_in_dir(dir, name, Mode::ReadOnly)
            .map_err(fs_error)?;
        match self.volumes.file_length(raw) {
            Ok(length) => Ok(SdFile { raw, length }),
            Err(e) => {
                let _ = self.volumes.close_file(raw);
                Err(fs_error(e))
            }
        }
    }

    fn size(&self, file: &SdFile) -> u32 {
        file.length
    }

    fn read(&mut self, file: &mut SdFile, buf: &mut [u8]) -> Result<usize, FsError> {
        self.volumes.read(file.raw, buf).map_err(fs_error)
    }

    fn close(&mut self, file: SdFile) -> Result<(), FsError> {
        self.volumes.close_file(file.raw).map_err(fs_error)
    }

    fn delete(&mut self, name: &str) -> Result<(), FsError> {
        let dir = self.root_dir()?;
        self.volumes.delete_file_in_dir(dir, name).map_err(fs_error)
    }
}
