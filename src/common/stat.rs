//! Assembly of POSIX metadata from native handle information.

use super::types::{
    FileMetadata, InodeId, DIRECTORY_PERMISSIONS, FILE_PERMISSIONS, S_IFCHR, S_IFDIR, S_IFIFO,
    S_IFREG,
};

/// Native timestamps count 100ns ticks.
pub const TICKS_PER_SECOND: i64 = 10_000_000;
/// Seconds between 1601-01-01 and 1970-01-01.
pub const EPOCH_OFFSET_SECONDS: i64 = 11_644_473_600;

pub fn ticks_to_unix_seconds(ticks: i64) -> i64 {
    ticks / TICKS_PER_SECOND - EPOCH_OFFSET_SECONDS
}

/// What kind of object a native handle refers to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HandleKind {
    Disk,
    Pipe,
    CharDevice,
    Unknown,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct BasicTimes {
    pub last_access: i64,
    pub last_write: i64,
    pub change: i64,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct StandardInfo {
    pub links: u32,
    pub is_directory: bool,
    pub end_of_file: i64,
}

/// Device + object identity of an open filesystem entry.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Identity {
    pub dev: u64,
    pub ino: InodeId,
}

impl Identity {
    /// From the modern 128-bit file ID. The ID bytes are little-endian; only
    /// as many as fit in `InodeId` are kept.
    pub fn from_file_id_128(volume_serial: u64, id: [u8; 16]) -> Self {
        const WIDTH: usize = std::mem::size_of::<InodeId>();
        let mut bytes = [0u8; WIDTH];
        bytes.copy_from_slice(&id[..WIDTH]);
        Self {
            dev: volume_serial,
            ino: InodeId::from_le_bytes(bytes),
        }
    }

    /// From the legacy volume serial and two-part file index. Not guaranteed
    /// unique on every filesystem.
    pub fn from_file_index(volume_serial: u32, index_high: u32, index_low: u32) -> Self {
        Self {
            dev: volume_serial as u64,
            ino: ((index_high as InodeId) << 32) | index_low as InodeId,
        }
    }
}

impl FileMetadata {
    pub fn fifo() -> Self {
        Self {
            nlink: 1,
            mode: S_IFIFO | FILE_PERMISSIONS,
            ..Self::default()
        }
    }

    pub fn char_device() -> Self {
        Self {
            nlink: 1,
            mode: S_IFCHR | FILE_PERMISSIONS,
            ..Self::default()
        }
    }

    /// Metadata for a filesystem entry. Permission bits are fixed, never read
    /// from ACLs; size is only reported for regular files.
    pub fn synthesize(times: BasicTimes, standard: StandardInfo, identity: Identity) -> Self {
        let (mode, size) = if standard.is_directory {
            (S_IFDIR | DIRECTORY_PERMISSIONS, 0)
        } else {
            (S_IFREG | FILE_PERMISSIONS, standard.end_of_file)
        };
        Self {
            dev: identity.dev,
            ino: identity.ino,
            mode,
            nlink: standard.links as u64,
            size,
            atime: ticks_to_unix_seconds(times.last_access),
            mtime: ticks_to_unix_seconds(times.last_write),
            ctime: ticks_to_unix_seconds(times.change),
            ..Self::default()
        }
    }
}
