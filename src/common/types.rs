use core::ffi::c_char;

use super::unicode::{utf8_capacity_for_wide, WIDE_NAME_MAX};

/// Unique-per-volume object identifier.
///
/// 128-bit native file IDs fit on 64-bit targets. 32-bit targets keep only the
/// low 64 bits, so IDs from filesystems that really use all 128 bits may
/// collide there.
#[cfg(target_pointer_width = "64")]
pub type InodeId = u128;
#[cfg(not(target_pointer_width = "64"))]
pub type InodeId = u64;

pub const S_IFMT: u32 = 0o170000;
pub const S_IFIFO: u32 = 0o010000;
pub const S_IFCHR: u32 = 0o020000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFREG: u32 = 0o100000;

/// Permission bits reported for every regular file, pipe and device.
pub const FILE_PERMISSIONS: u32 = 0o644;
/// Permission bits reported for every directory.
pub const DIRECTORY_PERMISSIONS: u32 = 0o755;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FileType {
    Regular,
    Directory,
    Fifo,
    CharDevice,
    Other,
}

impl FileType {
    pub fn from_mode(mode: u32) -> Self {
        match mode & S_IFMT {
            S_IFREG => FileType::Regular,
            S_IFDIR => FileType::Directory,
            S_IFIFO => FileType::Fifo,
            S_IFCHR => FileType::CharDevice,
            _ => FileType::Other,
        }
    }
}

/// POSIX-shaped metadata for one open object. Built fresh on every call.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct FileMetadata {
    pub dev: u64,
    pub ino: InodeId,
    pub mode: u32,
    pub nlink: u64,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u64,
    pub size: i64,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
}

impl FileMetadata {
    pub fn file_type(&self) -> FileType {
        FileType::from_mode(self.mode)
    }

    pub fn permissions(&self) -> u32 {
        self.mode & 0o7777
    }

    pub fn is_dir(&self) -> bool {
        self.file_type() == FileType::Directory
    }

    pub fn is_file(&self) -> bool {
        self.file_type() == FileType::Regular
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Whence {
    Start,
    Current,
    End,
}

impl Whence {
    pub fn from_raw(whence: i32) -> Option<Self> {
        match whence {
            libc::SEEK_SET => Some(Whence::Start),
            libc::SEEK_CUR => Some(Whence::Current),
            libc::SEEK_END => Some(Whence::End),
            _ => None,
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            Whence::Start => libc::SEEK_SET,
            Whence::Current => libc::SEEK_CUR,
            Whence::End => libc::SEEK_END,
        }
    }
}

/// Room for the longest native entry name after conversion to UTF-8.
pub const NAME_CAPACITY: usize = utf8_capacity_for_wide(WIDE_NAME_MAX);

/// One directory entry, overwritten in place by every read of its stream.
#[repr(C)]
#[derive(Clone)]
pub struct DirEntry {
    pub d_ino: u64,
    pub d_reclen: u16,
    pub d_namlen: u16,
    pub d_name: [c_char; NAME_CAPACITY],
}

const _: () = assert!(NAME_CAPACITY - 1 <= u16::MAX as usize);

impl DirEntry {
    pub(crate) fn empty() -> Self {
        Self {
            d_ino: 0,
            d_reclen: 0,
            d_namlen: 0,
            d_name: [0; NAME_CAPACITY],
        }
    }

    pub fn ino(&self) -> u64 {
        self.d_ino
    }

    pub fn name_bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.d_name.as_ptr() as *const u8, self.d_namlen as usize) }
    }

    /// The entry name. Always valid UTF-8; readers reject names that are not.
    pub fn name(&self) -> &str {
        std::str::from_utf8(self.name_bytes()).unwrap_or_default()
    }

    pub(crate) fn name_buffer(&mut self) -> &mut [u8] {
        unsafe {
            std::slice::from_raw_parts_mut(self.d_name.as_mut_ptr() as *mut u8, NAME_CAPACITY)
        }
    }
}

impl std::fmt::Debug for DirEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirEntry")
            .field("d_ino", &self.d_ino)
            .field("name", &self.name())
            .finish()
    }
}

/// C-facing metadata record filled by `wposix_stat` / `wposix_fstat`.
///
/// `st_uid` and `st_gid` keep the CRT's `short` width. Ids above `i16::MAX`
/// are clamped to it.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct Stat {
    pub st_dev: u64,
    pub st_ino: InodeId,
    pub st_mode: u16,
    pub st_nlink: u32,
    pub st_uid: i16,
    pub st_gid: i16,
    pub st_rdev: u64,
    pub st_size: i64,
    pub st_atime: i64,
    pub st_mtime: i64,
    pub st_ctime: i64,
}

fn clamp_id(id: u32) -> i16 {
    i16::try_from(id).unwrap_or(i16::MAX)
}

impl From<FileMetadata> for Stat {
    fn from(meta: FileMetadata) -> Self {
        Self {
            st_dev: meta.dev,
            st_ino: meta.ino,
            st_mode: meta.mode as u16,
            st_nlink: meta.nlink.min(u32::MAX as u64) as u32,
            st_uid: clamp_id(meta.uid),
            st_gid: clamp_id(meta.gid),
            st_rdev: meta.rdev,
            st_size: meta.size,
            st_atime: meta.atime,
            st_mtime: meta.mtime,
            st_ctime: meta.ctime,
        }
    }
}

/// Versioned configuration record for the process-wide port.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct PortConfig {
    pub size: u32,
    pub flags: u32,
    pub reserved: [u64; 6],
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            size: std::mem::size_of::<PortConfig>() as u32,
            flags: 0,
            reserved: [0; 6],
        }
    }
}

impl PortConfig {
    pub fn with_flags(flags: u32) -> Self {
        Self {
            flags,
            ..Self::default()
        }
    }

    pub fn has(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }
}

/// Identify files through the legacy volume-serial + file-index query only.
pub const WPOSIX_FLAG_LEGACY_FILE_IDS: u32 = 1 << 0;
/// Match environment names ignoring ASCII case.
pub const WPOSIX_FLAG_FOLD_ENV_CASE: u32 = 1 << 1;
/// Match environment names exactly.
pub const WPOSIX_FLAG_EXACT_ENV_CASE: u32 = 1 << 2;

#[repr(C)]
#[derive(Copy, Clone)]
pub struct StringView {
    pub ptr: *const c_char,
    pub len: usize,
}

#[repr(i32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct LogRecord {
    pub level: LogLevel,
    pub target: StringView,
    pub message: StringView,
    /// Name of the failed operation, empty for other records.
    pub op: StringView,
    /// errno the failure was reported with, or 0.
    pub errno: i32,
}

#[repr(i32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LogStatus {
    Ok = 0,
    ExternalLogger = 1,
}
