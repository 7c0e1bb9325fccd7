use std::ffi::{CStr, CString};
use std::os::unix::ffi::OsStrExt;

use super::dir::NativeDir;
use crate::common::descriptor::{Descriptor, RawDescriptor};
use crate::common::dir::DirStream;
use crate::common::environ::{EnvSource, NameMatch, RawEnvEntry, SharedEnvironment};
use crate::common::error::{Error, Result};
use crate::common::flags::{OpenFlags, POSIX_OFLAGS};
use crate::common::types::{
    FileMetadata, InodeId, PortConfig, Whence, WPOSIX_FLAG_FOLD_ENV_CASE,
};
use crate::logging::{self, Op};
use crate::port::FsPort;

/// Reads the process environment through the standard library.
#[derive(Debug, Default)]
pub struct NativeEnvironment;

impl EnvSource for NativeEnvironment {
    fn read_block(&self) -> Vec<RawEnvEntry> {
        std::env::vars_os()
            .map(|(name, value)| {
                let name = name.as_bytes();
                let value = value.as_bytes();
                let mut entry = Vec::with_capacity(name.len() + 1 + value.len());
                entry.extend_from_slice(name);
                entry.push(b'=');
                entry.extend_from_slice(value);
                RawEnvEntry::Bytes(entry)
            })
            .collect()
    }
}

/// Unix hosts already speak UTF-8 paths and POSIX descriptors, so every call
/// goes straight to libc.
#[derive(Debug)]
pub struct PosixPort {
    config: PortConfig,
    environment: SharedEnvironment,
}

impl PosixPort {
    pub fn new(config: PortConfig) -> Self {
        Self::with_env_source(config, Box::new(NativeEnvironment))
    }

    pub fn with_env_source(config: PortConfig, source: Box<dyn EnvSource>) -> Self {
        let matching = if config.has(WPOSIX_FLAG_FOLD_ENV_CASE) {
            NameMatch::FoldCase
        } else {
            NameMatch::Exact
        };
        Self {
            config,
            environment: SharedEnvironment::new(source, matching),
        }
    }

    pub fn config(&self) -> &PortConfig {
        &self.config
    }
}

impl Default for PosixPort {
    fn default() -> Self {
        Self::new(PortConfig::default())
    }
}

fn c_path(path: &str) -> Result<CString> {
    CString::new(path).map_err(|_| Error::EncodingError)
}

fn metadata_from(st: &libc::stat) -> FileMetadata {
    FileMetadata {
        dev: st.st_dev as u64,
        ino: st.st_ino as InodeId,
        mode: st.st_mode as u32,
        nlink: st.st_nlink as u64,
        uid: st.st_uid,
        gid: st.st_gid,
        rdev: st.st_rdev as u64,
        size: st.st_size as i64,
        atime: st.st_atime as i64,
        mtime: st.st_mtime as i64,
        ctime: st.st_ctime as i64,
    }
}

#[cfg(target_os = "linux")]
fn advise(fd: RawDescriptor, flags: OpenFlags) {
    let advice = if flags.contains(OpenFlags::SEQUENTIAL) {
        libc::POSIX_FADV_SEQUENTIAL
    } else if flags.contains(OpenFlags::RANDOM) {
        libc::POSIX_FADV_RANDOM
    } else {
        return;
    };
    let rc = unsafe { libc::posix_fadvise(fd, 0, 0, advice) };
    if rc != 0 {
        log::trace!(target: "wposix::open", "posix_fadvise({fd}) ignored: {rc}");
    }
}

#[cfg(not(target_os = "linux"))]
fn advise(_fd: RawDescriptor, _flags: OpenFlags) {}

impl FsPort for PosixPort {
    fn open(&self, path: &str, flags: OpenFlags, mode: u32) -> Result<Descriptor> {
        let oflag = POSIX_OFLAGS.encode(flags)?;
        let cpath = c_path(path)?;
        let fd = unsafe { libc::open(cpath.as_ptr(), oflag, mode as libc::c_uint) };
        if fd < 0 {
            let err = Error::last_errno();
            logging::failure(Op::Open, format_args!("{path}, {flags:?}"), err);
            return Err(err);
        }
        advise(fd, flags);
        Ok(unsafe { Descriptor::from_raw(fd) })
    }

    fn opendir(&self, path: &str) -> Result<DirStream> {
        let cpath = c_path(path)?;
        NativeDir::open(&cpath).map(DirStream::new).map_err(|err| {
            logging::failure(Op::Opendir, format_args!("{path}"), err);
            err
        })
    }

    fn mkdir(&self, path: &str, mode: u32) -> Result<()> {
        let cpath = c_path(path)?;
        if unsafe { libc::mkdir(cpath.as_ptr(), mode as libc::mode_t) } != 0 {
            let err = Error::last_errno();
            logging::failure(Op::Mkdir, format_args!("{path}"), err);
            return Err(err);
        }
        Ok(())
    }

    fn getcwd(&self, capacity: usize) -> Result<String> {
        if capacity == 0 {
            return Err(Error::InvalidArgument);
        }
        let mut buf: Vec<u8> = Vec::new();
        buf.try_reserve_exact(capacity)?;
        buf.resize(capacity, 0);
        let ptr = unsafe { libc::getcwd(buf.as_mut_ptr() as *mut libc::c_char, capacity) };
        if ptr.is_null() {
            return Err(Error::last_errno());
        }
        let cwd = CStr::from_bytes_until_nul(&buf).map_err(|_| Error::RangeExceeded)?;
        cwd.to_str()
            .map(str::to_owned)
            .map_err(|_| Error::EncodingError)
    }

    fn lseek(&self, fd: RawDescriptor, offset: i64, whence: Whence) -> Result<i64> {
        let pos = unsafe { libc::lseek(fd, offset as libc::off_t, whence.as_raw()) };
        if pos < 0 {
            return Err(Error::last_errno());
        }
        Ok(pos as i64)
    }

    fn stat(&self, path: &str) -> Result<FileMetadata> {
        let cpath = c_path(path)?;
        let mut st: libc::stat = unsafe { std::mem::zeroed() };
        if unsafe { libc::stat(cpath.as_ptr(), &mut st) } != 0 {
            let err = Error::last_errno();
            logging::failure(Op::Stat, format_args!("{path}"), err);
            return Err(err);
        }
        Ok(metadata_from(&st))
    }

    fn fstat(&self, fd: RawDescriptor) -> Result<FileMetadata> {
        let mut st: libc::stat = unsafe { std::mem::zeroed() };
        if unsafe { libc::fstat(fd, &mut st) } != 0 {
            return Err(Error::last_errno());
        }
        Ok(metadata_from(&st))
    }

    fn environment(&self) -> &SharedEnvironment {
        &self.environment
    }
}
