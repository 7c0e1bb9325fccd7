use windows_sys::Win32::Foundation::{HANDLE, INVALID_HANDLE_VALUE};

use super::dir::NativeDir;
use super::win32::{self, NativeEnvironment};
use crate::common::descriptor::{Descriptor, RawDescriptor};
use crate::common::dir::DirStream;
use crate::common::environ::{EnvSource, NameMatch, SharedEnvironment};
use crate::common::error::{Error, Result};
use crate::common::flags::{OpenFlags, CRT_OFLAGS};
use crate::common::stat::HandleKind;
use crate::common::types::{
    FileMetadata, PortConfig, Whence, WPOSIX_FLAG_EXACT_ENV_CASE, WPOSIX_FLAG_LEGACY_FILE_IDS,
};
use crate::common::unicode::{self, utf8_capacity_for_wide};
use crate::logging::{self, Op};
use crate::port::FsPort;

/// The Win32 wide-API implementation.
#[derive(Debug)]
pub struct WindowsPort {
    config: PortConfig,
    environment: SharedEnvironment,
}

impl WindowsPort {
    pub fn new(config: PortConfig) -> Self {
        Self::with_env_source(config, Box::new(NativeEnvironment))
    }

    pub fn with_env_source(config: PortConfig, source: Box<dyn EnvSource>) -> Self {
        let matching = if config.has(WPOSIX_FLAG_EXACT_ENV_CASE) {
            NameMatch::Exact
        } else {
            NameMatch::FoldCase
        };
        Self {
            config,
            environment: SharedEnvironment::new(source, matching),
        }
    }

    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    /// Metadata for any native handle.
    pub fn handle_stat(&self, handle: HANDLE) -> Result<FileMetadata> {
        match win32::handle_kind(handle) {
            HandleKind::Pipe => return Ok(FileMetadata::fifo()),
            HandleKind::CharDevice => return Ok(FileMetadata::char_device()),
            HandleKind::Unknown => return Err(Error::BadDescriptor),
            HandleKind::Disk => {}
        }
        let times = win32::basic_times(handle).ok_or(Error::BadDescriptor)?;
        let standard = win32::standard_info(handle).ok_or(Error::BadDescriptor)?;
        let wide_id = if self.config.has(WPOSIX_FLAG_LEGACY_FILE_IDS) {
            None
        } else {
            win32::file_id_128(handle)
        };
        let identity = wide_id
            .or_else(|| {
                log::trace!(target: "wposix::stat", "falling back to legacy file index");
                win32::file_index(handle)
            })
            .ok_or(Error::BadDescriptor)?;
        Ok(FileMetadata::synthesize(times, standard, identity))
    }
}

impl Default for WindowsPort {
    fn default() -> Self {
        Self::new(PortConfig::default())
    }
}

#[cfg(target_env = "msvc")]
mod crt {
    use core::ffi::c_uint;

    type InvalidParameterHandler =
        Option<unsafe extern "C" fn(*const u16, *const u16, *const u16, c_uint, usize)>;

    extern "C" {
        fn _set_thread_local_invalid_parameter_handler(
            handler: InvalidParameterHandler,
        ) -> InvalidParameterHandler;
    }

    unsafe extern "C" fn ignore(_: *const u16, _: *const u16, _: *const u16, _: c_uint, _: usize) {}

    /// While alive, CRT descriptor calls on this thread fail with `EBADF`
    /// instead of ending the process through the invalid-parameter handler.
    pub struct QuietParameters {
        previous: InvalidParameterHandler,
    }

    impl QuietParameters {
        pub fn install() -> Self {
            let previous = unsafe { _set_thread_local_invalid_parameter_handler(Some(ignore)) };
            Self { previous }
        }
    }

    impl Drop for QuietParameters {
        fn drop(&mut self) {
            unsafe { _set_thread_local_invalid_parameter_handler(self.previous) };
        }
    }
}

// msvcrt reports bad descriptors through errno alone.
#[cfg(not(target_env = "msvc"))]
mod crt {
    pub struct QuietParameters;

    impl QuietParameters {
        pub fn install() -> Self {
            Self
        }
    }
}

fn crt_handle(fd: RawDescriptor) -> HANDLE {
    if fd < 0 {
        return INVALID_HANDLE_VALUE;
    }
    let _quiet = crt::QuietParameters::install();
    unsafe { libc::get_osfhandle(fd) as HANDLE }
}

impl FsPort for WindowsPort {
    fn open(&self, path: &str, flags: OpenFlags, _mode: u32) -> Result<Descriptor> {
        let request = flags.to_native()?;
        let binding = CRT_OFLAGS.binding_flags(flags)?;
        let wide = unicode::to_wide(path)?;
        let handle = win32::create_file(&wide, &request).map_err(|err| {
            logging::failure(Op::Open, format_args!("{path}, {flags:?}"), err);
            err
        })?;
        drop(wide);

        let fd = unsafe { libc::open_osfhandle(handle.raw() as libc::intptr_t, binding) };
        if fd < 0 {
            let err = Error::last_errno();
            logging::failure(Op::Open, format_args!("{path}: binding handle"), err);
            drop(handle);
            return Err(err);
        }
        handle.into_raw();
        Ok(unsafe { Descriptor::from_raw(fd) })
    }

    fn opendir(&self, path: &str) -> Result<DirStream> {
        NativeDir::open(path).map(DirStream::new)
    }

    fn mkdir(&self, path: &str, _mode: u32) -> Result<()> {
        let wide = unicode::to_wide(path)?;
        win32::create_directory(&wide).map_err(|err| {
            logging::failure(Op::Mkdir, format_args!("{path}"), err);
            err
        })
    }

    fn getcwd(&self, capacity: usize) -> Result<String> {
        if capacity >= usize::MAX / 3 - 1 {
            return Err(Error::OutOfMemory);
        }
        let wide_capacity = utf8_capacity_for_wide(capacity);
        let mut buf: Vec<u16> = Vec::new();
        buf.try_reserve_exact(wide_capacity)?;
        buf.resize(wide_capacity, 0);

        let dot = unicode::to_wide(".")?;
        let len = win32::full_path_name(&dot, &mut buf) as usize;
        if len == 0 {
            return Err(Error::NotFound);
        }
        if len >= buf.len() {
            return Err(Error::RangeExceeded);
        }
        let cwd = unicode::from_wide(&buf[..len])?;
        if cwd.len() >= capacity {
            return Err(Error::RangeExceeded);
        }
        Ok(cwd)
    }

    fn lseek(&self, fd: RawDescriptor, offset: i64, whence: Whence) -> Result<i64> {
        if fd < 0 {
            return Err(Error::BadDescriptor);
        }
        let handle = crt_handle(fd);
        if handle != INVALID_HANDLE_VALUE && win32::handle_kind(handle) != HandleKind::Disk {
            return Err(Error::NotSeekable);
        }
        let _quiet = crt::QuietParameters::install();
        let pos = unsafe { libc::lseek64(fd, offset, whence.as_raw()) };
        if pos < 0 {
            return Err(Error::last_errno());
        }
        Ok(pos)
    }

    fn stat(&self, path: &str) -> Result<FileMetadata> {
        let wide = unicode::to_wide(path)?;
        let handle = win32::open_for_attributes(&wide).map_err(|err| {
            logging::failure(Op::Stat, format_args!("{path}"), err);
            err
        })?;
        drop(wide);
        self.handle_stat(handle.raw())
    }

    fn fstat(&self, fd: RawDescriptor) -> Result<FileMetadata> {
        let handle = crt_handle(fd);
        if handle == INVALID_HANDLE_VALUE {
            return Err(Error::BadDescriptor);
        }
        self.handle_stat(handle)
    }

    fn environment(&self) -> &SharedEnvironment {
        &self.environment
    }
}
