use core::ffi::{c_char, c_int, c_void};
use std::ffi::CStr;

use crate::common::dir::DirStream;
use crate::common::error::{errno, Error, Result};
use crate::common::flags::OflagBits;
use crate::common::types::*;
use crate::logging::{self, LogCallback};
use crate::port::{configure, host_port, FsPort};

#[cfg(target_os = "windows")]
const NATIVE_OFLAGS: OflagBits = crate::common::flags::CRT_OFLAGS;
#[cfg(not(target_os = "windows"))]
const NATIVE_OFLAGS: OflagBits = crate::common::flags::POSIX_OFLAGS;

/// Records `err` in `errno` and returns the call's failure value.
fn fail<T>(err: Error, value: T) -> T {
    errno::set(err.errno());
    value
}

fn path_arg<'a>(path: *const c_char) -> Result<&'a str> {
    if path.is_null() {
        return Err(Error::InvalidArgument);
    }
    unsafe { CStr::from_ptr(path) }
        .to_str()
        .map_err(|_| Error::EncodingError)
}

fn status(result: Result<()>) -> c_int {
    match result {
        Ok(()) => 0,
        Err(err) => fail(err, -1),
    }
}

#[no_mangle]
pub extern "C" fn wposix_configure(config: *const PortConfig) -> c_int {
    if config.is_null() {
        return fail(Error::InvalidArgument, -1);
    }
    // Older callers may pass a shorter record; look at `size` before the rest.
    let size = unsafe { core::ptr::addr_of!((*config).size).read_unaligned() };
    if (size as usize) < core::mem::size_of::<PortConfig>() {
        return fail(Error::InvalidArgument, -1);
    }
    status(configure(unsafe { config.read_unaligned() }).map(|_| ()))
}

#[no_mangle]
pub extern "C" fn wposix_open(path: *const c_char, oflag: c_int, mode: c_int) -> c_int {
    let flags = NATIVE_OFLAGS.decode(oflag);
    match path_arg(path).and_then(|path| host_port().open(path, flags, mode as u32)) {
        Ok(descriptor) => descriptor.into_raw(),
        Err(err) => fail(err, -1),
    }
}

#[no_mangle]
pub extern "C" fn wposix_creat(path: *const c_char, mode: c_int) -> c_int {
    match path_arg(path).and_then(|path| host_port().creat(path, mode as u32)) {
        Ok(descriptor) => descriptor.into_raw(),
        Err(err) => fail(err, -1),
    }
}

#[no_mangle]
pub extern "C" fn wposix_fopen(path: *const c_char, mode: *const c_char) -> *mut libc::FILE {
    let result = path_arg(path).and_then(|path| {
        let mode = path_arg(mode)?;
        host_port().fopen(path, mode)
    });
    match result {
        Ok(stream) => stream.into_raw(),
        Err(err) => fail(err, core::ptr::null_mut()),
    }
}

#[no_mangle]
pub extern "C" fn wposix_opendir(path: *const c_char) -> *mut DirStream {
    match path_arg(path).and_then(|path| host_port().opendir(path)) {
        Ok(dir) => Box::into_raw(Box::new(dir)),
        Err(err) => fail(err, core::ptr::null_mut()),
    }
}

/// Returns the next entry, or null at the end of the stream (with `errno`
/// untouched) or on failure (with `errno` set). The entry stays valid until
/// the next call on the same stream.
#[no_mangle]
pub extern "C" fn wposix_readdir(dir: *mut DirStream) -> *const DirEntry {
    let Some(dir) = (unsafe { dir.as_mut() }) else {
        return fail(Error::BadDescriptor, core::ptr::null());
    };
    match dir.read() {
        Ok(Some(entry)) => entry as *const DirEntry,
        Ok(None) => core::ptr::null(),
        Err(err) => fail(err, core::ptr::null()),
    }
}

#[no_mangle]
pub extern "C" fn wposix_closedir(dir: *mut DirStream) -> c_int {
    if dir.is_null() {
        return fail(Error::BadDescriptor, -1);
    }
    let dir = unsafe { Box::from_raw(dir) };
    status(dir.close())
}

#[no_mangle]
pub extern "C" fn wposix_mkdir(path: *const c_char, mode: c_int) -> c_int {
    status(path_arg(path).and_then(|path| host_port().mkdir(path, mode as u32)))
}

/// Writes the current directory into `buf` (`size` bytes including the
/// terminator) and returns `buf`, or null with `errno` set.
#[no_mangle]
pub extern "C" fn wposix_getcwd(buf: *mut c_char, size: usize) -> *mut c_char {
    if buf.is_null() || size == 0 {
        return fail(Error::InvalidArgument, core::ptr::null_mut());
    }
    match host_port().getcwd(size) {
        Ok(cwd) if cwd.len() < size => {
            unsafe {
                core::ptr::copy_nonoverlapping(cwd.as_ptr(), buf as *mut u8, cwd.len());
                *buf.add(cwd.len()) = 0;
            }
            buf
        }
        Ok(_) => fail(Error::RangeExceeded, core::ptr::null_mut()),
        Err(err) => fail(err, core::ptr::null_mut()),
    }
}

#[no_mangle]
pub extern "C" fn wposix_lseek(fd: c_int, offset: i64, whence: c_int) -> i64 {
    let Some(whence) = Whence::from_raw(whence) else {
        return fail(Error::InvalidArgument, -1);
    };
    match host_port().lseek(fd, offset, whence) {
        Ok(pos) => pos,
        Err(err) => fail(err, -1),
    }
}

fn write_stat(out: *mut Stat, meta: Result<FileMetadata>) -> c_int {
    let Some(out) = (unsafe { out.as_mut() }) else {
        return fail(Error::InvalidArgument, -1);
    };
    match meta {
        Ok(meta) => {
            *out = Stat::from(meta);
            0
        }
        Err(err) => fail(err, -1),
    }
}

#[no_mangle]
pub extern "C" fn wposix_stat(path: *const c_char, out: *mut Stat) -> c_int {
    write_stat(out, path_arg(path).and_then(|path| host_port().stat(path)))
}

#[no_mangle]
pub extern "C" fn wposix_fstat(fd: c_int, out: *mut Stat) -> c_int {
    write_stat(out, host_port().fstat(fd))
}

/// The value of `name`, or null. Returned strings live for the rest of the
/// process and must not be freed.
#[no_mangle]
pub extern "C" fn wposix_getenv(name: *const c_char) -> *const c_char {
    if name.is_null() {
        return core::ptr::null();
    }
    let name = unsafe { CStr::from_ptr(name) }.to_bytes();
    match host_port().getenv_c(name) {
        Some(value) => value.as_ptr(),
        None => core::ptr::null(),
    }
}

#[no_mangle]
pub extern "C" fn wposix_log_set_stderr(level: LogLevel) -> LogStatus {
    logging::log_set_stderr(level)
}

#[no_mangle]
pub extern "C" fn wposix_log_set_callback(
    callback: LogCallback,
    user_data: *mut c_void,
    level: LogLevel,
) -> LogStatus {
    logging::log_set_callback(callback, user_data, level)
}

#[no_mangle]
pub extern "C" fn wposix_log_set_level(level: LogLevel) -> LogStatus {
    logging::log_set_level(level)
}

#[no_mangle]
pub extern "C" fn wposix_log_disable() -> LogStatus {
    logging::log_disable()
}
