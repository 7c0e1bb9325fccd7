use core::ffi::{c_char, c_int, c_void};
use std::io;

use super::error::{errno, Error, Result};
use super::flags::StreamMode;

pub type RawDescriptor = c_int;

/// An owned C runtime file descriptor. Closed on drop.
#[derive(Debug)]
pub struct Descriptor {
    fd: RawDescriptor,
}

impl Descriptor {
    /// Takes ownership of `fd`.
    ///
    /// # Safety
    /// `fd` must be an open descriptor not owned by anything else.
    pub unsafe fn from_raw(fd: RawDescriptor) -> Self {
        Self { fd }
    }

    pub fn as_raw(&self) -> RawDescriptor {
        self.fd
    }

    /// Releases ownership without closing.
    pub fn into_raw(self) -> RawDescriptor {
        let fd = self.fd;
        std::mem::forget(self);
        fd
    }

    pub fn close(self) -> Result<()> {
        let fd = self.into_raw();
        if unsafe { libc::close(fd) } != 0 {
            return Err(Error::last_errno());
        }
        Ok(())
    }
}

impl Drop for Descriptor {
    fn drop(&mut self) {
        errno::preserve(|| unsafe {
            libc::close(self.fd);
        });
    }
}

impl io::Read for Descriptor {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = buf.len().min(c_int::MAX as usize);
        let n = unsafe { libc::read(self.fd, buf.as_mut_ptr() as *mut c_void, len as _) };
        if n < 0 {
            return Err(errno_io_error());
        }
        Ok(n as usize)
    }
}

impl io::Write for Descriptor {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let len = buf.len().min(c_int::MAX as usize);
        let n = unsafe { libc::write(self.fd, buf.as_ptr() as *const c_void, len as _) };
        if n < 0 {
            return Err(errno_io_error());
        }
        Ok(n as usize)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// CRT calls report through `errno`, which is not the OS last-error slot on
/// every platform.
fn errno_io_error() -> io::Error {
    io::Error::from_raw_os_error(errno::get())
}

/// A buffered C stream over a descriptor, opened in binary mode.
#[derive(Debug)]
pub struct Stream {
    file: *mut libc::FILE,
}

impl Stream {
    /// Wraps `descriptor`. If wrapping fails the descriptor is closed before
    /// the error is returned.
    pub fn from_descriptor(descriptor: Descriptor, mode: StreamMode) -> Result<Self> {
        let cmode = mode.binary_mode();
        let file = unsafe { libc::fdopen(descriptor.as_raw(), cmode.as_ptr() as *const c_char) };
        if file.is_null() {
            let err = Error::last_errno();
            drop(descriptor);
            return Err(err);
        }
        descriptor.into_raw();
        Ok(Self { file })
    }

    pub fn as_ptr(&self) -> *mut libc::FILE {
        self.file
    }

    /// Hands the `FILE*` to the caller, who becomes responsible for `fclose`.
    pub fn into_raw(self) -> *mut libc::FILE {
        let file = self.file;
        std::mem::forget(self);
        file
    }

    pub fn close(self) -> Result<()> {
        let file = self.into_raw();
        if unsafe { libc::fclose(file) } != 0 {
            return Err(Error::last_errno());
        }
        Ok(())
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        errno::preserve(|| unsafe {
            libc::fclose(self.file);
        });
    }
}

#[cfg(windows)]
extern "C" {
    fn clearerr(stream: *mut libc::FILE);
}

#[cfg(unix)]
use libc::clearerr;

impl io::Read for Stream {
    /// A zero count is end of file unless the stream's error flag is set.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let n = unsafe { libc::fread(buf.as_mut_ptr() as *mut c_void, 1, buf.len(), self.file) };
        if n == 0 && unsafe { libc::ferror(self.file) } != 0 {
            let err = errno_io_error();
            unsafe { clearerr(self.file) };
            return Err(err);
        }
        Ok(n)
    }
}

impl io::Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let n = unsafe { libc::fwrite(buf.as_ptr() as *const c_void, 1, buf.len(), self.file) };
        if n == 0 {
            return Err(errno_io_error());
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        if unsafe { libc::fflush(self.file) } != 0 {
            return Err(errno_io_error());
        }
        Ok(())
    }
}
