use std::ffi::{CStr, CString};
use std::ptr::NonNull;

use crate::common::dir::NativeDirectory;
use crate::common::error::{errno, Error, Result};
use crate::common::types::DirEntry;

pub struct NativeDir {
    dir: NonNull<libc::DIR>,
}

impl NativeDir {
    pub fn open(path: &CString) -> Result<Self> {
        let dir = unsafe { libc::opendir(path.as_ptr()) };
        NonNull::new(dir)
            .map(|dir| Self { dir })
            .ok_or_else(Error::last_errno)
    }

    /// readdir signals the end with a null return and an unchanged errno.
    fn next_raw(&mut self) -> Result<Option<&libc::dirent>> {
        let saved = errno::get();
        errno::set(0);
        let raw = unsafe { libc::readdir(self.dir.as_ptr()) };
        if raw.is_null() {
            let code = errno::get();
            if code == 0 {
                errno::set(saved);
                return Ok(None);
            }
            return Err(Error::from_errno(code));
        }
        errno::set(saved);
        Ok(Some(unsafe { &*raw }))
    }
}

impl NativeDirectory for NativeDir {
    fn advance(&mut self, entry: &mut DirEntry) -> Result<bool> {
        loop {
            let Some(raw) = self.next_raw()? else {
                return Ok(false);
            };
            let name = unsafe { CStr::from_ptr(raw.d_name.as_ptr()) }.to_bytes();
            if std::str::from_utf8(name).is_err() {
                log::trace!(target: "wposix::dir", "skipping non-UTF-8 entry {}", name.escape_ascii());
                continue;
            }
            let out = entry.name_buffer();
            if name.len() >= out.len() {
                return Err(Error::RangeExceeded);
            }
            out[..name.len()].copy_from_slice(name);
            out[name.len()] = 0;
            entry.d_ino = raw.d_ino as u64;
            entry.d_reclen = raw.d_reclen as u16;
            entry.d_namlen = name.len() as u16;
            return Ok(true);
        }
    }

    fn close(self) -> Result<()> {
        if unsafe { libc::closedir(self.dir.as_ptr()) } != 0 {
            return Err(Error::last_errno());
        }
        Ok(())
    }
}
