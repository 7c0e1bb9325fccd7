use std::mem::zeroed;

use windows_sys::Win32::Foundation::{
    GetLastError, ERROR_FILE_NOT_FOUND, ERROR_NO_MORE_FILES, HANDLE, INVALID_HANDLE_VALUE, MAX_PATH,
};
use windows_sys::Win32::Storage::FileSystem::{
    FindClose, FindFirstFileW, FindNextFileW, WIN32_FIND_DATAW,
};

use super::win32::{self, map_win32_error};
use crate::common::dir::NativeDirectory;
use crate::common::error::{Error, Result};
use crate::common::types::DirEntry;
use crate::common::unicode::{self, encode_wide_into, wide_len, WIDE_NAME_MAX};
use crate::logging::{self, Op};

const _: () = assert!(MAX_PATH as usize == WIDE_NAME_MAX);

/// Directory search handle. The first match arrives with the open call and
/// is held until the first read.
pub struct NativeDir {
    handle: Option<HANDLE>,
    data: Box<WIN32_FIND_DATAW>,
    primed: bool,
}

impl NativeDir {
    pub fn open(path: &str) -> Result<Self> {
        let mut pattern = unicode::to_wide(path)?;
        if !win32::is_directory(&pattern)? {
            return Err(Error::InvalidArgument);
        }
        let suffix: &[u16] = match pattern.as_units().last() {
            Some(&c) if c == u16::from(b'\\') || c == u16::from(b'/') => &[b'*' as u16],
            _ => &[b'\\' as u16, b'*' as u16],
        };
        pattern.push_units(suffix)?;

        let mut data: Box<WIN32_FIND_DATAW> = Box::new(unsafe { zeroed() });
        let handle = unsafe { FindFirstFileW(pattern.as_ptr(), &mut *data) };
        if handle == INVALID_HANDLE_VALUE {
            let code = unsafe { GetLastError() };
            if code == ERROR_FILE_NOT_FOUND {
                return Ok(Self {
                    handle: None,
                    data,
                    primed: false,
                });
            }
            let err = map_win32_error(code);
            logging::failure(Op::Opendir, format_args!("{path}: win32 error {code}"), err);
            return Err(err);
        }
        Ok(Self {
            handle: Some(handle),
            data,
            primed: true,
        })
    }
}

impl NativeDirectory for NativeDir {
    fn advance(&mut self, entry: &mut DirEntry) -> Result<bool> {
        let Some(handle) = self.handle else {
            return Ok(false);
        };
        if self.primed {
            self.primed = false;
        } else if unsafe { FindNextFileW(handle, &mut *self.data) } == 0 {
            let code = unsafe { GetLastError() };
            if code == ERROR_NO_MORE_FILES {
                return Ok(false);
            }
            return Err(map_win32_error(code));
        }
        let name = &self.data.cFileName[..wide_len(&self.data.cFileName)];
        let len = encode_wide_into(name, entry.name_buffer())?;
        entry.d_ino = 0;
        entry.d_reclen = 0;
        entry.d_namlen = len as u16;
        Ok(true)
    }

    fn close(self) -> Result<()> {
        match self.handle {
            Some(handle) if unsafe { FindClose(handle) } == 0 => Err(win32::last_error()),
            _ => Ok(()),
        }
    }
}
