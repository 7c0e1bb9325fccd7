use std::ffi::c_void;
use std::mem::{size_of, zeroed};

use windows_sys::Win32::Foundation::{
    CloseHandle, GetLastError, SetLastError, ERROR_ACCESS_DENIED, ERROR_ALREADY_EXISTS,
    ERROR_FILE_EXISTS, ERROR_FILE_NOT_FOUND, ERROR_INVALID_HANDLE, ERROR_NOT_ENOUGH_MEMORY,
    ERROR_NO_UNICODE_TRANSLATION, ERROR_OUTOFMEMORY, ERROR_PATH_NOT_FOUND, ERROR_PIPE_BUSY,
    ERROR_SHARING_VIOLATION, GENERIC_READ, GENERIC_WRITE, HANDLE, INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::Storage::FileSystem::{
    CreateDirectoryW, CreateFileW, FileBasicInfo, FileIdInfo, FileStandardInfo,
    GetFileAttributesW, GetFileInformationByHandle, GetFileInformationByHandleEx, GetFileType,
    GetFullPathNameW, BY_HANDLE_FILE_INFORMATION, CREATE_ALWAYS, CREATE_NEW, DELETE,
    FILE_APPEND_DATA, FILE_ATTRIBUTE_DIRECTORY, FILE_ATTRIBUTE_NORMAL, FILE_ATTRIBUTE_TEMPORARY,
    FILE_BASIC_INFO, FILE_FLAG_BACKUP_SEMANTICS, FILE_FLAG_DELETE_ON_CLOSE,
    FILE_FLAG_RANDOM_ACCESS, FILE_FLAG_SEQUENTIAL_SCAN, FILE_ID_INFO, FILE_INFO_BY_HANDLE_CLASS,
    FILE_READ_ATTRIBUTES, FILE_SHARE_DELETE, FILE_SHARE_READ, FILE_SHARE_WRITE,
    FILE_STANDARD_INFO, FILE_TYPE_CHAR, FILE_TYPE_DISK, FILE_TYPE_PIPE, FILE_TYPE_REMOTE,
    FILE_WRITE_ATTRIBUTES, FILE_WRITE_EA, INVALID_FILE_ATTRIBUTES, OPEN_ALWAYS, OPEN_EXISTING,
    SECURITY_IDENTIFICATION, SECURITY_SQOS_PRESENT, TRUNCATE_EXISTING,
};
use windows_sys::Win32::System::Environment::{FreeEnvironmentStringsW, GetEnvironmentStringsW};

use crate::common::environ::{split_wide_block, EnvSource, RawEnvEntry};
use crate::common::error::{errno, Error, Result};
use crate::common::flags::{AccessRights, Disposition, NativeOpenRequest, OpenHints, ShareMode};
use crate::common::stat::{BasicTimes, HandleKind, Identity, StandardInfo};
use crate::common::unicode::WideString;

/// Translates the error codes the calls in this crate produce. Anything
/// else becomes `InvalidArgument`.
pub fn map_win32_error(err: u32) -> Error {
    match err {
        ERROR_FILE_NOT_FOUND | ERROR_PATH_NOT_FOUND => Error::NotFound,
        ERROR_SHARING_VIOLATION | ERROR_ACCESS_DENIED => Error::AccessDenied,
        ERROR_FILE_EXISTS | ERROR_ALREADY_EXISTS => Error::AlreadyExists,
        ERROR_PIPE_BUSY => Error::WouldBlock,
        ERROR_INVALID_HANDLE => Error::BadDescriptor,
        ERROR_NOT_ENOUGH_MEMORY | ERROR_OUTOFMEMORY => Error::OutOfMemory,
        ERROR_NO_UNICODE_TRANSLATION => Error::EncodingError,
        _ => Error::InvalidArgument,
    }
}

pub fn last_error() -> Error {
    map_win32_error(unsafe { GetLastError() })
}

/// Closes `handle` without disturbing the thread's last error or `errno`.
pub fn close_handle_keep_err(handle: HANDLE) {
    errno::preserve(|| unsafe {
        let saved = GetLastError();
        CloseHandle(handle);
        SetLastError(saved);
    });
}

/// An owned native handle, closed on drop.
#[derive(Debug)]
pub struct NativeHandle(HANDLE);

impl NativeHandle {
    pub fn raw(&self) -> HANDLE {
        self.0
    }

    pub fn into_raw(self) -> HANDLE {
        let handle = self.0;
        std::mem::forget(self);
        handle
    }
}

impl Drop for NativeHandle {
    fn drop(&mut self) {
        close_handle_keep_err(self.0);
    }
}

fn native_access(access: AccessRights) -> u32 {
    let mut out = 0;
    if access.contains(AccessRights::GENERIC_READ) {
        out |= GENERIC_READ;
    }
    if access.contains(AccessRights::GENERIC_WRITE) {
        out |= GENERIC_WRITE;
    }
    if access.contains(AccessRights::APPEND_DATA) {
        out |= FILE_APPEND_DATA;
    }
    if access.contains(AccessRights::WRITE_ATTRIBUTES) {
        out |= FILE_WRITE_ATTRIBUTES;
    }
    if access.contains(AccessRights::WRITE_EA) {
        out |= FILE_WRITE_EA;
    }
    if access.contains(AccessRights::DELETE) {
        out |= DELETE;
    }
    if access.contains(AccessRights::READ_ATTRIBUTES) {
        out |= FILE_READ_ATTRIBUTES;
    }
    out
}

fn native_share(share: ShareMode) -> u32 {
    let mut out = 0;
    if share.contains(ShareMode::READ) {
        out |= FILE_SHARE_READ;
    }
    if share.contains(ShareMode::WRITE) {
        out |= FILE_SHARE_WRITE;
    }
    if share.contains(ShareMode::DELETE) {
        out |= FILE_SHARE_DELETE;
    }
    out
}

fn native_disposition(disposition: Disposition) -> u32 {
    match disposition {
        Disposition::OpenExisting => OPEN_EXISTING,
        Disposition::TruncateExisting => TRUNCATE_EXISTING,
        Disposition::OpenAlways => OPEN_ALWAYS,
        Disposition::CreateAlways => CREATE_ALWAYS,
        Disposition::CreateNew => CREATE_NEW,
    }
}

fn native_hints(hints: OpenHints) -> u32 {
    let table = [
        (OpenHints::BACKUP_SEMANTICS, FILE_FLAG_BACKUP_SEMANTICS),
        (OpenHints::DELETE_ON_CLOSE, FILE_FLAG_DELETE_ON_CLOSE),
        (OpenHints::ATTRIBUTE_NORMAL, FILE_ATTRIBUTE_NORMAL),
        (OpenHints::ATTRIBUTE_TEMPORARY, FILE_ATTRIBUTE_TEMPORARY),
        (OpenHints::SEQUENTIAL_SCAN, FILE_FLAG_SEQUENTIAL_SCAN),
        (OpenHints::RANDOM_ACCESS, FILE_FLAG_RANDOM_ACCESS),
        (
            OpenHints::SECURITY_IDENTIFICATION,
            SECURITY_SQOS_PRESENT | SECURITY_IDENTIFICATION,
        ),
    ];
    table
        .iter()
        .filter(|(hint, _)| hints.contains(*hint))
        .fold(0, |acc, (_, bits)| acc | bits)
}

pub fn create_file(path: &WideString, request: &NativeOpenRequest) -> Result<NativeHandle> {
    let handle = unsafe {
        CreateFileW(
            path.as_ptr(),
            native_access(request.access),
            native_share(request.share),
            std::ptr::null_mut(),
            native_disposition(request.disposition),
            native_hints(request.hints),
            0,
        )
    };
    if handle == INVALID_HANDLE_VALUE {
        return Err(last_error());
    }
    Ok(NativeHandle(handle))
}

/// Opens any existing entry, directories included, for metadata queries.
pub fn open_for_attributes(path: &WideString) -> Result<NativeHandle> {
    let request = NativeOpenRequest {
        access: AccessRights::READ_ATTRIBUTES,
        share: ShareMode::all(),
        disposition: Disposition::OpenExisting,
        hints: OpenHints::BACKUP_SEMANTICS | OpenHints::SECURITY_IDENTIFICATION,
    };
    create_file(path, &request)
}

pub fn handle_kind(handle: HANDLE) -> HandleKind {
    match unsafe { GetFileType(handle) } & !FILE_TYPE_REMOTE {
        FILE_TYPE_DISK => HandleKind::Disk,
        FILE_TYPE_PIPE => HandleKind::Pipe,
        FILE_TYPE_CHAR => HandleKind::CharDevice,
        _ => HandleKind::Unknown,
    }
}

fn query_info<T>(handle: HANDLE, class: FILE_INFO_BY_HANDLE_CLASS) -> Option<T> {
    let mut info: T = unsafe { zeroed() };
    let ok = unsafe {
        GetFileInformationByHandleEx(
            handle,
            class,
            &mut info as *mut T as *mut c_void,
            size_of::<T>() as u32,
        )
    };
    (ok != 0).then_some(info)
}

pub fn basic_times(handle: HANDLE) -> Option<BasicTimes> {
    let info: FILE_BASIC_INFO = query_info(handle, FileBasicInfo)?;
    Some(BasicTimes {
        last_access: info.LastAccessTime,
        last_write: info.LastWriteTime,
        change: info.ChangeTime,
    })
}

pub fn standard_info(handle: HANDLE) -> Option<StandardInfo> {
    let info: FILE_STANDARD_INFO = query_info(handle, FileStandardInfo)?;
    Some(StandardInfo {
        links: info.NumberOfLinks,
        is_directory: info.Directory != 0,
        end_of_file: info.EndOfFile,
    })
}

/// Identity from the 128-bit file ID query (Windows 8 and later, not FAT).
pub fn file_id_128(handle: HANDLE) -> Option<Identity> {
    let info: FILE_ID_INFO = query_info(handle, FileIdInfo)?;
    Some(Identity::from_file_id_128(
        info.VolumeSerialNumber,
        info.FileId.Identifier,
    ))
}

/// Identity from the legacy query. Works on FAT and older hosts, but may
/// produce non-unique IDs on ReFS.
pub fn file_index(handle: HANDLE) -> Option<Identity> {
    let mut info: BY_HANDLE_FILE_INFORMATION = unsafe { zeroed() };
    if unsafe { GetFileInformationByHandle(handle, &mut info) } == 0 {
        return None;
    }
    Some(Identity::from_file_index(
        info.dwVolumeSerialNumber,
        info.nFileIndexHigh,
        info.nFileIndexLow,
    ))
}

pub fn is_directory(path: &WideString) -> Result<bool> {
    let attrs = unsafe { GetFileAttributesW(path.as_ptr()) };
    if attrs == INVALID_FILE_ATTRIBUTES {
        return Err(last_error());
    }
    Ok(attrs & FILE_ATTRIBUTE_DIRECTORY != 0)
}

pub fn create_directory(path: &WideString) -> Result<()> {
    let ok = unsafe { CreateDirectoryW(path.as_ptr(), std::ptr::null_mut()) };
    if ok == 0 {
        return Err(last_error());
    }
    Ok(())
}

/// Resolves `path` into `buf`, returning the native length. A length of
/// `buf.len()` or more means the buffer was too small.
pub fn full_path_name(path: &WideString, buf: &mut [u16]) -> u32 {
    let len = buf.len().min(u32::MAX as usize) as u32;
    unsafe { GetFullPathNameW(path.as_ptr(), len, buf.as_mut_ptr(), std::ptr::null_mut()) }
}

/// Reads the native wide environment block.
#[derive(Debug, Default)]
pub struct NativeEnvironment;

impl EnvSource for NativeEnvironment {
    fn read_block(&self) -> Vec<RawEnvEntry> {
        let block = unsafe { GetEnvironmentStringsW() };
        if block.is_null() {
            return Vec::new();
        }
        let mut total = 0usize;
        loop {
            let mut len = 0usize;
            while unsafe { *block.add(total + len) } != 0 {
                len += 1;
            }
            total += len + 1;
            if len == 0 {
                break;
            }
        }
        let entries = split_wide_block(unsafe { std::slice::from_raw_parts(block, total) });
        unsafe {
            FreeEnvironmentStringsW(block);
        }
        entries
    }
}
