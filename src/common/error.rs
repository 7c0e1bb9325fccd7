use core::ffi::c_int;

/// Failure kinds reported by every port operation.
///
/// Native error codes never cross the crate boundary; they are translated at
/// the point of failure into one of these.
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("no such file or directory")]
    NotFound,
    #[error("permission denied")]
    AccessDenied,
    #[error("file exists")]
    AlreadyExists,
    #[error("resource temporarily unavailable")]
    WouldBlock,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("out of memory")]
    OutOfMemory,
    #[error("bad file descriptor")]
    BadDescriptor,
    #[error("illegal seek")]
    NotSeekable,
    #[error("result too large for the provided buffer")]
    RangeExceeded,
    #[error("text could not be converted between UTF-8 and UTF-16")]
    EncodingError,
    /// An errno with no counterpart above, passed through unchanged by the
    /// Unix port.
    #[error("os error {0}")]
    Os(i32),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The C `errno` value reported for this error.
    pub fn errno(self) -> c_int {
        match self {
            Error::NotFound => libc::ENOENT,
            Error::AccessDenied => libc::EACCES,
            Error::AlreadyExists => libc::EEXIST,
            Error::WouldBlock => libc::EAGAIN,
            Error::InvalidArgument | Error::EncodingError => libc::EINVAL,
            Error::OutOfMemory => libc::ENOMEM,
            Error::BadDescriptor => libc::EBADF,
            Error::NotSeekable => libc::ESPIPE,
            Error::RangeExceeded => libc::ERANGE,
            Error::Os(code) => code,
        }
    }

    pub fn from_errno(code: c_int) -> Self {
        match code {
            libc::ENOENT => Error::NotFound,
            libc::EACCES | libc::EPERM => Error::AccessDenied,
            libc::EEXIST => Error::AlreadyExists,
            libc::EAGAIN => Error::WouldBlock,
            libc::EINVAL => Error::InvalidArgument,
            libc::ENOMEM => Error::OutOfMemory,
            libc::EBADF => Error::BadDescriptor,
            libc::ESPIPE => Error::NotSeekable,
            libc::ERANGE => Error::RangeExceeded,
            libc::EILSEQ => Error::EncodingError,
            other => Error::Os(other),
        }
    }

    /// Reads the calling thread's `errno`.
    pub fn last_errno() -> Self {
        Self::from_errno(errno::get())
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(_: std::collections::TryReserveError) -> Self {
        Error::OutOfMemory
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        std::io::Error::from_raw_os_error(err.errno())
    }
}

/// Access to the C runtime's thread-local `errno`.
pub mod errno {
    use core::ffi::c_int;

    // The errno crate maps to the Win32 last-error slot on Windows, while C
    // callers read the CRT's own errno.
    #[cfg(windows)]
    extern "C" {
        fn _errno() -> *mut c_int;
    }

    #[cfg(windows)]
    pub fn get() -> c_int {
        unsafe { *_errno() }
    }

    #[cfg(windows)]
    pub fn set(value: c_int) {
        unsafe { *_errno() = value };
    }

    #[cfg(unix)]
    pub fn get() -> c_int {
        ::errno::errno().0
    }

    #[cfg(unix)]
    pub fn set(value: c_int) {
        ::errno::set_errno(::errno::Errno(value));
    }

    /// Runs `f` and restores `errno` afterwards, so incidental cleanup cannot
    /// clobber an error that was already reported.
    pub fn preserve<T>(f: impl FnOnce() -> T) -> T {
        let saved = get();
        let out = f();
        set(saved);
        out
    }
}
