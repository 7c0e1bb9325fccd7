use std::ffi::CStr;
use std::sync::OnceLock;

use crate::common::descriptor::{Descriptor, RawDescriptor, Stream};
use crate::common::dir::DirStream;
use crate::common::environ::SharedEnvironment;
use crate::common::error::{Error, Result};
use crate::common::flags::{OpenFlags, StreamMode};
use crate::common::types::{FileMetadata, PortConfig, Whence};
use crate::HostPort;

/// POSIX-shaped filesystem and environment calls taking and returning UTF-8.
///
/// There is one implementation per host platform; see [`crate::HostPort`].
pub trait FsPort: Send + Sync {
    fn open(&self, path: &str, flags: OpenFlags, mode: u32) -> Result<Descriptor>;

    fn opendir(&self, path: &str) -> Result<DirStream>;

    fn mkdir(&self, path: &str, mode: u32) -> Result<()>;

    /// The current directory, failing with `RangeExceeded` if it would not
    /// fit in `capacity` bytes including a terminating NUL.
    fn getcwd(&self, capacity: usize) -> Result<String>;

    fn lseek(&self, fd: RawDescriptor, offset: i64, whence: Whence) -> Result<i64>;

    fn stat(&self, path: &str) -> Result<FileMetadata>;

    fn fstat(&self, fd: RawDescriptor) -> Result<FileMetadata>;

    /// The environment snapshot every `getenv` of this port shares.
    fn environment(&self) -> &SharedEnvironment;

    /// Value of an environment variable from a snapshot taken on first use.
    fn getenv(&self, name: &str) -> Option<&str> {
        self.environment().get(name)
    }

    fn getenv_c(&self, name: &[u8]) -> Option<&CStr> {
        self.environment().get_c(name)
    }

    fn creat(&self, path: &str, mode: u32) -> Result<Descriptor> {
        self.open(
            path,
            OpenFlags::CREATE | OpenFlags::WRITE | OpenFlags::TRUNCATE,
            mode,
        )
    }

    fn fopen(&self, path: &str, mode: &str) -> Result<Stream> {
        let mode = StreamMode::parse(mode)?;
        let descriptor = self.open(path, mode.open_flags(), 0o666)?;
        Stream::from_descriptor(descriptor, mode)
    }
}

static HOST_PORT: OnceLock<HostPort> = OnceLock::new();

/// The process-wide port, created with the default configuration on first
/// use unless [`configure`] ran earlier.
pub fn host_port() -> &'static HostPort {
    HOST_PORT.get_or_init(HostPort::default)
}

/// Creates the process-wide port from `config`. Fails with
/// `InvalidArgument` if the record is too short for this version or the port
/// already exists; the existing port is kept in that case.
pub fn configure(config: PortConfig) -> Result<&'static HostPort> {
    if (config.size as usize) < std::mem::size_of::<PortConfig>() {
        return Err(Error::InvalidArgument);
    }
    let mut created = false;
    let port = HOST_PORT.get_or_init(|| {
        created = true;
        HostPort::new(config)
    });
    if !created {
        log::debug!(target: "wposix::config", "port already in use; configuration ignored");
        return Err(Error::InvalidArgument);
    }
    Ok(port)
}
