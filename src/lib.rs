mod common;
mod ffi;
mod logging;
mod port;

#[cfg(target_os = "windows")]
pub mod windows_native;
#[cfg(target_os = "windows")]
pub use windows_native::WindowsPort as HostPort;
#[cfg(target_os = "windows")]
pub(crate) use windows_native::NativeDir as PlatformDir;

#[cfg(any(target_os = "linux", target_os = "macos"))]
pub mod posix_passthrough;
#[cfg(any(target_os = "linux", target_os = "macos"))]
pub use posix_passthrough::PosixPort as HostPort;
#[cfg(any(target_os = "linux", target_os = "macos"))]
pub(crate) use posix_passthrough::NativeDir as PlatformDir;

#[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
compile_error!("wposix only supports Windows, Linux and macOS targets.");

pub use crate::common::descriptor::{Descriptor, RawDescriptor, Stream};
pub use crate::common::dir::DirStream;
pub use crate::common::environ::{
    split_wide_block, EnvSource, EnvironmentSnapshot, NameMatch, RawEnvEntry, SharedEnvironment,
    StaticEnv,
};
pub use crate::common::error::{errno, Error, Result};
pub use crate::common::flags::{
    AccessMode, AccessRights, Disposition, NativeOpenRequest, OflagBits, OpenFlags, OpenHints,
    ShareMode, StreamBase, StreamMode, CRT_OFLAGS,
};
#[cfg(unix)]
pub use crate::common::flags::POSIX_OFLAGS;
pub use crate::common::stat::{
    ticks_to_unix_seconds, BasicTimes, HandleKind, Identity, StandardInfo, EPOCH_OFFSET_SECONDS,
    TICKS_PER_SECOND,
};
pub use crate::common::types::*;
pub use crate::common::unicode::{
    encode_wide_into, from_wide, to_wide, utf8_capacity_for_wide, wide_len, WideString,
    MAX_UTF8_BYTES_PER_WIDE_UNIT, WIDE_NAME_MAX,
};
pub use crate::ffi::*;
pub use crate::logging::{LogCallback, WposixLogger};
pub use crate::port::{configure, host_port, FsPort};
