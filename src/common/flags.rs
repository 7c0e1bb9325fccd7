//! Translation from POSIX open semantics to native access, sharing and
//! creation-disposition semantics, and `fopen` mode-string parsing.

use core::ffi::c_int;

use bitflags::bitflags;

use super::error::{Error, Result};

bitflags! {
    /// Requested open behavior.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct OpenFlags: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const APPEND = 1 << 2;
        const CREATE = 1 << 3;
        const EXCLUSIVE = 1 << 4;
        const TRUNCATE = 1 << 5;
        /// Delete the file when its last handle closes.
        const TEMPORARY = 1 << 6;
        /// Hint that the file is short-lived and should stay in cache.
        const SHORT_LIVED = 1 << 7;
        const SEQUENTIAL = 1 << 8;
        const RANDOM = 1 << 9;
    }
}

bitflags! {
    /// Native access rights.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct AccessRights: u32 {
        const GENERIC_READ = 1 << 0;
        const GENERIC_WRITE = 1 << 1;
        const APPEND_DATA = 1 << 2;
        const WRITE_ATTRIBUTES = 1 << 3;
        const WRITE_EA = 1 << 4;
        const DELETE = 1 << 5;
        const READ_ATTRIBUTES = 1 << 6;
        /// Write access that only ever appends, so the native layer makes
        /// every write land atomically at end of file.
        const APPEND_ONLY = Self::APPEND_DATA.bits()
            | Self::WRITE_ATTRIBUTES.bits()
            | Self::WRITE_EA.bits();
    }
}

bitflags! {
    /// Sharing granted to other openers of the same file.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct ShareMode: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const DELETE = 1 << 2;
    }
}

bitflags! {
    /// Native behavioral flags and attribute hints.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct OpenHints: u32 {
        /// Required to open directories.
        const BACKUP_SEMANTICS = 1 << 0;
        const DELETE_ON_CLOSE = 1 << 1;
        const ATTRIBUTE_NORMAL = 1 << 2;
        const ATTRIBUTE_TEMPORARY = 1 << 3;
        const SEQUENTIAL_SCAN = 1 << 4;
        const RANDOM_ACCESS = 1 << 5;
        /// Named-pipe servers may identify the caller but not impersonate it.
        const SECURITY_IDENTIFICATION = 1 << 6;
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Disposition {
    OpenExisting,
    TruncateExisting,
    OpenAlways,
    CreateAlways,
    CreateNew,
}

/// Access direction requested by the caller, after validation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct NativeOpenRequest {
    pub access: AccessRights,
    pub share: ShareMode,
    pub disposition: Disposition,
    pub hints: OpenHints,
}

impl OpenFlags {
    pub fn access_mode(self) -> Result<AccessMode> {
        match (self.contains(OpenFlags::READ), self.contains(OpenFlags::WRITE)) {
            (true, false) => Ok(AccessMode::ReadOnly),
            (false, true) => Ok(AccessMode::WriteOnly),
            (true, true) => Ok(AccessMode::ReadWrite),
            (false, false) => Err(Error::InvalidArgument),
        }
    }

    /// Derives the native open parameters.
    pub fn to_native(self) -> Result<NativeOpenRequest> {
        let mut hints = OpenHints::empty();
        let append = self.contains(OpenFlags::APPEND);

        let mut access = match (self.access_mode()?, append) {
            (AccessMode::ReadOnly, false) => {
                hints |= OpenHints::BACKUP_SEMANTICS;
                AccessRights::GENERIC_READ
            }
            (AccessMode::ReadWrite, false) => AccessRights::GENERIC_READ | AccessRights::GENERIC_WRITE,
            (AccessMode::ReadOnly | AccessMode::ReadWrite, true) => {
                AccessRights::GENERIC_READ | AccessRights::APPEND_ONLY
            }
            (AccessMode::WriteOnly, false) => AccessRights::GENERIC_WRITE,
            (AccessMode::WriteOnly, true) => AccessRights::APPEND_ONLY,
        };

        let create = self.contains(OpenFlags::CREATE);
        let exclusive = self.contains(OpenFlags::EXCLUSIVE);
        let truncate = self.contains(OpenFlags::TRUNCATE);
        let disposition = match (create, exclusive, truncate) {
            // A lone EXCLUSIVE is ignored, as the C runtime does.
            (false, _, false) => Disposition::OpenExisting,
            (false, _, true) => Disposition::TruncateExisting,
            (true, false, false) => {
                hints |= OpenHints::ATTRIBUTE_NORMAL;
                Disposition::OpenAlways
            }
            (true, false, true) => Disposition::CreateAlways,
            (true, true, _) => {
                hints |= OpenHints::ATTRIBUTE_NORMAL;
                Disposition::CreateNew
            }
        };

        if disposition != Disposition::CreateNew {
            hints |= OpenHints::SECURITY_IDENTIFICATION;
        }

        if self.contains(OpenFlags::TEMPORARY) {
            hints |= OpenHints::DELETE_ON_CLOSE;
            access |= AccessRights::DELETE;
        }
        if self.contains(OpenFlags::SHORT_LIVED) {
            hints |= OpenHints::ATTRIBUTE_TEMPORARY;
        }
        if self.contains(OpenFlags::SEQUENTIAL) {
            hints |= OpenHints::SEQUENTIAL_SCAN;
        } else if self.contains(OpenFlags::RANDOM) {
            hints |= OpenHints::RANDOM_ACCESS;
        }

        Ok(NativeOpenRequest {
            access,
            share: ShareMode::all(),
            disposition,
            hints,
        })
    }
}

/// Bit positions of a C runtime's `open` flags. A zero field means the
/// runtime has no such flag.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OflagBits {
    pub write_only: c_int,
    pub read_write: c_int,
    pub append: c_int,
    pub create: c_int,
    pub exclusive: c_int,
    pub truncate: c_int,
    pub temporary: c_int,
    pub short_lived: c_int,
    pub sequential: c_int,
    pub random: c_int,
    pub no_inherit: c_int,
}

/// Microsoft C runtime numbering.
pub const CRT_OFLAGS: OflagBits = OflagBits {
    write_only: 0x0001,
    read_write: 0x0002,
    append: 0x0008,
    create: 0x0100,
    exclusive: 0x0400,
    truncate: 0x0200,
    temporary: 0x0040,
    short_lived: 0x1000,
    sequential: 0x0020,
    random: 0x0010,
    no_inherit: 0x0080,
};

#[cfg(unix)]
pub const POSIX_OFLAGS: OflagBits = OflagBits {
    write_only: libc::O_WRONLY,
    read_write: libc::O_RDWR,
    append: libc::O_APPEND,
    create: libc::O_CREAT,
    exclusive: libc::O_EXCL,
    truncate: libc::O_TRUNC,
    temporary: 0,
    short_lived: 0,
    sequential: 0,
    random: 0,
    no_inherit: libc::O_CLOEXEC,
};

impl OflagBits {
    /// Decodes a raw `open` flag word. An access field with both the
    /// write-only and read-write bits set yields no access at all, which
    /// [`OpenFlags::access_mode`] rejects.
    pub fn decode(&self, oflag: c_int) -> OpenFlags {
        let access = oflag & (self.write_only | self.read_write);
        let mut flags = if access == 0 {
            OpenFlags::READ
        } else if access == self.write_only {
            OpenFlags::WRITE
        } else if access == self.read_write {
            OpenFlags::READ | OpenFlags::WRITE
        } else {
            OpenFlags::empty()
        };
        let table = [
            (self.append, OpenFlags::APPEND),
            (self.create, OpenFlags::CREATE),
            (self.exclusive, OpenFlags::EXCLUSIVE),
            (self.truncate, OpenFlags::TRUNCATE),
            (self.temporary, OpenFlags::TEMPORARY),
            (self.short_lived, OpenFlags::SHORT_LIVED),
            (self.sequential, OpenFlags::SEQUENTIAL),
            (self.random, OpenFlags::RANDOM),
        ];
        for (bit, flag) in table {
            if bit != 0 && oflag & bit != 0 {
                flags |= flag;
            }
        }
        flags
    }

    /// Encodes `flags` for a runtime whose `open` applies them itself.
    /// Exclusive without create is dropped, as in [`OpenFlags::to_native`].
    pub fn encode(&self, flags: OpenFlags) -> Result<c_int> {
        let mut out = self.binding_flags(flags)?;
        if flags.contains(OpenFlags::CREATE) {
            out |= self.create;
            if flags.contains(OpenFlags::EXCLUSIVE) {
                out |= self.exclusive;
            }
        }
        let table = [
            (OpenFlags::TRUNCATE, self.truncate),
            (OpenFlags::TEMPORARY, self.temporary),
            (OpenFlags::SHORT_LIVED, self.short_lived),
            (OpenFlags::SEQUENTIAL, self.sequential),
            (OpenFlags::RANDOM, self.random),
        ];
        for (flag, bit) in table {
            if flags.contains(flag) {
                out |= bit;
            }
        }
        Ok(out)
    }

    /// Flags used when binding a native handle to a descriptor: the access
    /// direction, append, and no-inherit. Everything else was already
    /// applied at open time.
    pub fn binding_flags(&self, flags: OpenFlags) -> Result<c_int> {
        let mut out = match flags.access_mode()? {
            AccessMode::ReadOnly => 0,
            AccessMode::WriteOnly => self.write_only,
            AccessMode::ReadWrite => self.read_write,
        };
        if flags.contains(OpenFlags::APPEND) {
            out |= self.append;
        }
        Ok(out | self.no_inherit)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StreamBase {
    Read,
    Write,
    Append,
}

/// A parsed `fopen` mode string.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StreamMode {
    pub base: StreamBase,
    pub read_write: bool,
    pub exclusive: bool,
}

impl StreamMode {
    /// Parses `r`, `w` or `a` followed by any of `+`, `x` in any order.
    /// Other trailing characters are ignored.
    pub fn parse(mode: &str) -> Result<Self> {
        let mut chars = mode.chars();
        let base = match chars.next() {
            Some('r') => StreamBase::Read,
            Some('w') => StreamBase::Write,
            Some('a') => StreamBase::Append,
            _ => return Err(Error::InvalidArgument),
        };
        let mut parsed = StreamMode {
            base,
            read_write: false,
            exclusive: false,
        };
        for ch in chars {
            match ch {
                '+' => parsed.read_write = true,
                'x' => parsed.exclusive = true,
                _ => {}
            }
        }
        Ok(parsed)
    }

    pub fn open_flags(&self) -> OpenFlags {
        let mut flags = match self.base {
            StreamBase::Read => OpenFlags::READ,
            StreamBase::Write => OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
            StreamBase::Append => OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::APPEND,
        };
        if self.read_write {
            flags |= OpenFlags::READ | OpenFlags::WRITE;
        }
        if self.exclusive {
            flags |= OpenFlags::EXCLUSIVE;
        }
        flags
    }

    /// Binary-mode string handed to the stream layer, NUL-terminated.
    pub fn binary_mode(&self) -> [u8; 4] {
        let base = match self.base {
            StreamBase::Read => b'r',
            StreamBase::Write => b'w',
            StreamBase::Append => b'a',
        };
        let plus = if self.read_write { b'+' } else { 0 };
        [base, b'b', plus, 0]
    }
}
