//! Process environment captured once as UTF-8 `NAME=value` strings.
//!
//! Callers of `getenv` keep the returned strings indefinitely, so the
//! snapshot is taken once, never mutated afterwards, and lives as long as
//! its owner (the process-wide port lives for the whole process).

use std::ffi::{CStr, CString};
use std::sync::OnceLock;

use super::error::{Error, Result};
use super::unicode;

/// One raw environment entry as the native side stores it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RawEnvEntry {
    Wide(Vec<u16>),
    Bytes(Vec<u8>),
}

impl RawEnvEntry {
    fn to_utf8(&self) -> Result<String> {
        match self {
            RawEnvEntry::Wide(units) => unicode::from_wide(units),
            RawEnvEntry::Bytes(bytes) => String::from_utf8(bytes.clone())
                .map_err(|_| Error::EncodingError),
        }
    }
}

/// Where a snapshot reads its entries from.
pub trait EnvSource: Send + Sync {
    /// Every `NAME=value` entry of the environment block, in block order.
    fn read_block(&self) -> Vec<RawEnvEntry>;
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NameMatch {
    /// ASCII case-insensitive, like the native environment.
    FoldCase,
    Exact,
}

#[derive(Debug)]
pub struct EnvironmentSnapshot {
    entries: Vec<CString>,
    matching: NameMatch,
}

impl EnvironmentSnapshot {
    /// Converts every entry, omitting the ones that fail to convert.
    pub fn capture(source: &dyn EnvSource, matching: NameMatch) -> Self {
        let block = source.read_block();
        let mut entries = Vec::new();
        if entries.try_reserve_exact(block.len()).is_err() {
            log::warn!(target: "wposix::environ", "no memory for {} environment entries", block.len());
            return Self { entries, matching };
        }
        for raw in &block {
            let converted = raw.to_utf8().and_then(|text| {
                CString::new(text).map_err(|_| Error::EncodingError)
            });
            match converted {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    log::trace!(target: "wposix::environ", "omitting environment entry: {err}");
                }
            }
        }
        Self { entries, matching }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The stored value for `name` as a C string, borrowed from the snapshot.
    ///
    /// `name` is matched as a prefix followed by `=`, so the hidden per-drive
    /// entries (`=C:=C:\work`) are reachable as `=C:`.
    pub fn lookup_c(&self, name: &[u8]) -> Option<&CStr> {
        if name.is_empty() {
            return None;
        }
        self.entries.iter().find_map(|entry| {
            let bytes = entry.to_bytes_with_nul();
            let key = bytes.get(..name.len())?;
            let rest = &bytes[name.len()..];
            let matched = match self.matching {
                NameMatch::FoldCase => key.eq_ignore_ascii_case(name),
                NameMatch::Exact => key == name,
            };
            if !matched || rest.first() != Some(&b'=') {
                return None;
            }
            CStr::from_bytes_with_nul(&rest[1..]).ok()
        })
    }

    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.lookup_c(name.as_bytes())?.to_str().ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|entry| entry.to_str().ok())
    }
}

/// Lazily captured snapshot shared by every `getenv` of one port.
///
/// The first caller captures; concurrent first callers block until it is
/// done. Readers afterwards take no lock.
pub struct SharedEnvironment {
    source: Box<dyn EnvSource>,
    matching: NameMatch,
    snapshot: OnceLock<EnvironmentSnapshot>,
}

impl SharedEnvironment {
    pub fn new(source: Box<dyn EnvSource>, matching: NameMatch) -> Self {
        Self {
            source,
            matching,
            snapshot: OnceLock::new(),
        }
    }

    pub fn snapshot(&self) -> &EnvironmentSnapshot {
        self.snapshot
            .get_or_init(|| EnvironmentSnapshot::capture(self.source.as_ref(), self.matching))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.snapshot().lookup(name)
    }

    pub fn get_c(&self, name: &[u8]) -> Option<&CStr> {
        self.snapshot().lookup_c(name)
    }
}

impl std::fmt::Debug for SharedEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedEnvironment")
            .field("matching", &self.matching)
            .field("captured", &self.snapshot.get().is_some())
            .finish()
    }
}

/// Splits a native wide environment block into entries. The block is a
/// sequence of NUL-terminated strings ended by an empty one.
pub fn split_wide_block(block: &[u16]) -> Vec<RawEnvEntry> {
    let mut entries = Vec::new();
    let mut rest = block;
    loop {
        let len = unicode::wide_len(rest);
        if len == 0 {
            break;
        }
        entries.push(RawEnvEntry::Wide(rest[..len].to_vec()));
        if len >= rest.len() {
            break;
        }
        rest = &rest[len + 1..];
    }
    entries
}

/// Fixed entries, for tests and embedders.
#[derive(Clone, Debug, Default)]
pub struct StaticEnv(pub Vec<RawEnvEntry>);

impl StaticEnv {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| RawEnvEntry::Bytes(format!("{k}={v}").into_bytes()))
                .collect(),
        )
    }
}

impl EnvSource for StaticEnv {
    fn read_block(&self) -> Vec<RawEnvEntry> {
        self.0.clone()
    }
}
