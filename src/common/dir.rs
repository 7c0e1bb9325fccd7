use super::error::{errno, Error, Result};
use super::types::DirEntry;
use crate::PlatformDir;

/// Platform side of a directory stream.
pub(crate) trait NativeDirectory: Sized {
    /// Fills `entry` with the next entry. `Ok(false)` means the stream is
    /// exhausted.
    fn advance(&mut self, entry: &mut DirEntry) -> Result<bool>;

    fn close(self) -> Result<()>;
}

/// An open directory stream yielding POSIX-shaped entries.
pub struct DirStream {
    native: Option<PlatformDir>,
    entry: DirEntry,
}

impl DirStream {
    pub(crate) fn new(native: PlatformDir) -> Self {
        Self {
            native: Some(native),
            entry: DirEntry::empty(),
        }
    }

    /// Advances the stream. The returned entry is overwritten by the next
    /// call; `Ok(None)` marks the end.
    pub fn read(&mut self) -> Result<Option<&DirEntry>> {
        let native = self.native.as_mut().ok_or(Error::BadDescriptor)?;
        if native.advance(&mut self.entry)? {
            Ok(Some(&self.entry))
        } else {
            Ok(None)
        }
    }

    /// Closes the native stream and reports its status.
    pub fn close(mut self) -> Result<()> {
        match self.native.take() {
            Some(native) => native.close(),
            None => Ok(()),
        }
    }
}

impl Iterator for DirStream {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read() {
            Ok(Some(entry)) => Some(Ok(entry.name().to_owned())),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

impl Drop for DirStream {
    fn drop(&mut self) {
        if let Some(native) = self.native.take() {
            errno::preserve(|| {
                let _ = native.close();
            });
        }
    }
}

impl std::fmt::Debug for DirStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirStream")
            .field("open", &self.native.is_some())
            .finish()
    }
}
