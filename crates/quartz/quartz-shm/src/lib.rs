//! Named shared-memory objects behind one capability interface.
//!
//! A backend knows how to create a zero-filled object of a given size and map
//! it read-write, map an existing object read-only, and remove the name.
//! Unmapping and closing the handle happen when a mapped region is dropped.
//! The region protocol built on top never looks at which backend is active.

use memmap2::{Mmap, MmapMut};
use std::fs::File;
use std::io;

mod file;
#[cfg(unix)]
mod posix;
#[cfg(windows)]
mod windows;

pub use file::FileShm;
#[cfg(unix)]
pub use posix::PosixShm;
#[cfg(windows)]
pub use windows::WindowsShm;

/// Backend selected for the build target.
#[cfg(unix)]
pub type PlatformShm = PosixShm;
#[cfg(windows)]
pub type PlatformShm = WindowsShm;
#[cfg(not(any(unix, windows)))]
pub type PlatformShm = FileShm;

pub trait ShmBackend {
    /// Creates (or replaces) the object `name` with `size` zeroed bytes and
    /// maps it read-write.
    fn create(name: &str, size: usize) -> Result<MappedRegionMut, ShmError>;

    /// Maps an existing object read-only.
    fn open_read_only(name: &str) -> Result<MappedRegion, ShmError>;

    /// Removes the name. Existing mappings stay valid until dropped.
    fn unlink(name: &str) -> Result<(), ShmError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ShmError {
    #[error("invalid shared memory name '{0}'")]
    InvalidName(String),

    #[error("failed to create shared memory object '{name}'")]
    Create {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to map shared memory object '{name}'")]
    Map {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to open shared memory object '{name}'")]
    Open {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to unlink shared memory object '{name}'")]
    Unlink {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Read-write mapping of a shared object.
///
/// Dropping it unmaps the region and closes the handle; the object itself
/// stays in the namespace.
pub struct MappedRegionMut {
    view: WritableView,
    name: String,
}

/// Read-only mapping of a shared object.
pub struct MappedRegion {
    view: ReadableView,
    name: String,
}

enum WritableView {
    File { _file: File, mmap: MmapMut },
    #[cfg(windows)]
    Section(windows::SectionView),
}

enum ReadableView {
    File { _file: File, mmap: Mmap },
    #[cfg(windows)]
    Section(windows::SectionView),
}

impl MappedRegionMut {
    pub(crate) fn map(file: File, name: &str) -> Result<Self, ShmError> {
        // SAFETY: the object is shared with other processes by design; all
        // access to the bytes goes through the bounds-checked region accessor
        // and the sequence protocol.
        let mmap = unsafe { MmapMut::map_mut(&file) }.map_err(|source| ShmError::Map {
            name: name.to_owned(),
            source,
        })?;
        Ok(Self {
            view: WritableView::File { _file: file, mmap },
            name: name.to_owned(),
        })
    }

    #[cfg(windows)]
    pub(crate) fn from_section(view: windows::SectionView, name: &str) -> Self {
        Self {
            view: WritableView::Section(view),
            name: name.to_owned(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.as_ref().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unmaps and closes. Equivalent to dropping.
    pub fn close(self) {}
}

impl MappedRegion {
    pub(crate) fn map(file: File, name: &str) -> Result<Self, ShmError> {
        // SAFETY: see `MappedRegionMut::map`; this side never writes.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|source| ShmError::Map {
            name: name.to_owned(),
            source,
        })?;
        Ok(Self {
            view: ReadableView::File { _file: file, mmap },
            name: name.to_owned(),
        })
    }

    #[cfg(windows)]
    pub(crate) fn from_section(view: windows::SectionView, name: &str) -> Self {
        Self {
            view: ReadableView::Section(view),
            name: name.to_owned(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.as_ref().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AsRef<[u8]> for MappedRegionMut {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        match &self.view {
            WritableView::File { mmap, .. } => &mmap[..],
            #[cfg(windows)]
            WritableView::Section(view) => view.as_slice(),
        }
    }
}

impl AsMut<[u8]> for MappedRegionMut {
    #[inline]
    fn as_mut(&mut self) -> &mut [u8] {
        match &mut self.view {
            WritableView::File { mmap, .. } => &mut mmap[..],
            #[cfg(windows)]
            WritableView::Section(view) => view.as_mut_slice(),
        }
    }
}

impl AsRef<[u8]> for MappedRegion {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        match &self.view {
            ReadableView::File { mmap, .. } => &mmap[..],
            #[cfg(windows)]
            ReadableView::Section(view) => view.as_slice(),
        }
    }
}

/// Rejects names the shared-object namespaces cannot hold: empty, containing
/// a path separator, or containing NUL.
pub(crate) fn check_name(name: &str) -> Result<(), ShmError> {
    if name.is_empty() || name.contains(['/', '\\', '\0']) {
        return Err(ShmError::InvalidName(name.to_owned()));
    }
    Ok(())
}
