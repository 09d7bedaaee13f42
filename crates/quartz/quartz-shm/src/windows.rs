use crate::{MappedRegion, MappedRegionMut, ShmBackend, ShmError, check_name};
use std::ffi::c_void;
use std::io;
use std::mem::{MaybeUninit, size_of};
use std::ptr;
use windows_sys::Win32::Foundation::{
    CloseHandle, ERROR_ALREADY_EXISTS, GetLastError, HANDLE, INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::System::Memory::{
    CreateFileMappingW, FILE_MAP, FILE_MAP_ALL_ACCESS, FILE_MAP_READ, MEMORY_BASIC_INFORMATION,
    MEMORY_MAPPED_VIEW_ADDRESS, MapViewOfFile, OpenFileMappingW, PAGE_READWRITE,
    UnmapViewOfFile, VirtualQuery,
};

/// Pagefile-backed named sections in the session namespace, named
/// `Local\<name>`.
///
/// A section lives as long as some process holds a handle to it, so the
/// region disappears once the writer and every reader have closed it.
/// `unlink` has nothing to remove.
pub struct WindowsShm;

impl WindowsShm {
    /// `Local\<name>` as a NUL-terminated UTF-16 string.
    fn section_name(name: &str) -> Result<Vec<u16>, ShmError> {
        check_name(name)?;
        Ok(format!("Local\\{name}")
            .encode_utf16()
            .chain(Some(0))
            .collect())
    }
}

impl ShmBackend for WindowsShm {
    /// Creates the section and maps it read-write.
    ///
    /// Fails with `AlreadyExists` if a section of that name is still held
    /// open, by a previous writer or by attached readers. Pagefile sections
    /// are zero-filled on creation.
    fn create(name: &str, size: usize) -> Result<MappedRegionMut, ShmError> {
        let wide = Self::section_name(name)?;
        let create_err = |source| ShmError::Create {
            name: name.to_owned(),
            source,
        };
        let section_size = size as u64;

        // SAFETY: `wide` is NUL-terminated and outlives the call; a null
        // security descriptor selects the default.
        let handle = unsafe {
            CreateFileMappingW(
                INVALID_HANDLE_VALUE,
                ptr::null(),
                PAGE_READWRITE,
                (section_size >> 32) as u32,
                section_size as u32,
                wide.as_ptr(),
            )
        };
        if handle.is_null() {
            return Err(create_err(io::Error::last_os_error()));
        }
        // SAFETY: reads the calling thread's last-error value.
        if unsafe { GetLastError() } == ERROR_ALREADY_EXISTS {
            close_handle(handle);
            return Err(create_err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "section is still open in another process",
            )));
        }

        let view = SectionView::map(handle, FILE_MAP_ALL_ACCESS, Some(size)).map_err(|source| {
            ShmError::Map {
                name: name.to_owned(),
                source,
            }
        })?;
        Ok(MappedRegionMut::from_section(view, name))
    }

    fn open_read_only(name: &str) -> Result<MappedRegion, ShmError> {
        let wide = Self::section_name(name)?;
        // SAFETY: `wide` is NUL-terminated and outlives the call.
        let handle = unsafe { OpenFileMappingW(FILE_MAP_READ, 0, wide.as_ptr()) };
        if handle.is_null() {
            return Err(ShmError::Open {
                name: name.to_owned(),
                source: io::Error::last_os_error(),
            });
        }

        let view = SectionView::map(handle, FILE_MAP_READ, None).map_err(|source| ShmError::Map {
            name: name.to_owned(),
            source,
        })?;
        Ok(MappedRegion::from_section(view, name))
    }

    fn unlink(name: &str) -> Result<(), ShmError> {
        check_name(name)
    }
}

fn close_handle(handle: HANDLE) {
    // SAFETY: `handle` is an open section handle owned by the caller.
    if unsafe { CloseHandle(handle) } == 0 {
        tracing::debug!(error = %io::Error::last_os_error(), "CloseHandle failed");
    }
}

/// A mapped view of a section together with the section handle.
///
/// Dropping it unmaps the view, then closes the handle.
pub(crate) struct SectionView {
    handle: HANDLE,
    base: *mut u8,
    len: usize,
}

// SAFETY: the view is plain shared memory owned by this value, and the handle
// may be closed from any thread.
unsafe impl Send for SectionView {}
// SAFETY: `&SectionView` only hands out `&[u8]`.
unsafe impl Sync for SectionView {}

impl SectionView {
    /// Maps the whole section, exposing at most `limit` bytes of it. Takes
    /// ownership of `handle`, closing it on failure.
    fn map(handle: HANDLE, access: FILE_MAP, limit: Option<usize>) -> io::Result<Self> {
        // SAFETY: `handle` is an open section handle; length 0 maps all of it.
        let view = unsafe { MapViewOfFile(handle, access, 0, 0, 0) };
        if view.Value.is_null() {
            let err = io::Error::last_os_error();
            close_handle(handle);
            return Err(err);
        }

        // The view length is the section size rounded up to whole pages.
        let mut info = MaybeUninit::<MEMORY_BASIC_INFORMATION>::uninit();
        // SAFETY: `info` is a writable buffer of the size passed.
        let written = unsafe {
            VirtualQuery(
                view.Value as *const c_void,
                info.as_mut_ptr(),
                size_of::<MEMORY_BASIC_INFORMATION>(),
            )
        };
        let mut section = Self {
            handle,
            base: view.Value as *mut u8,
            len: 0,
        };
        if written == 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: VirtualQuery filled the buffer.
        let mapped = unsafe { info.assume_init() }.RegionSize;
        section.len = limit.map_or(mapped, |limit| limit.min(mapped));
        Ok(section)
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        // SAFETY: `base..base + len` is mapped for the lifetime of `self`.
        unsafe { std::slice::from_raw_parts(self.base, self.len) }
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above; only read-write views are reachable mutably.
        unsafe { std::slice::from_raw_parts_mut(self.base, self.len) }
    }
}

impl Drop for SectionView {
    fn drop(&mut self) {
        let view = MEMORY_MAPPED_VIEW_ADDRESS {
            Value: self.base as *mut c_void,
        };
        // SAFETY: `view` was returned by MapViewOfFile and is unmapped once.
        if unsafe { UnmapViewOfFile(view) } == 0 {
            tracing::debug!(error = %io::Error::last_os_error(), "UnmapViewOfFile failed");
        }
        close_handle(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_name(tag: &str) -> String {
        format!("quartz_shm_test_{}_{tag}", std::process::id())
    }

    #[test]
    fn section_names_live_in_the_session_namespace() {
        let wide = WindowsShm::section_name("quantnexus_ohlcv").unwrap();
        assert_eq!(wide.last(), Some(&0));
        let text = String::from_utf16(&wide[..wide.len() - 1]).unwrap();
        assert_eq!(text, "Local\\quantnexus_ohlcv");
        assert!(WindowsShm::section_name("a\\b").is_err());
    }

    #[test]
    fn created_section_is_zeroed_and_shared() {
        let name = test_name("shared");
        let mut rw = WindowsShm::create(&name, 8192).expect("create");
        assert_eq!(rw.len(), 8192);
        assert!(rw.as_ref().iter().all(|&b| b == 0));
        rw.as_mut()[100] = 42;

        let ro = WindowsShm::open_read_only(&name).expect("open");
        assert_eq!(ro.as_ref()[100], 42);
        assert_eq!(ro.name(), name);
    }

    #[test]
    fn open_section_cannot_be_created_twice() {
        let name = test_name("twice");
        let _first = WindowsShm::create(&name, 4096).expect("create");
        let second = WindowsShm::create(&name, 4096);
        assert!(matches!(
            second,
            Err(ShmError::Create { ref source, .. }) if source.kind() == io::ErrorKind::AlreadyExists
        ));
    }

    #[test]
    fn section_vanishes_with_its_last_handle() {
        let name = test_name("vanish");
        drop(WindowsShm::create(&name, 4096).expect("create"));
        assert!(matches!(
            WindowsShm::open_read_only(&name),
            Err(ShmError::Open { .. })
        ));
        WindowsShm::unlink(&name).expect("unlink is a no-op");
    }
}
