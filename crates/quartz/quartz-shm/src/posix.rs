use crate::{MappedRegion, MappedRegionMut, ShmBackend, ShmError, check_name};
use std::ffi::CString;
use std::fs::{File, Permissions};
use std::io;
use std::os::fd::FromRawFd;
use std::os::unix::fs::PermissionsExt;

/// Access bits for created objects: readable and writable by everyone.
const SHM_MODE: u32 = 0o666;

/// POSIX shared memory (`shm_open`), named `/<name>`.
///
/// On Linux the objects appear under `/dev/shm`.
pub struct PosixShm;

impl PosixShm {
    fn object_name(name: &str) -> Result<CString, ShmError> {
        check_name(name)?;
        CString::new(format!("/{name}")).map_err(|_| ShmError::InvalidName(name.to_owned()))
    }

    fn shm_open(path: &CString, flags: libc::c_int) -> io::Result<File> {
        #[cfg(target_os = "macos")]
        let mode = SHM_MODE as libc::c_uint;
        #[cfg(not(target_os = "macos"))]
        let mode = SHM_MODE as libc::mode_t;

        // SAFETY: `path` is a valid NUL-terminated string for the duration of the call.
        let fd = unsafe { libc::shm_open(path.as_ptr(), flags, mode) };
        if fd == -1 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: `fd` was just returned by shm_open and is owned by nobody else.
        Ok(unsafe { File::from_raw_fd(fd) })
    }

    fn shm_unlink(path: &CString) -> io::Result<()> {
        // SAFETY: `path` is a valid NUL-terminated string.
        if unsafe { libc::shm_unlink(path.as_ptr()) } == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl ShmBackend for PosixShm {
    /// Replaces any stale object of the same name, then creates a fresh one.
    ///
    /// Readers still mapped to the stale object keep their mapping; they never
    /// see it shrink underneath them. A fresh object is zero-filled by the
    /// kernel when it is sized.
    fn create(name: &str, size: usize) -> Result<MappedRegionMut, ShmError> {
        let path = Self::object_name(name)?;
        let create_err = |source| ShmError::Create {
            name: name.to_owned(),
            source,
        };

        match Self::shm_unlink(&path) {
            Ok(()) => tracing::debug!(name, "replaced stale shared memory object"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(create_err(e)),
        }

        let file = Self::shm_open(&path, libc::O_CREAT | libc::O_EXCL | libc::O_RDWR)
            .map_err(create_err)?;

        // The process umask may have narrowed the mode given to shm_open.
        if let Err(e) = file.set_permissions(Permissions::from_mode(SHM_MODE)) {
            tracing::debug!(name, error = %e, "could not widen shared memory permissions");
        }

        if let Err(e) = file.set_len(size as u64) {
            let _ = Self::shm_unlink(&path);
            return Err(create_err(e));
        }

        MappedRegionMut::map(file, name).inspect_err(|_| {
            let _ = Self::shm_unlink(&path);
        })
    }

    fn open_read_only(name: &str) -> Result<MappedRegion, ShmError> {
        let path = Self::object_name(name)?;
        let file = Self::shm_open(&path, libc::O_RDONLY).map_err(|source| ShmError::Open {
            name: name.to_owned(),
            source,
        })?;
        MappedRegion::map(file, name)
    }

    fn unlink(name: &str) -> Result<(), ShmError> {
        let path = Self::object_name(name)?;
        Self::shm_unlink(&path).map_err(|source| ShmError::Unlink {
            name: name.to_owned(),
            source,
        })
    }
}
