use crate::{MappedRegion, MappedRegionMut, ShmBackend, ShmError, check_name};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;

/// File-backed shared objects in the system temp directory.
///
/// Used where POSIX shared memory is unavailable. Any process mapping the same
/// file shares the same pages.
pub struct FileShm;

impl FileShm {
    pub fn path_for(name: &str) -> Result<PathBuf, ShmError> {
        check_name(name)?;
        Ok(std::env::temp_dir().join(format!("{name}.qshm")))
    }
}

impl ShmBackend for FileShm {
    fn create(name: &str, size: usize) -> Result<MappedRegionMut, ShmError> {
        let path = Self::path_for(name)?;
        let create_err = |source| ShmError::Create {
            name: name.to_owned(),
            source,
        };

        match fs::remove_file(&path) {
            Ok(()) => tracing::debug!(name, "replaced stale region file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(create_err(e)),
        }

        let file = OpenOptions::new()
            .create_new(true)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(create_err)?;
        file.set_len(size as u64).map_err(create_err)?;

        MappedRegionMut::map(file, name)
    }

    fn open_read_only(name: &str) -> Result<MappedRegion, ShmError> {
        let path = Self::path_for(name)?;
        let file = OpenOptions::new()
            .read(true)
            .open(&path)
            .map_err(|source| ShmError::Open {
                name: name.to_owned(),
                source,
            })?;
        MappedRegion::map(file, name)
    }

    fn unlink(name: &str) -> Result<(), ShmError> {
        let path = Self::path_for(name)?;
        fs::remove_file(&path).map_err(|source| ShmError::Unlink {
            name: name.to_owned(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_backed_region_round_trip() {
        let name = format!("quartz_file_test_{}", std::process::id());
        let mut rw = FileShm::create(&name, 4096).expect("create");
        assert!(rw.as_ref().iter().all(|&b| b == 0));
        rw.as_mut()[4095] = 7;

        let ro = FileShm::open_read_only(&name).expect("open");
        assert_eq!(ro.as_ref()[4095], 7);
        assert_eq!(ro.name(), name);

        drop(rw);
        drop(ro);
        FileShm::unlink(&name).expect("unlink");
        assert!(FileShm::open_read_only(&name).is_err());
    }
}
