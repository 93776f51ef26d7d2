use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcfsError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path} has no {field} entry")]
    MissingField { path: PathBuf, field: &'static str },
}

/// Reads a whole file; paths and arguments in proc files need not be UTF-8.
pub fn read_lossy(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Locations of the kernel interfaces the monitor reads.
///
/// Both roots are configurable so tests can point at fixture trees.
#[derive(Debug, Clone)]
pub struct ProcFs {
    proc_root: PathBuf,
    block_root: PathBuf,
}

impl Default for ProcFs {
    fn default() -> Self {
        ProcFs::new("/proc", "/sys/class/block")
    }
}

impl ProcFs {
    pub fn new(proc_root: impl Into<PathBuf>, block_root: impl Into<PathBuf>) -> Self {
        ProcFs {
            proc_root: proc_root.into(),
            block_root: block_root.into(),
        }
    }

    pub fn pids(&self) -> Result<Vec<u32>, ProcfsError> {
        let entries = fs::read_dir(&self.proc_root).map_err(|source| ProcfsError::Read {
            path: self.proc_root.clone(),
            source,
        })?;
        let mut pids: Vec<u32> = entries
            .flatten()
            .filter_map(|entry| entry.file_name().to_str()?.parse().ok())
            .collect();
        pids.sort_unstable();
        Ok(pids)
    }

    pub fn pid_file(&self, pid: u32, name: &str) -> PathBuf {
        self.proc_root.join(pid.to_string()).join(name)
    }

    pub fn read_pid_file(&self, pid: u32, name: &str) -> io::Result<String> {
        read_lossy(&self.pid_file(pid, name))
    }

    pub fn meminfo_path(&self) -> PathBuf {
        self.proc_root.join("meminfo")
    }

    pub fn stat_path(&self) -> PathBuf {
        self.proc_root.join("stat")
    }

    /// Compressed-swap block devices with statistics, sorted by name.
    pub fn zram_devices(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.block_root) else {
            return Vec::new();
        };
        let mut devices: Vec<PathBuf> = entries
            .flatten()
            .filter(|entry| entry.file_name().to_string_lossy().starts_with("zram"))
            .map(|entry| entry.path())
            .filter(|path| path.join("mm_stat").exists())
            .collect();
        devices.sort();
        devices
    }
}

/// A file kept open between polls and re-read from the start each time.
///
/// A failed read closes the handle; the next read reopens it.
#[derive(Debug)]
pub struct CachedFile {
    path: PathBuf,
    file: Option<File>,
    bytes: Vec<u8>,
    buf: String,
}

impl CachedFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CachedFile {
            path: path.into(),
            file: None,
            bytes: Vec::new(),
            buf: String::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&mut self) -> io::Result<&str> {
        let file = match self.file.take() {
            Some(file) => file,
            None => File::open(&self.path)?,
        };
        let file = self.file.insert(file);
        self.bytes.clear();
        let result = file
            .seek(SeekFrom::Start(0))
            .and_then(|_| file.read_to_end(&mut self.bytes));
        if let Err(err) = result {
            self.file = None;
            return Err(err);
        }
        self.buf = String::from_utf8_lossy(&self.bytes).into_owned();
        Ok(&self.buf)
    }

    pub fn close(&mut self) {
        self.file = None;
    }
}

pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pids_lists_numeric_entries_only() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["12", "3", "self", "meminfo"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        let procfs = ProcFs::new(dir.path(), dir.path().join("block"));
        assert_eq!(procfs.pids().unwrap(), vec![3, 12]);
    }

    #[test]
    fn pids_reports_missing_root() {
        let procfs = ProcFs::new("/nonexistent/proc", "/nonexistent/block");
        assert!(matches!(procfs.pids(), Err(ProcfsError::Read { .. })));
    }

    #[test]
    fn cached_file_rereads_from_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stat");
        fs::write(&path, "first").unwrap();
        let mut cached = CachedFile::new(&path);
        assert_eq!(cached.read().unwrap(), "first");
        assert_eq!(cached.read().unwrap(), "first");
    }

    #[test]
    fn cached_file_replaces_invalid_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stat");
        fs::write(&path, b"1 (caf\xe9) S 0").unwrap();
        let mut cached = CachedFile::new(&path);
        assert_eq!(cached.read().unwrap(), "1 (caf\u{FFFD}) S 0");
    }

    #[test]
    fn cached_file_missing_is_error() {
        let mut cached = CachedFile::new("/nonexistent/stat");
        assert!(cached.read().is_err());
        assert_eq!(cached.path(), Path::new("/nonexistent/stat"));
    }

    #[test]
    fn zram_devices_need_mm_stat() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("zram0")).unwrap();
        fs::write(dir.path().join("zram0/mm_stat"), "0 0 0 0 0").unwrap();
        fs::create_dir_all(dir.path().join("zram1")).unwrap();
        fs::create_dir_all(dir.path().join("sda")).unwrap();
        let procfs = ProcFs::new(dir.path(), dir.path());
        assert_eq!(procfs.zram_devices(), vec![dir.path().join("zram0")]);
    }
}
