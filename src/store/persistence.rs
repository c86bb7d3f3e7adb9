//! Atomic document writes and the self-write log.

use dashmap::DashMap;
use sha2::{Digest as _, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// SHA-256 of a document's bytes.
pub type Digest = [u8; 32];

pub fn digest(bytes: &[u8]) -> Digest {
    let hash = Sha256::digest(bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hash);
    out
}

/// Digest of the last bytes the store itself wrote, per file.
///
/// Shared with the change watcher, which ignores events whose file content
/// matches the entry.
#[derive(Debug, Default)]
pub struct SelfWriteLog {
    last: DashMap<PathBuf, Digest>,
}

impl SelfWriteLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, path: &Path, digest: Digest) -> Option<Digest> {
        self.last.insert(path.to_path_buf(), digest)
    }

    pub fn is_self_write(&self, path: &Path, digest: &Digest) -> bool {
        self.last.get(path).is_some_and(|d| d.value() == digest)
    }

    fn restore(&self, path: &Path, previous: Option<Digest>) {
        match previous {
            Some(d) => {
                self.last.insert(path.to_path_buf(), d);
            }
            None => {
                self.last.remove(path);
            }
        }
    }
}

/// Read a document. A missing file is `Ok(None)`.
pub fn read_document(path: &Path) -> std::io::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Write `bytes` to `path` through a sibling temp file and a rename, so
/// readers see either the old document or the new one.
///
/// The digest is logged before the rename becomes visible and rolled back if
/// the write fails.
pub fn write_atomic(path: &Path, bytes: &[u8], log: &SelfWriteLog) -> std::io::Result<Digest> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let digest = digest(bytes);
    let previous = log.record(path, digest);
    let temp_path = temp_path_for(path);

    let result = (|| {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        log.restore(path, previous);
        return Err(e);
    }
    Ok(digest)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Move an unreadable document out of the way as
/// `bad_<YYYYmmdd_HHMMSS>_<file>.bak`, so it no longer counts as a collection.
pub fn quarantine(path: &Path) -> std::io::Result<PathBuf> {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let file_name = path.file_name().unwrap_or_default().to_string_lossy();
    let target = path.with_file_name(format!("bad_{stamp}_{file_name}.bak"));
    fs::rename(path, &target)?;
    Ok(target)
}
