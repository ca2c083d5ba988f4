//! One file per key under a base directory.
//!
//! Keys map directly onto relative filesystem paths (`/`-separated
//! segments); `delete` on a directory-shaped key walks and removes the
//! whole subtree.

use std::fs::{self, File};
use std::io::{self, ErrorKind, Write as _};
use std::path::{Path, PathBuf};

use fs4::FileExt;
use walkdir::WalkDir;

use super::Store;

pub struct FileSystemStore {
    base_path: PathBuf,
}

impl FileSystemStore {
    /// Canonicalizes `path` and checks it is an extant directory.
    pub fn open(path: PathBuf) -> io::Result<Self> {
        let base_path = path.canonicalize()?;
        if fs::metadata(&base_path)?.is_file() {
            return Err(io::Error::new(
                ErrorKind::Other,
                "path exists but is a file",
            ));
        }
        Ok(Self { base_path })
    }

    /// Creates `path` as a fresh directory (and its parents).
    pub fn create(path: PathBuf) -> io::Result<Self> {
        fs::create_dir_all(&path)?;
        Ok(Self {
            base_path: path.canonicalize()?,
        })
    }

    /// Opens `path` if it exists, else creates it.
    pub fn open_or_create(path: PathBuf) -> io::Result<Self> {
        if path.exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    fn resolve(&self, key: &str) -> PathBuf {
        let mut p = self.base_path.clone();
        for segment in key.split('/').filter(|s| !s.is_empty()) {
            p.push(segment);
        }
        p
    }
}

impl Store for FileSystemStore {
    fn get(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        let path = self.resolve(key);
        match File::open(&path) {
            Ok(f) => {
                f.lock_shared()?;
                let bytes = std::fs::read(&path)?;
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn put(&self, key: &str, value: Vec<u8>) -> io::Result<()> {
        let path = self.resolve(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut f = fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .open(&path)?;
        f.lock_exclusive()?;
        f.write_all(&value)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> io::Result<()> {
        let path = self.resolve(key);
        if !path.exists() {
            return Ok(());
        }
        if path.is_file() {
            let f = File::open(&path)?;
            f.lock_exclusive()?;
            fs::remove_file(&path)?;
            return Ok(());
        }
        for entry in WalkDir::new(&path).contents_first(true).follow_links(false) {
            let entry = entry?;
            if entry.file_type().is_dir() {
                fs::remove_dir(entry.path())?;
            } else {
                let f = File::open(entry.path())?;
                f.lock_exclusive()?;
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }

    fn list_prefix(&self, prefix: &str) -> io::Result<Vec<String>> {
        let base = self.resolve(prefix);
        if !base.exists() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in WalkDir::new(&base).into_iter().filter_map(|e| e.ok()) {
            if entry.file_type().is_file() {
                if let Ok(rel) = entry.path().strip_prefix(&self.base_path) {
                    if let Some(s) = path_to_key(rel) {
                        out.push(s);
                    }
                }
            }
        }
        Ok(out)
    }

    fn exists(&self, key: &str) -> io::Result<bool> {
        Ok(self.resolve(key).exists())
    }
}

fn path_to_key(rel: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for c in rel.components() {
        parts.push(c.as_os_str().to_str()?.to_string());
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSystemStore::open(dir.path().to_path_buf()).unwrap();
        store.put("arr/0.0", vec![1, 2, 3]).unwrap();
        assert_eq!(store.get("arr/0.0").unwrap(), Some(vec![1, 2, 3]));
        store.delete("arr").unwrap();
        assert_eq!(store.get("arr/0.0").unwrap(), None);
    }
}
