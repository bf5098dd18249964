/// Durable key/value storage for the conversation snapshot.
///
/// Mirrors a browser's local storage: whole string values under string keys,
/// each write replaces the previous value. `FileStorage` keeps one
/// `<key>.json` file per key under the data directory.
use std::io;
use std::path::PathBuf;

pub trait Storage {
    /// Stored value for `key`, or `None` if nothing was ever written.
    fn get_item(&self, key: &str) -> io::Result<Option<String>>;
    /// Replace the value stored under `key`.
    fn set_item(&mut self, key: &str, value: &str) -> io::Result<()>;
}

// ── Directory helpers ─────────────────────────────────────────────────────────

pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .ok()
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            PathBuf::from(std::env::var("HOME").unwrap_or_default()).join(".local/share")
        })
        .join("genie")
}

// ── FileStorage ───────────────────────────────────────────────────────────────

pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[cfg(test)]
    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> io::Result<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set_item(&mut self, key: &str, value: &str) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        // Write-then-rename so a crash mid-write never leaves a torn snapshot
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)
    }
}

// ── MemoryStorage ─────────────────────────────────────────────────────────────

#[cfg(test)]
#[derive(Default)]
pub struct MemoryStorage {
    items: std::collections::HashMap<String, String>,
    /// When set, every write fails (simulates a full or read-only disk)
    pub fail_writes: bool,
}

#[cfg(test)]
impl MemoryStorage {
    pub fn with_item(key: &str, value: &str) -> Self {
        let mut s = Self::default();
        s.items.insert(key.to_string(), value.to_string());
        s
    }
}

#[cfg(test)]
impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> io::Result<()> {
        if self.fail_writes {
            return Err(io::Error::other("quota exceeded"));
        }
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
