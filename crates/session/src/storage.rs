//! Durable key-value storage for the session record
//!
//! The session is stored as independently addressable string keys, read in
//! bulk with `multi_get`, written in bulk with `multi_set` and erased with a
//! full `clear` of the namespace. `FileStore` keeps the namespace in one JSON
//! object file; every write goes through an atomic temp-file + rename so a
//! crash mid-write never leaves a torn record.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Boxed future returned by [`KeyValueStore`] operations.
pub type StorageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Durable string key-value namespace backing the session.
///
/// Uses `Pin<Box<dyn Future>>` return types so stores can be shared as
/// `Arc<dyn KeyValueStore>`.
pub trait KeyValueStore: Send + Sync {
    /// Read `keys`, returning one slot per key in the same order.
    fn multi_get<'a>(&'a self, keys: &'a [&'a str]) -> StorageFuture<'a, Vec<Option<String>>>;

    /// Write every entry in one persisted update.
    fn multi_set<'a>(&'a self, entries: &'a [(&'a str, String)]) -> StorageFuture<'a, ()>;

    /// Erase the whole namespace.
    fn clear(&self) -> StorageFuture<'_, ()>;
}

/// JSON-file backed store.
///
/// The Mutex serializes read-modify-write cycles so two concurrent
/// `multi_set` calls cannot drop each other's keys.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        info!(path = %path.display(), "using file session storage");
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for FileStore {
    fn multi_get<'a>(&'a self, keys: &'a [&'a str]) -> StorageFuture<'a, Vec<Option<String>>> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            let entries = read_entries(&self.path).await?;
            Ok(keys.iter().map(|key| entries.get(*key).cloned()).collect())
        })
    }

    fn multi_set<'a>(&'a self, entries: &'a [(&'a str, String)]) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            let mut current = match read_entries(&self.path).await {
                Ok(current) => current,
                Err(Error::Parse(e)) => {
                    warn!(path = %self.path.display(), error = %e, "overwriting unreadable session file");
                    HashMap::new()
                }
                Err(e) => return Err(e),
            };
            for (key, value) in entries {
                current.insert((*key).to_string(), value.clone());
            }
            write_atomic(&self.path, &current).await
        })
    }

    fn clear(&self) -> StorageFuture<'_, ()> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            match tokio::fs::remove_file(&self.path).await {
                Ok(()) => {
                    debug!(path = %self.path.display(), "erased session file");
                    Ok(())
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(Error::Storage(format!("removing session file: {e}"))),
            }
        })
    }
}

/// In-process store for embedding and tests.
///
/// `set_unavailable(true)` makes every operation fail, simulating a storage
/// layer that has gone away.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Copy of every stored entry.
    pub async fn entries(&self) -> HashMap<String, String> {
        self.entries.lock().await.clone()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::Storage("memory store marked unavailable".into()));
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    fn multi_get<'a>(&'a self, keys: &'a [&'a str]) -> StorageFuture<'a, Vec<Option<String>>> {
        Box::pin(async move {
            self.check_available()?;
            let entries = self.entries.lock().await;
            Ok(keys.iter().map(|key| entries.get(*key).cloned()).collect())
        })
    }

    fn multi_set<'a>(&'a self, entries: &'a [(&'a str, String)]) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            self.check_available()?;
            let mut current = self.entries.lock().await;
            for (key, value) in entries {
                current.insert((*key).to_string(), value.clone());
            }
            Ok(())
        })
    }

    fn clear(&self) -> StorageFuture<'_, ()> {
        Box::pin(async move {
            self.check_available()?;
            self.entries.lock().await.clear();
            Ok(())
        })
    }
}

async fn read_entries(path: &Path) -> Result<HashMap<String, String>> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => return Err(Error::Storage(format!("reading session file: {e}"))),
    };
    serde_json::from_str(&contents).map_err(|e| Error::Parse(format!("parsing session file: {e}")))
}

/// Write the namespace to `path` atomically with 0600 permissions.
async fn write_atomic(path: &Path, data: &HashMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Parse(format!("serializing session: {e}")))?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Error::Storage(format!("creating session directory: {e}")))?;

    let tmp_path = dir.join(format!(".session.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Storage(format!("writing temp session file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Storage(format!("setting session file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Storage(format!("renaming temp session file: {e}")))?;

    debug!(path = %path.display(), keys = data.len(), "persisted session");
    Ok(())
}
