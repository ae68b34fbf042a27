use crate::error::SyncError;
use std::cell::Cell;
use std::path::PathBuf;

/// A downstream cache that must be recomputed after session data changes.
pub trait CacheState {
    /// Mark the cache stale. Invalidating an already-stale cache is a no-op.
    fn invalidate(&self) -> Result<(), SyncError>;
}

/// Cache whose staleness is signalled by the absence of a marker file.
#[derive(Debug, Clone)]
pub struct FileCacheMarker {
    path: PathBuf,
}

impl FileCacheMarker {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl CacheState for FileCacheMarker {
    fn invalidate(&self) -> Result<(), SyncError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(SyncError::io(&self.path, error)),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryCacheMarker {
    invalidations: Cell<usize>,
}

impl MemoryCacheMarker {
    pub fn invalidations(&self) -> usize {
        self.invalidations.get()
    }
}

impl CacheState for MemoryCacheMarker {
    fn invalidate(&self) -> Result<(), SyncError> {
        self.invalidations.set(self.invalidations.get() + 1);
        Ok(())
    }
}
