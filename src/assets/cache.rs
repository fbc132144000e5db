use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context as _;

use crate::assets::key::AssetKey;
use crate::foundation::atomic_file::{sibling, write_atomically};
use crate::foundation::error::{SceneError, SceneResult};

/// Snapshot of cache activity since construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// `ensure` calls answered from disk without invoking a generator.
    pub hits: u64,
    /// Generator invocations that produced a new asset.
    pub generated: u64,
}

/// Content-addressed, produce-if-absent store for generated audio.
///
/// Layout is `{root}/{namespace}/{fragment}_{digest}.{ext}`. At most one generator runs per key:
/// concurrent callers in this process serialize on a per-path lock, and other processes sharing
/// the directory serialize on an advisory lock held on `{file}.lock`. Finished assets are written
/// to a temporary sibling and renamed into place, so a failed or cancelled generation never
/// leaves a partial file behind.
#[derive(Debug)]
pub struct AssetCache {
    root: PathBuf,
    ext: String,
    in_flight: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
    hits: AtomicU64,
    generated: AtomicU64,
}

impl AssetCache {
    pub fn new(root: impl Into<PathBuf>, ext: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            ext: ext.into(),
            in_flight: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            generated: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extension(&self) -> &str {
        &self.ext
    }

    pub fn path_for(&self, key: &AssetKey) -> PathBuf {
        self.root
            .join(key.namespace.dir_name())
            .join(key.file_name(&self.ext))
    }

    /// Cached path for `key`, if the asset already exists.
    pub fn lookup(&self, key: &AssetKey) -> Option<PathBuf> {
        let path = self.path_for(key);
        path.is_file().then_some(path)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            generated: self.generated.load(Ordering::Relaxed),
        }
    }

    /// Return the path for `key`, invoking `generate(text, duration_hint)` only if absent.
    pub fn ensure<F>(
        &self,
        key: &AssetKey,
        duration_hint: Option<f64>,
        generate: F,
    ) -> SceneResult<PathBuf>
    where
        F: FnOnce(&str, Option<f64>) -> SceneResult<Vec<u8>>,
    {
        let path = self.path_for(key);
        if path.is_file() {
            return Ok(self.hit(key, path));
        }

        let key_lock = self.lock_for(&path);
        let _local = key_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if path.is_file() {
            return Ok(self.hit(key, path));
        }

        let parent = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        std::fs::create_dir_all(&parent)
            .with_context(|| format!("failed to create cache directory '{}'", parent.display()))?;

        let lock_path = sibling(&path, ".lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("failed to open cache lock '{}'", lock_path.display()))?;
        lock_file
            .lock()
            .with_context(|| format!("failed to acquire cache lock '{}'", lock_path.display()))?;
        if path.is_file() {
            return Ok(self.hit(key, path));
        }

        tracing::info!(namespace = %key.namespace, key = %key.text, hint = ?duration_hint, "generating asset");
        let bytes = generate(&key.text, duration_hint)?;
        if bytes.is_empty() {
            return Err(SceneError::Other(anyhow::anyhow!(
                "generator returned no bytes for {} '{}'",
                key.namespace,
                key.text
            )));
        }

        write_atomically(&path, &bytes)?;
        self.generated.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "asset stored");
        Ok(path)
    }

    fn hit(&self, key: &AssetKey, path: PathBuf) -> PathBuf {
        self.hits.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(namespace = %key.namespace, key = %key.text, "asset cache hit");
        path
    }

    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut table = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        table.entry(path.to_path_buf()).or_default().clone()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/cache.rs"]
mod tests;
