use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs;
use tracing::{debug, info, warn};

use super::entry::CacheEntry;
use super::locks::KeyedLocks;
use crate::core::downloader::sha1_hex;
use crate::core::error::{RepoError, RepoResult};
use crate::core::maven::ArtifactCoordinate;

const STAGING_DIR: &str = ".staging";
const ENTRY_SUFFIX: &str = ".entry.json";

/// Path-addressed artifact store keyed by coordinate.
///
/// Layout mirrors a Maven local repository. Every artifact is accompanied by
/// a [`CacheEntry`] record; the record is written last, so an artifact is
/// never visible before it is complete.
pub struct CacheStore {
    root: PathBuf,
    staging: PathBuf,
    locks: KeyedLocks<ArtifactCoordinate>,
}

impl CacheStore {
    /// Store rooted at `root`. Nothing is created until the first publish.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            staging: root.join(STAGING_DIR),
            root,
            locks: KeyedLocks::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic on-disk location of `coordinate`. Never touches disk.
    pub fn path_for(&self, coordinate: &ArtifactCoordinate) -> PathBuf {
        self.root.join(coordinate.local_path())
    }

    fn entry_path_for(&self, coordinate: &ArtifactCoordinate) -> PathBuf {
        let mut path = self.path_for(coordinate).into_os_string();
        path.push(ENTRY_SUFFIX);
        PathBuf::from(path)
    }

    /// Existence check: record readable, file present, sizes agree.
    pub async fn has(&self, coordinate: &ArtifactCoordinate) -> bool {
        matches!(self.read_entry(coordinate).await, Ok(Some(_)))
    }

    /// Fully verified lookup.
    ///
    /// Returns `Ok(None)` when nothing was ever published, and
    /// [`RepoError::CacheCorruption`] when something is on disk but does not
    /// match its record.
    pub async fn lookup(&self, coordinate: &ArtifactCoordinate) -> RepoResult<Option<CacheEntry>> {
        let Some(entry) = self.read_entry(coordinate).await? else {
            return Ok(None);
        };

        if let Some(expected) = &entry.sha1 {
            let bytes = fs::read(&entry.path)
                .await
                .map_err(|e| RepoError::io(&entry.path, e))?;
            let actual = sha1_hex(&bytes);
            if &actual != expected {
                return Err(corrupt(
                    coordinate,
                    format!("checksum mismatch: expected {}, got {}", expected, actual),
                ));
            }
        }

        Ok(Some(entry))
    }

    /// Return the cached artifact, or run `producer` exactly once to create it.
    ///
    /// `producer` receives a fresh private staging directory and must return
    /// the path of the file it wrote inside it. On success the file is moved
    /// into place and its record written; on failure the staging directory is
    /// discarded and the coordinate stays absent.
    ///
    /// Concurrent calls for the same coordinate serialize on a per-coordinate
    /// lock: the first runs `producer`, the rest observe its result.
    pub async fn publish<F, Fut>(
        &self,
        coordinate: &ArtifactCoordinate,
        producer: F,
    ) -> RepoResult<CacheEntry>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = RepoResult<PathBuf>>,
    {
        if let Some(entry) = self.cached(coordinate).await? {
            debug!("Cache hit: {}", coordinate);
            return Ok(entry);
        }

        let _guard = self.locks.lock(coordinate).await;

        // Another publisher may have finished while we waited.
        if let Some(entry) = self.cached(coordinate).await? {
            debug!("Cache hit after wait: {}", coordinate);
            return Ok(entry);
        }
        self.invalidate(coordinate).await?;

        fs::create_dir_all(&self.staging)
            .await
            .map_err(|e| RepoError::io(&self.staging, e))?;
        let staging = tempfile::Builder::new()
            .prefix("publish-")
            .tempdir_in(&self.staging)
            .map_err(|e| RepoError::io(&self.staging, e))?;

        info!("Producing {}", coordinate);
        let produced = producer(staging.path().to_path_buf()).await?;
        if !produced.starts_with(staging.path()) {
            return Err(RepoError::Other(format!(
                "Producer for {} returned {:?}, outside its staging directory",
                coordinate, produced
            )));
        }

        self.commit(coordinate, &produced, staging.path()).await
    }

    async fn cached(&self, coordinate: &ArtifactCoordinate) -> RepoResult<Option<CacheEntry>> {
        match self.lookup(coordinate).await {
            Ok(hit) => Ok(hit),
            Err(e) if e.is_corruption() => {
                warn!("{}; treating as cache miss", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn commit(
        &self,
        coordinate: &ArtifactCoordinate,
        produced: &Path,
        staging: &Path,
    ) -> RepoResult<CacheEntry> {
        let bytes = fs::read(produced)
            .await
            .map_err(|e| RepoError::io(produced, e))?;

        let target = self.path_for(coordinate);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| RepoError::io(parent, e))?;
        }

        let entry = CacheEntry {
            coordinate: coordinate.clone(),
            path: target.clone(),
            sha1: Some(sha1_hex(&bytes)),
            size: bytes.len() as u64,
            produced_at: Utc::now(),
        };

        fs::rename(produced, &target)
            .await
            .map_err(|e| RepoError::io(&target, e))?;

        let record_tmp = staging.join(".entry.tmp");
        fs::write(&record_tmp, serde_json::to_vec_pretty(&entry)?)
            .await
            .map_err(|e| RepoError::io(&record_tmp, e))?;
        let record = self.entry_path_for(coordinate);
        fs::rename(&record_tmp, &record)
            .await
            .map_err(|e| RepoError::io(&record, e))?;

        debug!("Published {} -> {:?}", coordinate, target);
        Ok(entry)
    }

    /// Remove any trace of `coordinate`. The record goes first.
    async fn invalidate(&self, coordinate: &ArtifactCoordinate) -> RepoResult<()> {
        for path in [self.entry_path_for(coordinate), self.path_for(coordinate)] {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(RepoError::io(path, e)),
            }
        }
        Ok(())
    }

    async fn read_entry(&self, coordinate: &ArtifactCoordinate) -> RepoResult<Option<CacheEntry>> {
        let path = self.path_for(coordinate);
        let record = self.entry_path_for(coordinate);

        let raw = match fs::read(&record).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return if fs::try_exists(&path).await.unwrap_or(false) {
                    Err(corrupt(coordinate, "artifact present without entry record"))
                } else {
                    Ok(None)
                };
            }
            Err(e) => return Err(RepoError::io(record, e)),
        };

        let mut entry: CacheEntry = serde_json::from_slice(&raw)
            .map_err(|e| corrupt(coordinate, format!("unreadable entry record: {}", e)))?;
        if &entry.coordinate != coordinate {
            return Err(corrupt(
                coordinate,
                format!("entry record describes {}", entry.coordinate),
            ));
        }

        let metadata = fs::metadata(&path)
            .await
            .map_err(|_| corrupt(coordinate, "artifact file missing"))?;
        if metadata.len() != entry.size {
            return Err(corrupt(
                coordinate,
                format!("size {} does not match recorded {}", metadata.len(), entry.size),
            ));
        }

        entry.path = path;
        Ok(Some(entry))
    }
}

fn corrupt(coordinate: &ArtifactCoordinate, reason: impl Into<String>) -> RepoError {
    RepoError::CacheCorruption {
        coordinate: coordinate.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn coord(raw: &str) -> ArtifactCoordinate {
        ArtifactCoordinate::parse(raw).unwrap()
    }

    async fn write_staged(dir: PathBuf, contents: &'static str) -> RepoResult<PathBuf> {
        let path = dir.join("out.jar");
        fs::write(&path, contents).await.map_err(|e| RepoError::io(&path, e))?;
        Ok(path)
    }

    #[tokio::test]
    async fn path_for_is_deterministic_and_lazy() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let c = coord("com.example:game:1.0:sources");

        let path = store.path_for(&c);
        assert_eq!(path, dir.path().join("com/example/game/1.0/game-1.0-sources.jar"));
        assert_eq!(path, store.path_for(&c));
        assert!(!path.exists());
        assert!(!store.has(&c).await);
    }

    #[tokio::test]
    async fn publish_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let c = coord("com.example:game:1.0");
        let calls = AtomicUsize::new(0);

        let first = store
            .publish(&c, |staging| {
                calls.fetch_add(1, Ordering::SeqCst);
                write_staged(staging, "payload")
            })
            .await
            .unwrap();
        let second = store
            .publish(&c, |staging| {
                calls.fetch_add(1, Ordering::SeqCst);
                write_staged(staging, "other payload")
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.path, second.path);
        assert_eq!(std::fs::read_to_string(&first.path).unwrap(), "payload");
        assert!(store.has(&c).await);
    }

    #[tokio::test]
    async fn failed_producer_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let c = coord("com.example:game:1.0");

        let err = store
            .publish(&c, |staging| async move {
                fs::write(staging.join("half.jar"), "partial").await.unwrap();
                Err::<PathBuf, _>(RepoError::RepackageFailed {
                    coordinate: "com.example:game:1.0@jar".into(),
                    reason: "boom".into(),
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::RepackageFailed { .. }));

        assert!(!store.has(&c).await);
        assert!(!store.path_for(&c).exists());
        let leftovers = std::fs::read_dir(dir.path().join(STAGING_DIR)).unwrap().count();
        assert_eq!(leftovers, 0);

        // A later call starts from scratch.
        let entry = store.publish(&c, |s| write_staged(s, "ok")).await.unwrap();
        assert_eq!(std::fs::read_to_string(entry.path).unwrap(), "ok");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_publish_runs_one_producer() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(CacheStore::new(dir.path()));
        let calls = Arc::new(AtomicUsize::new(0));
        let c = coord("com.example:game:1.0");

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let calls = calls.clone();
                let c = c.clone();
                tokio::spawn(async move {
                    store
                        .publish(&c, |staging| async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            write_staged(staging, "payload").await
                        })
                        .await
                })
            })
            .collect();

        let mut paths = Vec::new();
        for task in tasks {
            paths.push(task.await.unwrap().unwrap().path);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(paths.iter().all(|p| p == &paths[0]));
    }

    #[tokio::test]
    async fn tampered_artifact_is_corrupt_and_rederived() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let c = coord("com.example:game:1.0");

        let entry = store.publish(&c, |s| write_staged(s, "payload")).await.unwrap();
        std::fs::write(&entry.path, "PAYLOAD").unwrap();

        let err = store.lookup(&c).await.unwrap_err();
        assert!(err.is_corruption());

        let calls = AtomicUsize::new(0);
        let repaired = store
            .publish(&c, |s| {
                calls.fetch_add(1, Ordering::SeqCst);
                write_staged(s, "payload")
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(std::fs::read_to_string(repaired.path).unwrap(), "payload");
        assert!(store.lookup(&c).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn artifact_without_record_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let c = coord("com.example:game:1.0");

        let path = store.path_for(&c);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "stray").unwrap();

        assert!(!store.has(&c).await);
        assert!(store.lookup(&c).await.unwrap_err().is_corruption());
    }

    #[tokio::test]
    async fn producer_must_stay_inside_staging() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let c = coord("com.example:game:1.0");
        let escape = outside.path().to_path_buf();

        let err = store
            .publish(&c, |_| write_staged(escape, "payload"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Other(_)));
        assert!(!store.has(&c).await);
    }
}
