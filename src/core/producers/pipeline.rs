// ─── Pipeline Steps ───
// Building blocks shared by every producer: extract, remap, repackage,
// describe. Each step reports failures with its own error kind, tagged with
// the coordinate being produced. Archive steps are synchronous and run on the
// blocking pool via `blocking`.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use tracing::debug;

use super::context::PipelineContext;
use crate::core::access::{self, AccessTransformers};
use crate::core::downloader::FetchSource;
use crate::core::error::{RepoError, RepoResult};
use crate::core::mapping::Mapping;
use crate::core::maven::{ArtifactCoordinate, PomDocument};

const MANIFEST: &str = "META-INF/MANIFEST.MF";

/// In-memory archive contents, keyed and ordered by entry name.
/// Directory entries are not kept.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Archive {
    entries: BTreeMap<String, Vec<u8>>,
}

impl Archive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, data: Vec<u8>) {
        self.entries.insert(name.into(), data);
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Split into (matching, rest).
    pub fn partition(self, pred: impl Fn(&str) -> bool) -> (Archive, Archive) {
        let (yes, no): (BTreeMap<_, _>, BTreeMap<_, _>) =
            self.entries.into_iter().partition(|(name, _)| pred(name.as_str()));
        (Archive { entries: yes }, Archive { entries: no })
    }
}

pub fn is_class(name: &str) -> bool {
    name.ends_with(".class")
}

// ── Extract ─────────────────────────────────────────────

pub fn read_archive_file(path: &Path, coordinate: &str) -> RepoResult<Archive> {
    let file = std::fs::File::open(path).map_err(|e| extraction(coordinate, e))?;
    read_archive(file, coordinate)
}

pub fn read_archive_bytes(bytes: Vec<u8>, coordinate: &str) -> RepoResult<Archive> {
    read_archive(Cursor::new(bytes), coordinate)
}

fn read_archive<R: Read + Seek>(reader: R, coordinate: &str) -> RepoResult<Archive> {
    let mut zip = ZipArchive::new(reader).map_err(|e| extraction(coordinate, e))?;
    let mut archive = Archive::new();

    for i in 0..zip.len() {
        let mut file = zip.by_index(i).map_err(|e| extraction(coordinate, e))?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)
            .map_err(|e| extraction(coordinate, format!("{}: {}", name, e)))?;
        archive.insert(name, data);
    }

    Ok(archive)
}

/// Read one named entry without loading the rest of the archive.
pub fn read_entry(path: &Path, entry: &str, coordinate: &str) -> RepoResult<Vec<u8>> {
    let file = std::fs::File::open(path).map_err(|e| extraction(coordinate, e))?;
    let mut zip = ZipArchive::new(file).map_err(|e| extraction(coordinate, e))?;
    let mut file = zip
        .by_name(entry)
        .map_err(|e| extraction(coordinate, format!("{}: {}", entry, e)))?;

    let mut data = Vec::new();
    file.read_to_end(&mut data)
        .map_err(|e| extraction(coordinate, format!("{}: {}", entry, e)))?;
    Ok(data)
}

/// Drop jar signature files; they no longer verify once entries are renamed.
pub fn strip_signatures(archive: Archive) -> Archive {
    archive.partition(|name| !is_signature_file(name)).0
}

fn is_signature_file(name: &str) -> bool {
    let Some(file) = name.strip_prefix("META-INF/") else {
        return false;
    };
    !file.contains('/')
        && [".SF", ".RSA", ".DSA", ".EC"]
            .iter()
            .any(|ext| file.to_ascii_uppercase().ends_with(ext))
}

// ── Remap ───────────────────────────────────────────────

/// Rename class and source entries through `mapping`. Two entries landing on
/// the same name is an error.
pub fn remap(archive: Archive, mapping: &Mapping, coordinate: &str) -> RepoResult<Archive> {
    let mut out = Archive::new();
    let mut origin: BTreeMap<String, String> = BTreeMap::new();

    for (name, data) in archive.entries {
        let renamed = mapping.remap_entry_name(&name).unwrap_or_else(|| name.clone());
        if let Some(previous) = origin.insert(renamed.clone(), name.clone()) {
            return Err(RepoError::RemapFailed {
                coordinate: coordinate.to_string(),
                reason: format!("{} and {} both map to {}", previous, name, renamed),
            });
        }
        out.insert(renamed, data);
    }

    Ok(out)
}

// ── Access ──────────────────────────────────────────

/// Rewrite access flags of every class some rule names. Runs after remap, so
/// rules use the remapped class names.
pub fn apply_access(
    mut archive: Archive,
    transformers: &AccessTransformers,
    coordinate: &str,
) -> RepoResult<Archive> {
    if transformers.is_empty() {
        return Ok(archive);
    }

    let mut patched = 0;
    for (name, data) in archive.entries.iter_mut() {
        let Some(rules) = name.strip_suffix(".class").and_then(|c| transformers.rules_for(c)) else {
            continue;
        };
        let rewritten = access::transform_class(data, rules).map_err(|reason| {
            RepoError::AccessTransformFailed {
                coordinate: coordinate.to_string(),
                reason: format!("{}: {}", name, reason),
            }
        })?;
        if let Some(rewritten) = rewritten {
            *data = rewritten;
            patched += 1;
        }
    }
    debug!("{}: access widened in {} classes", coordinate, patched);
    Ok(archive)
}

// ── Repackage ───────────────────────────────────────────

/// Write `archive` as a jar at `dest`. Output is deterministic: manifest
/// first, remaining entries sorted, fixed timestamps.
pub fn repackage(archive: &Archive, dest: &Path, coordinate: &str) -> RepoResult<()> {
    let file = std::fs::File::create(dest).map_err(|e| repackaging(coordinate, e))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    let manifest = archive.get(MANIFEST).map(|data| (MANIFEST, data));
    let rest = archive
        .entries
        .iter()
        .filter(|(name, _)| name.as_str() != MANIFEST)
        .map(|(name, data)| (name.as_str(), data.as_slice()));

    for (name, data) in manifest.into_iter().chain(rest) {
        zip.start_file(name, options)
            .map_err(|e| repackaging(coordinate, format!("{}: {}", name, e)))?;
        zip.write_all(data)
            .map_err(|e| repackaging(coordinate, format!("{}: {}", name, e)))?;
    }

    zip.finish().map_err(|e| repackaging(coordinate, e))?;
    Ok(())
}

/// Write a POM for `artifact` listing `dependencies`.
pub fn write_descriptor(
    artifact: &ArtifactCoordinate,
    dependencies: &[ArtifactCoordinate],
    dest: &Path,
) -> RepoResult<()> {
    let coordinate = artifact.with_extension("pom").to_string();
    let xml = PomDocument::for_artifact(artifact, dependencies)
        .render()
        .map_err(|e| repackaging(&coordinate, e))?;
    std::fs::write(dest, xml).map_err(|e| repackaging(&coordinate, e))
}

// ── Composition ─────────────────────────────────────────

/// Run a synchronous step on the blocking pool.
pub async fn blocking<T, F>(step: F) -> RepoResult<T>
where
    F: FnOnce() -> RepoResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(step)
        .await
        .map_err(|e| RepoError::Other(format!("pipeline step panicked or was cancelled: {}", e)))?
}

/// fetch → extract → `transform` (with the mapping for `mapping_version`) →
/// repackage into `staging`. Returns the staged file for `coordinate`.
pub async fn derive_archive<T>(
    ctx: &PipelineContext<'_>,
    upstream: &FetchSource,
    mapping_version: &str,
    coordinate: &ArtifactCoordinate,
    staging: PathBuf,
    transform: T,
) -> RepoResult<PathBuf>
where
    T: FnOnce(Archive, &Mapping, &str) -> RepoResult<Archive> + Send + 'static,
{
    let raw = ctx.downloads.fetch(upstream).await?;
    let target = coordinate.to_string();
    let mapping = ctx.mappings.resolve(mapping_version, &target).await?;
    let dest = staging.join(coordinate.filename());

    blocking(move || {
        let archive = read_archive_file(&raw, &target)?;
        let transformed = transform(archive, mapping.as_ref(), target.as_str())?;
        repackage(&transformed, &dest, &target)?;
        Ok(dest)
    })
    .await
}

/// Staged jar with no entries, for closure members with no upstream content.
pub async fn derive_empty_jar(coordinate: &ArtifactCoordinate, staging: PathBuf) -> RepoResult<PathBuf> {
    let target = coordinate.to_string();
    let dest = staging.join(coordinate.filename());
    blocking(move || {
        repackage(&Archive::new(), &dest, &target)?;
        Ok(dest)
    })
    .await
}

/// Staged POM for `artifact`, written next to the other staged outputs.
pub async fn derive_descriptor(
    artifact: &ArtifactCoordinate,
    dependencies: Vec<ArtifactCoordinate>,
    staging: PathBuf,
) -> RepoResult<PathBuf> {
    let artifact = artifact.clone();
    let dest = staging.join(artifact.with_extension("pom").filename());
    blocking(move || {
        write_descriptor(&artifact, &dependencies, &dest)?;
        Ok(dest)
    })
    .await
}

fn extraction(coordinate: &str, reason: impl ToString) -> RepoError {
    RepoError::ExtractionFailed {
        coordinate: coordinate.to_string(),
        reason: reason.to_string(),
    }
}

fn repackaging(coordinate: &str, reason: impl ToString) -> RepoError {
    RepoError::RepackageFailed {
        coordinate: coordinate.to_string(),
        reason: reason.to_string(),
    }
}
