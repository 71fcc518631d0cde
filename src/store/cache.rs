// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Local cache of remote resources.
//!
//! Each remote resource is mirrored into its own __cache entry__ directory.
//! Placement is a pure function of the resource URI, so every process that
//! shares a cache directory agrees on where a resource lives.
//!
//! # Layout
//!
//! For a cache entry at `<path>`:
//!
//! - `<path>/` holds the resource files.
//! - `<path>.md5.json` holds the checksum manifest of those files. Its
//!   presence marks the entry as complete.
//! - `<path>.download/` is the staging directory of an ongoing download.
//!
//! # Staging Lock
//!
//! Creating the staging directory is the lock. Creation is exclusive, so of
//! all processes that try to download the same resource, exactly one
//! succeeds. The rest wait: every check they record the latest modification
//! time inside the staging directory, sleep, and look again. If a complete
//! entry shows up they adopt it. An entry only counts as complete once its
//! manifest is written, and when the caller knows the checksums it expects,
//! only once the manifest matches them. If the staging directory kept changing they keep
//! waiting. If nothing changed for a whole delay the downloader is presumed
//! dead, and the waiter takes the lock over. Waiting is capped, so a download
//! that is alive but never finishes ends in [`StoreError::DownloadTimeout`].

use crate::store::{
    checksum::{manifest_path, Checksums},
    Result, StoreError,
};

use flate2::read::GzDecoder;
use glob::{glob, Pattern};
use std::{
    fs::{create_dir, remove_dir_all, remove_file, rename, File},
    io::ErrorKind,
    path::{Path, PathBuf},
    thread::sleep,
    time::{Duration, SystemTime},
};
use tar::Archive;
use tracing::{debug, info, warn};

/// Suffix appended to a cache path to locate its staging directory.
pub const STAGING_SUFFIX: &str = ".download";

/// Name of the payload directory inside downloaded archives.
const PAYLOAD_DIR: &str = "files";

/// Number of leading URI segments that do not contribute to cache paths.
const URI_PREFIX_SEGMENTS: usize = 3;

/// Map resource URI onto cache path under cache root.
///
/// The leading empty, `data`, and `archive` segments of canonical URIs are
/// dropped, e.g., `/data/archive/projects/P/resources/R` becomes
/// `<root>/projects/P/resources/R`.
pub fn cache_path(root: impl AsRef<Path>, uri: &str) -> PathBuf {
    let mut path = root.as_ref().to_path_buf();
    path.extend(uri.split('/').skip(URI_PREFIX_SEGMENTS).filter(|part| !part.is_empty()));
    path
}

/// How long to wait on a concurrent download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaceSettings {
    /// Pause between checks on the staging directory.
    pub delay: Duration,

    /// Checks to make before giving up.
    pub max_attempts: usize,
}

impl Default for RaceSettings {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(30),
            max_attempts: 20,
        }
    }
}

/// Cache entry of one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    path: PathBuf,
}

impl CacheEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Directory holding the resource files.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn manifest(&self) -> PathBuf {
        manifest_path(&self.path)
    }

    pub fn staging(&self) -> PathBuf {
        let mut path = self.path.as_os_str().to_owned();
        path.push(STAGING_SUFFIX);
        PathBuf::from(path)
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Checksums recorded for the entry, if any.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Checksum`] if manifest exists but is unreadable.
    pub fn checksums(&self) -> Result<Option<Checksums>> {
        Ok(Checksums::load(self.manifest())?)
    }

    /// Check that entry has a manifest, and that it matches `expected` if
    /// given.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Checksum`] if manifest exists but is unreadable.
    pub fn is_complete(&self, expected: Option<&Checksums>) -> Result<bool> {
        if !self.exists() {
            return Ok(false);
        }

        Ok(match (self.checksums()?, expected) {
            (Some(cached), Some(expected)) => &cached == expected,
            (Some(_), None) => true,
            (None, _) => false,
        })
    }

    /// Either take the staging lock, or adopt the result of a concurrent
    /// download.
    ///
    /// Only a complete entry is adopted, see [`CacheEntry::is_complete`]. A
    /// stale entry left beside a dead staging directory gets downloaded again.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::DownloadTimeout`] if a concurrent download is
    ///   still making progress after every allowed check.
    /// - Return [`StoreError::Io`] if staging directory cannot be managed.
    pub fn claim(&self, race: &RaceSettings, expected: Option<&Checksums>) -> Result<Claim> {
        if let Some(parent) = self.path.parent() {
            mkdirp::mkdirp(parent).map_err(StoreError::io(parent))?;
        }

        let staging = self.staging();
        if let Some(lock) = StagingLock::try_acquire(&staging)? {
            return Ok(Claim::Download(lock));
        }

        info!("waiting on concurrent download into {}", staging.display());
        for attempt in 1..=race.max_attempts {
            let before = latest_mtime(&staging);
            sleep(race.delay);

            if self.is_complete(expected)? {
                debug!("concurrent download of {} finished", self.path.display());
                return Ok(Claim::Adopt);
            }

            match latest_mtime(&staging) {
                // INVARIANT: Staging is gone but the entry is not, take over.
                None => {
                    if let Some(lock) = StagingLock::try_acquire(&staging)? {
                        return Ok(Claim::Download(lock));
                    }
                }
                Some(after) if before != Some(after) => {
                    debug!("concurrent download into {} still in progress (check {attempt})", staging.display());
                }
                Some(_) => {
                    warn!(
                        "no progress in {} for {:?}, assuming download died",
                        staging.display(),
                        race.delay
                    );
                    remove_dir_all(&staging)
                        .or_else(ignore_missing)
                        .map_err(StoreError::io(&staging))?;
                    if let Some(lock) = StagingLock::try_acquire(&staging)? {
                        return Ok(Claim::Download(lock));
                    }
                }
            }
        }

        Err(StoreError::DownloadTimeout {
            path: staging,
            attempts: race.max_attempts,
        })
    }
}

/// Outcome of [`CacheEntry::claim`].
#[derive(Debug)]
pub enum Claim {
    /// Caller holds the staging lock and must download.
    Download(StagingLock),

    /// Another process completed the entry.
    Adopt,
}

/// Exclusively created staging directory.
///
/// Removed on drop, so a failed download never leaves a stale lock behind.
#[derive(Debug)]
pub struct StagingLock {
    path: PathBuf,
}

impl StagingLock {
    fn try_acquire(path: &Path) -> Result<Option<Self>> {
        match create_dir(path) {
            Ok(()) => {
                debug!("acquired staging lock {}", path.display());
                Ok(Some(Self { path: path.into() }))
            }
            Err(error) if error.kind() == ErrorKind::AlreadyExists => Ok(None),
            Err(source) => Err(StoreError::Io {
                source,
                path: path.into(),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace cache entry with payload directory and record its manifest.
    ///
    /// The stale manifest is removed before the entry is touched.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Io`] if entry cannot be replaced.
    /// - Return [`StoreError::Checksum`] if manifest cannot be written.
    pub fn promote(self, payload: &Path, entry: &CacheEntry, checksums: &Checksums) -> Result<()> {
        let manifest = entry.manifest();
        remove_file(&manifest)
            .or_else(ignore_missing)
            .map_err(StoreError::io(&manifest))?;
        remove_dir_all(entry.path())
            .or_else(ignore_missing)
            .map_err(StoreError::io(entry.path()))?;
        rename(payload, entry.path()).map_err(StoreError::io(entry.path()))?;
        checksums.save(&manifest)?;
        info!("cached {}", entry.path().display());

        Ok(())
    }
}

impl Drop for StagingLock {
    fn drop(&mut self) {
        if let Err(error) = remove_dir_all(&self.path).or_else(ignore_missing) {
            warn!("failed to remove staging directory {}: {error}", self.path.display());
        }
    }
}

/// Unpack gzip compressed tar archive and locate its payload directory.
///
/// # Errors
///
/// - Return [`StoreError::CorruptArchive`] if archive cannot be unpacked.
/// - Return [`StoreError::MissingPayload`] if archive has no payload.
pub fn unpack(archive: &Path, dest: &Path, uri: &str) -> Result<PathBuf> {
    let corrupt = |source| StoreError::CorruptArchive {
        uri: uri.to_string(),
        source,
    };
    let file = File::open(archive).map_err(StoreError::io(archive))?;
    Archive::new(GzDecoder::new(file)).unpack(dest).map_err(corrupt)?;

    find_payload(dest).ok_or_else(|| StoreError::MissingPayload { uri: uri.to_string() })
}

fn find_payload(root: &Path) -> Option<PathBuf> {
    let pattern = format!("{}/**/{PAYLOAD_DIR}", Pattern::escape(&root.to_string_lossy()));
    glob(&pattern)
        .ok()?
        .filter_map(|entry| entry.ok())
        .find(|path| path.is_dir())
}

/// Latest modification time of a directory and everything in it.
fn latest_mtime(dir: &Path) -> Option<SystemTime> {
    let mut latest = dir.metadata().and_then(|meta| meta.modified()).ok()?;
    let pattern = format!("{}/**/*", Pattern::escape(&dir.to_string_lossy()));
    if let Ok(paths) = glob(&pattern) {
        for path in paths.filter_map(|entry| entry.ok()) {
            if let Ok(modified) = path.metadata().and_then(|meta| meta.modified()) {
                latest = latest.max(modified);
            }
        }
    }

    Some(latest)
}

fn ignore_missing(error: std::io::Error) -> std::io::Result<()> {
    match error.kind() {
        ErrorKind::NotFound => Ok(()),
        _ => Err(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{write::GzEncoder, Compression};
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;
    use std::fs::{create_dir_all, read_to_string, write};

    fn quick() -> RaceSettings {
        RaceSettings {
            delay: Duration::from_millis(20),
            max_attempts: 3,
        }
    }

    #[test_case(
        "/data/archive/projects/PROJ/subjects/S01/experiments/S01_MR1/resources/t1w",
        "projects/PROJ/subjects/S01/experiments/S01_MR1/resources/t1w";
        "session resource"
    )]
    #[test_case("/data/archive/projects/PROJ", "projects/PROJ"; "project")]
    #[test_case("/data/projects/PROJ/resources/R", "PROJ/resources/R"; "short prefix")]
    #[test]
    fn cache_paths_drop_prefix(uri: &str, expect: &str) {
        use pretty_assertions::assert_eq;
        assert_eq!(cache_path("/cache", uri), Path::new("/cache").join(expect));
        assert_eq!(cache_path("/cache", uri), cache_path("/cache", uri));
    }

    #[test]
    fn sidecar_locations() {
        let entry = CacheEntry::new("/cache/projects/P/resources/R");
        assert_eq!(entry.staging(), Path::new("/cache/projects/P/resources/R.download"));
        assert_eq!(entry.manifest(), Path::new("/cache/projects/P/resources/R.md5.json"));
    }

    #[test]
    fn uncontested_claim_downloads_and_drop_unlocks() -> anyhow::Result<()> {
        let scratch = tempfile::tempdir()?;
        let entry = CacheEntry::new(scratch.path().join("projects/P/resources/R"));

        let claim = entry.claim(&quick(), None)?;
        assert!(entry.staging().is_dir());
        assert!(matches!(claim, Claim::Download(_)));
        drop(claim);
        assert!(!entry.staging().exists());

        Ok(())
    }

    #[test]
    fn stale_staging_is_taken_over() -> anyhow::Result<()> {
        let scratch = tempfile::tempdir()?;
        let entry = CacheEntry::new(scratch.path().join("R"));
        create_dir_all(entry.staging())?;
        write(entry.staging().join("download.tar.gz"), "partial")?;

        let claim = entry.claim(&quick(), None)?;
        assert!(matches!(claim, Claim::Download(_)));
        assert!(!entry.staging().join("download.tar.gz").exists());

        Ok(())
    }

    #[test]
    fn stale_entry_beside_dead_staging_is_not_adopted() -> anyhow::Result<()> {
        let scratch = tempfile::tempdir()?;
        let entry = CacheEntry::new(scratch.path().join("R"));
        create_dir_all(entry.path())?;
        write(entry.path().join("notes.txt"), "old")?;
        create_dir_all(entry.staging())?;

        let claim = entry.claim(&quick(), None)?;
        assert!(matches!(claim, Claim::Download(_)));

        let expected: Checksums = [(".".to_string(), "new".to_string())].into_iter().collect();
        write(entry.manifest(), r#"{".":"old"}"#)?;
        assert!(entry.is_complete(None)?);
        assert!(!entry.is_complete(Some(&expected))?);
        drop(claim);

        create_dir_all(entry.staging())?;
        let claim = entry.claim(&quick(), Some(&expected))?;
        assert!(matches!(claim, Claim::Download(_)));

        Ok(())
    }

    #[test]
    fn promotion_replaces_entry_and_writes_manifest() -> anyhow::Result<()> {
        let scratch = tempfile::tempdir()?;
        let entry = CacheEntry::new(scratch.path().join("R"));
        create_dir_all(entry.path())?;
        write(entry.path().join("old.txt"), "old")?;
        write(entry.manifest(), r#"{".":"old"}"#)?;

        let Claim::Download(lock) = entry.claim(&quick(), None)? else {
            panic!("expected to hold the staging lock");
        };
        let payload = lock.path().join("expanded/files");
        create_dir_all(&payload)?;
        write(payload.join("new.txt"), "new")?;

        let checksums: Checksums = [(".".to_string(), "new".to_string())].into_iter().collect();
        lock.promote(&payload, &entry, &checksums)?;

        assert!(!entry.path().join("old.txt").exists());
        assert_eq!(read_to_string(entry.path().join("new.txt"))?, "new");
        assert_eq!(entry.checksums()?, Some(checksums));
        assert!(!entry.staging().exists());

        Ok(())
    }

    #[test]
    fn unpack_finds_nested_payload() -> anyhow::Result<()> {
        let scratch = tempfile::tempdir()?;
        let archive = scratch.path().join("download.tar.gz");
        let mut builder = tar::Builder::new(GzEncoder::new(File::create(&archive)?, Compression::default()));
        let data = b"hello";
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, "S01_MR1/resources/notes/files/notes.txt", &data[..])?;
        builder.into_inner()?.finish()?;

        let payload = unpack(&archive, &scratch.path().join("expanded"), "/notes")?;
        assert!(payload.ends_with("S01_MR1/resources/notes/files"));
        assert_eq!(read_to_string(payload.join("notes.txt"))?, "hello");

        Ok(())
    }

    #[test]
    fn unpack_rejects_garbage() -> anyhow::Result<()> {
        let scratch = tempfile::tempdir()?;
        let archive = scratch.path().join("download.tar.gz");
        write(&archive, "definitely not gzip")?;

        let result = unpack(&archive, &scratch.path().join("expanded"), "/notes");
        assert!(matches!(result, Err(StoreError::CorruptArchive { .. })));

        Ok(())
    }
}
