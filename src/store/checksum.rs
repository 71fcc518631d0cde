// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Checksum manifests.
//!
//! A __checksum manifest__ maps the files of a cached resource to their MD5
//! digests. It is persisted as JSON next to the cache entry, and its presence
//! signals that the cache entry underneath is complete.
//!
//! # Keys
//!
//! Directory resources key their files by path relative to the resource
//! root. Single file resources key the primary file as `.`, and each side car
//! by its extension, so the manifest does not depend on file stems.

use crate::{
    format::{FileFormat, FormatError},
    store::session::RemoteFile,
};

use glob::{glob, Pattern};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::{read_to_string, write, File},
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tracing::warn;

/// Key of the primary file in single file manifests.
pub const PRIMARY_KEY: &str = ".";

/// Suffix appended to a cache path to locate its manifest.
pub const MANIFEST_SUFFIX: &str = ".md5.json";

/// Mapping of resource files to MD5 hex digests.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Checksums(BTreeMap<String, String>);

impl Checksums {
    pub fn new(entries: BTreeMap<String, String>) -> Self {
        Self(entries)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, digest)| (key.as_str(), digest.as_str()))
    }

    /// Digest local files of a file group.
    ///
    /// # Errors
    ///
    /// - Return [`ChecksumError::Read`] if a file cannot be read.
    /// - Return [`ChecksumError::Walk`] if directory cannot be walked.
    pub fn calculate(format: &FileFormat, primary: &Path, aux: &BTreeMap<String, PathBuf>) -> Result<Self> {
        let mut entries = BTreeMap::new();
        if format.is_directory() {
            for path in walk_files(primary)? {
                let relative = relative_key(primary, &path);
                entries.insert(relative, md5_file(&path)?);
            }
        } else {
            entries.insert(PRIMARY_KEY.to_string(), md5_file(primary)?);
            for (name, path) in aux {
                let ext = match format.aux_files().get(name) {
                    Some(ext) => ext.clone(),
                    None => format.extension_of(path),
                };
                entries.insert(ext, md5_file(path)?);
            }
        }

        Ok(Self(entries))
    }

    /// Remap remote file listing into manifest keys.
    ///
    /// Side cars that share an extension collide. The first one in path order
    /// keeps the key, the rest are logged and dropped.
    ///
    /// # Errors
    ///
    /// - Return [`ChecksumError::Format`] if primary file cannot be told apart
    ///   from the listing.
    pub fn from_remote(format: &FileFormat, files: impl IntoIterator<Item = RemoteFile>) -> Result<Self> {
        let relative: BTreeMap<String, String> = files
            .into_iter()
            .map(|file| (strip_resource_prefix(&file.uri).to_string(), file.digest))
            .collect();

        if format.is_directory() {
            return Ok(Self(relative));
        }

        let primary = format.assort_files(relative.keys())?.primary;
        let primary = primary.to_string_lossy().into_owned();

        let mut entries = BTreeMap::new();
        for (path, digest) in relative {
            if path == primary {
                entries.insert(PRIMARY_KEY.to_string(), digest);
                continue;
            }

            let ext = format.extension_of(&path);
            if entries.contains_key(&ext) {
                warn!("dropping checksum of {path:?}, another side car already claims extension {ext:?}");
                continue;
            }
            entries.insert(ext, digest);
        }

        Ok(Self(entries))
    }

    /// Read manifest, if any.
    ///
    /// # Errors
    ///
    /// - Return [`ChecksumError::Read`] if manifest exists but cannot be read.
    /// - Return [`ChecksumError::Manifest`] if manifest is not valid JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        let contents = match read_to_string(path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ChecksumError::Read {
                    source,
                    path: path.into(),
                })
            }
        };

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| ChecksumError::Manifest {
                source,
                path: path.into(),
            })
    }

    /// Write manifest.
    ///
    /// # Errors
    ///
    /// - Return [`ChecksumError::Write`] if manifest cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let contents = serde_json::to_string(&self.0).map_err(|source| ChecksumError::Manifest {
            source,
            path: path.into(),
        })?;
        write(path, contents).map_err(|source| ChecksumError::Write {
            source,
            path: path.into(),
        })
    }
}

impl FromIterator<(String, String)> for Checksums {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Location of the manifest of a cache entry.
pub fn manifest_path(cache_path: impl AsRef<Path>) -> PathBuf {
    let mut path = cache_path.as_ref().as_os_str().to_owned();
    path.push(MANIFEST_SUFFIX);
    PathBuf::from(path)
}

/// MD5 hex digest of file contents.
///
/// # Errors
///
/// - Return [`ChecksumError::Read`] if file cannot be read.
pub fn md5_file(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let read_error = |source| ChecksumError::Read {
        source,
        path: path.into(),
    };
    let mut file = File::open(path).map_err(read_error)?;
    let mut hasher = Md5::new();
    io::copy(&mut file, &mut hasher).map_err(read_error)?;

    Ok(format!("{:x}", hasher.finalize()))
}

/// Every regular file under a directory, in path order.
///
/// # Errors
///
/// - Return [`ChecksumError::Walk`] if directory cannot be walked.
pub fn walk_files(root: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/**/*", Pattern::escape(&root.to_string_lossy()));
    let walk_error = |reason: String| ChecksumError::Walk {
        path: root.into(),
        reason,
    };

    let mut files = Vec::new();
    for entry in glob(&pattern).map_err(|error| walk_error(error.to_string()))? {
        let path = entry.map_err(|error| walk_error(error.to_string()))?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    Ok(files)
}

/// Path of file relative to root, always `/` separated.
pub fn relative_key(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|part| part.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

// INVARIANT: Anything not under "/resources/<label>/files/" is kept whole.
fn strip_resource_prefix(uri: &str) -> &str {
    uri.split_once("/resources/")
        .and_then(|(_, rest)| rest.split_once("/files/"))
        .map(|(_, relative)| relative)
        .unwrap_or(uri)
}

/// Checksum error types.
#[derive(Debug, thiserror::Error)]
pub enum ChecksumError {
    /// Item has no local files to digest yet.
    #[error("{item} has no materialized files to digest")]
    NotMaterialized { item: String },

    /// Failed to read file.
    #[error("failed to read {path:?}")]
    Read {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Failed to write manifest.
    #[error("failed to write manifest {path:?}")]
    Write {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Manifest is not valid JSON.
    #[error("malformed manifest {path:?}")]
    Manifest {
        #[source]
        source: serde_json::Error,
        path: PathBuf,
    },

    /// Failed to walk directory.
    #[error("failed to walk {path:?}: {reason}")]
    Walk { path: PathBuf, reason: String },

    /// Files do not match their format.
    #[error(transparent)]
    Format(#[from] FormatError),
}

/// Friendly result alias :3
pub type Result<T, E = ChecksumError> = std::result::Result<T, E>;
