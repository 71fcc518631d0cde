// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Data store gateways.
//!
//! A __data store__ is anything that can populate a [`Dataset`] with data
//! nodes and items, and move item contents between the store and the local
//! file system. The [`DataStore`] trait is the capability contract every
//! backing store implements.
//!
//! # Store Identity
//!
//! Every store instance gets a process-unique [`StoreId`]. Datasets created
//! through a store carry its id, and so do all of their nodes and items. A
//! store refuses to operate on items that carry another store's id.
//!
//! # Cache Layout
//!
//! Remote stores mirror file groups into a local cache directory. See
//! [`cache`] for the on-disk layout and the protocol that keeps concurrent
//! processes from downloading the same resource twice.

pub mod cache;
pub mod checksum;
pub mod rest;
pub mod session;
pub mod xnat;

pub use checksum::Checksums;
pub use rest::RestConnector;
pub use session::{Connector, RemoteError, RemoteKind, RemoteNode, RemoteSession, SessionGuard, SessionScope};
pub use xnat::XnatStore;

use crate::{
    dataset::{DataNode, Dataset, DatasetError, Field, FieldValue, FileGroup},
    format::{AssortedFiles, FormatError},
    lattice::{DataSpace, Frequency},
};

use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

/// Process-unique identity of a store instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoreId(u64);

impl StoreId {
    /// Allocate fresh id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Display for StoreId {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "store#{}", self.0)
    }
}

/// Capability contract of a backing store.
pub trait DataStore {
    /// Data space the store's tree is expressed in.
    type Space: DataSpace;

    fn id(&self) -> StoreId;

    /// Frequencies of the levels of the store's native tree, top down.
    fn default_hierarchy(&self) -> Vec<Frequency<Self::Space>>;

    /// Create empty dataset bound to this store.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Dataset`] if hierarchy is malformed.
    fn dataset(
        &self,
        name: impl Into<String>,
        hierarchy: Option<Vec<Frequency<Self::Space>>>,
    ) -> Result<Dataset<Self::Space>> {
        let hierarchy = hierarchy.unwrap_or_else(|| self.default_hierarchy());
        Ok(Dataset::new(name, self.id(), hierarchy)?)
    }

    /// Rebuild the node tree of a dataset from the store.
    fn find_nodes(&self, dataset: &mut Dataset<Self::Space>) -> Result<()>;

    /// Discover file groups and fields of a node.
    fn find_items(&self, node: &mut DataNode<Self::Space>) -> Result<()>;

    /// Make file group available locally.
    fn get_file_group(&self, file_group: &mut FileGroup<Self::Space>) -> Result<AssortedFiles>;

    /// Replace file group in the store with local files.
    fn put_file_group(
        &self,
        file_group: &mut FileGroup<Self::Space>,
        primary: &Path,
        aux: &BTreeMap<String, PathBuf>,
    ) -> Result<()>;

    /// Read current value of field.
    fn get_field(&self, field: &Field<Self::Space>) -> Result<FieldValue>;

    /// Overwrite value of field.
    fn put_field(&self, field: &Field<Self::Space>, value: &FieldValue) -> Result<()>;

    /// Manifest of the store's copy of a file group.
    fn get_checksums(&self, file_group: &FileGroup<Self::Space>) -> Result<Checksums>;
}

/// Broad category of a [`StoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller violated a precondition.
    Usage,

    /// Object belongs to another store instance.
    WrongRepository,

    /// Files do not match their format.
    FileFormat,

    /// Anything else, including remote failures.
    Internal,
}

/// Store error types.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Caller violated a precondition.
    #[error("{0}")]
    Usage(String),

    /// Item is bound to another store.
    #[error("{item} is from {found} instead of {expected}")]
    WrongRepository {
        item: String,
        expected: StoreId,
        found: StoreId,
    },

    #[error(transparent)]
    FileFormat(#[from] FormatError),

    /// Downloaded archive cannot be unpacked.
    #[error("downloaded archive of {uri} is corrupt")]
    CorruptArchive {
        uri: String,
        #[source]
        source: std::io::Error,
    },

    /// Downloaded archive holds no payload directory.
    #[error("downloaded archive of {uri} has no files directory")]
    MissingPayload { uri: String },

    /// Concurrent download kept going past the wait budget.
    #[error("gave up on concurrent download into {path:?} after {attempts} checks")]
    DownloadTimeout { path: PathBuf, attempts: usize },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// File system operation failed.
    #[error("failed to access {path:?}")]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    #[error(transparent)]
    Checksum(#[from] checksum::ChecksumError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

impl StoreError {
    /// Category of error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Usage(_) => ErrorKind::Usage,
            Self::WrongRepository { .. } => ErrorKind::WrongRepository,
            Self::FileFormat(_) | Self::Checksum(checksum::ChecksumError::Format(_)) => ErrorKind::FileFormat,
            _ => ErrorKind::Internal,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { source, path }
    }
}

/// Friendly result alias :3
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
