// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Remote session contract.
//!
//! The gateway never talks to the network directly. Instead, it opens a
//! __remote session__ through a [`Connector`], and issues every remote call
//! through the [`RemoteSession`] trait. The REST client in
//! [`crate::store::rest`] is the production implementation.
//!
//! # Session Scoping
//!
//! Connecting is expensive, and gateway operations call each other (fetching
//! a file group also fetches its checksums). A [`SessionScope`] hands out
//! [`SessionGuard`]s that share one underlying session. The session is opened
//! by the outermost guard, and closed exactly once when the last guard drops,
//! no matter how the enclosing operation exits.

use std::{
    cell::{Cell, Ref, RefCell},
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
    io::Write,
    path::Path,
};
use tracing::{debug, warn};

/// Kind of remote container backing a data node.
///
/// Containers of each kind expose different collections, e.g., only sessions
/// hold scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteKind {
    Project,
    Subject,
    Session,

    /// Container synthesized to hold items of a node that the remote tree has
    /// no native level for.
    Synthetic,
}

impl RemoteKind {
    /// Whether containers of this kind hold scans.
    pub fn has_scans(self) -> bool {
        matches!(self, Self::Session)
    }

    /// Whether containers of this kind may be missing until first written to.
    pub fn created_on_demand(self) -> bool {
        matches!(self, Self::Synthetic)
    }

    /// XNAT data type used to address custom fields of this kind.
    pub fn field_namespace(self) -> &'static str {
        match self {
            Self::Project => "xnat:projectData",
            Self::Subject | Self::Synthetic => "xnat:subjectData",
            Self::Session => "xnat:experimentData",
        }
    }
}

/// Remote container of a data node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteNode {
    /// Canonical URI, using labels rather than IDs.
    pub uri: String,
    pub kind: RemoteKind,
}

impl Display for RemoteNode {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&self.uri)
    }
}

/// Leaf container listed under a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentEntry {
    pub subject_label: String,
    pub label: String,
}

/// Scan listed under a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    pub id: String,
    pub scan_type: String,
    pub quality: Option<String>,
    pub resources: Vec<ResourceEntry>,
}

/// File resource listed under a container or scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEntry {
    pub label: String,
    pub format: Option<String>,
    pub uri: String,
}

/// File of a resource with its digest as reported by the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub uri: String,
    pub digest: String,
}

/// Opens remote sessions.
pub trait Connector {
    type Session: RemoteSession;

    /// Open a fresh session.
    ///
    /// # Errors
    ///
    /// - Return [`RemoteError`] if remote cannot be reached or refuses login.
    fn connect(&self) -> Result<Self::Session>;
}

/// Remote calls the gateway relies on.
///
/// All calls block the calling thread. Resource URIs are canonical URIs of
/// the form `<container uri>/resources/<label>`.
pub trait RemoteSession {
    /// Close the session.
    fn disconnect(self) -> Result<()>;

    /// List every leaf container of a project.
    fn experiments(&self, project: &str) -> Result<Vec<ExperimentEntry>>;

    /// List scans of a container.
    fn scans(&self, node: &RemoteNode) -> Result<Vec<ScanEntry>>;

    /// List resources directly attached to a container.
    fn resources(&self, node: &RemoteNode) -> Result<Vec<ResourceEntry>>;

    /// Read custom fields of a container as raw strings.
    fn fields(&self, node: &RemoteNode) -> Result<BTreeMap<String, String>>;

    /// Create container if it does not exist yet.
    fn ensure_node(&self, node: &RemoteNode) -> Result<()>;

    /// List files of a resource with their digests.
    fn file_digests(&self, resource: &str) -> Result<Vec<RemoteFile>>;

    /// Stream every file of a resource as a gzip compressed tar archive.
    fn download(&self, resource: &str, sink: &mut dyn Write) -> Result<()>;

    /// Delete resource with its files.
    ///
    /// Return false if there was nothing to delete.
    fn delete_resource(&self, resource: &str) -> Result<bool>;

    /// Create empty resource.
    fn create_resource(&self, resource: &str, format: &str) -> Result<()>;

    /// Upload local file into resource under a relative remote name.
    fn upload(&self, resource: &str, source: &Path, remote_name: &str) -> Result<()>;

    /// Write custom field of a container.
    fn put_field(&self, node: &RemoteNode, name: &str, value: &str) -> Result<()>;
}

/// Reference counted scope of a shared remote session.
pub struct SessionScope<C: Connector> {
    connector: C,
    slot: RefCell<Option<C::Session>>,
    depth: Cell<usize>,
}

impl<C: Connector> SessionScope<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            slot: RefCell::new(None),
            depth: Cell::new(0),
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Number of live guards.
    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    /// Enter scope, connecting if no other guard is alive.
    ///
    /// # Errors
    ///
    /// - Return [`RemoteError`] if connection fails. Scope is left untouched.
    pub fn enter(&self) -> Result<SessionGuard<'_, C>> {
        if self.depth.get() == 0 {
            let session = self.connector.connect()?;
            *self.slot.borrow_mut() = Some(session);
            debug!("remote session opened");
        }
        self.depth.set(self.depth.get() + 1);

        Ok(SessionGuard { scope: self })
    }
}

/// Live entry into a [`SessionScope`].
pub struct SessionGuard<'scope, C: Connector> {
    scope: &'scope SessionScope<C>,
}

impl<C: Connector> SessionGuard<'_, C> {
    /// Borrow the shared session.
    ///
    /// # Errors
    ///
    /// - Return [`RemoteError::Disconnected`] if the session is gone.
    pub fn session(&self) -> Result<Ref<'_, C::Session>> {
        Ref::filter_map(self.scope.slot.borrow(), Option::as_ref).map_err(|_| RemoteError::Disconnected)
    }
}

impl<C: Connector> Drop for SessionGuard<'_, C> {
    fn drop(&mut self) {
        let depth = self.scope.depth.get().saturating_sub(1);
        self.scope.depth.set(depth);
        if depth > 0 {
            return;
        }

        // INVARIANT: Only the outermost guard closes the session.
        if let Some(session) = self.scope.slot.borrow_mut().take() {
            match session.disconnect() {
                Ok(()) => debug!("remote session closed"),
                Err(error) => warn!("failed to close remote session: {error}"),
            }
        }
    }
}

/// Remote call error types.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Remote answered with a failure status.
    #[error("{method} {url} failed with status {status}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
    },

    /// Remote could not be reached.
    #[error("failed to reach {url}")]
    Transport {
        url: String,
        #[source]
        source: Box<ureq::Transport>,
    },

    /// Remote answered with something unexpected.
    #[error("unexpected response from {url}: {reason}")]
    Malformed { url: String, reason: String },

    /// Streaming a body failed.
    #[error("failed to stream {url}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// Requested object does not exist remotely.
    #[error("{uri} does not exist on remote")]
    NotFound { uri: String },

    /// Session was used outside of its scope.
    #[error("remote session is not connected")]
    Disconnected,
}

/// Friendly result alias :3
pub type Result<T, E = RemoteError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    #[derive(Default)]
    struct Counts {
        connects: Cell<usize>,
        disconnects: Cell<usize>,
    }

    struct CountingConnector(Rc<Counts>);

    struct CountingSession(Rc<Counts>);

    impl Connector for CountingConnector {
        type Session = CountingSession;

        fn connect(&self) -> Result<Self::Session> {
            self.0.connects.set(self.0.connects.get() + 1);
            Ok(CountingSession(self.0.clone()))
        }
    }

    impl RemoteSession for CountingSession {
        fn disconnect(self) -> Result<()> {
            self.0.disconnects.set(self.0.disconnects.get() + 1);
            Ok(())
        }

        fn experiments(&self, _: &str) -> Result<Vec<ExperimentEntry>> {
            Ok(Vec::new())
        }

        fn scans(&self, _: &RemoteNode) -> Result<Vec<ScanEntry>> {
            Ok(Vec::new())
        }

        fn resources(&self, _: &RemoteNode) -> Result<Vec<ResourceEntry>> {
            Ok(Vec::new())
        }

        fn fields(&self, _: &RemoteNode) -> Result<BTreeMap<String, String>> {
            Ok(BTreeMap::new())
        }

        fn ensure_node(&self, _: &RemoteNode) -> Result<()> {
            Ok(())
        }

        fn file_digests(&self, _: &str) -> Result<Vec<RemoteFile>> {
            Ok(Vec::new())
        }

        fn download(&self, _: &str, _: &mut dyn Write) -> Result<()> {
            Ok(())
        }

        fn delete_resource(&self, _: &str) -> Result<bool> {
            Ok(false)
        }

        fn create_resource(&self, _: &str, _: &str) -> Result<()> {
            Ok(())
        }

        fn upload(&self, _: &str, _: &Path, _: &str) -> Result<()> {
            Ok(())
        }

        fn put_field(&self, _: &RemoteNode, _: &str, _: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn nested_guards_share_one_session() -> anyhow::Result<()> {
        let counts = Rc::new(Counts::default());
        let scope = SessionScope::new(CountingConnector(counts.clone()));

        {
            let outer = scope.enter()?;
            {
                let inner = scope.enter()?;
                inner.session()?.experiments("PROJ")?;
                assert_eq!(scope.depth(), 2);
            }
            assert_eq!(counts.disconnects.get(), 0);
            outer.session()?.experiments("PROJ")?;
        }

        assert_eq!(counts.connects.get(), 1);
        assert_eq!(counts.disconnects.get(), 1);
        assert_eq!(scope.depth(), 0);

        Ok(())
    }

    #[test]
    fn guard_releases_on_early_return() -> anyhow::Result<()> {
        let counts = Rc::new(Counts::default());
        let scope = SessionScope::new(CountingConnector(counts.clone()));

        let failing = || -> Result<()> {
            let _guard = scope.enter()?;
            Err(RemoteError::NotFound { uri: "/data".into() })
        };
        assert!(failing().is_err());
        assert_eq!(counts.disconnects.get(), 1);

        // Scope can be entered again afterwards.
        let guard = scope.enter()?;
        guard.session()?;
        assert_eq!(counts.connects.get(), 2);

        Ok(())
    }

    #[test]
    fn only_sessions_hold_scans() {
        assert!(RemoteKind::Session.has_scans());
        assert!(!RemoteKind::Project.has_scans());
        assert!(!RemoteKind::Subject.has_scans());
        assert!(!RemoteKind::Synthetic.has_scans());
    }
}
