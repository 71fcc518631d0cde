// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Cache-synchronized gateway to XNAT-style stores.
//!
//! XNAT organizes data as projects holding subjects, which hold imaging
//! sessions (experiments). A project maps onto a dataset in the
//! [`Clinical`] space with the hierarchy `[subject, session]`. Nodes of any
//! other frequency are kept in synthetic subjects named after the node, which
//! are created remotely the first time something is written to them.
//!
//! # Remote Addressing
//!
//! Remote containers are always addressed by label, never by the IDs XNAT
//! assigns, e.g.,
//! `/data/archive/projects/PROJ/subjects/S01/experiments/S01_MR1`. Cache paths
//! derive from these URIs, so they stay stable when IDs get reassigned.
//!
//! # Fetching
//!
//! File groups are mirrored into the cache on demand. A cached copy is
//! trusted if its checksum manifest matches the remote one, or if it merely
//! exists when checksum checks are off. Otherwise the resource is downloaded
//! under the staging lock described in [`crate::store::cache`].

use crate::{
    config::StoreSettings,
    dataset::{DataNode, Dataset, Field, FieldValue, FileGroup, NodeAddress, NodeId, Provenance},
    format::{AssortedFiles, FileFormat, FormatError},
    lattice::{Clinical, Frequency},
    path::default_cache_dir,
    store::{
        cache::{cache_path, CacheEntry, Claim, RaceSettings, StagingLock},
        checksum::{manifest_path, relative_key, walk_files, Checksums},
        rest::RestConnector,
        session::{self, Connector, RemoteError, RemoteKind, RemoteNode, RemoteSession, SessionGuard, SessionScope},
        DataStore, Result, StoreError, StoreId,
    },
};

use indicatif::{ProgressBar, ProgressStyle};
use std::{
    collections::BTreeMap,
    fmt::Display,
    fs::{copy, read_dir, remove_dir_all, remove_file, File},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, info, instrument, warn};

/// Label of the resource holding provenance records of a node's items.
pub const PROVENANCE_RESOURCE: &str = "__provenance__";

/// Prefix of provenance records that belong to fields.
pub const FIELD_PROVENANCE_PREFIX: &str = "__field__";

/// Format name given to provenance resources.
const PROVENANCE_FORMAT: &str = "PROVENANCE";

/// Map item path onto remote label.
pub fn path_to_label(path: &str) -> String {
    path.replace('/', "__")
}

/// Map remote label onto item path.
pub fn label_to_path(label: &str) -> String {
    label.replace("__", "/")
}

/// Replace subject and experiment IDs in a remote URI with labels.
pub fn standard_uri(uri: &str, subject: Option<&str>, session: Option<&str>) -> String {
    let mut parts: Vec<&str> = uri.split('/').collect();
    for index in 1..parts.len() {
        let collection = parts[index - 1];
        let label = match collection {
            "subjects" => subject,
            "experiments" => session,
            _ => None,
        };
        if let Some(label) = label {
            parts[index] = label;
        }
    }

    parts.join("/")
}

/// Kind of remote container holding nodes of frequency.
pub fn remote_kind(frequency: Frequency<Clinical>) -> RemoteKind {
    if frequency == Clinical::DATASET {
        RemoteKind::Project
    } else if frequency == Clinical::SUBJECT {
        RemoteKind::Subject
    } else if frequency == Clinical::SESSION {
        RemoteKind::Session
    } else {
        RemoteKind::Synthetic
    }
}

/// Locate remote container of a data node.
///
/// # Errors
///
/// - Return [`StoreError::Usage`] if address lacks the labels needed.
pub fn remote_node(address: &NodeAddress<Clinical>) -> Result<RemoteNode> {
    let kind = remote_kind(address.frequency);
    let project = format!("/data/archive/projects/{}", address.dataset);
    let label = |frequency: Frequency<Clinical>| {
        address
            .ids
            .get(&frequency)
            .cloned()
            .ok_or_else(|| StoreError::Usage(format!("node {address} has no {frequency} label")))
    };

    let uri = match kind {
        RemoteKind::Project => project,
        RemoteKind::Subject => format!("{project}/subjects/{}", label(Clinical::SUBJECT)?),
        RemoteKind::Session => format!(
            "{project}/subjects/{}/experiments/{}",
            label(Clinical::SUBJECT)?,
            label(Clinical::SESSION)?
        ),
        RemoteKind::Synthetic => format!("{project}/subjects/{}", synthetic_name(address)),
    };

    Ok(RemoteNode { uri, kind })
}

fn synthetic_name(address: &NodeAddress<Clinical>) -> String {
    match &address.id {
        NodeId::Unique => format!("__{}__", address.frequency),
        id => format!("__{}_{id}__", address.frequency),
    }
}

fn resource_uri(node: &RemoteNode, path: &str) -> String {
    format!("{}/resources/{}", node.uri, path_to_label(path))
}

/// Gateway to an XNAT-style store with a local disk cache.
pub struct XnatStore<C: Connector = RestConnector> {
    id: StoreId,
    cache_dir: PathBuf,
    check_md5: bool,
    race: RaceSettings,
    progress: bool,
    scope: SessionScope<C>,
}

impl XnatStore<RestConnector> {
    /// Construct gateway from configuration.
    ///
    /// # Errors
    ///
    /// - Return [`crate::path::NoWayHome`] if no cache directory is set and
    ///   the default one cannot be determined.
    pub fn from_settings(settings: &StoreSettings) -> crate::path::Result<Self> {
        let mut connector = RestConnector::new(&settings.server);
        if let (Some(user), Some(password)) = (&settings.user, &settings.password) {
            connector = connector.with_credentials(user, password);
        }
        let cache_dir = match &settings.cache_dir {
            Some(cache_dir) => cache_dir.clone(),
            None => default_cache_dir()?,
        };

        Ok(Self::new(connector, cache_dir)
            .with_check_md5(settings.check_md5)
            .with_race_settings(RaceSettings {
                delay: Duration::from_secs(settings.race_condition_delay),
                max_attempts: settings.max_race_wait_attempts,
            })
            .with_progress(settings.progress))
    }
}

impl<C: Connector> XnatStore<C> {
    pub fn new(connector: C, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            id: StoreId::next(),
            cache_dir: cache_dir.into(),
            check_md5: true,
            race: RaceSettings::default(),
            progress: false,
            scope: SessionScope::new(connector),
        }
    }

    /// Compare checksums with the remote before trusting cached resources.
    pub fn with_check_md5(mut self, check_md5: bool) -> Self {
        self.check_md5 = check_md5;
        self
    }

    /// Set how long to wait on concurrent downloads.
    pub fn with_race_settings(mut self, race: RaceSettings) -> Self {
        self.race = race;
        self
    }

    /// Show download progress.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Session scope shared by all operations of this store.
    pub fn scope(&self) -> &SessionScope<C> {
        &self.scope
    }

    /// Enter session scope, e.g., to run several operations on one
    /// connection.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Remote`] if connection fails.
    pub fn connect(&self) -> Result<SessionGuard<'_, C>> {
        Ok(self.scope.enter()?)
    }

    /// Location of cache entry of a resource.
    pub fn cache_path(&self, uri: &str) -> PathBuf {
        cache_path(&self.cache_dir, uri)
    }

    /// Location of checksum manifest of a resource.
    pub fn manifest_path(&self, uri: &str) -> PathBuf {
        manifest_path(self.cache_path(uri))
    }

    fn check_store(&self, item: &impl Display, store: StoreId) -> Result<()> {
        if store != self.id {
            return Err(StoreError::WrongRepository {
                item: item.to_string(),
                expected: self.id,
                found: store,
            });
        }

        Ok(())
    }

    /// Checksums a cache entry must match before it is trusted.
    fn expected_checksums(&self, file_group: &FileGroup) -> Result<Option<Checksums>> {
        match self.check_md5 {
            true => Ok(Some(self.get_checksums(file_group)?)),
            false => Ok(None),
        }
    }

    fn progress_bar(&self, uri: &str) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }

        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {bytes} ({bytes_per_sec}) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(uri.to_string());
        bar
    }

    fn download(&self, file_group: &FileGroup, uri: &str, entry: &CacheEntry, lock: StagingLock) -> Result<()> {
        info!("downloading {uri}");
        let guard = self.scope.enter()?;
        let archive = lock.path().join("download.tar.gz");
        {
            let file = File::create(&archive).map_err(StoreError::io(&archive))?;
            let bar = self.progress_bar(uri);
            let mut sink = bar.wrap_write(file);
            guard.session()?.download(uri, &mut sink)?;
            sink.flush().map_err(StoreError::io(&archive))?;
            bar.finish_and_clear();
        }

        let checksums = self.get_checksums(file_group)?;
        let payload = super::cache::unpack(&archive, &lock.path().join("expanded"), uri)?;
        lock.promote(&payload, entry, &checksums)
    }

    fn cached_files(format: &FileFormat, entry: &CacheEntry) -> Result<AssortedFiles> {
        if format.is_directory() {
            return Ok(AssortedFiles {
                primary: entry.path().to_path_buf(),
                aux: BTreeMap::new(),
            });
        }

        let listing = read_dir(entry.path())
            .and_then(|entries| entries.map(|entry| entry.map(|entry| entry.path())).collect::<std::io::Result<Vec<_>>>())
            .map_err(StoreError::io(entry.path()))?;

        Ok(format.assort_files(listing)?)
    }

    fn put_provenance(
        &self,
        session: &C::Session,
        address: &NodeAddress,
        path: &str,
        provenance: &Provenance,
        is_field: bool,
    ) -> Result<()> {
        let node = remote_node(address)?;
        let uri = resource_uri(&node, PROVENANCE_RESOURCE);
        let cache_dir = self.cache_path(&uri);
        mkdirp::mkdirp(&cache_dir).map_err(StoreError::io(&cache_dir))?;

        let mut name = format!("{}.json", path_to_label(path));
        if is_field {
            name = format!("{FIELD_PROVENANCE_PREFIX}{name}");
        }
        let cached = cache_dir.join(&name);
        provenance.save(&cached).map_err(StoreError::io(&cached))?;

        // TODO: Record digest of the record in a field, so remote tampering
        // can be detected without downloading it.
        let exists = absent_as_empty(&node, session.resources(&node))?
            .iter()
            .any(|resource| resource.label == PROVENANCE_RESOURCE);
        if !exists {
            session.create_resource(&uri, PROVENANCE_FORMAT)?;
        }
        session.upload(&uri, &cached, &name)?;
        debug!("stored provenance of {path:?} in {uri}");

        Ok(())
    }

    fn typed_value(field: &Field, value: FieldValue) -> Result<FieldValue> {
        let Some(datatype) = field.datatype().filter(|_| field.is_declared()) else {
            return Ok(value);
        };

        if value.is_array() != field.is_array() {
            return Err(StoreError::Usage(format!(
                "{field} expects {} value, found {value}",
                if field.is_array() { "an array" } else { "a scalar" }
            )));
        }

        let description = value.to_string();
        value
            .coerce(datatype)
            .ok_or_else(|| StoreError::Usage(format!("{field} expects {datatype} values, found {description}")))
    }
}

impl<C: Connector> DataStore for XnatStore<C> {
    type Space = Clinical;

    fn id(&self) -> StoreId {
        self.id
    }

    fn default_hierarchy(&self) -> Vec<Frequency<Clinical>> {
        vec![Clinical::SUBJECT, Clinical::SESSION]
    }

    #[instrument(skip(self, dataset), fields(dataset = %dataset.id()), level = "debug")]
    fn find_nodes(&self, dataset: &mut Dataset) -> Result<()> {
        self.check_store(&dataset.id(), dataset.store())?;
        let guard = self.scope.enter()?;
        let experiments = guard.session()?.experiments(dataset.id())?;

        dataset.clear();
        for experiment in &experiments {
            dataset.add_leaf_node(&[experiment.subject_label.as_str(), experiment.label.as_str()])?;
        }
        info!("found {} sessions in {}", experiments.len(), dataset.id());

        Ok(())
    }

    #[instrument(skip(self, node), fields(node = %node.address()), level = "debug")]
    fn find_items(&self, node: &mut DataNode) -> Result<()> {
        self.check_store(node.address(), node.address().store)?;
        let remote = remote_node(node.address())?;
        let subject = node.label(Clinical::SUBJECT).map(String::from);
        let session_label = node.label(Clinical::SESSION).map(String::from);
        let standard = |uri: &str| standard_uri(uri, subject.as_deref(), session_label.as_deref());

        let guard = self.scope.enter()?;
        let session = guard.session()?;
        node.clear_items();

        if remote.kind.has_scans() {
            for scan in session.scans(&remote)? {
                let uris = scan
                    .resources
                    .iter()
                    .map(|resource| (resource.label.clone(), standard(&resource.uri)))
                    .collect();
                let mut file_group = node.new_file_group(scan.scan_type).with_order(scan.id).with_uris(uris);
                if let Some(quality) = scan.quality {
                    file_group = file_group.with_quality(quality);
                }
                node.add_file_group(file_group);
            }
        }

        for (name, value) in absent_as_empty(&remote, session.fields(&remote))? {
            node.add_field(label_to_path(&name), Some(FieldValue::parse(&unescape(&value))));
        }

        for resource in absent_as_empty(&remote, session.resources(&remote))? {
            if resource.label == PROVENANCE_RESOURCE {
                continue;
            }
            let format = resource.format.unwrap_or_else(|| resource.label.clone());
            let uris = BTreeMap::from([(format, standard(&resource.uri))]);
            let file_group = node.new_file_group(label_to_path(&resource.label)).with_uris(uris);
            node.add_file_group(file_group);
        }
        debug!(
            "found {} file groups and {} fields",
            node.file_groups().count(),
            node.fields().count()
        );

        Ok(())
    }

    #[instrument(skip(self, file_group), fields(item = %file_group), level = "debug")]
    fn get_file_group(&self, file_group: &mut FileGroup) -> Result<AssortedFiles> {
        info!("getting {file_group}");
        let format = file_group.datatype().cloned().ok_or_else(|| FormatError::Unassigned {
            item: file_group.to_string(),
            action: "downloading",
        })?;
        self.check_store(&*file_group, file_group.address().store)?;

        let _guard = self.scope.enter()?;
        if file_group.uri().is_none() {
            let node = remote_node(file_group.address())?;
            file_group.set_uri(resource_uri(&node, file_group.path()));
        }
        let uri = file_group.uri().map(String::from).unwrap_or_default();

        let entry = CacheEntry::new(self.cache_path(&uri));
        let expected = self.expected_checksums(file_group)?;
        if entry.is_complete(expected.as_ref())? {
            debug!("cache of {uri} is fresh");
        } else {
            match entry.claim(&self.race, expected.as_ref())? {
                Claim::Download(lock) => self.download(file_group, &uri, &entry, lock)?,
                Claim::Adopt => debug!("adopted concurrent download of {uri}"),
            }
        }

        let files = Self::cached_files(&format, &entry)?;
        file_group.set_fs_paths(files.primary.clone(), files.aux.clone());

        Ok(files)
    }

    #[instrument(skip(self, file_group, primary, aux), fields(item = %file_group), level = "debug")]
    fn put_file_group(&self, file_group: &mut FileGroup, primary: &Path, aux: &BTreeMap<String, PathBuf>) -> Result<()> {
        info!("putting {file_group}");
        let format = file_group.datatype().cloned().ok_or_else(|| FormatError::Unassigned {
            item: file_group.to_string(),
            action: "uploading",
        })?;
        self.check_store(&*file_group, file_group.address().store)?;

        let label = path_to_label(file_group.path());
        let ext = format.extension().unwrap_or_default();
        let mut uploads = Vec::new();
        if format.is_directory() {
            for file in walk_files(primary)? {
                let name = relative_key(primary, &file);
                uploads.push((None, file, name));
            }
        } else {
            uploads.push((None, primary.to_path_buf(), format!("{label}{ext}")));
            for (name, source) in aux {
                let aux_ext = format.aux_files().get(name).ok_or_else(|| FormatError::UnknownAux {
                    format: format.name().to_string(),
                    aux: name.clone(),
                })?;
                uploads.push((Some(name.clone()), source.clone(), format!("{label}{aux_ext}")));
            }
        }

        let guard = self.scope.enter()?;
        let session = guard.session()?;
        let node = remote_node(file_group.address())?;
        if node.kind.created_on_demand() {
            session.ensure_node(&node)?;
        }
        if file_group.uri().is_none() {
            file_group.set_uri(resource_uri(&node, file_group.path()));
        }
        let uri = file_group.uri().map(String::from).unwrap_or_default();

        if session.delete_resource(&uri)? {
            debug!("removed previous contents of {uri}");
        }
        session.create_resource(&uri, format.name())?;

        let entry = CacheEntry::new(self.cache_path(&uri));
        let manifest = entry.manifest();
        remove_file(&manifest).or_else(ignore_missing).map_err(StoreError::io(&manifest))?;
        remove_dir_all(entry.path()).or_else(ignore_missing).map_err(StoreError::io(entry.path()))?;
        mkdirp::mkdirp(entry.path()).map_err(StoreError::io(entry.path()))?;

        let mut cached_primary = entry.path().to_path_buf();
        let mut cached_aux = BTreeMap::new();
        for (aux_name, source, name) in uploads {
            session.upload(&uri, &source, &name)?;

            let dest = entry.path().join(&name);
            if let Some(parent) = dest.parent() {
                mkdirp::mkdirp(parent).map_err(StoreError::io(parent))?;
            }
            copy(&source, &dest).map_err(StoreError::io(&dest))?;

            match aux_name {
                Some(aux_name) => {
                    cached_aux.insert(aux_name, dest);
                }
                None if !format.is_directory() => cached_primary = dest,
                None => {}
            }
        }
        file_group.set_fs_paths(cached_primary, cached_aux);

        let checksums = file_group.calculate_checksums()?;
        checksums.save(&manifest)?;
        info!("uploaded {} files to {uri}", checksums.len());

        if let Some(provenance) = file_group.provenance() {
            self.put_provenance(&session, file_group.address(), file_group.path(), provenance, false)?;
        }

        Ok(())
    }

    #[instrument(skip(self, field), fields(item = %field), level = "debug")]
    fn get_field(&self, field: &Field) -> Result<FieldValue> {
        self.check_store(field, field.address().store)?;
        let node = remote_node(field.address())?;
        let name = path_to_label(field.path());

        let guard = self.scope.enter()?;
        let fields = absent_as_empty(&node, guard.session()?.fields(&node))?;
        let raw = fields.get(&name).ok_or_else(|| RemoteError::NotFound {
            uri: format!("{node}/fields/{name}"),
        })?;

        Self::typed_value(field, FieldValue::parse(&unescape(raw)))
    }

    #[instrument(skip(self, field, value), fields(item = %field), level = "debug")]
    fn put_field(&self, field: &Field, value: &FieldValue) -> Result<()> {
        self.check_store(field, field.address().store)?;
        let value = Self::typed_value(field, value.clone())?;
        let node = remote_node(field.address())?;

        let guard = self.scope.enter()?;
        let session = guard.session()?;
        if node.kind.created_on_demand() {
            session.ensure_node(&node)?;
        }
        session.put_field(&node, &path_to_label(field.path()), &value.to_literal())?;
        info!("set {field} to {value}");

        if let Some(provenance) = field.provenance() {
            self.put_provenance(&session, field.address(), field.path(), provenance, true)?;
        }

        Ok(())
    }

    #[instrument(skip(self, file_group), fields(item = %file_group), level = "debug")]
    fn get_checksums(&self, file_group: &FileGroup) -> Result<Checksums> {
        self.check_store(file_group, file_group.address().store)?;
        let uri = file_group.uri().ok_or_else(|| {
            StoreError::Usage(format!("URI of {file_group} must be set before retrieving its checksums"))
        })?;
        let format = file_group.datatype().ok_or_else(|| FormatError::Unassigned {
            item: file_group.to_string(),
            action: "retrieving checksums",
        })?;

        let guard = self.scope.enter()?;
        let files = guard.session()?.file_digests(uri)?;

        Ok(Checksums::from_remote(format, files)?)
    }
}

// INVARIANT: Containers created on demand may not exist yet.
fn absent_as_empty<T: Default>(node: &RemoteNode, result: session::Result<T>) -> Result<T> {
    match result {
        Err(RemoteError::NotFound { .. }) if node.kind.created_on_demand() => {
            warn!("{node} does not exist yet");
            Ok(T::default())
        }
        result => Ok(result?),
    }
}

/// Reverse server-side quote escaping of field values.
fn unescape(value: &str) -> String {
    value.replace("&quot;", "\"")
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
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    fn address(frequency: Frequency<Clinical>, id: NodeId, ids: &[(Frequency<Clinical>, &str)]) -> NodeAddress {
        NodeAddress {
            store: StoreId::next(),
            dataset: "PROJ".into(),
            frequency,
            id,
            ids: ids.iter().map(|(freq, label)| (*freq, label.to_string())).collect(),
        }
    }

    #[test]
    fn canonical_node_uris() -> anyhow::Result<()> {
        let project = address(Clinical::DATASET, NodeId::Unique, &[]);
        assert_eq!(remote_node(&project)?.uri, "/data/archive/projects/PROJ");

        let subject = address(Clinical::SUBJECT, "S01".into(), &[(Clinical::SUBJECT, "S01")]);
        assert_eq!(remote_node(&subject)?.uri, "/data/archive/projects/PROJ/subjects/S01");

        let session = address(
            Clinical::SESSION,
            "S01_MR1".into(),
            &[(Clinical::SUBJECT, "S01"), (Clinical::SESSION, "S01_MR1")],
        );
        let node = remote_node(&session)?;
        assert_eq!(node.uri, "/data/archive/projects/PROJ/subjects/S01/experiments/S01_MR1");
        assert_eq!(node.kind, RemoteKind::Session);

        Ok(())
    }

    #[test]
    fn synthetic_nodes_live_in_named_subjects() -> anyhow::Result<()> {
        let batch = address(
            Clinical::BATCH,
            NodeId::Tuple(vec!["T1".into(), "CONTROL".into()]),
            &[(Clinical::TIMEPOINT, "T1"), (Clinical::GROUP, "CONTROL")],
        );
        let node = remote_node(&batch)?;
        assert_eq!(node.uri, "/data/archive/projects/PROJ/subjects/__batch_T1_CONTROL__");
        assert_eq!(node.kind, RemoteKind::Synthetic);

        let group = address(Clinical::GROUP, NodeId::Unique, &[]);
        assert_eq!(remote_node(&group)?.uri, "/data/archive/projects/PROJ/subjects/__group__");

        Ok(())
    }

    #[test]
    fn session_without_subject_label_is_misuse() {
        let session = address(Clinical::SESSION, "S01_MR1".into(), &[(Clinical::SESSION, "S01_MR1")]);
        assert!(matches!(remote_node(&session), Err(StoreError::Usage(_))));
    }

    #[test_case("deriv/brain_mask", "deriv__brain_mask"; "nested")]
    #[test_case("t1w", "t1w"; "flat")]
    #[test]
    fn labels_round_trip(path: &str, label: &str) {
        use pretty_assertions::assert_eq;
        assert_eq!(path_to_label(path), label);
        assert_eq!(label_to_path(label), path);
    }

    #[test]
    fn ids_replaced_with_labels() {
        let uri = "/data/archive/projects/PROJ/subjects/XNAT_S0001/experiments/XNAT_E0001/scans/1/resources/DICOM";
        assert_eq!(
            standard_uri(uri, Some("S01"), Some("S01_MR1")),
            "/data/archive/projects/PROJ/subjects/S01/experiments/S01_MR1/scans/1/resources/DICOM"
        );
        assert_eq!(standard_uri(uri, None, None), uri);
    }

    #[test]
    fn unescape_quotes() {
        assert_eq!(unescape("[&quot;a&quot;,&quot;b&quot;]"), "[\"a\",\"b\"]");
    }
}
