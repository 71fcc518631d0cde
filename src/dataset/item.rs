// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Data items attached to data nodes.
//!
//! Two kinds of item exist: __file groups__, which are file artifacts that get
//! cached locally, and __fields__, which are scalar or array values that always
//! round-trip straight through the remote store.

use crate::{
    dataset::{value::FieldType, FieldValue, NodeId},
    format::{AssortedFiles, FileFormat},
    lattice::{Clinical, DataSpace, Frequency},
    store::{
        checksum::{self, Checksums},
        StoreId,
    },
};

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
    fs::write,
    path::{Path, PathBuf},
};

/// Location of a data node, shared by every item the node owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeAddress<S: DataSpace = Clinical> {
    /// Store the owning dataset was created from.
    pub store: StoreId,

    /// Dataset (project) id in the store.
    pub dataset: String,

    pub frequency: Frequency<S>,

    pub id: NodeId,

    /// Labels of this node and its ancestors in the hierarchy.
    pub ids: BTreeMap<Frequency<S>, String>,
}

impl<S: DataSpace> Display for NodeAddress<S> {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}:{}", self.frequency, self.id)
    }
}

/// Provenance record of an item.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Provenance(serde_json::Value);

impl Provenance {
    pub fn new(record: serde_json::Value) -> Self {
        Self(record)
    }

    pub fn record(&self) -> &serde_json::Value {
        &self.0
    }

    /// Write record as pretty JSON.
    ///
    /// # Errors
    ///
    /// - Return [`std::io::Error`] if file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let contents = serde_json::to_string_pretty(&self.0)?;
        write(path, contents)
    }
}

/// File artifact of a data node.
#[derive(Debug, Clone, PartialEq)]
pub struct FileGroup<S: DataSpace = Clinical> {
    path: String,
    address: NodeAddress<S>,
    order: Option<String>,
    quality: Option<String>,
    uris: BTreeMap<String, String>,
    uri: Option<String>,
    datatype: Option<FileFormat>,
    provenance: Option<Provenance>,
    fs_paths: Option<AssortedFiles>,
}

impl<S: DataSpace> FileGroup<S> {
    pub fn new(path: impl Into<String>, address: NodeAddress<S>) -> Self {
        Self {
            path: path.into(),
            address,
            order: None,
            quality: None,
            uris: BTreeMap::new(),
            uri: None,
            datatype: None,
            provenance: None,
            fs_paths: None,
        }
    }

    /// Set position of the scan within its session.
    pub fn with_order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    /// Set scan quality label.
    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = Some(quality.into());
        self
    }

    /// Set available resources as format name to remote URI.
    pub fn with_uris(mut self, uris: BTreeMap<String, String>) -> Self {
        self.uris = uris;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn address(&self) -> &NodeAddress<S> {
        &self.address
    }

    pub fn order(&self) -> Option<&str> {
        self.order.as_deref()
    }

    pub fn quality(&self) -> Option<&str> {
        self.quality.as_deref()
    }

    pub fn uris(&self) -> &BTreeMap<String, String> {
        &self.uris
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn set_uri(&mut self, uri: impl Into<String>) {
        self.uri = Some(uri.into());
    }

    pub fn datatype(&self) -> Option<&FileFormat> {
        self.datatype.as_ref()
    }

    /// Assign format of file group.
    ///
    /// If the remote offers a resource under the format's name, or one of its
    /// alternate names, that resource becomes the URI of the file group.
    pub fn set_datatype(&mut self, format: FileFormat) {
        if self.uri.is_none() {
            if let Some(uri) = self
                .uris
                .iter()
                .find(|(name, _)| format.answers_to(name))
                .map(|(_, uri)| uri.clone())
            {
                self.uri = Some(uri);
            }
        }
        self.datatype = Some(format);
    }

    pub fn provenance(&self) -> Option<&Provenance> {
        self.provenance.as_ref()
    }

    pub fn set_provenance(&mut self, provenance: Provenance) {
        self.provenance = Some(provenance);
    }

    /// Locations of the materialized primary file and side cars.
    pub fn fs_paths(&self) -> Option<&AssortedFiles> {
        self.fs_paths.as_ref()
    }

    pub fn set_fs_paths(&mut self, primary: impl Into<PathBuf>, aux: BTreeMap<String, PathBuf>) {
        self.fs_paths = Some(AssortedFiles {
            primary: primary.into(),
            aux,
        });
    }

    /// Digest materialized files into manifest form.
    ///
    /// # Errors
    ///
    /// - Return [`checksum::ChecksumError::NotMaterialized`] if no files have
    ///   been set or format is unassigned.
    /// - Return [`checksum::ChecksumError::Read`] if a file cannot be read.
    pub fn calculate_checksums(&self) -> checksum::Result<Checksums> {
        match (&self.datatype, &self.fs_paths) {
            (Some(format), Some(paths)) => Checksums::calculate(format, &paths.primary, &paths.aux),
            _ => Err(checksum::ChecksumError::NotMaterialized {
                item: self.to_string(),
            }),
        }
    }
}

impl<S: DataSpace> Display for FileGroup<S> {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "file group {:?} of {}", self.path, self.address)
    }
}

/// Scalar or array value of a data node.
#[derive(Debug, Clone, PartialEq)]
pub struct Field<S: DataSpace = Clinical> {
    path: String,
    address: NodeAddress<S>,
    datatype: Option<FieldType>,
    array: bool,
    declared: bool,
    value: Option<FieldValue>,
    provenance: Option<Provenance>,
}

impl<S: DataSpace> Field<S> {
    /// Construct field, inferring type from discovered value.
    ///
    /// Inferred types are informational only. Stores coerce values just
    /// for types declared through [`Field::set_datatype`].
    pub fn new(path: impl Into<String>, address: NodeAddress<S>, value: Option<FieldValue>) -> Self {
        Self {
            path: path.into(),
            address,
            datatype: value.as_ref().map(FieldValue::field_type),
            array: value.as_ref().is_some_and(FieldValue::is_array),
            declared: false,
            value,
            provenance: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn address(&self) -> &NodeAddress<S> {
        &self.address
    }

    pub fn datatype(&self) -> Option<FieldType> {
        self.datatype
    }

    pub fn is_array(&self) -> bool {
        self.array
    }

    /// Declare scalar type and whether field holds an array.
    pub fn set_datatype(&mut self, datatype: FieldType, array: bool) {
        self.datatype = Some(datatype);
        self.array = array;
        self.declared = true;
    }

    /// Whether type came from [`Field::set_datatype`] rather than inference.
    pub fn is_declared(&self) -> bool {
        self.declared
    }

    /// Value seen when node items were discovered.
    pub fn value(&self) -> Option<&FieldValue> {
        self.value.as_ref()
    }

    pub fn provenance(&self) -> Option<&Provenance> {
        self.provenance.as_ref()
    }

    pub fn set_provenance(&mut self, provenance: Provenance) {
        self.provenance = Some(provenance);
    }
}

impl<S: DataSpace> Display for Field<S> {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "field {:?} of {}", self.path, self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::common;
    use pretty_assertions::assert_eq;

    fn address() -> NodeAddress {
        NodeAddress {
            store: StoreId::next(),
            dataset: "PROJ".into(),
            frequency: Clinical::SESSION,
            id: NodeId::Label("S01_MR1".into()),
            ids: BTreeMap::from([
                (Clinical::SUBJECT, "S01".into()),
                (Clinical::SESSION, "S01_MR1".into()),
            ]),
        }
    }

    #[test]
    fn datatype_selects_matching_resource() {
        let uris = BTreeMap::from([
            ("DICOM".to_string(), "/data/archive/projects/PROJ/scans/1/resources/DICOM".to_string()),
            ("NIFTI".to_string(), "/data/archive/projects/PROJ/scans/1/resources/NIFTI".to_string()),
        ]);
        let mut file_group = FileGroup::new("t1w", address()).with_uris(uris);

        file_group.set_datatype(common::nifti_gz());
        assert_eq!(
            file_group.uri(),
            Some("/data/archive/projects/PROJ/scans/1/resources/NIFTI")
        );

        // URI already resolved, keep it.
        file_group.set_datatype(common::dicom());
        assert_eq!(
            file_group.uri(),
            Some("/data/archive/projects/PROJ/scans/1/resources/NIFTI")
        );
    }

    #[test]
    fn field_infers_type_from_value() {
        let field = Field::new("age", address(), Some(FieldValue::IntArray(vec![1, 2])));
        assert_eq!(field.datatype(), Some(FieldType::Int));
        assert!(field.is_array());
        assert!(!field.is_declared());
        assert_eq!(field.to_string(), "field \"age\" of session:S01_MR1");
    }

    #[test]
    fn declaring_type_overrides_inferred_one() {
        let mut field = Field::new("age", address(), Some(FieldValue::Int(42)));
        field.set_datatype(FieldType::Float, false);
        assert_eq!(field.datatype(), Some(FieldType::Float));
        assert!(!field.is_array());
        assert!(field.is_declared());
    }

    #[test]
    fn checksums_need_materialized_files() {
        let file_group = FileGroup::new("t1w", address());
        assert!(matches!(
            file_group.calculate_checksums(),
            Err(checksum::ChecksumError::NotMaterialized { .. })
        ));
    }
}
