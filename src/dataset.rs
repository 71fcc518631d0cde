// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Dataset tree.
//!
//! A __dataset__ is the in-memory tree of data nodes mirrored from a remote
//! store. Remote stores are hierarchical: each level of the remote tree (e.g.,
//! subjects, then sessions) corresponds to one frequency of the data space,
//! and the ordered list of those frequencies is the dataset's __hierarchy__.
//!
//! Nodes are registered while the tree is populated from the store and are
//! not restructured afterwards. Repopulating starts from an empty tree.

pub mod item;
pub mod value;

pub use item::{Field, FileGroup, NodeAddress, Provenance};
pub use value::{FieldType, FieldValue};

use crate::{
    lattice::{Clinical, DataSpace, Frequency},
    store::StoreId,
};

use std::{
    collections::{btree_map::Entry, BTreeMap},
    fmt::{Display, Formatter, Result as FmtResult},
};
use tracing::debug;

/// Identifier of a data node within its frequency.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeId {
    /// Id of the dataset-wide node.
    Unique,

    /// Single label.
    Label(String),

    /// One label per contributing axis.
    Tuple(Vec<String>),
}

impl Display for NodeId {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Unique => Ok(()),
            Self::Label(label) => fmt.write_str(label),
            Self::Tuple(labels) => fmt.write_str(&labels.join("_")),
        }
    }
}

impl From<&str> for NodeId {
    fn from(label: &str) -> Self {
        Self::Label(label.to_string())
    }
}

/// Node of the dataset tree.
#[derive(Debug, Clone, PartialEq)]
pub struct DataNode<S: DataSpace = Clinical> {
    address: NodeAddress<S>,
    file_groups: BTreeMap<String, FileGroup<S>>,
    fields: BTreeMap<String, Field<S>>,
}

impl<S: DataSpace> DataNode<S> {
    fn new(address: NodeAddress<S>) -> Self {
        Self {
            address,
            file_groups: BTreeMap::new(),
            fields: BTreeMap::new(),
        }
    }

    pub fn address(&self) -> &NodeAddress<S> {
        &self.address
    }

    pub fn frequency(&self) -> Frequency<S> {
        self.address.frequency
    }

    pub fn id(&self) -> &NodeId {
        &self.address.id
    }

    /// Label recorded for frequency along the path to this node.
    pub fn label(&self, frequency: Frequency<S>) -> Option<&str> {
        self.address.ids.get(&frequency).map(String::as_str)
    }

    /// Register file group, replacing any of the same path.
    pub fn add_file_group(&mut self, file_group: FileGroup<S>) -> &mut FileGroup<S> {
        match self.file_groups.entry(file_group.path().to_string()) {
            Entry::Occupied(mut entry) => {
                entry.insert(file_group);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(file_group),
        }
    }

    /// Fresh file group addressed at this node.
    pub fn new_file_group(&self, path: impl Into<String>) -> FileGroup<S> {
        FileGroup::new(path, self.address.clone())
    }

    /// Register field, replacing any of the same path.
    pub fn add_field(&mut self, path: impl Into<String>, value: Option<FieldValue>) -> &mut Field<S> {
        let path = path.into();
        let field = Field::new(path.clone(), self.address.clone(), value);
        match self.fields.entry(path) {
            Entry::Occupied(mut entry) => {
                entry.insert(field);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(field),
        }
    }

    pub fn file_group(&self, path: &str) -> Option<&FileGroup<S>> {
        self.file_groups.get(path)
    }

    pub fn file_group_mut(&mut self, path: &str) -> Option<&mut FileGroup<S>> {
        self.file_groups.get_mut(path)
    }

    pub fn file_groups(&self) -> impl Iterator<Item = &FileGroup<S>> {
        self.file_groups.values()
    }

    pub fn field(&self, path: &str) -> Option<&Field<S>> {
        self.fields.get(path)
    }

    pub fn field_mut(&mut self, path: &str) -> Option<&mut Field<S>> {
        self.fields.get_mut(path)
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field<S>> {
        self.fields.values()
    }

    /// Forget discovered items.
    pub fn clear_items(&mut self) {
        self.file_groups.clear();
        self.fields.clear();
    }
}

/// Tree of data nodes mirrored from a store.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset<S: DataSpace = Clinical> {
    id: String,
    store: StoreId,
    hierarchy: Vec<Frequency<S>>,
    root: DataNode<S>,
    nodes: BTreeMap<Frequency<S>, BTreeMap<NodeId, DataNode<S>>>,
}

impl<S: DataSpace> Dataset<S> {
    /// Construct empty dataset bound to a store.
    ///
    /// # Errors
    ///
    /// - Return [`DatasetError::Hierarchy`] if hierarchy is empty or a layer
    ///   is not a strict child of the layer above it.
    pub fn new(id: impl Into<String>, store: StoreId, hierarchy: Vec<Frequency<S>>) -> Result<Self> {
        if hierarchy.is_empty() {
            return Err(DatasetError::Hierarchy("hierarchy has no layers".into()));
        }

        for pair in hierarchy.windows(2) {
            if !pair[0].is_parent(pair[1], false) {
                return Err(DatasetError::Hierarchy(format!(
                    "{} is not a parent of {}",
                    pair[0], pair[1]
                )));
            }
        }

        let id = id.into();
        let root = DataNode::new(NodeAddress {
            store,
            dataset: id.clone(),
            frequency: Frequency::ZERO,
            id: NodeId::Unique,
            ids: BTreeMap::new(),
        });

        Ok(Self {
            id,
            store,
            hierarchy,
            root,
            nodes: BTreeMap::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn store(&self) -> StoreId {
        self.store
    }

    pub fn hierarchy(&self) -> &[Frequency<S>] {
        &self.hierarchy
    }

    /// Build id of a node from its labels.
    ///
    /// Hierarchy layers and basis frequencies take one label. Any other
    /// frequency takes one label per axis of its basis, most significant
    /// first. The dataset-wide frequency takes none.
    ///
    /// # Errors
    ///
    /// - Return [`DatasetError::LabelCount`] if number of labels does not fit
    ///   the frequency.
    pub fn node_id(&self, frequency: Frequency<S>, mut labels: Vec<String>) -> Result<NodeId> {
        let single = frequency.is_basis() || self.hierarchy.contains(&frequency);
        let expected = if frequency.is_zero() {
            0
        } else if single {
            1
        } else {
            frequency.nonzero_basis().len()
        };
        if labels.len() != expected {
            return Err(DatasetError::LabelCount {
                frequency: frequency.to_string(),
                expected,
                found: labels.len(),
            });
        }

        Ok(match expected {
            0 => NodeId::Unique,
            1 if single => NodeId::Label(labels.remove(0)),
            _ => NodeId::Tuple(labels),
        })
    }

    /// Drop every node and item, leaving a bare dataset-wide root.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root.clear_items();
    }

    /// Dataset-wide root node.
    pub fn root(&self) -> &DataNode<S> {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut DataNode<S> {
        &mut self.root
    }

    /// Register path of labels from the root down to a leaf.
    ///
    /// One label per hierarchy layer. Each layer's node is identified by its
    /// label and remembers the labels of its ancestors. Registering the same
    /// path twice leaves the tree unchanged.
    ///
    /// # Errors
    ///
    /// - Return [`DatasetError::LeafDepth`] if number of labels does not match
    ///   number of hierarchy layers.
    pub fn add_leaf_node(&mut self, labels: &[impl AsRef<str>]) -> Result<()> {
        if labels.len() != self.hierarchy.len() {
            return Err(DatasetError::LeafDepth {
                expected: self.hierarchy.len(),
                found: labels.len(),
            });
        }

        let mut ids = BTreeMap::new();
        for (frequency, label) in self.hierarchy.clone().into_iter().zip(labels) {
            let label = label.as_ref().to_string();
            ids.insert(frequency, label.clone());
            let id = NodeId::Label(label);
            let address = self.address(frequency, id.clone(), ids.clone());
            self.nodes
                .entry(frequency)
                .or_default()
                .entry(id)
                .or_insert_with(|| DataNode::new(address));
        }
        debug!("registered leaf {:?} in {}", ids.values().collect::<Vec<_>>(), self.id);

        Ok(())
    }

    /// Register node outside of the hierarchy, e.g., an aggregate node.
    ///
    /// Existing nodes are returned as-is.
    pub fn insert_node(&mut self, frequency: Frequency<S>, id: NodeId) -> &mut DataNode<S> {
        if frequency.is_zero() && id == NodeId::Unique {
            return &mut self.root;
        }

        let ids = match &id {
            NodeId::Label(label) => BTreeMap::from([(frequency, label.clone())]),
            NodeId::Tuple(labels) => frequency.nonzero_basis().into_iter().zip(labels.clone()).collect(),
            NodeId::Unique => BTreeMap::new(),
        };
        let address = self.address(frequency, id.clone(), ids);
        self.nodes
            .entry(frequency)
            .or_default()
            .entry(id)
            .or_insert_with(|| DataNode::new(address))
    }

    fn address(&self, frequency: Frequency<S>, id: NodeId, ids: BTreeMap<Frequency<S>, String>) -> NodeAddress<S> {
        NodeAddress {
            store: self.store,
            dataset: self.id.clone(),
            frequency,
            id,
            ids,
        }
    }

    pub fn node(&self, frequency: Frequency<S>, id: &NodeId) -> Option<&DataNode<S>> {
        if frequency.is_zero() && *id == NodeId::Unique {
            return Some(&self.root);
        }
        self.nodes.get(&frequency).and_then(|nodes| nodes.get(id))
    }

    pub fn node_mut(&mut self, frequency: Frequency<S>, id: &NodeId) -> Option<&mut DataNode<S>> {
        if frequency.is_zero() && *id == NodeId::Unique {
            return Some(&mut self.root);
        }
        self.nodes.get_mut(&frequency).and_then(|nodes| nodes.get_mut(id))
    }

    /// Nodes of a frequency in id order.
    pub fn nodes(&self, frequency: Frequency<S>) -> impl Iterator<Item = &DataNode<S>> {
        let root = frequency.is_zero().then_some(&self.root);
        root.into_iter()
            .chain(self.nodes.get(&frequency).into_iter().flat_map(BTreeMap::values))
    }

    /// Every node, grouped by ascending frequency value.
    pub fn all_nodes(&self) -> impl Iterator<Item = &DataNode<S>> {
        std::iter::once(&self.root).chain(self.nodes.values().flat_map(BTreeMap::values))
    }

    /// Frequencies that currently have nodes.
    pub fn frequencies(&self) -> impl Iterator<Item = Frequency<S>> + '_ {
        std::iter::once(Frequency::ZERO).chain(self.nodes.keys().copied().filter(|freq| !freq.is_zero()))
    }

    /// Nodes of frequency `frequency` nested under `parent`.
    ///
    /// Empty if `parent` is not a parent frequency of `frequency`.
    pub fn children(&self, parent: &NodeAddress<S>, frequency: Frequency<S>) -> Vec<&DataNode<S>> {
        if !parent.frequency.is_parent(frequency, false) {
            return Vec::new();
        }

        self.nodes(frequency)
            .filter(|node| {
                parent
                    .ids
                    .iter()
                    .all(|(freq, label)| node.address.ids.get(freq) == Some(label))
            })
            .collect()
    }
}

/// Dataset error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DatasetError {
    /// Hierarchy layers are malformed.
    #[error("invalid hierarchy: {0}")]
    Hierarchy(String),

    /// Leaf path does not reach down the whole hierarchy.
    #[error("expected {expected} labels to reach a leaf node, found {found}")]
    LeafDepth { expected: usize, found: usize },

    /// Labels do not identify a node of the frequency.
    #[error("{frequency} nodes take {expected} labels, found {found}")]
    LabelCount {
        frequency: String,
        expected: usize,
        found: usize,
    },
}

/// Friendly result alias :3
pub type Result<T, E = DatasetError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dataset() -> Dataset {
        Dataset::new("PROJ", StoreId::next(), vec![Clinical::SUBJECT, Clinical::SESSION]).unwrap()
    }

    #[test]
    fn node_ids_follow_frequency() -> anyhow::Result<()> {
        let dataset = dataset();
        let labels = |labels: &[&str]| labels.iter().map(|label| label.to_string()).collect::<Vec<_>>();

        assert_eq!(dataset.node_id(Clinical::DATASET, Vec::new())?, NodeId::Unique);
        assert_eq!(dataset.node_id(Clinical::SESSION, labels(&["S01_MR1"]))?, NodeId::from("S01_MR1"));
        assert_eq!(dataset.node_id(Clinical::GROUP, labels(&["ctl_a"]))?, NodeId::from("ctl_a"));
        assert_eq!(
            dataset.node_id(Clinical::BATCH, labels(&["T1_M_01", "CONTROL"]))?,
            NodeId::Tuple(labels(&["T1_M_01", "CONTROL"]))
        );
        assert_eq!(
            dataset.node_id(Clinical::BATCH, labels(&["T1_M_01"])),
            Err(DatasetError::LabelCount {
                frequency: "batch".into(),
                expected: 2,
                found: 1
            })
        );

        Ok(())
    }

    #[test]
    fn leaf_paths_build_idempotent_tree() -> anyhow::Result<()> {
        let mut dataset = dataset();
        for _ in 0..2 {
            dataset.add_leaf_node(&["S01", "S01_MR1"])?;
            dataset.add_leaf_node(&["S01", "S01_MR2"])?;
            dataset.add_leaf_node(&["S02", "S02_MR1"])?;
        }

        let subjects: Vec<String> = dataset.nodes(Clinical::SUBJECT).map(|n| n.id().to_string()).collect();
        assert_eq!(subjects, vec!["S01", "S02"]);
        assert_eq!(dataset.nodes(Clinical::SESSION).count(), 3);
        assert_eq!(dataset.all_nodes().count(), 6);

        let session = dataset.node(Clinical::SESSION, &"S01_MR2".into()).unwrap();
        assert_eq!(session.label(Clinical::SUBJECT), Some("S01"));
        assert_eq!(session.label(Clinical::SESSION), Some("S01_MR2"));

        Ok(())
    }

    #[test]
    fn clear_keeps_only_root() -> anyhow::Result<()> {
        let mut dataset = dataset();
        dataset.add_leaf_node(&["S01", "S01_MR1"])?;
        dataset.clear();

        assert_eq!(dataset.all_nodes().count(), 1);
        assert_eq!(dataset.root().frequency(), Clinical::DATASET);
        assert_eq!(dataset.root().id(), &NodeId::Unique);

        Ok(())
    }

    #[test]
    fn reject_short_leaf_path() {
        let mut dataset = dataset();
        assert_eq!(
            dataset.add_leaf_node(&["S01"]),
            Err(DatasetError::LeafDepth {
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn reject_unordered_hierarchy() {
        let result = Dataset::new("PROJ", StoreId::next(), vec![Clinical::SESSION, Clinical::SUBJECT]);
        assert!(matches!(result, Err(DatasetError::Hierarchy(_))));
        let result = Dataset::new("PROJ", StoreId::next(), vec![Clinical::TIMEPOINT, Clinical::SUBJECT]);
        assert!(matches!(result, Err(DatasetError::Hierarchy(_))));
    }

    #[test]
    fn children_follow_parent_relation() -> anyhow::Result<()> {
        let mut dataset = dataset();
        dataset.add_leaf_node(&["S01", "S01_MR1"])?;
        dataset.add_leaf_node(&["S01", "S01_MR2"])?;
        dataset.add_leaf_node(&["S02", "S02_MR1"])?;

        let subject = dataset.node(Clinical::SUBJECT, &"S01".into()).unwrap().address().clone();
        let sessions: Vec<String> = dataset
            .children(&subject, Clinical::SESSION)
            .iter()
            .map(|node| node.id().to_string())
            .collect();
        assert_eq!(sessions, vec!["S01_MR1", "S01_MR2"]);

        let root = dataset.root().address().clone();
        assert_eq!(dataset.children(&root, Clinical::SESSION).len(), 3);
        assert!(dataset.children(&subject, Clinical::TIMEPOINT).is_empty());

        Ok(())
    }

    #[test]
    fn aggregate_nodes_record_axis_labels() {
        let mut dataset = dataset();
        let node = dataset.insert_node(
            Clinical::BATCH,
            NodeId::Tuple(vec!["T1".into(), "CONTROL".into()]),
        );
        assert_eq!(node.label(Clinical::TIMEPOINT), Some("T1"));
        assert_eq!(node.label(Clinical::GROUP), Some("CONTROL"));
        assert_eq!(node.id().to_string(), "T1_CONTROL");
    }
}
