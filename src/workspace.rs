//! # Workspace Model
//!
//! Albero in memoria dei nodi file/directory con lo stato di compressione per nodo,
//! più un indice piatto `key -> nodo` per mutazioni O(1).
//!
//! ## Responsabilità:
//! - Memorizza i nodi in un'arena (`Vec`) referenziata da `NodeId`
//! - Applica la macchina a stati per nodo:
//!   `idle → pending → {fulfilled | rejected}`, `fulfilled → saved`,
//!   `fulfilled | rejected → pending` (nuova compressione)
//! - Gestisce i flag derivati `disabled` / `checkbox_disabled`
//! - Calcola le chiavi selezionabili (esclusi nodi disabilitati, `pending` e `saved`)
//! - Espone una vista ad albero serializzabile per il livello di presentazione
//!
//! ## Invarianti:
//! - La chiave di un nodo è unica nell'albero e stabile
//! - Un nodo è foglia se e solo se rappresenta un file
//! - Le directory non hanno stato di compressione proprio

use crate::codec::CompressOutput;
use crate::error::CompressError;
use crate::file_manager::FileManager;
use crate::metadata::Dimensions;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub type NodeId = usize;

/// Candidate asset produced by the scanner; immutable afterwards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    /// Absolute path, unique within a workspace
    pub key: String,
    pub name: String,
    /// Lowercased, without the dot
    pub extension: String,
    pub size: u64,
    pub parent_path: PathBuf,
}

impl FileDescriptor {
    pub fn source_path(&self) -> &Path {
        Path::new(&self.key)
    }

    /// Describe the file at `path` from its metadata
    pub async fn from_path(path: &Path) -> Result<Self, CompressError> {
        let size = FileManager::file_size(path).await?;
        Ok(Self {
            key: path.to_string_lossy().into_owned(),
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            extension: FileManager::extension(path).unwrap_or_default(),
            size,
            parent_path: path.parent().map(Path::to_path_buf).unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressedState {
    Idle,
    Pending,
    Fulfilled,
    Rejected,
    Saved,
}

impl CompressedState {
    /// Whether `self → next` is an edge of the state graph
    pub fn can_transition_to(self, next: CompressedState) -> bool {
        use CompressedState::*;
        matches!(
            (self, next),
            (Idle, Pending)
                | (Pending, Fulfilled)
                | (Pending, Rejected)
                | (Fulfilled, Saved)
                | (Fulfilled, Pending)
                | (Rejected, Pending)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::Fulfilled => "fulfilled",
            Self::Rejected => "rejected",
            Self::Saved => "saved",
        }
    }
}

impl std::fmt::Display for CompressedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransitionError {
    #[error("no node with key {0}")]
    UnknownKey(String),
    #[error("{0} is a directory")]
    NotALeaf(String),
    #[error("{0} is disabled")]
    Disabled(String),
    #[error("{key}: invalid transition {from} -> {to}")]
    Invalid {
        key: String,
        from: CompressedState,
        to: CompressedState,
    },
}

/// One file or directory entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceNode {
    pub key: String,
    pub name: String,
    pub is_leaf: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<FileDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed_state: Option<CompressedState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_dimensions: Option<Dimensions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimized_dimensions: Option<Dimensions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimized_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimized_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub disabled: bool,
    pub checkbox_disabled: bool,
    #[serde(skip)]
    pub children: Vec<NodeId>,
}

impl WorkspaceNode {
    fn directory(path: &Path) -> Self {
        Self {
            key: path.to_string_lossy().into_owned(),
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.to_string_lossy().into_owned()),
            is_leaf: false,
            file: None,
            compressed_state: None,
            source_dimensions: None,
            optimized_dimensions: None,
            optimized_path: None,
            optimized_size: None,
            error_message: None,
            disabled: false,
            checkbox_disabled: false,
            children: Vec::new(),
        }
    }

    fn leaf(file: FileDescriptor, source: Result<Dimensions, CompressError>) -> Self {
        let (source_dimensions, state, error_message, disabled) = match source {
            Ok(dims) => (Some(dims), CompressedState::Idle, None, false),
            Err(e) => (None, CompressedState::Rejected, Some(e.to_string()), true),
        };
        Self {
            key: file.key.clone(),
            name: file.name.clone(),
            is_leaf: true,
            file: Some(file),
            compressed_state: Some(state),
            source_dimensions,
            optimized_dimensions: None,
            optimized_path: None,
            optimized_size: None,
            error_message,
            disabled,
            checkbox_disabled: false,
            children: Vec::new(),
        }
    }

    pub fn state(&self) -> Option<CompressedState> {
        self.compressed_state
    }

    fn clear_optimized(&mut self) {
        self.optimized_dimensions = None;
        self.optimized_path = None;
        self.optimized_size = None;
        self.error_message = None;
    }
}

/// Nested, serializable view of a subtree
#[derive(Debug, Serialize)]
pub struct TreeView<'a> {
    #[serde(flatten)]
    pub node: &'a WorkspaceNode,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeView<'a>>,
}

#[derive(Debug, Default, Clone)]
pub struct Workspace {
    nodes: Vec<WorkspaceNode>,
    roots: Vec<NodeId>,
    index: HashMap<String, NodeId>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys are unique: re-inserting a known key returns the existing node untouched
    fn insert(&mut self, parent: Option<NodeId>, node: WorkspaceNode) -> NodeId {
        if let Some(&existing) = self.index.get(&node.key) {
            debug!("Node {} already in the workspace", node.key);
            return existing;
        }
        let id = self.nodes.len();
        self.index.insert(node.key.clone(), id);
        self.nodes.push(node);
        match parent.and_then(|p| self.nodes.get_mut(p)) {
            Some(parent) => parent.children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    /// Add a directory node under `parent`, or as a root when `None`
    pub fn add_directory(&mut self, parent: Option<NodeId>, path: &Path) -> NodeId {
        self.insert(parent, WorkspaceNode::directory(path))
    }

    /// Add a file leaf; a failure to read its dimensions marks it disabled and rejected
    pub fn add_file(
        &mut self,
        parent: Option<NodeId>,
        file: FileDescriptor,
        source_dimensions: Result<Dimensions, CompressError>,
    ) -> NodeId {
        self.insert(parent, WorkspaceNode::leaf(file, source_dimensions))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut WorkspaceNode> {
        self.nodes.get_mut(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&WorkspaceNode> {
        self.nodes.get(id)
    }

    pub fn get(&self, key: &str) -> Option<&WorkspaceNode> {
        self.index.get(key).and_then(|&id| self.nodes.get(id))
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn leaves(&self) -> impl Iterator<Item = &WorkspaceNode> {
        self.nodes.iter().filter(|n| n.is_leaf)
    }

    pub fn state(&self, key: &str) -> Option<CompressedState> {
        self.get(key).and_then(WorkspaceNode::state)
    }

    /// Whether `key` may be included in a new batch
    pub fn is_selectable(&self, key: &str) -> bool {
        self.get(key).map_or(false, |node| {
            node.is_leaf
                && !node.disabled
                && !matches!(
                    node.compressed_state,
                    Some(CompressedState::Pending) | Some(CompressedState::Saved)
                )
        })
    }

    /// Keys of every leaf that may be included in a new batch, in insertion order
    pub fn selectable_keys(&self) -> Vec<String> {
        self.leaves()
            .filter(|n| self.is_selectable(&n.key))
            .map(|n| n.key.clone())
            .collect()
    }

    /// Keys of leaves holding an unsaved optimized artifact
    pub fn fulfilled_keys(&self) -> Vec<String> {
        self.leaves()
            .filter(|n| n.compressed_state == Some(CompressedState::Fulfilled))
            .map(|n| n.key.clone())
            .collect()
    }

    fn transition(
        &mut self,
        key: &str,
        to: CompressedState,
    ) -> Result<&mut WorkspaceNode, TransitionError> {
        let id = *self
            .index
            .get(key)
            .ok_or_else(|| TransitionError::UnknownKey(key.to_string()))?;
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| TransitionError::UnknownKey(key.to_string()))?;
        let from = node
            .compressed_state
            .ok_or_else(|| TransitionError::NotALeaf(key.to_string()))?;
        if node.disabled {
            return Err(TransitionError::Disabled(key.to_string()));
        }
        if !from.can_transition_to(to) {
            return Err(TransitionError::Invalid {
                key: key.to_string(),
                from,
                to,
            });
        }
        node.compressed_state = Some(to);
        Ok(node)
    }

    /// `idle | fulfilled | rejected → pending`: clear stale results and lock the checkbox
    pub fn begin(&mut self, key: &str) -> Result<(), TransitionError> {
        let node = self.transition(key, CompressedState::Pending)?;
        node.clear_optimized();
        node.checkbox_disabled = true;
        Ok(())
    }

    /// `pending → fulfilled`
    pub fn fulfill(&mut self, key: &str, output: &CompressOutput) -> Result<(), TransitionError> {
        let node = self.transition(key, CompressedState::Fulfilled)?;
        node.optimized_dimensions = Some(output.output_dimensions.clone());
        node.optimized_path = Some(output.output_path.clone());
        node.optimized_size = Some(output.output_size);
        node.checkbox_disabled = false;
        Ok(())
    }

    /// `pending → rejected`
    pub fn reject(&mut self, key: &str, message: impl Into<String>) -> Result<(), TransitionError> {
        let node = self.transition(key, CompressedState::Rejected)?;
        node.error_message = Some(message.into());
        node.checkbox_disabled = false;
        Ok(())
    }

    /// `fulfilled → saved`; the checkbox stays disabled from now on
    pub fn mark_saved(&mut self, key: &str) -> Result<(), TransitionError> {
        let node = self.transition(key, CompressedState::Saved)?;
        node.checkbox_disabled = true;
        Ok(())
    }

    /// Nested view of every root
    pub fn tree(&self) -> Vec<TreeView<'_>> {
        self.roots.iter().filter_map(|&id| self.view(id)).collect()
    }

    fn view(&self, id: NodeId) -> Option<TreeView<'_>> {
        let node = self.nodes.get(id)?;
        Some(TreeView {
            node,
            children: node.children.iter().filter_map(|&c| self.view(c)).collect(),
        })
    }
}
