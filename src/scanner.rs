//! # Workspace Scanner
//!
//! Costruisce il `Workspace` a partire da una o più root.
//!
//! ## Regole:
//! - Le directory diventano nodi interni, i file candidati (png/jpg/jpeg/webp/svg/gif/svga) foglie
//! - I path che corrispondono ai glob di ignore vengono saltati insieme al loro contenuto
//! - Le dimensioni sorgente vengono lette per ogni foglia; un errore di parsing
//!   marca il nodo `disabled`, stato `rejected`, messaggio `[ParseError]: ...`
//! - Una directory senza figli ha la checkbox disabilitata
//! - Più root producono più nodi di primo livello

use crate::error::CompressError;
use crate::file_manager::FileManager;
use crate::metadata;
use crate::workspace::{FileDescriptor, NodeId, Workspace};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub struct Scanner {
    ignore: GlobSet,
}

struct Entry {
    path: PathBuf,
    depth: usize,
    is_dir: bool,
}

impl Scanner {
    /// Scanner skipping every path matched by `patterns`
    pub fn new(patterns: &[String]) -> Result<Self, CompressError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(Self::glob(pattern)?);
            // `dir/**` also hides `dir` itself
            if let Some(prefix) = pattern.strip_suffix("/**") {
                if !prefix.is_empty() {
                    builder.add(Self::glob(prefix)?);
                }
            }
        }
        let ignore = builder
            .build()
            .map_err(|e| CompressError::configuration(format!("invalid ignore patterns: {}", e)))?;
        Ok(Self { ignore })
    }

    fn glob(pattern: &str) -> Result<Glob, CompressError> {
        Glob::new(pattern)
            .map_err(|e| CompressError::configuration(format!("invalid ignore pattern {:?}: {}", pattern, e)))
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        self.ignore.is_match(path)
    }

    /// Walk `root` in file-name order, pruning ignored subtrees
    fn walk(&self, root: &Path) -> Vec<Entry> {
        WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !self.is_ignored(e.path()))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(Entry {
                    path: entry.path().to_path_buf(),
                    depth: entry.depth(),
                    is_dir: entry.file_type().is_dir(),
                }),
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .collect()
    }

    async fn add_leaf(workspace: &mut Workspace, parent: Option<NodeId>, path: &Path) {
        let file = match FileDescriptor::from_path(path).await {
            Ok(file) => file,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                return;
            }
        };
        let dims = metadata::read_dimensions(path).await;
        if let Err(e) = &dims {
            debug!("Source metadata unavailable for {}: {}", path.display(), e);
        }
        workspace.add_file(parent, file, dims);
    }

    /// Build the workspace tree for `roots`
    pub async fn scan(&self, roots: &[PathBuf]) -> Result<Workspace, CompressError> {
        let mut workspace = Workspace::new();

        for root in roots {
            let meta = tokio::fs::metadata(root)
                .await
                .map_err(|e| CompressError::io(format!("Cannot scan {}: {}", root.display(), e)))?;

            if meta.is_file() {
                if FileManager::is_candidate(root) {
                    Self::add_leaf(&mut workspace, None, root).await;
                }
                continue;
            }

            // depth-indexed stack of open directories
            let mut stack: Vec<(usize, NodeId)> = Vec::new();
            for entry in self.walk(root) {
                while stack.last().map_or(false, |(depth, _)| *depth >= entry.depth) {
                    stack.pop();
                }
                let parent = stack.last().map(|(_, id)| *id);

                if entry.is_dir {
                    let id = workspace.add_directory(parent, &entry.path);
                    stack.push((entry.depth, id));
                } else if FileManager::is_candidate(&entry.path) {
                    Self::add_leaf(&mut workspace, parent, &entry.path).await;
                }
            }
        }

        for id in 0..workspace.len() {
            if let Some(node) = workspace.node_mut(id) {
                if !node.is_leaf && node.children.is_empty() {
                    node.checkbox_disabled = true;
                }
            }
        }

        info!(
            "Scanned {} root(s): {} nodes, {} candidate files",
            roots.len(),
            workspace.len(),
            workspace.leaves().count()
        );
        Ok(workspace)
    }
}
