//! Node types of the virtual namespace.
//!
//! A [`Node`] is one addressable entity: a resource (regular file), a
//! directory, or a link. There is no class hierarchy; the kind is a tagged
//! variant carrying only the fields that kind needs. Node identity is the
//! full namespace path, unique for the lifetime of the image, and the cache
//! guarantees one `Arc<Node>` per path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;

/// Hop cap for link chains. Links are only ever constructed pointing at
/// module-root directories, so a single hop terminates every real chain; the
/// cap keeps behavior defined if that invariant is ever broken.
const MAX_LINK_HOPS: usize = 8;

#[derive(Debug)]
pub enum NodeKind {
    /// A regular file, with its resolved on-disk location and size captured
    /// at creation.
    Resource { disk: PathBuf, size: u64 },
    /// A directory. `children` holds the sorted, deduplicated full-path child
    /// names once computed; unset means uncomputed. The cell transitions
    /// exactly once.
    Directory { children: OnceCell<Vec<String>> },
    /// A symbolic link to another node owned by the same cache.
    Link { target: Arc<Node> },
}

#[derive(Debug)]
pub struct Node {
    name: String,
    kind: NodeKind,
}

impl Node {
    pub(crate) fn resource(name: String, disk: PathBuf, size: u64) -> Self {
        Node {
            name,
            kind: NodeKind::Resource { disk, size },
        }
    }

    /// An uncomputed directory; its child list is filled in lazily.
    pub(crate) fn directory(name: String) -> Self {
        Node {
            name,
            kind: NodeKind::Directory {
                children: OnceCell::new(),
            },
        }
    }

    /// A directory whose child list is known at construction time (the
    /// synthetic `/`, `/modules`, `/packages` and per-package directories).
    pub(crate) fn completed_directory(name: String, children: Vec<String>) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(children);
        Node {
            name,
            kind: NodeKind::Directory { children: cell },
        }
    }

    pub(crate) fn link(name: String, target: Arc<Node>) -> Self {
        Node {
            name,
            kind: NodeKind::Link { target },
        }
    }

    /// Full namespace path, the node's unique identity.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_resource(&self) -> bool {
        matches!(self.kind, NodeKind::Resource { .. })
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { .. })
    }

    pub fn is_link(&self) -> bool {
        matches!(self.kind, NodeKind::Link { .. })
    }

    /// Byte size of a resource; 0 for directories and links.
    pub fn size(&self) -> u64 {
        match &self.kind {
            NodeKind::Resource { size, .. } => *size,
            _ => 0,
        }
    }

    pub(crate) fn disk(&self) -> Option<&Path> {
        match &self.kind {
            NodeKind::Resource { disk, .. } => Some(disk),
            _ => None,
        }
    }

    pub(crate) fn children_cell(&self) -> Option<&OnceCell<Vec<String>>> {
        match &self.kind {
            NodeKind::Directory { children } => Some(children),
            _ => None,
        }
    }

    pub(crate) fn link_target(&self) -> Option<&Arc<Node>> {
        match &self.kind {
            NodeKind::Link { target } => Some(target),
            _ => None,
        }
    }
}

/// Follow a link. `recursive = false` follows exactly one hop, `true` follows
/// chains transitively up to the hop cap. Identity no-op for non-links.
pub fn resolve_link(node: &Arc<Node>, recursive: bool) -> Arc<Node> {
    let mut current = Arc::clone(node);
    let mut hops = 0;
    while let Some(target) = current.link_target() {
        let target = Arc::clone(target);
        current = target;
        hops += 1;
        if !recursive || hops >= MAX_LINK_HOPS {
            break;
        }
    }
    current
}
