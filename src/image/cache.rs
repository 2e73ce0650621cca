//! Node cache: path → node with at-most-once creation per path.
//!
//! The cache owns every node of an image. Both the eager construction path
//! and the lazy per-lookup path insert through it; the first writer wins, so
//! concurrent creators of the same path always observe one shared `Arc`.
//! Append-only until `clear()` on image close.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::Result;
use crate::image::node::Node;

#[derive(Debug, Default)]
pub(crate) struct NodeCache {
    nodes: DashMap<String, Arc<Node>>,
}

impl NodeCache {
    pub fn get(&self, name: &str) -> Option<Arc<Node>> {
        self.nodes.get(name).map(|e| Arc::clone(e.value()))
    }

    /// Insert an eagerly built node. Returns the cached instance, which is
    /// the existing one if the path was already present.
    pub fn insert(&self, node: Arc<Node>) -> Arc<Node> {
        match self.nodes.entry(node.name().to_string()) {
            Entry::Occupied(e) => Arc::clone(e.get()),
            Entry::Vacant(e) => {
                e.insert(Arc::clone(&node));
                node
            }
        }
    }

    /// Lazy creation: run `init` only if `name` is not cached yet. The shard
    /// stays locked across `init`, so a racing creator of the same path waits
    /// and then observes the winner's node. `init` returning `None` caches
    /// nothing (absence is recomputed per lookup); errors propagate without
    /// poisoning the map.
    pub fn get_or_try_insert<F>(&self, name: &str, init: F) -> Result<Option<Arc<Node>>>
    where
        F: FnOnce() -> Result<Option<Node>>,
    {
        match self.nodes.entry(name.to_string()) {
            Entry::Occupied(e) => Ok(Some(Arc::clone(e.get()))),
            Entry::Vacant(e) => match init()? {
                Some(node) => {
                    let node = Arc::new(node);
                    e.insert(Arc::clone(&node));
                    Ok(Some(node))
                }
                None => Ok(None),
            },
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn clear(&self) {
        self.nodes.clear();
    }
}
