//! # Image engine: virtual view over a module image
//!
//! An [`ImageFs`] projects an on-disk "module image" — one top-level
//! directory per module, resources nested below by package path — into a
//! synthetic read-only namespace that callers address with `/`-separated
//! paths:
//!
//! ```text
//! /
//! ├── modules/              ← mirrors the on-disk layout
//! │   └── <module>/<package-path>/<resource>
//! └── packages/             ← derived cross-reference
//!     └── <package>/<module>   (link back into /modules/<module>)
//! ```
//!
//! With preview mode enabled, a reserved `_preview` subtree inside each
//! module transparently shadows or augments primary entries; the subtree
//! itself is never visible.
//!
//! ## Key Components
//!
//! - [`ImageFs`]: builds the namespace once, then serves lookups and reads
//! - [`node::Node`]: resource / directory / link entities with stable identity
//! - [`path`]: namespace validation and overlay precedence
//!
//! ## Example
//!
//! ```rust,ignore
//! use polarisfs::ImageFs;
//!
//! fn main() -> polarisfs::Result<()> {
//!     let image = ImageFs::open("/var/lib/polaris/image", false)?;
//!
//!     let node = image.find("/modules/java.base/java/lang/Object.class")?
//!         .expect("resource present");
//!     let bytes = image.read(&node)?;
//!     println!("{} bytes", bytes.len());
//!
//!     image.close();
//!     Ok(())
//! }
//! ```

pub(crate) mod cache;
pub mod node;
pub mod path;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;

use crate::attr::{AttrSource, StdAttrSource};
use crate::error::{Error, Result};
use crate::util::config;
use cache::NodeCache;
use node::Node;

const ROOT: &str = "/";
const MODULES: &str = "/modules";
const PACKAGES: &str = "/packages";

/// Read-only virtual filesystem over one module image.
///
/// Construction walks every module's tree exactly once to build the module
/// roots and the package cross-reference; everything below a module root is
/// materialized lazily on first lookup and memoized. Two lookups of the same
/// path always return the same cached node. The instance is passive: all work
/// happens on the calling thread, and concurrent callers may share it freely.
pub struct ImageFs {
    root: PathBuf,
    preview: bool,
    source: Arc<dyn AttrSource>,
    cache: NodeCache,
    closed: AtomicBool,
}

impl ImageFs {
    /// Open the image rooted at `root`, using the real filesystem as backing
    /// store. `preview` enables the overlay merge.
    pub fn open(root: impl Into<PathBuf>, preview: bool) -> Result<ImageFs> {
        Self::open_with(root, preview, Arc::new(StdAttrSource))
    }

    /// Open with a caller-supplied [`AttrSource`] backing store.
    ///
    /// Any I/O failure during the construction walk aborts the open; no
    /// partially built image is ever returned.
    pub fn open_with(
        root: impl Into<PathBuf>,
        preview: bool,
        source: Arc<dyn AttrSource>,
    ) -> Result<ImageFs> {
        let root = root.into();
        let start = std::time::Instant::now();
        tracing::info!(
            "polaris: open start root={} preview={}",
            root.display(),
            preview
        );

        let image = ImageFs {
            root,
            preview,
            source,
            cache: NodeCache::default(),
            closed: AtomicBool::new(false),
        };
        image.build()?;

        tracing::info!(
            "polaris: open done root={} nodes={} elapsed={:.2}s",
            image.root.display(),
            image.cache.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(image)
    }

    /// Open using the globally initialized configuration
    /// (see [`config::init_config`]).
    pub fn from_global_config() -> Result<ImageFs> {
        let cfg = config::get()?;
        Self::open(cfg.image_root.clone(), cfg.preview)
    }

    /// Primary root directory of the backing image.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn preview_enabled(&self) -> bool {
        self.preview
    }

    /// Resolve a namespace path to its node.
    ///
    /// Returns `Ok(None)` for invalid, absent, or hidden paths — malformed
    /// input is absence, never an error. Errors are reserved for backing
    /// store failures on paths the image already believed to exist.
    /// Repeated calls for the same path return the same `Arc`, including
    /// across concurrent callers.
    pub fn find(&self, path: &str) -> Result<Option<Arc<Node>>> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(None);
        }
        if let Some(node) = self.cache.get(path) {
            return Ok(Some(node));
        }
        // Cache misses can only materialize below a module root. Everything
        // under /packages, the module roots, and the synthetic directories
        // were all built eagerly, so a miss there is plain absence.
        let Some(mp) = path::parse_module_path(path) else {
            return Ok(None);
        };
        self.cache.get_or_try_insert(path, || {
            match path::locate(self.source.as_ref(), &self.root, self.preview, &mp)? {
                None => Ok(None),
                Some((_, attrs)) if attrs.is_dir => {
                    debug!("materialized directory {path}");
                    Ok(Some(Node::directory(path.to_string())))
                }
                Some((disk, attrs)) => {
                    debug!("materialized resource {path} ({} bytes)", attrs.size);
                    Ok(Some(Node::resource(path.to_string(), disk, attrs.size)))
                }
            }
        })
    }

    /// Sorted, deduplicated full-path child names of a directory node.
    ///
    /// The first call merges primary and (if enabled) preview entries,
    /// resolves each raw name through [`find`](Self::find) so markers and the
    /// preview root drop out, and memoizes the result; later calls return the
    /// cached list. Fails with [`Error::NotADirectory`] on resources and
    /// links.
    pub fn child_names(&self, dir: &Node) -> Result<Vec<String>> {
        let cell = dir
            .children_cell()
            .ok_or_else(|| Error::NotADirectory(dir.name().to_string()))?;
        let names = cell.get_or_try_init(|| self.complete(dir))?;
        Ok(names.clone())
    }

    /// Full content of a resource node. Fails with [`Error::NotAResource`]
    /// on directories and links; I/O failures carry the on-disk path.
    pub fn read(&self, node: &Node) -> Result<Bytes> {
        match node.disk() {
            Some(disk) => self.source.read_all(disk).map_err(|e| Error::io(disk, e)),
            None => Err(Error::NotAResource(node.name().to_string())),
        }
    }

    /// Release all cached nodes. Idempotent; lookups on a closed image
    /// return absence.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::info!("polaris: close root={}", self.root.display());
            self.cache.clear();
        }
    }

    /// One-time eager construction: module roots, package index, and the
    /// synthetic directories, all inserted into the cache.
    fn build(&self) -> Result<()> {
        let modules = self.discover_modules()?;

        let mut index: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for module in &modules {
            self.index_module(module, &mut index)?;
        }

        let mut module_nodes: BTreeMap<&str, Arc<Node>> = BTreeMap::new();
        let mut module_names = Vec::with_capacity(modules.len());
        for module in &modules {
            let name = format!("{MODULES}/{module}");
            let node = self.cache.insert(Arc::new(Node::directory(name.clone())));
            module_nodes.insert(module.as_str(), node);
            module_names.push(name);
        }
        self.cache.insert(Arc::new(Node::completed_directory(
            MODULES.to_string(),
            module_names,
        )));

        let mut package_names = Vec::with_capacity(index.len());
        for (package, contributors) in &index {
            let dir_name = format!("{PACKAGES}/{package}");
            let mut links = Vec::with_capacity(contributors.len());
            for module in contributors {
                let Some(target) = module_nodes.get(module.as_str()) else {
                    continue;
                };
                let link_name = format!("{dir_name}/{module}");
                self.cache.insert(Arc::new(Node::link(
                    link_name.clone(),
                    Arc::clone(target),
                )));
                links.push(link_name);
            }
            self.cache.insert(Arc::new(Node::completed_directory(
                dir_name.clone(),
                links,
            )));
            package_names.push(dir_name);
        }
        self.cache.insert(Arc::new(Node::completed_directory(
            PACKAGES.to_string(),
            package_names,
        )));

        self.cache.insert(Arc::new(Node::completed_directory(
            ROOT.to_string(),
            vec![MODULES.to_string(), PACKAGES.to_string()],
        )));
        debug!(
            "image built: {} modules, {} packages",
            modules.len(),
            index.len()
        );
        Ok(())
    }

    /// Every top-level directory under the primary root is a module.
    fn discover_modules(&self) -> Result<Vec<String>> {
        let mut modules = Vec::new();
        for name in self
            .source
            .list(&self.root)
            .map_err(|e| Error::io(&self.root, e))?
        {
            let on_disk = self.root.join(&name);
            let attrs = self
                .source
                .attrs(&on_disk)
                .map_err(|e| Error::io(&on_disk, e))?;
            if matches!(attrs, Some(a) if a.is_dir) {
                modules.push(name);
            }
        }
        modules.sort();
        modules.dedup();
        Ok(modules)
    }

    /// Walk one module's subtree (skipping the module root itself) and record
    /// a `package → module` association for every descendant directory.
    /// Preview-relative directories are remapped to their canonical package;
    /// with preview disabled the preview subtree is not walked at all.
    fn index_module(
        &self,
        module: &str,
        index: &mut BTreeMap<String, BTreeSet<String>>,
    ) -> Result<()> {
        let module_root = self.root.join(module);
        let mut pending: Vec<Vec<String>> = vec![Vec::new()];
        while let Some(rel) = pending.pop() {
            let mut dir = module_root.clone();
            for seg in &rel {
                dir.push(seg);
            }
            for name in self.source.list(&dir).map_err(|e| Error::io(&dir, e))? {
                let child = dir.join(&name);
                let attrs = self
                    .source
                    .attrs(&child)
                    .map_err(|e| Error::io(&child, e))?;
                if !matches!(attrs, Some(a) if a.is_dir) {
                    continue;
                }
                if rel.is_empty() && name == path::PREVIEW_ROOT && !self.preview {
                    continue;
                }
                let mut next = rel.clone();
                next.push(name);
                if let Some(package) = path::package_for(&next) {
                    index
                        .entry(package)
                        .or_default()
                        .insert(module.to_string());
                }
                pending.push(next);
            }
        }
        Ok(())
    }

    /// Directory completer: compute the merged child list of an uncomputed
    /// directory. Runs inside the node's once-cell, so it executes at most
    /// once per directory; an I/O failure propagates to the caller without
    /// poisoning the cell.
    fn complete(&self, dir: &Node) -> Result<Vec<String>> {
        let Some((module, rest)) = path::split_modules_path(dir.name()) else {
            // Synthetic directories are built pre-completed; nothing below
            // them completes lazily.
            return Ok(Vec::new());
        };

        let mut raw: BTreeSet<String> = BTreeSet::new();

        let primary = path::primary_location(&self.root, module, &rest);
        self.collect_dir_entries(&primary, &mut raw)?;

        let inside_preview = rest.first() == Some(&path::PREVIEW_ROOT);
        if self.preview && !inside_preview {
            let shadow = path::preview_location(&self.root, module, &rest);
            self.collect_dir_entries(&shadow, &mut raw)?;
        }

        // `raw` is an ordered set and every full name shares the directory
        // prefix, so the result comes out sorted and deduplicated.
        let mut names = Vec::with_capacity(raw.len());
        for entry in raw {
            let full = format!("{}/{}", dir.name(), entry);
            // Resolving through the normal lookup path canonicalizes each
            // child and silently drops hidden artifacts.
            if self.find(&full)?.is_some() {
                names.push(full);
            }
        }
        Ok(names)
    }

    fn collect_dir_entries(&self, on_disk: &Path, out: &mut BTreeSet<String>) -> Result<()> {
        let attrs = self
            .source
            .attrs(on_disk)
            .map_err(|e| Error::io(on_disk, e))?;
        if matches!(attrs, Some(a) if a.is_dir) {
            out.extend(
                self.source
                    .list(on_disk)
                    .map_err(|e| Error::io(on_disk, e))?,
            );
        }
        Ok(())
    }
}

impl std::fmt::Debug for ImageFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageFs")
            .field("root", &self.root)
            .field("preview", &self.preview)
            .field("nodes", &self.cache.len())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}
