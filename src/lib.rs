//! # Polaris Filesystem Library
//!
//! Polaris is a read-only, in-memory virtual filesystem over a "module
//! image": an on-disk hierarchy with one directory per module and resource
//! files nested below by package path. Consumers (filesystem providers,
//! packaging tools) look up synthetic `/`-separated paths and get back nodes
//! that behave like files, directories, or symbolic links — without that
//! hierarchy physically existing in that shape.
//!
//! Two namespaces are projected from one image:
//!
//! - `/modules/<module>/...` mirrors the on-disk layout of each module;
//! - `/packages/<package>/<module>` is a derived cross-reference of which
//!   modules contribute to which package, served as links back into
//!   `/modules`.
//!
//! An optional **preview** mode lets a reserved overlay subtree inside each
//! module shadow or augment primary entries; the overlay directory itself is
//! never visible.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use polarisfs::prelude::*;
//!
//! fn main() -> polarisfs::Result<()> {
//!     let image = ImageFs::open("/var/lib/polaris/image", false)?;
//!
//!     // Walk the package cross-reference.
//!     let pkg = image.find("/packages/java.lang")?.expect("package present");
//!     for name in image.child_names(&pkg)? {
//!         let link = image.find(&name)?.expect("link present");
//!         let module = polarisfs::image::node::resolve_link(&link, false);
//!         println!("{name} -> {}", module.name());
//!     }
//!
//!     // Read a resource.
//!     let node = image.find("/modules/java.base/java/lang/Object.class")?
//!         .expect("resource present");
//!     let bytes = image.read(&node)?;
//!     println!("{} bytes", bytes.len());
//!
//!     image.close();
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! Embedders can load a global TOML config once and open the image from it:
//!
//! ```rust,ignore
//! polarisfs::util::config::init_config("polaris.toml")?;
//! let image = polarisfs::ImageFs::from_global_config()?;
//! ```
//!
//! ## Core Components
//!
//! - [`image`]: the node/caching/path-resolution engine
//! - [`attr`]: the backing-store seam ([`attr::AttrSource`])
//! - [`util::config`]: configuration management
//!
//! ## Guarantees
//!
//! - Repeated lookups of one path return the *same* cached node, including
//!   across concurrent callers.
//! - Directory listings are computed once, memoized, sorted, and
//!   deduplicated, with construction-time marker files excluded.
//! - The image is a static snapshot: the backing tree must not change for
//!   the lifetime of an instance.

#[macro_use]
extern crate log;

pub mod attr;
pub mod error;
pub mod image;
pub mod util;

/// Commonly used types and traits for working with a module image.
///
/// # Usage
///
/// ```rust,ignore
/// use polarisfs::prelude::*;
/// ```
pub mod prelude {
    pub use crate::attr::{AttrSource, Attrs, StdAttrSource};
    pub use crate::error::{Error, Result};
    pub use crate::image::node::{resolve_link, Node, NodeKind};
    pub use crate::image::ImageFs;
}

// Re-export key types at crate root for convenience
pub use error::{Error, Result};
pub use image::node::Node;
pub use image::ImageFs;
