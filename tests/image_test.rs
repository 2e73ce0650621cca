//! Integration tests for the image engine.
//!
//! These tests build real on-disk module images inside temp directories and
//! verify lookup identity, namespace projection, preview precedence, and the
//! error taxonomy end to end.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test image_test
//! ```

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use polarisfs::prelude::*;
use tempfile::{tempdir, TempDir};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Write `contents` at `rel` below `root`, creating parent directories.
fn write_file(root: &Path, rel: &str, contents: &[u8]) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn mkdir(root: &Path, rel: &str) {
    fs::create_dir_all(root.join(rel)).unwrap();
}

/// Two modules contributing to the same package, plus a marker file:
///
/// ```text
/// A/_the.A             (marker, hidden)
/// A/p/q.class
/// B/p/r.class
/// ```
fn basic_image() -> TempDir {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "A/_the.A", b"");
    write_file(dir.path(), "A/p/q.class", b"contents of q");
    write_file(dir.path(), "B/p/r.class", b"contents of r");
    dir
}

/// Module A with a primary resource, a preview shadow of it, and a
/// preview-only resource:
///
/// ```text
/// A/x/Y.class                    (primary)
/// A/_preview/x/Y.class           (shadows Y)
/// A/_preview/x/Z.class           (preview-only)
/// ```
fn preview_image() -> TempDir {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "A/x/Y.class", b"primary Y");
    write_file(dir.path(), "A/_preview/x/Y.class", b"preview Y");
    write_file(dir.path(), "A/_preview/x/Z.class", b"preview Z");
    dir
}

fn names(image: &ImageFs, path: &str) -> Vec<String> {
    let node = image.find(path).unwrap().expect("directory present");
    image.child_names(&node).unwrap()
}

// =============================================================================
// Lookup identity and caching
// =============================================================================

#[test]
fn repeated_lookups_return_the_same_node() {
    init_logging();
    let dir = basic_image();
    let image = ImageFs::open(dir.path(), false).unwrap();

    for path in ["/", "/modules", "/modules/A", "/modules/A/p/q.class", "/packages/p"] {
        let first = image.find(path).unwrap().expect(path);
        let second = image.find(path).unwrap().expect(path);
        assert!(Arc::ptr_eq(&first, &second), "distinct nodes for {path}");
    }
}

#[test]
fn concurrent_lookups_share_one_node_per_path() {
    init_logging();
    let dir = basic_image();
    let image = Arc::new(ImageFs::open(dir.path(), false).unwrap());

    let mut found: Vec<Arc<Node>> = Vec::new();
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let image = Arc::clone(&image);
                scope.spawn(move || {
                    image
                        .find("/modules/A/p/q.class")
                        .unwrap()
                        .expect("resource present")
                })
            })
            .collect();
        for handle in handles {
            found.push(handle.join().unwrap());
        }
    });
    for node in &found {
        assert!(Arc::ptr_eq(node, &found[0]));
    }
}

#[test]
fn directory_listing_is_memoized() {
    init_logging();
    let dir = basic_image();
    let image = ImageFs::open(dir.path(), false).unwrap();

    let first = names(&image, "/modules/A");
    let second = names(&image, "/modules/A");
    assert_eq!(first, second);
}

// =============================================================================
// Namespace projection
// =============================================================================

#[test]
fn root_has_exactly_modules_and_packages() {
    init_logging();
    let dir = basic_image();
    let image = ImageFs::open(dir.path(), false).unwrap();

    assert_eq!(names(&image, "/"), vec!["/modules", "/packages"]);
    assert_eq!(names(&image, "/modules"), vec!["/modules/A", "/modules/B"]);
}

#[test]
fn module_listing_matches_disk_and_excludes_markers() {
    init_logging();
    let dir = basic_image();
    let image = ImageFs::open(dir.path(), false).unwrap();

    // _the.A is a real on-disk file but must never be observable.
    assert_eq!(names(&image, "/modules/A"), vec!["/modules/A/p"]);
    assert_eq!(names(&image, "/modules/A/p"), vec!["/modules/A/p/q.class"]);
    assert!(image.find("/modules/A/_the.A").unwrap().is_none());
}

#[test]
fn packages_cross_reference_modules() {
    init_logging();
    let dir = basic_image();
    let image = ImageFs::open(dir.path(), false).unwrap();

    assert_eq!(names(&image, "/packages"), vec!["/packages/p"]);
    assert_eq!(
        names(&image, "/packages/p"),
        vec!["/packages/p/A", "/packages/p/B"]
    );

    let link = image.find("/packages/p/A").unwrap().expect("link present");
    assert!(link.is_link());
    let module = image.find("/modules/A").unwrap().expect("module present");
    assert!(Arc::ptr_eq(&resolve_link(&link, false), &module));
}

#[test]
fn nested_directories_become_dotted_packages() {
    init_logging();
    let dir = tempdir().unwrap();
    write_file(dir.path(), "M/a/b/c/T.class", b"t");
    let image = ImageFs::open(dir.path(), false).unwrap();

    assert_eq!(
        names(&image, "/packages"),
        vec!["/packages/a", "/packages/a.b", "/packages/a.b.c"]
    );
}

#[test]
fn resource_nodes_carry_size_and_content() {
    init_logging();
    let dir = basic_image();
    let image = ImageFs::open(dir.path(), false).unwrap();

    let node = image
        .find("/modules/A/p/q.class")
        .unwrap()
        .expect("resource present");
    assert!(node.is_resource());
    assert_eq!(node.size(), b"contents of q".len() as u64);
    assert_eq!(image.read(&node).unwrap().as_ref(), b"contents of q");
}

// =============================================================================
// Path validation
// =============================================================================

#[test]
fn malformed_paths_are_absent_not_errors() {
    init_logging();
    let dir = basic_image();
    let image = ImageFs::open(dir.path(), false).unwrap();

    for path in [
        "",
        "/modules/",
        "/modules//x",
        "/modules/../x",
        "/modules/A/",
        "/modules/A/./q",
        "/modules/A/p/..",
        "/packages/nope",
        "/packages/p/C",
        "/nowhere",
    ] {
        assert!(
            image.find(path).unwrap().is_none(),
            "expected absence for {path:?}"
        );
    }
}

// =============================================================================
// Preview overlay
// =============================================================================

#[test]
fn preview_shadows_and_augments_primary_resources() {
    init_logging();
    let dir = preview_image();
    let image = ImageFs::open(dir.path(), true).unwrap();

    assert_eq!(
        names(&image, "/modules/A/x"),
        vec!["/modules/A/x/Y.class", "/modules/A/x/Z.class"]
    );

    let y = image.find("/modules/A/x/Y.class").unwrap().unwrap();
    assert_eq!(image.read(&y).unwrap().as_ref(), b"preview Y");
    let z = image.find("/modules/A/x/Z.class").unwrap().unwrap();
    assert_eq!(image.read(&z).unwrap().as_ref(), b"preview Z");
}

#[test]
fn preview_disabled_serves_primary_only() {
    init_logging();
    let dir = preview_image();
    let image = ImageFs::open(dir.path(), false).unwrap();

    assert_eq!(names(&image, "/modules/A/x"), vec!["/modules/A/x/Y.class"]);

    let y = image.find("/modules/A/x/Y.class").unwrap().unwrap();
    assert_eq!(image.read(&y).unwrap().as_ref(), b"primary Y");
    assert!(image.find("/modules/A/x/Z.class").unwrap().is_none());
}

#[test]
fn preview_root_is_never_directly_resolvable() {
    init_logging();
    let dir = preview_image();

    for preview in [false, true] {
        let image = ImageFs::open(dir.path(), preview).unwrap();
        assert!(image.find("/modules/A/_preview").unwrap().is_none());
        assert!(image
            .find("/modules/A/_preview/x/Y.class")
            .unwrap()
            .is_none());
        assert!(!names(&image, "/modules/A").contains(&"/modules/A/_preview".to_string()));
    }
}

#[test]
fn primary_directory_wins_and_preview_merges_into_it() {
    init_logging();
    let dir = tempdir().unwrap();
    // Primary directory and preview directory collide at x.
    write_file(dir.path(), "A/x/P.class", b"p");
    write_file(dir.path(), "A/_preview/x/Q.class", b"q");
    let image = ImageFs::open(dir.path(), true).unwrap();

    let x = image.find("/modules/A/x").unwrap().expect("dir present");
    assert!(x.is_directory());
    assert_eq!(
        image.child_names(&x).unwrap(),
        vec!["/modules/A/x/P.class", "/modules/A/x/Q.class"]
    );
}

#[test]
fn preview_only_directories_resolve_and_list() {
    init_logging();
    let dir = tempdir().unwrap();
    mkdir(dir.path(), "A/keep");
    write_file(dir.path(), "A/_preview/only/W.class", b"w");
    let image = ImageFs::open(dir.path(), true).unwrap();

    let only = image.find("/modules/A/only").unwrap().expect("preview-only dir");
    assert!(only.is_directory());
    assert_eq!(image.child_names(&only).unwrap(), vec!["/modules/A/only/W.class"]);
    assert!(names(&image, "/modules/A").contains(&"/modules/A/only".to_string()));
}

#[test]
fn primary_file_wins_over_preview_directory() {
    init_logging();
    let dir = tempdir().unwrap();
    // The primary tree has a regular file where the overlay has a directory.
    write_file(dir.path(), "A/f", b"primary f");
    write_file(dir.path(), "A/_preview/f/inner.class", b"inner");
    let image = ImageFs::open(dir.path(), true).unwrap();

    let f = image.find("/modules/A/f").unwrap().expect("file present");
    assert!(f.is_resource());
    assert_eq!(image.read(&f).unwrap().as_ref(), b"primary f");
    assert_eq!(names(&image, "/modules/A"), vec!["/modules/A/f"]);

    // Below a regular file there is nothing, in either tree.
    assert!(image.find("/modules/A/f/nothing").unwrap().is_none());
}

#[test]
fn preview_only_packages_are_indexed_with_preview_enabled() {
    init_logging();
    let dir = tempdir().unwrap();
    write_file(dir.path(), "A/p/q.class", b"q");
    write_file(dir.path(), "A/_preview/pv/N.class", b"n");

    let with_preview = ImageFs::open(dir.path(), true).unwrap();
    assert_eq!(
        names(&with_preview, "/packages"),
        vec!["/packages/p", "/packages/pv"]
    );

    let without = ImageFs::open(dir.path(), false).unwrap();
    assert_eq!(names(&without, "/packages"), vec!["/packages/p"]);
}

// =============================================================================
// Backing-store failures
// =============================================================================

/// Backing store that fails listing or reading selected paths exactly once,
/// then behaves like the real filesystem again.
struct FlakySource {
    inner: StdAttrSource,
    fail_list: Mutex<HashSet<PathBuf>>,
    fail_read: Mutex<HashSet<PathBuf>>,
}

impl FlakySource {
    fn new() -> Arc<Self> {
        Arc::new(FlakySource {
            inner: StdAttrSource,
            fail_list: Mutex::new(HashSet::new()),
            fail_read: Mutex::new(HashSet::new()),
        })
    }

    fn fail_list_once(&self, path: PathBuf) {
        self.fail_list.lock().unwrap().insert(path);
    }

    fn fail_read_once(&self, path: PathBuf) {
        self.fail_read.lock().unwrap().insert(path);
    }
}

impl AttrSource for FlakySource {
    fn attrs(&self, path: &Path) -> io::Result<Option<Attrs>> {
        self.inner.attrs(path)
    }

    fn list(&self, path: &Path) -> io::Result<Vec<String>> {
        if self.fail_list.lock().unwrap().remove(path) {
            return Err(io::Error::other("injected listing failure"));
        }
        self.inner.list(path)
    }

    fn read_all(&self, path: &Path) -> io::Result<Bytes> {
        if self.fail_read.lock().unwrap().remove(path) {
            return Err(io::Error::other("injected read failure"));
        }
        self.inner.read_all(path)
    }
}

#[test]
fn listing_failure_carries_path_and_does_not_poison_the_directory() {
    init_logging();
    let dir = basic_image();
    let source = FlakySource::new();
    let image = ImageFs::open_with(dir.path(), false, source.clone()).unwrap();

    let p = image.find("/modules/A/p").unwrap().expect("dir present");
    let on_disk = dir.path().join("A").join("p");
    source.fail_list_once(on_disk.clone());

    match image.child_names(&p) {
        Err(Error::Io { path, .. }) => assert_eq!(path, on_disk),
        other => panic!("expected i/o error, got {other:?}"),
    }

    // The child-list cell was left unset; the next call completes normally.
    assert_eq!(image.child_names(&p).unwrap(), vec!["/modules/A/p/q.class"]);

    // Node identity survives the failed listing.
    let again = image.find("/modules/A/p").unwrap().unwrap();
    assert!(Arc::ptr_eq(&again, &p));
}

#[test]
fn read_failure_carries_path_and_does_not_poison_the_node() {
    init_logging();
    let dir = basic_image();
    let source = FlakySource::new();
    let image = ImageFs::open_with(dir.path(), false, source.clone()).unwrap();

    let q = image
        .find("/modules/A/p/q.class")
        .unwrap()
        .expect("resource present");
    let on_disk = dir.path().join("A").join("p").join("q.class");
    source.fail_read_once(on_disk.clone());

    match image.read(&q) {
        Err(Error::Io { path, .. }) => assert_eq!(path, on_disk),
        other => panic!("expected i/o error, got {other:?}"),
    }

    assert_eq!(image.read(&q).unwrap().as_ref(), b"contents of q");
}

// =============================================================================
// Error taxonomy and lifecycle
// =============================================================================

#[test]
fn kind_mismatches_are_typed_errors() {
    init_logging();
    let dir = basic_image();
    let image = ImageFs::open(dir.path(), false).unwrap();

    let resource = image.find("/modules/A/p/q.class").unwrap().unwrap();
    assert!(matches!(
        image.child_names(&resource),
        Err(Error::NotADirectory(_))
    ));

    let directory = image.find("/modules/A").unwrap().unwrap();
    assert!(matches!(image.read(&directory), Err(Error::NotAResource(_))));

    let link = image.find("/packages/p/A").unwrap().unwrap();
    assert!(matches!(image.read(&link), Err(Error::NotAResource(_))));
    assert!(matches!(
        image.child_names(&link),
        Err(Error::NotADirectory(_))
    ));
}

#[test]
fn close_is_idempotent_and_ends_lookups() {
    init_logging();
    let dir = basic_image();
    let image = ImageFs::open(dir.path(), false).unwrap();

    assert!(image.find("/modules/A").unwrap().is_some());
    image.close();
    image.close();
    assert!(image.find("/modules/A").unwrap().is_none());
    assert!(image.find("/").unwrap().is_none());
}

#[test]
fn empty_image_still_projects_both_namespaces() {
    init_logging();
    let dir = tempdir().unwrap();
    let image = ImageFs::open(dir.path(), false).unwrap();

    assert_eq!(names(&image, "/"), vec!["/modules", "/packages"]);
    assert!(names(&image, "/modules").is_empty());
    assert!(names(&image, "/packages").is_empty());
}
