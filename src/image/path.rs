//! Namespace path validation and on-disk resolution.
//!
//! Namespace paths always use `/` as the separator, independent of the host
//! filesystem. Only `/modules/...` paths are ever resolved against disk;
//! `/packages/...` entries are served straight from the cache built at
//! construction time. Validation never fails with an error: a malformed path
//! is simply absent.

use std::path::{Path, PathBuf};

use crate::attr::{AttrSource, Attrs};
use crate::error::{Error, Result};

/// Prefix tagging construction-time marker files. Marker files exist on disk
/// but are never listed and never resolvable.
pub const MARKER_PREFIX: &str = "_the.";

/// Reserved directory under each module root holding the preview overlay
/// subtree. Never directly resolvable; its contents surface only through the
/// overlay merge.
pub const PREVIEW_ROOT: &str = "_preview";

/// Delimiter of canonical package names (`a/b/c` on disk is package `a.b.c`).
pub const PACKAGE_DELIMITER: char = '.';

const MODULES_PREFIX: &str = "/modules/";

/// A validated namespace path below a module root: `/modules/<module>/<rest>`
/// with at least one `rest` segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModulePath<'a> {
    pub module: &'a str,
    pub rest: Vec<&'a str>,
}

impl ModulePath<'_> {
    /// Whether the path points into the reserved preview subtree.
    pub fn in_preview(&self) -> bool {
        self.rest.first() == Some(&PREVIEW_ROOT)
    }

    /// Name of the addressed entry (final segment).
    pub fn leaf(&self) -> &str {
        self.rest.last().copied().unwrap_or(self.module)
    }
}

fn valid_segment(seg: &str) -> bool {
    !seg.is_empty() && seg != "." && seg != ".."
}

/// Parse `/modules/<module>(/<segment>)+`. Anything else — `/modules` alone,
/// a trailing slash, an empty, `.` or `..` segment — is `None`.
pub fn parse_module_path(path: &str) -> Option<ModulePath<'_>> {
    let tail = path.strip_prefix(MODULES_PREFIX)?;
    let mut segments = tail.split('/');
    let module = segments.next().filter(|s| valid_segment(s))?;
    let rest: Vec<&str> = segments.collect();
    if rest.is_empty() || !rest.iter().all(|s| valid_segment(s)) {
        return None;
    }
    Some(ModulePath { module, rest })
}

/// Split any `/modules/...` path (module root included) into module name and
/// rest segments, without the below-root arity requirement. Used by the
/// directory completer, which also lists module roots.
pub fn split_modules_path(path: &str) -> Option<(&str, Vec<&str>)> {
    let tail = path.strip_prefix(MODULES_PREFIX)?;
    let mut segments = tail.split('/');
    let module = segments.next().filter(|s| valid_segment(s))?;
    let rest: Vec<&str> = segments.collect();
    if !rest.iter().all(|s| valid_segment(s)) {
        return None;
    }
    Some((module, rest))
}

pub fn is_marker(name: &str) -> bool {
    name.starts_with(MARKER_PREFIX)
}

/// On-disk location of a module-relative path in the primary tree.
pub fn primary_location(root: &Path, module: &str, rest: &[&str]) -> PathBuf {
    let mut p = root.join(module);
    for seg in rest {
        p.push(seg);
    }
    p
}

/// On-disk location of a module-relative path inside the preview overlay.
pub fn preview_location(root: &Path, module: &str, rest: &[&str]) -> PathBuf {
    let mut p = root.join(module);
    p.push(PREVIEW_ROOT);
    for seg in rest {
        p.push(seg);
    }
    p
}

/// Canonical package name for a directory at `segments` relative to a module
/// root. Preview-relative paths are remapped to their canonical package;
/// the preview root itself contributes no package.
pub fn package_for(segments: &[String]) -> Option<String> {
    let canonical: &[String] = if segments.first().map(String::as_str) == Some(PREVIEW_ROOT) {
        &segments[1..]
    } else {
        segments
    };
    if canonical.is_empty() {
        return None;
    }
    let mut name = String::new();
    for (i, seg) in canonical.iter().enumerate() {
        if i > 0 {
            name.push(PACKAGE_DELIMITER);
        }
        name.push_str(seg);
    }
    Some(name)
}

fn usable(attrs: &Attrs) -> bool {
    attrs.is_dir || attrs.is_file
}

/// Apply the overlay precedence rules to a validated module path and return
/// the winning on-disk location plus its attribute snapshot, or `None` for
/// absence. Precedence:
///
/// 1. a primary directory always wins (the overlay never shadows it);
/// 2. with preview enabled, an overlay file beats a primary file, and an
///    overlay directory stands in where the primary has no entry at all;
/// 3. a primary file;
/// 4. absence.
///
/// Paths into the preview root and marker files are absent in every mode.
pub fn locate(
    source: &dyn AttrSource,
    root: &Path,
    preview: bool,
    mp: &ModulePath<'_>,
) -> Result<Option<(PathBuf, Attrs)>> {
    if mp.in_preview() {
        return Ok(None);
    }

    let primary = primary_location(root, mp.module, &mp.rest);
    let primary_attrs = source
        .attrs(&primary)
        .map_err(|e| Error::io(&primary, e))?
        .filter(usable);

    let chosen = match primary_attrs {
        Some(a) if a.is_dir => Some((primary, a)),
        primary_file => {
            let from_preview = if preview {
                let shadow = preview_location(root, mp.module, &mp.rest);
                source
                    .attrs(&shadow)
                    .map_err(|e| Error::io(&shadow, e))?
                    .filter(usable)
                    // The overlay shadows resource files with resource files
                    // only; an overlay directory surfaces solely where the
                    // primary tree has no entry at this path.
                    .filter(|a| a.is_file || primary_file.is_none())
                    .map(|a| (shadow, a))
            } else {
                None
            };
            from_preview.or_else(|| primary_file.map(|a| (primary, a)))
        }
    };

    match chosen {
        Some((_, a)) if a.is_file && is_marker(mp.leaf()) => Ok(None),
        other => Ok(other),
    }
}
