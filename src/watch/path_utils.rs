// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.

use std::path::Path;

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// - First we try a direct `strip_prefix(root)`.
/// - If that fails (e.g. due to symlinks or different absolute prefixes),
///   we canonicalize both paths and try again.
/// - Only if both attempts fail do we give up.
///
/// Returns `None` if the path cannot be reasonably related to `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        let s = rel.to_string_lossy().replace('\\', "/");
        return Some(s);
    }

    // macOS reports /private/var/... for /var/... and similar.
    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            let s = rel.to_string_lossy().replace('\\', "/");
            return Some(s);
        }
    }

    None
}

/// Extension of the final path element *including* the leading dot.
///
/// Everything from the last `.` of the file name is the extension, so
/// `main.go` → `.go`, `go.sum` → `.sum`, `.env` → `.env`, `Makefile` → none.
pub fn dotted_extension(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    let idx = name.rfind('.')?;
    Some(&name[idx..])
}

/// Fragment-containment exclusion rule.
///
/// A path is excluded when its string form contains any fragment *anywhere*,
/// not only as a whole component: `vendor` also matches `./vendored/x` and
/// `/home/vendor-tools/project`. Kept as-is for compatibility.
pub fn is_excluded(path: &Path, fragments: &[String]) -> bool {
    let s = path.to_string_lossy();
    fragments.iter().any(|frag| s.contains(frag.as_str()))
}
