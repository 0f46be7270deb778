// SPDX-License-Identifier: Apache-2.0

//! `top.v` + idx -> `top_00.v`, preserving any leading path.

use std::path::{Path, PathBuf};

/// Returns `<stem>_NN<ext>` next to `base`. `digits` controls the zero
/// padding; indices wider than `digits` keep all their digits.
pub fn make_numbered(base: &Path, idx: u32, digits: usize) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = base
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let name = format!("{}_{:0width$}{}", stem, idx, ext, width = digits);
    match base.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(name),
        _ => PathBuf::from(name),
    }
}
