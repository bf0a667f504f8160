pub mod chart;
pub mod dicom;
pub mod image_io;
pub mod loader;
pub mod map_writer;

use std::path::{Path, PathBuf};

use crate::error::Result;

/// Sibling path used while `path` is being written.
///
/// The extension is preserved so writers that pick their format from it
/// still work: `out/T2_map.dcm` becomes `out/.T2_map.partial.dcm`.
pub fn partial_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!(".{}.partial.{}", stem, ext.to_string_lossy()),
        None => format!(".{}.partial", stem),
    };
    path.with_file_name(name)
}

/// Run `write` against a temporary sibling of `path`, then move it into place.
///
/// On failure the temporary file is removed and `path` is left untouched.
pub fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    let tmp = partial_path(path);
    let result = write(&tmp).and_then(|()| std::fs::rename(&tmp, path).map_err(Into::into));
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}
