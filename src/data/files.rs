use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::error::DataError;

/// Create `path` if it does not exist. Returns whether a directory was made.
///
/// Only the last component is created; the parent must already exist.
pub fn create_dir(path: &Path) -> Result<bool, DataError> {
    if path.exists() {
        return Ok(false);
    }
    fs::create_dir(path).map_err(|e| DataError::io(path, e))?;
    Ok(true)
}

/// Write `path` through a sibling `.part` file that is renamed into place once
/// `write` succeeds. On failure the partial file is removed.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<(), DataError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), DataError>,
{
    let tmp = part_path(path);
    let result = (|| {
        let file = File::create(&tmp).map_err(|e| DataError::io(&tmp, e))?;
        let mut out = BufWriter::new(file);
        write(&mut out)?;
        let file = out
            .into_inner()
            .map_err(|e| DataError::io(&tmp, e.into_error()))?;
        file.sync_all().map_err(|e| DataError::io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| DataError::io(path, e))
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn part_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.part"))
}
