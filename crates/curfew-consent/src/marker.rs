//! Acceptance marker files
//!
//! A marker holds exactly the accepted hash. Surrounding whitespace is
//! ignored on read so hand-edited markers still match.

use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

use crate::{ConsentError, ConsentResult};

/// Read the stored hash, or `None` when no marker exists yet
pub fn read_marker(path: &Path) -> ConsentResult<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content.trim().to_string())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ConsentError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Persist `hash` as the accepted version
pub fn write_marker(path: &Path, hash: &str) -> ConsentResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|source| ConsentError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    std::fs::write(path, hash).map_err(|source| ConsentError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(path = %path.display(), hash, "Acceptance marker written");
    Ok(())
}
