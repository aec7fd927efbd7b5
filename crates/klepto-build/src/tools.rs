use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Resolve every required executable, failing on the first one that is not found.
///
/// `search_path` has the same syntax as `PATH`; `None` uses the process `PATH`.
pub fn locate_all<S: AsRef<str>>(
    names: &[S],
    search_path: Option<&OsString>,
    cwd: &Path,
) -> Result<Vec<PathBuf>> {
    let mut found = Vec::with_capacity(names.len());
    for name in names {
        let name = name.as_ref();
        let resolved = match search_path {
            Some(paths) => which::which_in(name, Some(paths), cwd),
            None => which::which(name),
        };
        match resolved {
            Ok(path) => {
                tracing::debug!(tool = name, path = %path.display(), "found tool");
                found.push(path);
            }
            Err(_) => return Err(Error::prerequisite(format!("Could not find {name}"))),
        }
    }
    Ok(found)
}
