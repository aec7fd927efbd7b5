use std::fs::File;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::error::{Error, Result};
use crate::products::util;

/// Write `<out_dir>/<dist_name>.tar.gz` holding `install_dir` under a `<dist_name>/` root.
pub fn write_archive(install_dir: &Path, out_dir: &Path, dist_name: &str) -> Result<PathBuf> {
    util::ensure_dir(out_dir)?;
    let path = out_dir.join(format!("{dist_name}.tar.gz"));

    let file = File::create(&path)
        .map_err(|e| Error::io(format!("failed to create {}: {e}", path.display())))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut archive = tar::Builder::new(encoder);
    // Keep symlinks (the frontend link) as links.
    archive.follow_symlinks(false);
    archive
        .append_dir_all(dist_name, install_dir)
        .map_err(|e| Error::io(format!("failed to archive {}: {e}", install_dir.display())))?;
    archive
        .into_inner()
        .and_then(|gz| gz.finish())
        .map_err(|e| Error::io(format!("failed to finish {}: {e}", path.display())))?;

    tracing::info!(archive = %path.display(), "wrote package");
    Ok(path)
}
