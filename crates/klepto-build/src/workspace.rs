use std::path::{Component, Path, PathBuf};

use crate::config::SourcesConfig;
use crate::error::{Error, Result};

/// Absolute locations of every checkout the build reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLayout {
    pub root: PathBuf,
    pub swift_dir: PathBuf,
    pub swiftpm_dir: PathBuf,
    pub icu_dir: PathBuf,
    pub frontend_dir: PathBuf,
    pub libdispatch_dir: PathBuf,
    pub build_dir: PathBuf,
}

impl SourceLayout {
    pub fn resolve(root: &Path, cfg: &SourcesConfig) -> Result<Self> {
        let root = absolute(root)?;
        Ok(Self {
            swift_dir: resolve_user_dir(&root, &cfg.swift)?,
            swiftpm_dir: resolve_user_dir(&root, &cfg.swiftpm)?,
            icu_dir: resolve_user_dir(&root, &cfg.icu)?,
            frontend_dir: resolve_user_dir(&root, &cfg.frontend)?,
            libdispatch_dir: resolve_user_dir(&root, &cfg.libdispatch)?,
            build_dir: resolve_user_dir(&root, &cfg.build_dir)?,
            root,
        })
    }

    pub fn cmakelists(&self) -> PathBuf {
        self.swift_dir.join("CMakeLists.txt")
    }

    /// Resolve a configured output path (e.g. `[dist].dir`) against the source root.
    pub fn resolve_output(&self, raw: &Path) -> PathBuf {
        if raw.is_absolute() {
            raw.to_path_buf()
        } else {
            self.root.join(raw)
        }
    }
}

pub fn absolute(p: &Path) -> Result<PathBuf> {
    if p.is_absolute() {
        return Ok(p.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| Error::io(format!("cwd error: {e}")))?;
    Ok(cwd.join(p))
}

fn resolve_user_dir(root: &Path, p: &str) -> Result<PathBuf> {
    let p = p.trim();
    if p.is_empty() {
        return Err(Error::parse("empty source directory name"));
    }
    let pb = PathBuf::from(p);
    if pb.is_absolute() {
        return Ok(pb);
    }
    if pb.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(Error::parse(format!(
            "invalid source directory '{}' (contains '..')",
            p
        )));
    }
    Ok(root.join(pb))
}
