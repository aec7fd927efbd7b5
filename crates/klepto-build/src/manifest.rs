use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::products::util;
use crate::versions::{REQUIRED_PACKAGES, ResolvedVersions, VersionMap};

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub versions: VersionMap,
}

impl Manifest {
    /// Keep only the packages the toolchain is built against, then add swift and klepto.
    pub fn from_resolved(resolved: &ResolvedVersions) -> Self {
        let mut versions: VersionMap = resolved
            .packages
            .iter()
            .filter(|(name, _)| REQUIRED_PACKAGES.contains(&name.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        versions.insert("swift".into(), resolved.swift.clone());
        versions.insert("klepto".into(), resolved.klepto.clone());
        Self { versions }
    }

    pub fn write(&self, install_dir: &Path) -> Result<PathBuf> {
        let path = install_dir.join(MANIFEST_FILE);
        util::write_text(&path, &serde_json::to_string(self)?)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::versions::parse_package_list;

    fn resolved() -> ResolvedVersions {
        ResolvedVersions {
            packages: parse_package_list("devkitA64 1.2.3\nlibnx 4.5.6\nfoo 9.9.9"),
            swift: "5.9".into(),
            klepto: "0.3.0".into(),
            using: "dkp-pacman".into(),
        }
    }

    #[test]
    fn unrelated_packages_are_dropped() {
        let manifest = Manifest::from_resolved(&resolved());
        let keys: Vec<&str> = manifest.versions.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["devkitA64", "klepto", "libnx", "swift"]);
    }

    #[test]
    fn written_as_single_level_json() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = Manifest::from_resolved(&resolved())
            .write(tmp.path())
            .expect("write");
        let raw = std::fs::read_to_string(path).expect("read");
        let v: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(v["versions"]["libnx"], "4.5.6");
        assert_eq!(v["versions"]["swift"], "5.9");
        assert!(v["versions"].get("foo").is_none());
    }
}
