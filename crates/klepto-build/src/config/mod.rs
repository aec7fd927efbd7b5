use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use toml::Value;

use crate::error::{Error, Result};

/// Name of the config file picked up from the source root when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "klepto-build.toml";

const KNOWN_TABLES: [&str; 3] = ["sources", "tools", "dist"];

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct BuildConfig {
    pub sources: SourcesConfig,
    pub tools: ToolsConfig,
    pub dist: DistConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SourcesConfig {
    pub root: Option<String>,
    pub swift: String,
    pub swiftpm: String,
    pub icu: String,
    pub frontend: String,
    pub libdispatch: String,
    pub build_dir: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            root: None,
            swift: "swift".into(),
            swiftpm: "klepto-swiftpm".into(),
            icu: "libicuuc-libnx".into(),
            frontend: "klepto-frontend".into(),
            libdispatch: "klepto-libdispatch".into(),
            build_dir: "build".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolsConfig {
    pub required: Vec<String>,
    /// Package database front-ends, tried in order.
    pub package_queries: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            required: ["clang", "clang++", "swift", "python3", "cmake"]
                .into_iter()
                .map(String::from)
                .collect(),
            package_queries: vec!["dkp-pacman".into(), "pacman".into()],
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DistConfig {
    pub product: String,
    pub dir: String,
    pub platform: Option<String>,
}

impl Default for DistConfig {
    fn default() -> Self {
        Self {
            product: "klepto".into(),
            dir: "dist".into(),
            platform: None,
        }
    }
}

fn merge_values(base: &mut Value, child: Value) {
    match (base, child) {
        (Value::Table(base_tbl), Value::Table(child_tbl)) => {
            for (k, v) in child_tbl {
                match base_tbl.get_mut(&k) {
                    Some(existing) => merge_values(existing, v),
                    None => {
                        base_tbl.insert(k, v);
                    }
                }
            }
        }
        (base_slot, child_val) => {
            *base_slot = child_val;
        }
    }
}

fn resolve_ref_path(from_file: &Path, reference: &str) -> PathBuf {
    let p = PathBuf::from(reference);
    if p.is_absolute() {
        p
    } else {
        from_file.parent().unwrap_or_else(|| Path::new(".")).join(p)
    }
}

fn load_value_inner(path: &Path, stack: &mut HashSet<PathBuf>) -> Result<Value> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !stack.insert(canonical.clone()) {
        return Err(Error::parse(format!(
            "config extends cycle detected at {}",
            canonical.display()
        )));
    }

    let data = fs::read_to_string(path)
        .map_err(|e| Error::io(format!("failed to read config {}: {e}", path.display())))?;
    let mut value: Value = toml::from_str(&data)
        .map_err(|e| Error::parse(format!("TOML parse error in {}: {e}", path.display())))?;

    let mut out = Value::Table(Default::default());
    if let Some(parent) = value.get("extends").and_then(Value::as_str) {
        out = load_value_inner(&resolve_ref_path(path, parent), stack)?;
    }
    if let Some(tbl) = value.as_table_mut() {
        tbl.remove("extends");
    }
    merge_values(&mut out, value);

    stack.remove(&canonical);
    Ok(out)
}

pub fn from_value(path: &Path, value: Value) -> Result<BuildConfig> {
    if let Some(tbl) = value.as_table() {
        for key in tbl.keys() {
            if !KNOWN_TABLES.contains(&key.as_str()) {
                return Err(Error::parse(format!(
                    "config key '{}' in {} is not supported; use {}",
                    key,
                    path.display(),
                    KNOWN_TABLES.join(", ")
                )));
            }
        }
    }
    value
        .try_into()
        .map_err(|e| Error::parse(format!("invalid config {}: {e}", path.display())))
}

pub fn load(path: &Path) -> Result<BuildConfig> {
    let mut stack = HashSet::<PathBuf>::new();
    let value = load_value_inner(path, &mut stack)?;
    from_value(path, value)
}

/// Load an explicit config file, or the default one under `root` if it exists.
pub fn load_or_default(explicit: Option<&Path>, root: &Path) -> Result<BuildConfig> {
    if let Some(path) = explicit {
        return load(path);
    }
    let candidate = root.join(DEFAULT_CONFIG_FILE);
    if candidate.is_file() {
        tracing::debug!(path = %candidate.display(), "loading default config");
        return load(&candidate);
    }
    Ok(BuildConfig::default())
}
