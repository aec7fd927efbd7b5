use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::process::Command;

use regex::Regex;

use crate::error::{Error, ErrorKind, Result};
use crate::executor::ExecCtx;

/// Package name -> installed version.
pub type VersionMap = BTreeMap<String, String>;

/// Packages the toolchain cannot be built without.
pub const REQUIRED_PACKAGES: [&str; 2] = ["devkitA64", "libnx"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersions {
    pub packages: VersionMap,
    pub swift: String,
    pub klepto: String,
    /// Package database front-end that answered the query.
    pub using: String,
}

impl ResolvedVersions {
    /// Label baked into the toolchain, e.g. `swift[5.9]+dkA64[r22-1]+lnx[4.4.0-1]`.
    pub fn version_tag(&self) -> String {
        let get = |k: &str| self.packages.get(k).map(String::as_str).unwrap_or("");
        format!(
            "swift[{}]+dkA64[{}]+lnx[{}]",
            self.swift,
            get("devkitA64"),
            get("libnx")
        )
    }
}

/// Parse `pacman -Qe` output: one `<name> <version>` entry per line.
pub fn parse_package_list(text: &str) -> VersionMap {
    text.lines()
        .filter_map(|line| {
            let (name, version) = line.trim().split_once(char::is_whitespace)?;
            Some((name.to_string(), version.trim().to_string()))
        })
        .collect()
}

/// Ask each package database front-end in turn; a missing executable moves on to the next.
pub fn query_packages<S: AsRef<str>>(ctx: &ExecCtx, frontends: &[S]) -> Result<(VersionMap, String)> {
    for frontend in frontends {
        let frontend = frontend.as_ref();
        let mut cmd = Command::new(frontend);
        cmd.arg("-Qe");
        let captured = match ctx.capture(cmd) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::ToolMissing => {
                tracing::debug!(frontend, "package database front-end not available");
                continue;
            }
            Err(e) => return Err(e),
        };
        if !captured.success {
            return Err(Error::process(format!(
                "{frontend} -Qe failed with exit code {}",
                captured
                    .code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "<signal>".into())
            )));
        }
        return Ok((parse_package_list(&captured.text), frontend.to_string()));
    }

    let names: Vec<&str> = frontends.iter().map(|f| f.as_ref()).collect();
    Err(Error::prerequisite(format!(
        "Could not find {} to determine installed devkitA64 and libnx versions",
        names.join(" or ")
    )))
}

pub fn require_packages(packages: &VersionMap, using: &str) -> Result<()> {
    for name in REQUIRED_PACKAGES {
        if !packages.contains_key(name) {
            return Err(Error::prerequisite(format!(
                "{name} does not seem to be installed (searched with {using})"
            )));
        }
    }
    Ok(())
}

/// Extract the value of `set(<name> "<value>")` from a CMake file.
pub fn parse_cmake_version(text: &str, name: &str) -> Option<String> {
    let re = Regex::new(&format!(r#"set\({}\s+"(.*?)"\)"#, regex::escape(name))).ok()?;
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Read `SWIFT_VERSION` and `KLEPTO_VERSION` from the swift checkout's CMakeLists.txt.
pub fn read_cmake_versions(cmakelists: &Path) -> Result<(String, String)> {
    if !cmakelists.is_file() {
        return Err(Error::prerequisite(format!(
            "Did not find swift source code at {}",
            cmakelists.display()
        )));
    }
    let text = fs::read_to_string(cmakelists)
        .map_err(|e| Error::io(format!("failed to read {}: {e}", cmakelists.display())))?;
    let get = |name: &str| {
        parse_cmake_version(&text, name).ok_or_else(|| {
            Error::parse(format!(
                "Unable to parse {name} from {}",
                cmakelists.display()
            ))
        })
    };
    Ok((get("SWIFT_VERSION")?, get("KLEPTO_VERSION")?))
}

pub fn resolve<S: AsRef<str>>(
    ctx: &ExecCtx,
    frontends: &[S],
    cmakelists: &Path,
) -> Result<ResolvedVersions> {
    let (packages, using) = query_packages(ctx, frontends)?;
    require_packages(&packages, &using)?;
    let (swift, klepto) = read_cmake_versions(cmakelists)?;
    tracing::info!(%swift, %klepto, %using, "resolved versions");
    Ok(ResolvedVersions {
        packages,
        swift,
        klepto,
        using,
    })
}
