use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::executor::ExecCtx;
use crate::workspace::SourceLayout;

pub mod frontend;
pub mod icu;
pub mod libdispatch;
pub mod swiftpm;
pub mod toolchain;
pub mod util;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Configuration {
    #[default]
    Release,
    Debug,
}

impl Configuration {
    pub fn as_str(self) -> &'static str {
        match self {
            Configuration::Release => "release",
            Configuration::Debug => "debug",
        }
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a builder needs to know about one invocation.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// The product's own directory inside the install tree.
    pub destination: PathBuf,
    pub configuration: Configuration,
    pub devkitpro: PathBuf,
    pub icu_dir: PathBuf,
    pub layout: SourceLayout,
    pub version_tag: String,
    pub reconfigure: bool,
}

pub trait Product {
    fn name(&self) -> &'static str;
    /// Directory under the install root this product writes to. Products may share one.
    fn install_subpath(&self) -> &'static str;
    fn build(&self, req: &BuildRequest, ctx: &mut ExecCtx) -> Result<()>;
}

/// All products, in build order.
pub fn registry() -> Vec<Box<dyn Product>> {
    vec![
        Box::new(icu::IcuProduct),
        Box::new(toolchain::ToolchainProduct),
        // Compiled with the toolchain's clang, so it has to come after it.
        Box::new(libdispatch::LibdispatchProduct),
        Box::new(swiftpm::SwiftpmProduct),
        Box::new(frontend::FrontendProduct),
    ]
}

/// Keep the products named in `only`, preserving registry order. An empty set keeps all.
pub fn select(
    registry: Vec<Box<dyn Product>>,
    only: &BTreeSet<String>,
) -> Result<Vec<Box<dyn Product>>> {
    if let Some(unknown) = only
        .iter()
        .find(|n| !registry.iter().any(|p| p.name() == n.as_str()))
    {
        let known: Vec<&str> = registry.iter().map(|p| p.name()).collect();
        return Err(Error::usage(format!(
            "unknown product '{}' (known: {})",
            unknown,
            known.join(", ")
        )));
    }
    if only.is_empty() {
        return Ok(registry);
    }
    Ok(registry
        .into_iter()
        .filter(|p| only.contains(p.name()))
        .collect())
}
