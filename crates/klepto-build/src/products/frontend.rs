use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::executor::ExecCtx;
use crate::products::util;
use crate::products::{BuildRequest, Product};

/// Name of the link created next to the frontend directory.
pub const LINK_NAME: &str = "klepto";

/// Entry inside the installed frontend the link points at.
pub const ENTRY_NAME: &str = "klepto-frontend";

pub struct FrontendProduct;

/// Link target, relative to the directory holding the link.
pub fn link_target(destination: &Path) -> PathBuf {
    let dir_name = destination
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(ENTRY_NAME));
    dir_name.join(ENTRY_NAME)
}

impl Product for FrontendProduct {
    fn name(&self) -> &'static str {
        "frontend"
    }

    fn install_subpath(&self) -> &'static str {
        "klepto-frontend"
    }

    fn build(&self, req: &BuildRequest, ctx: &mut ExecCtx) -> Result<()> {
        let src = &req.layout.frontend_dir;
        if !src.is_dir() {
            return Err(Error::prerequisite(format!(
                "Did not find the frontend sources at {}",
                src.display()
            )));
        }
        let copied = util::copy_tree(src, &req.destination, &[])?;
        ctx.log(&format!("copied {copied} frontend files"));

        let Some(parent) = req.destination.parent() else {
            return Err(Error::msg(format!(
                "frontend destination {} has no parent directory",
                req.destination.display()
            )));
        };
        let link = parent.join(LINK_NAME);
        util::remove_existing(&link)?;
        let target = link_target(&req.destination);
        util::symlink(&target, &link)?;
        ctx.log(&format!("{} -> {}", link.display(), target.display()));
        Ok(())
    }
}
