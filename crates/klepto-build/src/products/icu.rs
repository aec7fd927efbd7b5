use crate::error::{Error, Result};
use crate::executor::ExecCtx;
use crate::products::util;
use crate::products::{BuildRequest, Product};

/// Only these folders are needed to link against ICU; headers are unused.
pub const STAGED_FOLDERS: [&str; 2] = ["lib", "stubdata"];

/// Shared objects and build leftovers never make it into the install tree.
pub const IGNORED_FILES: [&str; 6] = ["*.so.*", "*.so", "*.ao", "*.o", "*.d", "Makefile"];

pub struct IcuProduct;

impl Product for IcuProduct {
    fn name(&self) -> &'static str {
        "icu"
    }

    fn install_subpath(&self) -> &'static str {
        "icu"
    }

    // TODO: build libicuuc with devkitA64 here instead of requiring a prebuilt checkout.
    fn build(&self, req: &BuildRequest, ctx: &mut ExecCtx) -> Result<()> {
        if !req.icu_dir.is_dir() {
            return Err(Error::prerequisite(format!(
                "libicuuc not found, please build it with devkitA64 + libnx and place it at {}",
                req.icu_dir.display()
            )));
        }

        let ignore = util::compile_patterns(&IGNORED_FILES)?;
        for folder in STAGED_FOLDERS {
            let copied = util::copy_tree(
                &req.icu_dir.join(folder),
                &req.destination.join(folder),
                &ignore,
            )?;
            ctx.log(&format!("staged {copied} files from {folder}"));
        }
        Ok(())
    }
}
