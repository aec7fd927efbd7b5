use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};
use crate::executor::{ExecCtx, command_in};
use crate::flags;
use crate::products::util;
use crate::products::{BuildRequest, Product};

const EXTRA_CFLAGS: [&str; 2] = ["-DDISPATCH_USE_OS_DEBUG_LOG", "-U__linux__"];

pub struct LibdispatchProduct;

pub fn build_dir(req: &BuildRequest) -> PathBuf {
    req.layout.build_dir.join("libdispatch")
}

/// clang and clang++ from the toolchain installed at `toolchain_dir`.
pub fn toolchain_compilers(toolchain_dir: &Path) -> (PathBuf, PathBuf) {
    let bin = toolchain_dir.join("usr").join("bin");
    (bin.join("clang"), bin.join("clang++"))
}

pub fn cmake_command(req: &BuildRequest, cflags: &[String]) -> Command {
    let (clang, clangpp) = toolchain_compilers(&req.destination);
    let joined = cflags.join(" ");
    let mut cmd = command_in("cmake", &build_dir(req));
    cmd.arg("-G")
        .arg("Ninja")
        .arg(&req.layout.libdispatch_dir)
        .arg(format!("-DCMAKE_C_COMPILER={}", clang.display()))
        .arg(format!("-DCMAKE_CXX_COMPILER={}", clangpp.display()))
        .arg("-DBUILD_SHARED_LIBS:BOOL=NO")
        .arg(format!("-DCMAKE_C_FLAGS={joined}"))
        .arg(format!("-DCMAKE_CXX_FLAGS={joined}"));
    cmd
}

pub fn ninja_command(req: &BuildRequest) -> Command {
    let mut cmd = command_in("ninja", &build_dir(req));
    cmd.arg("-v");
    cmd
}

impl Product for LibdispatchProduct {
    fn name(&self) -> &'static str {
        "libdispatch"
    }

    // Installed alongside the swift toolchain.
    fn install_subpath(&self) -> &'static str {
        "toolchain"
    }

    fn build(&self, req: &BuildRequest, ctx: &mut ExecCtx) -> Result<()> {
        let (clang, clangpp) = toolchain_compilers(&req.destination);
        for compiler in [&clang, &clangpp] {
            if !compiler.exists() {
                return Err(Error::prerequisite(format!(
                    "{} not found, build the toolchain first (--only-toolchain)",
                    compiler.display()
                )));
            }
        }

        util::ensure_dir(&build_dir(req))?;

        let mut cflags = flags::clang_cflags(ctx, &req.devkitpro)?;
        cflags.extend(EXTRA_CFLAGS.iter().map(|s| s.to_string()));

        ctx.run_cmd(cmake_command(req, &cflags))
            .map_err(|e| Error::process(format!("Could not configure libdispatch: {e}")))?;
        ctx.run_cmd(ninja_command(req))
            .map_err(|e| Error::process(format!("Could not build libdispatch: {e}")))
    }
}
