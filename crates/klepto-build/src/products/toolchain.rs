use std::process::Command;

use crate::error::{Error, Result};
use crate::executor::{ExecCtx, command_in};
use crate::products::{BuildRequest, Configuration, Product};

pub struct ToolchainProduct;

pub fn preset(configuration: Configuration) -> &'static str {
    match configuration {
        Configuration::Release => "libnx_release",
        Configuration::Debug => "libnx_debug",
    }
}

pub fn build_script_command(req: &BuildRequest) -> Command {
    let script = req.layout.swift_dir.join("utils").join("build-script");
    let mut cmd = command_in("python3", &req.layout.root);
    cmd.arg(script)
        // LLVM and clang link steps eat several GB of RAM each.
        .arg("-j1")
        .arg(format!("--preset={}", preset(req.configuration)))
        .arg(format!("devkitpro_path={}", req.devkitpro.display()))
        .arg(format!("install_destdir={}", req.destination.display()))
        .arg(format!("libnx_icu_path={}", req.icu_dir.display()))
        .arg(format!("versions_str=klepto-toolchain-{}", req.version_tag));
    cmd
}

impl Product for ToolchainProduct {
    fn name(&self) -> &'static str {
        "toolchain"
    }

    fn install_subpath(&self) -> &'static str {
        "toolchain"
    }

    // The build-script preset always reconfigures; `reconfigure` has no effect here.
    fn build(&self, req: &BuildRequest, ctx: &mut ExecCtx) -> Result<()> {
        let preset = preset(req.configuration);
        ctx.run_cmd(build_script_command(req)).map_err(|e| {
            tracing::debug!("build-script error: {e}");
            Error::process(format!("Failed to build toolchain with preset {preset}"))
        })
    }
}
