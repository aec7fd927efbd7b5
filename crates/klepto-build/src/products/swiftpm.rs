use std::process::Command;

use crate::error::{Error, Result};
use crate::executor::{ExecCtx, command_in};
use crate::products::{BuildRequest, Configuration, Product};

pub struct SwiftpmProduct;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapStep {
    Build,
    Install,
}

impl BootstrapStep {
    fn as_str(self) -> &'static str {
        match self {
            BootstrapStep::Build => "build",
            BootstrapStep::Install => "install",
        }
    }
}

pub fn bootstrap_command(req: &BuildRequest, step: BootstrapStep) -> Command {
    // TODO: build into <build_dir>/swiftpm once bootstrap accepts a build path override.
    let mut cmd = command_in("python3", &req.layout.swiftpm_dir);
    cmd.arg("Utilities/bootstrap")
        .arg(step.as_str())
        .arg("-v")
        .arg("--prefix")
        .arg(&req.destination);
    if req.reconfigure {
        cmd.arg("--reconfigure");
    }
    if req.configuration == Configuration::Release {
        cmd.arg("--release");
    }
    cmd
}

impl Product for SwiftpmProduct {
    fn name(&self) -> &'static str {
        "swiftpm"
    }

    fn install_subpath(&self) -> &'static str {
        "swiftpm"
    }

    fn build(&self, req: &BuildRequest, ctx: &mut ExecCtx) -> Result<()> {
        ctx.run_cmd(bootstrap_command(req, BootstrapStep::Build))
            .map_err(|e| Error::process(format!("Could not build swiftpm: {e}")))?;
        ctx.run_cmd(bootstrap_command(req, BootstrapStep::Install))
            .map_err(|e| Error::process(format!("Could not install swiftpm: {e}")))
    }
}
