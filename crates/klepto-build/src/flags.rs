use std::path::Path;
use std::process::Command;

use regex::Regex;

use crate::error::{Error, Result};
use crate::executor::ExecCtx;

/// Switches that make clang behave like devkitA64 targeting Horizon.
const TARGET_FLAGS_HEAD: [&str; 10] = [
    "-Wno-gnu-include-next",
    "-D__SWITCH__",
    "-D__DEVKITA64__",
    "-D__unix__",
    "-D__linux__",
    "-fPIE",
    "-nostdinc",
    "-nostdinc++",
    "-D_POSIX_C_SOURCE=200809",
    "-D_GNU_SOURCE",
];

const TARGET_FLAGS_TAIL: [&str; 7] = [
    "-mno-tls-direct-seg-refs",
    "-Qunused-arguments",
    "-Xclang",
    "-target-feature",
    "-Xclang",
    "+read-tp-soft",
    "-ftls-model=local-exec",
];

/// Pull the system include directories out of `gcc -E -Wp,-v` diagnostics.
///
/// The search list is printed one directory per line, indented by a space.
pub fn parse_include_paths(probe_output: &str) -> Vec<String> {
    let re = Regex::new(r"(?m)^\s+/(.*?)$").expect("static include path regex");
    re.captures_iter(probe_output)
        .filter_map(|c| c.get(1))
        .map(|m| format!("/{}", m.as_str().trim_end_matches('\r')))
        .collect()
}

pub fn gcc_path(devkitpro: &Path) -> std::path::PathBuf {
    devkitpro
        .join("devkitA64")
        .join("bin")
        .join("aarch64-none-elf-gcc")
}

/// Ask devkitA64's gcc for its C++ system include directories.
pub fn probe_include_paths(ctx: &ExecCtx, devkitpro: &Path) -> Result<Vec<String>> {
    let gcc = gcc_path(devkitpro);
    let mut cmd = Command::new(&gcc);
    cmd.args(["-xc++", "-E", "-Wp,-v", "-"]);
    let captured = ctx.capture(cmd)?;
    if !captured.success {
        return Err(Error::process(format!(
            "{} exited with {} while probing include paths",
            gcc.display(),
            captured
                .code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "a signal".into())
        )));
    }
    let paths = parse_include_paths(&captured.text);
    tracing::debug!(count = paths.len(), "probed devkitA64 include paths");
    Ok(paths)
}

/// Assemble the clang flags from probed include directories. Order is stable.
pub fn assemble_cflags(devkitpro: &Path, probed: &[String]) -> Vec<String> {
    let mut out: Vec<String> = TARGET_FLAGS_HEAD.iter().map(|s| s.to_string()).collect();
    // libnx headers come in through -isystem below.
    out.push(format!(
        "-I{}/portlibs/switch/include/",
        devkitpro.display()
    ));
    out.extend(TARGET_FLAGS_TAIL.iter().map(|s| s.to_string()));

    let libnx_include = devkitpro.join("libnx").join("include");
    out.extend(
        probed
            .iter()
            .cloned()
            .chain(std::iter::once(libnx_include.display().to_string()))
            .map(|p| format!("-isystem{p}")),
    );
    out
}

pub fn clang_cflags(ctx: &ExecCtx, devkitpro: &Path) -> Result<Vec<String>> {
    let probed = probe_include_paths(ctx, devkitpro)?;
    Ok(assemble_cflags(devkitpro, &probed))
}
