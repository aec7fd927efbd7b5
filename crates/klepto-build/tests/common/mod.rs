#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};

use klepto_build::config::BuildConfig;
use klepto_build::executor::{Captured, ExecCtx, ExecEvent, ExecSink, Runner, describe_command};
use klepto_build::orchestrator::{HostEnv, Options, Outcome};
use klepto_build::workspace::SourceLayout;
use klepto_build::{Error, Result};

pub const PROBE_OUTPUT: &str = "\
#include <...> search starts here:
 /opt/devkitpro/devkitA64/aarch64-none-elf/include/c++/13.2.0
 /opt/devkitpro/devkitA64/aarch64-none-elf/include
End of search list.
";

/// Answers captures from canned output and records every streamed command.
#[derive(Default)]
pub struct FakeRunner {
    /// Package front-end -> `-Qe` output. Front-ends not listed are "not installed".
    pub packages: BTreeMap<String, String>,
    /// Substring of a command line that makes `run` fail.
    pub fail_on: Option<String>,
    pub runs: Mutex<Vec<String>>,
    pub captures: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn with_packages(frontend: &str, listing: &str) -> Self {
        let mut packages = BTreeMap::new();
        packages.insert(frontend.to_string(), listing.to_string());
        Self {
            packages,
            ..Self::default()
        }
    }

    pub fn runs(&self) -> Vec<String> {
        self.runs.lock().expect("runs lock").clone()
    }

    pub fn captures(&self) -> Vec<String> {
        self.captures.lock().expect("captures lock").clone()
    }
}

impl Runner for FakeRunner {
    fn run(&self, cmd: Command, log: &mut dyn FnMut(&str)) -> Result<()> {
        let line = describe_command(&cmd);
        self.runs.lock().expect("runs lock").push(line.clone());
        log("fake output");
        if let Some(pat) = &self.fail_on
            && line.contains(pat.as_str())
        {
            return Err(Error::process(format!("{} failed: exit status: 1", line)));
        }
        // Pretend build-script installed a toolchain.
        for arg in cmd.get_args() {
            if let Some(dest) = arg.to_string_lossy().strip_prefix("install_destdir=") {
                let bin = Path::new(dest).join("usr").join("bin");
                fs::create_dir_all(&bin).expect("mkdir toolchain bin");
                fs::write(bin.join("clang"), "").expect("write clang");
                fs::write(bin.join("clang++"), "").expect("write clang++");
            }
        }
        Ok(())
    }

    fn capture(&self, cmd: Command) -> Result<Captured> {
        let program = cmd.get_program().to_string_lossy().into_owned();
        self.captures
            .lock()
            .expect("captures lock")
            .push(describe_command(&cmd));
        if program.ends_with("aarch64-none-elf-gcc") {
            return Ok(Captured {
                success: true,
                code: Some(0),
                text: PROBE_OUTPUT.into(),
            });
        }
        match self.packages.get(&program) {
            Some(text) => Ok(Captured {
                success: true,
                code: Some(0),
                text: text.clone(),
            }),
            None => Err(Error::tool_missing(format!("could not find {program}"))),
        }
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<ExecEvent>>,
}

impl RecordingSink {
    pub fn started(&self) -> Vec<String> {
        self.events
            .lock()
            .expect("events lock")
            .iter()
            .filter_map(|ev| match ev {
                ExecEvent::ProductStarted { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ExecSink for RecordingSink {
    fn emit(&self, ev: ExecEvent) {
        self.events.lock().expect("events lock").push(ev);
    }
}

pub struct Fixture {
    pub tmp: tempfile::TempDir,
    pub layout: SourceLayout,
    pub cfg: BuildConfig,
    pub env: HostEnv,
}

impl Fixture {
    pub fn root(&self) -> &Path {
        &self.layout.root
    }

    pub fn default_install_dir(&self) -> PathBuf {
        self.root()
            .join("dist")
            .join("klepto-0.3.0-RELEASE-arch-x86_64")
    }

    pub fn run(
        &self,
        opts: &Options,
        runner: Arc<FakeRunner>,
        sink: Arc<RecordingSink>,
    ) -> Result<Outcome> {
        let mut ctx = ExecCtx::new(opts.dry_run, sink, runner);
        klepto_build::orchestrator::run(opts, &self.cfg, &self.layout, &self.env, &mut ctx)
    }
}

pub fn write(path: &Path, body: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("mkdir parent");
    }
    fs::write(path, body).expect("write file");
}

/// A checkout with every source directory the builders read from.
pub fn fixture() -> Fixture {
    let tmp = tempfile::tempdir().expect("tempdir");
    let root = tmp.path().to_path_buf();

    write(
        &root.join("swift/CMakeLists.txt"),
        "cmake_minimum_required(VERSION 3.19)\nset(SWIFT_VERSION \"5.9.2\")\nset(KLEPTO_VERSION \"0.3.0\")\n",
    );
    write(&root.join("libicuuc-libnx/lib/libicuuc.a"), "archive");
    write(&root.join("libicuuc-libnx/lib/libicuuc.so"), "shared");
    write(&root.join("libicuuc-libnx/lib/putil.o"), "object");
    write(&root.join("libicuuc-libnx/stubdata/libicudata.a"), "archive");
    write(&root.join("libicuuc-libnx/stubdata/Makefile"), "all:");
    write(&root.join("libicuuc-libnx/common/unicode/uchar.h"), "header");
    write(&root.join("klepto-frontend/klepto-frontend"), "#!/bin/sh\n");
    write(&root.join("klepto-frontend/templates/main.swift"), "print(1)\n");
    fs::create_dir_all(root.join("klepto-swiftpm")).expect("mkdir swiftpm");
    fs::create_dir_all(root.join("klepto-libdispatch")).expect("mkdir libdispatch");
    fs::create_dir_all(root.join("devkitpro/libnx/include")).expect("mkdir devkitpro");

    let mut cfg = BuildConfig::default();
    cfg.tools.required.clear();
    let layout = SourceLayout::resolve(&root, &cfg.sources).expect("layout");
    let env = HostEnv {
        devkitpro: Some(root.join("devkitpro")),
        search_path: None,
        os_release: Some("NAME=\"Arch Linux\"\nID=arch\n".into()),
        arch: "x86_64".into(),
    };
    Fixture {
        tmp,
        layout,
        cfg,
        env,
    }
}

pub const PACKAGES: &str = "devkitA64 1.2.3\nlibnx 4.5.6\nfoo 9.9.9\n";

pub fn runner() -> Arc<FakeRunner> {
    Arc::new(FakeRunner::with_packages("dkp-pacman", PACKAGES))
}

pub fn options() -> Options {
    Options {
        reconfigure: true,
        ..Options::default()
    }
}
