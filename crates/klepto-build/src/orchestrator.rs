use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::BuildConfig;
use crate::error::{Error, Result};
use crate::executor::{ExecCtx, ExecEvent};
use crate::manifest::Manifest;
use crate::package;
use crate::platform;
use crate::products::{self, BuildRequest, Configuration, util};
use crate::tools;
use crate::versions;
use crate::workspace::SourceLayout;

/// What the operator asked for on the command line.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Products named by `--only-*` flags.
    pub only: BTreeSet<String>,
    pub install_destdir: Option<PathBuf>,
    pub configuration: Configuration,
    /// Directory to write the `.tar.gz` into, when packaging.
    pub package: Option<PathBuf>,
    pub dry_run: bool,
    pub reconfigure: bool,
}

/// Host facts read once at startup.
#[derive(Debug, Clone, Default)]
pub struct HostEnv {
    pub devkitpro: Option<PathBuf>,
    /// `PATH`-style search list for required tools; `None` means the process `PATH`.
    pub search_path: Option<OsString>,
    pub os_release: Option<String>,
    pub arch: String,
}

impl HostEnv {
    pub fn from_process() -> Self {
        Self {
            devkitpro: std::env::var_os("DEVKITPRO")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            search_path: None,
            os_release: platform::host_os_release(),
            arch: platform::host_arch().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Outcome {
    pub install_dir: PathBuf,
    pub dist_name: String,
    pub manifest: PathBuf,
    pub archive: Option<PathBuf>,
    pub built: Vec<String>,
}

pub fn validate_options(opts: &Options) -> Result<()> {
    if opts.package.is_some()
        && let Some(product) = products::registry()
            .into_iter()
            .find(|p| opts.only.contains(p.name()))
    {
        let name = product.name();
        return Err(Error::usage(format!(
            "Cannot use --package with --only-{name}"
        )));
    }
    Ok(())
}

fn check_devkitpro(env: &HostEnv) -> Result<PathBuf> {
    let Some(path) = env.devkitpro.as_ref() else {
        return Err(Error::prerequisite(
            "DEVKITPRO environment variable is not set, cannot continue",
        ));
    };
    if !path.is_dir() {
        return Err(Error::prerequisite(format!(
            "Directory {} was not found, please check the DEVKITPRO environment variable",
            path.display()
        )));
    }
    crate::workspace::absolute(path)
}

fn check_icu(layout: &SourceLayout) -> Result<()> {
    if !layout.icu_dir.is_dir() {
        return Err(Error::prerequisite(format!(
            "Directory {} was not found, please build libicuuc and place it there",
            layout.icu_dir.display()
        )));
    }
    Ok(())
}

fn names(products: &[Box<dyn products::Product>]) -> String {
    products
        .iter()
        .map(|p| p.name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Run the whole pipeline: checks, builds, manifest and optional package.
pub fn run(
    opts: &Options,
    cfg: &BuildConfig,
    layout: &SourceLayout,
    env: &HostEnv,
    ctx: &mut ExecCtx,
) -> Result<Outcome> {
    validate_options(opts)?;

    tools::locate_all(&cfg.tools.required, env.search_path.as_ref(), &layout.root)?;

    let resolved = versions::resolve(ctx, &cfg.tools.package_queries, &layout.cmakelists())?;

    check_icu(layout)?;
    let devkitpro = check_devkitpro(env)?;

    let platform = cfg
        .dist
        .platform
        .clone()
        .unwrap_or_else(|| platform::platform_string(env.os_release.as_deref(), &env.arch));
    let dist_name = platform::dist_name(
        &cfg.dist.product,
        &resolved.klepto,
        opts.configuration,
        &platform,
    );
    let install_dir = match &opts.install_destdir {
        Some(p) => layout.resolve_output(p),
        None => layout
            .resolve_output(Path::new(&cfg.dist.dir))
            .join(&dist_name),
    };

    let selected = products::select(products::registry(), &opts.only)?;
    ctx.note(format!(
        "Prepared build for {} in {}",
        names(&selected),
        install_dir.display()
    ));

    util::ensure_dir(&install_dir)?;
    let version_tag = resolved.version_tag();
    let mut built = Vec::with_capacity(selected.len());
    for product in &selected {
        let destination = install_dir.join(product.install_subpath());
        util::ensure_dir(&destination)?;

        ctx.set_product(product.name());
        ctx.sink.emit(ExecEvent::ProductStarted {
            name: product.name().to_string(),
            dest: destination.clone(),
        });
        if ctx.dry_run {
            continue;
        }

        let req = BuildRequest {
            destination,
            configuration: opts.configuration,
            devkitpro: devkitpro.clone(),
            icu_dir: layout.icu_dir.clone(),
            layout: layout.clone(),
            version_tag: version_tag.clone(),
            reconfigure: opts.reconfigure,
        };
        let start = Instant::now();
        let res = product.build(&req, ctx);
        let elapsed_ms = start.elapsed().as_millis();
        tracing::info!(product = product.name(), elapsed_ms, ok = res.is_ok(), "product finished");
        ctx.sink.emit(ExecEvent::ProductFinished {
            name: product.name().to_string(),
            ok: res.is_ok(),
            error: res.as_ref().err().map(ToString::to_string),
            elapsed_ms,
        });
        if let Err(e) = res {
            ctx.sink.emit(ExecEvent::Done {
                ok: false,
                error: Some(e.to_string()),
            });
            return Err(e);
        }
        built.push(product.name().to_string());
    }

    let manifest_path = install_dir.join(crate::manifest::MANIFEST_FILE);
    ctx.note(format!("Writing manifest to {}", manifest_path.display()));
    let manifest = Manifest::from_resolved(&resolved).write(&install_dir)?;

    ctx.note(format!(
        "Done building {} in {}",
        names(&selected),
        install_dir.display()
    ));

    let archive = match &opts.package {
        Some(dir) => {
            let out_dir = layout.resolve_output(dir);
            let target = out_dir.join(format!("{dist_name}.tar.gz"));
            ctx.note(format!("Writing {}", target.display()));
            let path = package::write_archive(&install_dir, &out_dir, &dist_name)?;
            ctx.note(format!("Done writing {}", path.display()));
            Some(path)
        }
        None => None,
    };

    ctx.sink.emit(ExecEvent::Done {
        ok: true,
        error: None,
    });
    Ok(Outcome {
        install_dir,
        dist_name,
        manifest,
        archive,
        built,
    })
}
