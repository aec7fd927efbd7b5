use clap::Parser;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use klepto_build::Result;
use klepto_build::executor::{ExecCtx, StdoutSink, SystemRunner};
use klepto_build::orchestrator::{self, HostEnv, Options};
use klepto_build::products::Configuration;
use klepto_build::workspace::{SourceLayout, absolute};
use tracing_subscriber::EnvFilter;

/// Builds and installs klepto (products: icu, toolchain, libdispatch, swiftpm, frontend).
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Only build and install icu (combine with other --only-* flags to build a subset)
    #[arg(long)]
    only_icu: bool,
    /// Only build and install toolchain (combine with other --only-* flags to build a subset)
    #[arg(long)]
    only_toolchain: bool,
    /// Only build and install libdispatch (combine with other --only-* flags to build a subset)
    #[arg(long)]
    only_libdispatch: bool,
    /// Only build and install swiftpm (combine with other --only-* flags to build a subset)
    #[arg(long)]
    only_swiftpm: bool,
    /// Only build and install frontend (combine with other --only-* flags to build a subset)
    #[arg(long)]
    only_frontend: bool,

    /// Where to install klepto (default: <source root>/dist/klepto-{version string})
    #[arg(long, value_name = "DIR")]
    install_destdir: Option<PathBuf>,

    /// Configuration to build
    #[arg(long, value_enum, default_value_t = Configuration::Release)]
    configuration: Configuration,

    /// Create a .tar.gz package of the installed products, optionally in DIR
    /// (default: ./dist). Cannot be used with any --only-* flag
    #[arg(long, value_name = "DIR", num_args = 0..=1, default_missing_value = "dist")]
    package: Option<PathBuf>,

    /// Don't build or install anything but still perform all the checks
    #[arg(long)]
    dry_run: bool,

    /// Don't reconfigure before building
    #[arg(long)]
    no_reconfigure: bool,

    /// Build settings file (default: <source root>/klepto-build.toml if present)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Checkout containing swift/, klepto-swiftpm/, ... (default: current directory)
    #[arg(long, value_name = "DIR")]
    source_root: Option<PathBuf>,
}

impl Args {
    /// Relative output paths are taken from the current directory.
    fn options(&self) -> Result<Options> {
        let only = [
            ("icu", self.only_icu),
            ("toolchain", self.only_toolchain),
            ("libdispatch", self.only_libdispatch),
            ("swiftpm", self.only_swiftpm),
            ("frontend", self.only_frontend),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then(|| name.to_string()))
        .collect::<BTreeSet<_>>();

        Ok(Options {
            only,
            install_destdir: self.install_destdir.as_deref().map(absolute).transpose()?,
            configuration: self.configuration,
            package: self.package.as_deref().map(absolute).transpose()?,
            dry_run: self.dry_run,
            reconfigure: !self.no_reconfigure,
        })
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let json = std::env::var("KLEPTO_LOG_FORMAT").is_ok_and(|v| v == "json");
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("!!! {e}");
            ExitCode::from(1)
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let opts = args.options()?;
    // Reject bad flag combinations before touching the filesystem.
    orchestrator::validate_options(&opts)?;

    let root = absolute(
        args.source_root
            .as_deref()
            .unwrap_or_else(|| std::path::Path::new(".")),
    )?;
    let cfg = klepto_build::config::load_or_default(args.config.as_deref(), &root)?;
    let root = match cfg.sources.root.as_deref() {
        Some(r) => root.join(r),
        None => root,
    };
    let layout = SourceLayout::resolve(&root, &cfg.sources)?;

    let sink = Arc::new(StdoutSink::with_error_logs_root(
        layout.build_dir.join("error-logs"),
    ));
    let mut ctx = ExecCtx::new(opts.dry_run, sink, Arc::new(SystemRunner));
    let env = HostEnv::from_process();

    let outcome = orchestrator::run(&opts, &cfg, &layout, &env, &mut ctx)?;
    tracing::debug!(
        install_dir = %outcome.install_dir.display(),
        built = outcome.built.len(),
        "build complete"
    );
    Ok(())
}
