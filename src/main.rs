use clap::{Parser, Subcommand};
use sitepack::config::{self, BuildProfile};
use sitepack::imaging::RustBackend;
use sitepack::pipeline::{self, BuildEvent};
use sitepack::{output, watch};
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::thread::JoinHandle;
use tracing_subscriber::EnvFilter;

/// Shared flags for commands that generate cached assets.
#[derive(clap::Args, Clone)]
struct CacheArgs {
    /// Ignore the favicon and icon-font caches and regenerate both
    #[arg(long)]
    no_cache: bool,
}

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "sitepack")]
#[command(about = "Asset pipeline for static front-end projects")]
#[command(long_about = "\
Asset pipeline for static front-end projects

Builds a conventional source tree into a deployable output directory:

  src/
  ├── html/views/*.html        → dist/<name>.html (one page per template)
  ├── html/includes/           # partials: <%= require('../includes/nav.html') %>
  ├── js/index.js              → dist/js/bundle.js (+ .map, .LICENSE.txt)
  ├── scss/style.scss          → dist/css/style.bundle.css (+ .map)
  ├── img/                     → dist/img/ (JPEG/PNG compressed)
  ├── fonts/                   → dist/fonts/
  ├── iconfont/*.svg           → src/fonts/iconfont.{woff2,ttf,svg} + src/scss/_iconfont_iconfont.scss
  └── favicon/favicon.png      → dist/favicon/ (icons, manifests, page markup)

Production builds empty the output directory first. Favicon and icon-font
results are cached in .sitepack-cache/ until their inputs change.

Run 'sitepack gen-config' to generate a documented sitepack.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Project root
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Config file (defaults to <root>/sitepack.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Show debug diagnostics
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline once
    Build {
        #[arg(long, value_enum, default_value_t = BuildProfile::Development)]
        mode: BuildProfile,
        #[command(flatten)]
        cache: CacheArgs,
    },
    /// Build in development mode, then rebuild on every change
    Watch(CacheArgs),
    /// Validate config and inputs and print the build graph without building
    Check {
        #[arg(long, value_enum, default_value_t = BuildProfile::Development)]
        mode: BuildProfile,
    },
    /// Print a stock sitepack.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Build { mode, cache } => {
            let project = config::load_project(&cli.root, cli.config.as_deref())?;
            init_thread_pool(&project.config.processing);

            println!("==> Planning {} build", mode);
            let plan = pipeline::plan(&project, mode)?;
            let (tx, printer) = spawn_printer(project.output_dir());
            let backend = RustBackend::new();
            let result = pipeline::run(&plan, &project, &backend, cache.no_cache, Some(tx));
            printer.join().ok();
            let summary = result?;
            output::print_summary(&summary);
            println!("==> Build complete: {}", project.output_dir().display());
        }
        Command::Watch(cache) => {
            // Watcher events carry canonical paths
            let root = cli.root.canonicalize()?;
            let project = config::load_project(&root, cli.config.as_deref())?;
            init_thread_pool(&project.config.processing);

            let (tx, printer) = spawn_printer(project.output_dir());
            watch::watch(
                &root,
                cli.config.as_deref(),
                &RustBackend::new(),
                cache.no_cache,
                Some(tx),
                |result| match result {
                    Ok(summary) => output::print_summary(summary),
                    Err(e) => eprintln!("Build failed: {e}"),
                },
            )?;
            printer.join().ok();
        }
        Command::Check { mode } => {
            let project = config::load_project(&cli.root, cli.config.as_deref())?;
            println!("==> Checking {}", project.root.display());
            let plan = pipeline::plan(&project, mode)?;
            output::print_plan(&plan);
            println!("==> Project is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Diagnostics go to stderr. `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "sitepack=debug" } else { "sitepack=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Print build events on a dedicated thread until every sender is dropped.
fn spawn_printer(output_dir: PathBuf) -> (Sender<BuildEvent>, JoinHandle<()>) {
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_build_event(&event, &output_dir) {
                println!("{}", line);
            }
        }
    });
    (tx, printer)
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
