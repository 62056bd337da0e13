use clap::Parser;
use sitkin::project::OUTPUT_DIR;
use sitkin::serve::DevServer;
use sitkin::{output, watch};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Quiet period after a change before the dev loop rebuilds.
const REBUILD_DELAY: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "sitkin")]
#[command(about = "Static site generator")]
#[command(long_about = "\
Static site generator

Builds the project in DIR into DIR/gen.

Project structure:

  site/
  ├── sitkin/
  │   ├── config.json              # {\"ignore\", \"nohash\", \"filesets\"} (optional)
  │   ├── default.tmpl             # Root layout
  │   └── posts.tmpl               # Layout for the \"posts\" file set
  ├── posts/
  │   └── 2020-01-01.hello.md      # → gen/posts/hello.html
  ├── index.tmpl                   # → gen/index.html
  ├── feed.xml.tpl                 # → gen/feed.xml (plain text)
  ├── about.md                     # → gen/about.html
  └── assets/                      # Copied with content-hashed names

With --devaddr, assets keep their names, the site is rebuilt on every
change and served at ADDR.")]
#[command(version)]
struct Cli {
    /// Project directory
    #[arg(default_value = ".")]
    dir: PathBuf,

    /// Serve the site at this address and rebuild on changes (dev mode)
    #[arg(long, value_name = "ADDR")]
    devaddr: Option<String>,

    /// Log more, including the hashed asset map
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match &cli.devaddr {
        None => build_once(&cli),
        Some(addr) => dev(&cli, addr),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("sitkin: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_once(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let stats = sitkin::build(&cli.dir, false, cli.verbose)?;
    output::print_build_output(&stats);
    Ok(())
}

fn dev(cli: &Cli, addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    rebuild(&cli.dir, cli.verbose);

    let dir = cli.dir.clone();
    let verbose = cli.verbose;
    std::thread::spawn(move || {
        let result = watch::watch_dir(&dir, REBUILD_DELAY, OUTPUT_DIR, || rebuild(&dir, verbose));
        if let Err(e) = result {
            error!("watcher stopped: {e}");
        }
    });

    let server = DevServer::bind(addr, &cli.dir.join(OUTPUT_DIR))?;
    let url = server.url();
    info!("serving {url}");
    if let Err(e) = open::that(&url) {
        warn!("cannot open browser: {e}");
    }
    server.run();
    Ok(())
}

/// Dev-mode build. Failures are logged; the dev loop keeps going.
fn rebuild(dir: &Path, verbose: bool) {
    match sitkin::build(dir, true, verbose) {
        Ok(stats) => output::print_build_output(&stats),
        Err(e) => error!("build failed: {e}"),
    }
}
