use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{error, info};
use tracing_subscriber::EnvFilter;

use visreg::artifact::{self, Manifest, ShapeMismatch};
use visreg::{RunnerConfig, SettleStrategy, StyleConfig, Suite, SuiteReport};

#[derive(Parser)]
#[command(name = "visreg", version, about = "Visual regression runner for the tester demo dashboard")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a suite: capture screenshots and check the DOM
    Run(RunArgs),
    /// Run only the DOM expectations, without writing screenshots
    Check(RunArgs),
    /// List the scenarios of a suite
    List {
        #[arg(long, default_value = "tester-demo")]
        suite: String,
    },
    /// Print or write the style configuration
    Style {
        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
        /// Emit data-only JSON instead of the CommonJS module
        #[arg(long)]
        json: bool,
    },
    /// Compare two manifests by screenshot dimensions
    Compare { before: PathBuf, after: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    Cdp,
    Simple,
}

#[derive(Clone, Copy, ValueEnum)]
enum SettleMode {
    Fixed,
    Stable,
}

#[derive(Args)]
struct RunArgs {
    /// Built-in suite name or path to a JSON suite file
    #[arg(long, default_value = "tester-demo")]
    suite: String,
    /// Run only these scenarios (repeatable)
    #[arg(long = "scenario")]
    scenarios: Vec<String>,
    #[arg(long, env = "VISREG_BASE_URL", default_value = "http://localhost:4000")]
    base_url: String,
    #[arg(long, env = "VISREG_OUT_DIR", default_value = "screenshots")]
    out: PathBuf,
    /// Scenarios run concurrently (defaults to the CPU count)
    #[arg(long)]
    jobs: Option<usize>,
    #[arg(long, value_enum, default_value = "cdp")]
    backend: Backend,
    #[arg(long, value_enum, default_value = "fixed")]
    settle: SettleMode,
    /// Delay for the fixed settle mode
    #[arg(long, default_value_t = 2000)]
    settle_ms: u64,
    /// Per-step timeout for navigation and network idleness
    #[arg(long, default_value_t = 30000)]
    timeout_ms: u64,
    #[arg(long, env = "CHROME_PATH")]
    chrome: Option<PathBuf>,
    /// Launch Chrome without its sandbox (containers running as root)
    #[arg(long)]
    no_sandbox: bool,
}

impl RunArgs {
    fn config(&self, capture: bool) -> RunnerConfig {
        let mut config = RunnerConfig {
            base_url: self.base_url.clone(),
            output_dir: self.out.clone(),
            navigation_timeout_ms: self.timeout_ms,
            settle: match self.settle {
                SettleMode::Fixed => SettleStrategy::Fixed { ms: self.settle_ms },
                SettleMode::Stable => SettleStrategy::stable_layout(),
            },
            capture,
            chrome_path: self.chrome.clone(),
            ..Default::default()
        };
        config.network_idle.stability.timeout_ms = self.timeout_ms;
        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
        }
        config
    }
}

async fn run(args: RunArgs, capture: bool) -> anyhow::Result<bool> {
    let suite = Suite::resolve(&args.suite)?.filter(&args.scenarios)?;
    let config = Arc::new(args.config(capture));
    info!("Target {} -> {}", config.base_url, config.output_dir.display());

    let report = match args.backend {
        Backend::Cdp => run_cdp(&args, config.clone(), &suite).await?,
        Backend::Simple => run_simple(config.clone(), &suite, capture).await?,
    };

    if capture {
        artifact::ensure_dir(&config.output_dir)?;
        let path = report.manifest().save(&config.output_dir)?;
        info!("Manifest written to {}", path.display());
    }
    for r in report.results.iter().filter(|r| !r.success) {
        error!("{}: {}", r.name, r.error.as_deref().unwrap_or("unknown error"));
    }
    println!("{}: {} passed, {} failed", report.suite, report.passed, report.failed);
    Ok(report.success())
}

#[cfg(feature = "cdp")]
async fn run_cdp(args: &RunArgs, config: Arc<RunnerConfig>, suite: &Suite) -> anyhow::Result<SuiteReport> {
    let mut browser = visreg::cdp::CdpBrowser::new(&config);
    if args.no_sandbox {
        browser = browser.without_sandbox();
    }
    Ok(visreg::run_suite(Arc::new(browser), config, suite).await?)
}

#[cfg(not(feature = "cdp"))]
async fn run_cdp(_args: &RunArgs, _config: Arc<RunnerConfig>, _suite: &Suite) -> anyhow::Result<SuiteReport> {
    bail!("this build does not include the cdp backend")
}

#[cfg(feature = "simple")]
async fn run_simple(config: Arc<RunnerConfig>, suite: &Suite, capture: bool) -> anyhow::Result<SuiteReport> {
    if capture {
        bail!("the simple backend cannot take screenshots; use `visreg check --backend simple`");
    }
    let browser = visreg::simple::SimpleBrowser::new(&config);
    Ok(visreg::run_suite(Arc::new(browser), config, suite).await?)
}

#[cfg(not(feature = "simple"))]
async fn run_simple(_config: Arc<RunnerConfig>, _suite: &Suite, _capture: bool) -> anyhow::Result<SuiteReport> {
    bail!("this build does not include the simple backend")
}

fn list(suite: &str) -> anyhow::Result<bool> {
    let suite = Suite::resolve(suite)?;
    for s in &suite.scenarios {
        let vp = s.profile.viewport;
        let files: Vec<_> = s.captures().map(|c| c.file.as_str()).collect();
        println!(
            "{:<12} {:>4}x{:<5} {} -> [{}], {} expectation(s)",
            s.name,
            vp.width,
            vp.height,
            s.route,
            files.join(", "),
            s.expectations().count()
        );
    }
    Ok(true)
}

fn style(out: Option<PathBuf>, json: bool) -> anyhow::Result<bool> {
    let cfg = StyleConfig::tester_demo();
    cfg.validate()?;
    let rendered = if json { cfg.to_json()? } else { cfg.to_js_module()? };
    match out {
        Some(path) => {
            std::fs::write(&path, rendered).with_context(|| format!("writing {}", path.display()))?;
            info!("Style configuration written to {}", path.display());
        }
        None => print!("{}", rendered),
    }
    Ok(true)
}

fn compare(before: PathBuf, after: PathBuf) -> anyhow::Result<bool> {
    let old = Manifest::load(&before)?;
    let new = Manifest::load(&after)?;
    let diffs = artifact::compare_shapes(&old, &new);
    for d in &diffs {
        match d {
            ShapeMismatch::Missing { file } => println!("missing  {}", file),
            ShapeMismatch::Added { file } => println!("added    {}", file),
            ShapeMismatch::Resized { file, before, after } => {
                println!("resized  {} {}x{} -> {}x{}", file, before.0, before.1, after.0, after.1)
            }
        }
    }
    if diffs.is_empty() {
        println!("{} artifact(s) match in shape", new.artifacts.len());
    }
    Ok(diffs.is_empty())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Command::Run(args) => run(args, true).await,
        Command::Check(args) => run(args, false).await,
        Command::List { suite } => list(&suite),
        Command::Style { out, json } => style(out, json),
        Command::Compare { before, after } => compare(before, after),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("visreg: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
