//! agentval: inspect, analyze and check captured agent traces.

use agentval_cli::colors::{red, status_label};
use agentval_cli::commands::{self, CliError, Overrides};
use clap::{Parser as ClapParser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "agentval", version, about = "Root-cause analysis for agent workflow traces")]
struct Cli {
    /// Path to an agentval.toml (default: search the current directory and its parents)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the steps of a trace
    Show {
        /// Trace JSON file
        #[arg()]
        file: PathBuf,
    },
    /// Trace every failure back to its root cause
    Analyze {
        /// Trace JSON file
        #[arg()]
        file: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Warn when the trace has more steps than this
        #[arg(long)]
        max_steps: Option<usize>,

        /// Warn when a tool is called this many times in a row
        #[arg(long)]
        loop_threshold: Option<usize>,
    },
    /// Exit with status 2 if the trace contains failed steps
    Check {
        /// Trace JSON file
        #[arg()]
        file: PathBuf,
    },
    /// Create an agentval.toml config file in the current directory
    Init,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Show { file } => cmd_show(&file),
        Commands::Analyze {
            file,
            json,
            max_steps,
            loop_threshold,
        } => cmd_analyze(
            &file,
            config,
            json,
            Overrides {
                max_steps,
                loop_threshold,
            },
        ),
        Commands::Check { file } => cmd_check(&file, config),
        Commands::Init => cmd_init(),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn fail(e: CliError) -> ! {
    eprintln!("{} {}", red("error:"), e);
    std::process::exit(1);
}

fn cmd_show(file: &Path) {
    let trace = commands::load_trace(file).unwrap_or_else(|e| fail(e));
    print!("{}", commands::render_show(&trace));
}

fn cmd_analyze(file: &Path, config: Option<&Path>, json: bool, overrides: Overrides) {
    let options = commands::resolve_options(config, overrides).unwrap_or_else(|e| fail(e));
    let trace = commands::load_trace(file).unwrap_or_else(|e| fail(e));
    let report = agentval_runtime::analyze_with(&trace, &options);
    let rendered = commands::render_analysis(&report, json).unwrap_or_else(|e| fail(e));
    println!("{}", rendered);
}

fn cmd_check(file: &Path, config: Option<&Path>) {
    let options =
        commands::resolve_options(config, Overrides::default()).unwrap_or_else(|e| fail(e));
    let trace = commands::load_trace(file).unwrap_or_else(|e| fail(e));
    let outcome = commands::check(&trace, &options);
    println!("{}", outcome.output);
    if !outcome.passed {
        std::process::exit(2);
    }
}

fn cmd_init() {
    let dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let path = commands::init(&dir).unwrap_or_else(|e| fail(e));
    println!("{} {}", status_label("Created"), path.display());
}
