mod commands;

use clap::{Parser, ValueEnum};
use commands::{exit_code_for, EXIT_FAILURE};
use repkl_core::{Action, DuplicatePolicy, RepackConfig, RepackageRequest};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "repkl",
    version,
    about = "Repackage an IMF composition and the assets it references into a new delivery"
)]
struct Cli {
    /// Composition playlist (CPL) to repackage.
    target: PathBuf,

    /// Destination directory; must exist and be empty.
    dest: PathBuf,

    /// Directory holding an ASSETMAP.xml. Repeatable; later deliveries win
    /// on duplicate identifiers. Defaults to the directories of TARGET and --ov.
    #[arg(long = "delivery", value_name = "DIR")]
    deliveries: Vec<PathBuf>,

    /// Composition whose resources are already delivered and are left out.
    #[arg(long, value_name = "PATH")]
    ov: Option<PathBuf>,

    /// What to do with each asset file [default: copy].
    #[arg(long, value_enum)]
    action: Option<ActionArg>,

    /// Fail when deliveries register different records under the same identifier.
    #[arg(long, default_value_t = false)]
    strict_duplicates: bool,

    /// Config file (default: $REPKL_CONFIG, then ~/.config/repkl/config.toml).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Output the run report as structured JSON.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false)]
    trace: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ActionArg {
    Copy,
    Move,
    Dryrun,
    Skip,
    Symlink,
}

impl From<ActionArg> for Action {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::Copy => Action::Copy,
            ActionArg::Move => Action::Move,
            ActionArg::Dryrun => Action::DryRun,
            ActionArg::Skip => Action::Skip,
            ActionArg::Symlink => Action::Symlink,
        }
    }
}

impl Cli {
    /// Merge command-line flags over `config`.
    fn into_request(self, config: &RepackConfig) -> RepackageRequest {
        let action = self
            .action
            .map(Action::from)
            .or(config.action)
            .unwrap_or_default();
        let policy = if self.strict_duplicates {
            DuplicatePolicy::Reject
        } else {
            config.duplicate_policy()
        };

        let mut request = RepackageRequest::new(self.target, self.dest)
            .with_action(action)
            .with_duplicate_policy(policy)
            .with_defaults(config.defaults());
        request.mapped_file_sets = self.deliveries;
        request.base = self.ov;
        request
    }
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("REPKL_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let config = match cli.config.as_deref() {
        Some(path) => RepackConfig::load(path),
        None => RepackConfig::load_default(),
    };
    let config = match config {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    tracing::debug!("effective config: {config:?}");

    let json_output = cli.json;
    let request = cli.into_request(&config);

    match commands::repackage::run(&request, json_output) {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(exit_code_for(&msg))
        }
    }
}
