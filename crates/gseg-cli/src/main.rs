// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use clap::{Args, Parser, Subcommand, ValueEnum};
use gseg::{GsegConfig, ScanWindow};
use gseg_cli::{CliError, Mode, analyze, parse_adjacency, read_json_value, write_json_output};
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "gseg", version, about = "Graph-based changepoint detection")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scan a similarity graph for a changepoint or a changed interval.
    Detect(DetectArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Single,
    Interval,
}

impl From<ModeArg> for Mode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Single => Mode::Single,
            ModeArg::Interval => Mode::Interval,
        }
    }
}

#[derive(Debug, Args)]
struct DetectArgs {
    #[arg(long, value_enum, default_value_t = ModeArg::Single)]
    mode: ModeArg,
    /// JSON adjacency matrix (array of rows).
    #[arg(long)]
    input: PathBuf,
    /// all, o/ori/original, w/wei/weighted, m/max/max_type, g/gen/generalized
    #[arg(long, default_value = "all")]
    statistic: String,
    #[arg(long)]
    n0: Option<usize>,
    #[arg(long)]
    n1: Option<usize>,
    /// Skip the analytic p-values.
    #[arg(long)]
    no_asym: bool,
    /// Disable the skewness correction of the analytic p-values.
    #[arg(long)]
    no_skew: bool,
    /// Number of permutations; enables permutation p-values.
    #[arg(long)]
    perm: Option<usize>,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    #[arg(long)]
    output: Option<PathBuf>,
}

impl DetectArgs {
    fn to_config(&self) -> Result<GsegConfig, CliError> {
        let mut config = GsegConfig::default().with_statistic(&self.statistic)?;
        config.window = ScanWindow::new(self.n0, self.n1);
        config.pval_asym = !self.no_asym;
        config.asymptotic.skew_corr = !self.no_skew;
        if let Some(permutations) = self.perm {
            config = config.with_permutations(permutations, self.seed);
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorPayload,
}

#[derive(Serialize)]
struct ErrorPayload {
    code: String,
    message: String,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        emit_structured_error(&err);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Detect(args) => handle_detect(&args),
    }
}

fn handle_detect(args: &DetectArgs) -> Result<(), CliError> {
    let config = args.to_config()?;
    let adjacency = parse_adjacency(&read_json_value(&args.input)?)?;
    tracing::info!(
        n = adjacency.n,
        mode = ?args.mode,
        statistic = %args.statistic,
        "running detection"
    );
    let report = analyze(args.mode.into(), &adjacency, &config)?;
    write_json_output(&report, args.output.as_deref())
}

fn emit_structured_error(err: &CliError) {
    let envelope = ErrorEnvelope {
        error: ErrorPayload {
            code: err.code().to_string(),
            message: err.to_string(),
        },
    };

    match serde_json::to_string_pretty(&envelope) {
        Ok(json) => eprintln!("{json}"),
        Err(_) => eprintln!(
            "{{\"error\":{{\"code\":\"{}\",\"message\":\"{}\"}}}}",
            err.code(),
            err
        ),
    }
}
