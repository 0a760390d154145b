pub mod archive;
pub mod config;
pub mod consumer;
pub mod errors;
pub mod locator;
pub mod logging;
pub mod loopback;
pub mod pipeline;
pub mod publisher;
pub mod replay;
pub mod report;
pub mod retry;
pub mod runtime;
pub mod transport;
pub mod types;

use clap::{error::ErrorKind, Parser};
use config::{load_config, CliOverrides};
use errors::ReplayCheckError;
use logging::JsonlLogger;
use pipeline::run_verification;
use runtime::Harness;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "replaycheck")]
#[command(about = "Publish a sequenced stream, record it, replay it, verify it bit for bit")]
pub struct Cli {
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub messages: Option<u64>,
    #[arg(long = "message-size")]
    pub message_size: Option<usize>,
    #[arg(long = "idle-limit")]
    pub idle_limit: Option<u32>,
    #[arg(long = "report-path")]
    pub report_path: Option<PathBuf>,
    #[arg(long = "run-log")]
    pub run_log: Option<PathBuf>,
    #[arg(long, default_value_t = false)]
    pub check_config: bool,
}

pub fn run() -> Result<i32, ReplayCheckError> {
    let args = std::env::args_os().collect::<Vec<_>>();
    run_with_harness(&args, &Harness::loopback())
}

pub fn run_with_harness(
    args: &[std::ffi::OsString],
    harness: &Harness,
) -> Result<i32, ReplayCheckError> {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{error}");
                return Ok(0);
            }
            _ => return Err(ReplayCheckError::Cli(error.to_string())),
        },
    };

    let overrides = CliOverrides {
        config_path: cli.config.clone(),
        messages: cli.messages,
        message_size: cli.message_size,
        idle_limit: cli.idle_limit,
        report_path: cli.report_path.clone(),
        run_log_path: cli.run_log.clone(),
    };
    let cfg = load_config(&overrides)?;

    if cli.check_config {
        println!(
            "config ok: {} messages of {} bytes, record {}:{} replay {}:{}",
            cfg.publish.message_count,
            cfg.publish.message_size,
            cfg.stream.channel,
            cfg.stream.stream_id,
            cfg.stream.replay_channel,
            cfg.stream.replay_stream_id,
        );
        return Ok(0);
    }

    let logger = JsonlLogger::new(&cfg.report.run_log_path);
    let summary = run_verification(&cfg, harness, &logger)?;

    println!("{}", report::render(&summary.report));

    if let Some(path) = &cfg.report.report_path {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ReplayCheckError::Io(e.to_string()))?;
        }
        let rendered = serde_json::to_string_pretty(&summary.report)
            .map_err(|e| ReplayCheckError::Io(e.to_string()))?;
        std::fs::write(path, rendered).map_err(|e| ReplayCheckError::Io(e.to_string()))?;
    }

    // Infrastructure failures surface as Err; a verification mismatch is a
    // clean run with a failing verdict.
    Ok(if summary.report.matched { 0 } else { 1 })
}
