use crate::errors::ReplayCheckError;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub messages: Option<u64>,
    pub message_size: Option<usize>,
    pub idle_limit: Option<u32>,
    pub report_path: Option<PathBuf>,
    pub run_log_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub stream: StreamConfig,
    pub publish: PublishConfig,
    pub connect: ConnectConfig,
    pub locate: LocateConfig,
    pub consume: ConsumeConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamConfig {
    pub channel: String,
    pub stream_id: i32,
    pub replay_channel: String,
    pub replay_stream_id: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishConfig {
    pub message_count: u64,
    pub message_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectConfig {
    pub poll_interval_ms: u64,
    pub max_polls: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocateConfig {
    pub settle_ms: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub list_window: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsumeConfig {
    pub idle_poll_limit: u32,
    pub max_fragments_per_poll: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportConfig {
    pub run_log_path: PathBuf,
    pub report_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig {
                channel: "aeron:ipc".to_string(),
                stream_id: 16,
                replay_channel: "aeron:ipc".to_string(),
                replay_stream_id: 17,
            },
            publish: PublishConfig {
                message_count: 1_000,
                message_size: 8,
            },
            connect: ConnectConfig {
                poll_interval_ms: 10,
                max_polls: 1_000,
            },
            locate: LocateConfig {
                settle_ms: 2_000,
                retry_attempts: 10,
                retry_delay_ms: 500,
                list_window: 100,
            },
            consume: ConsumeConfig {
                idle_poll_limit: 10_000,
                max_fragments_per_poll: 256,
            },
            report: ReportConfig {
                run_log_path: PathBuf::from(".replaycheck/run-log.jsonl"),
                report_path: None,
            },
        }
    }
}

impl AppConfig {
    pub fn connect_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.connect.max_polls,
            Duration::from_millis(self.connect.poll_interval_ms),
        )
    }

    pub fn locate_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.locate.retry_attempts,
            Duration::from_millis(self.locate.retry_delay_ms),
        )
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.locate.settle_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialAppConfig {
    stream: Option<PartialStreamConfig>,
    publish: Option<PartialPublishConfig>,
    connect: Option<PartialConnectConfig>,
    locate: Option<PartialLocateConfig>,
    consume: Option<PartialConsumeConfig>,
    report: Option<PartialReportConfig>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialStreamConfig {
    channel: Option<String>,
    stream_id: Option<i32>,
    replay_channel: Option<String>,
    replay_stream_id: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialPublishConfig {
    message_count: Option<u64>,
    message_size: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialConnectConfig {
    poll_interval_ms: Option<u64>,
    max_polls: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialLocateConfig {
    settle_ms: Option<u64>,
    retry_attempts: Option<u32>,
    retry_delay_ms: Option<u64>,
    list_window: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialConsumeConfig {
    idle_poll_limit: Option<u32>,
    max_fragments_per_poll: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialReportConfig {
    run_log_path: Option<PathBuf>,
    report_path: Option<PathBuf>,
}

fn merge(base: AppConfig, partial: PartialAppConfig) -> AppConfig {
    let mut cfg = base;
    if let Some(stream) = partial.stream {
        cfg.stream.channel = stream.channel.unwrap_or(cfg.stream.channel);
        cfg.stream.stream_id = stream.stream_id.unwrap_or(cfg.stream.stream_id);
        cfg.stream.replay_channel = stream.replay_channel.unwrap_or(cfg.stream.replay_channel);
        cfg.stream.replay_stream_id = stream
            .replay_stream_id
            .unwrap_or(cfg.stream.replay_stream_id);
    }
    if let Some(publish) = partial.publish {
        cfg.publish.message_count = publish.message_count.unwrap_or(cfg.publish.message_count);
        cfg.publish.message_size = publish.message_size.unwrap_or(cfg.publish.message_size);
    }
    if let Some(connect) = partial.connect {
        cfg.connect.poll_interval_ms = connect
            .poll_interval_ms
            .unwrap_or(cfg.connect.poll_interval_ms);
        cfg.connect.max_polls = connect.max_polls.unwrap_or(cfg.connect.max_polls);
    }
    if let Some(locate) = partial.locate {
        cfg.locate.settle_ms = locate.settle_ms.unwrap_or(cfg.locate.settle_ms);
        cfg.locate.retry_attempts = locate.retry_attempts.unwrap_or(cfg.locate.retry_attempts);
        cfg.locate.retry_delay_ms = locate.retry_delay_ms.unwrap_or(cfg.locate.retry_delay_ms);
        cfg.locate.list_window = locate.list_window.unwrap_or(cfg.locate.list_window);
    }
    if let Some(consume) = partial.consume {
        cfg.consume.idle_poll_limit = consume.idle_poll_limit.unwrap_or(cfg.consume.idle_poll_limit);
        cfg.consume.max_fragments_per_poll = consume
            .max_fragments_per_poll
            .unwrap_or(cfg.consume.max_fragments_per_poll);
    }
    if let Some(report) = partial.report {
        cfg.report.run_log_path = report.run_log_path.unwrap_or(cfg.report.run_log_path);
        cfg.report.report_path = report.report_path.or(cfg.report.report_path);
    }
    cfg
}

fn apply_overrides(cfg: &mut AppConfig, overrides: &CliOverrides) {
    if let Some(messages) = overrides.messages {
        cfg.publish.message_count = messages;
    }
    if let Some(message_size) = overrides.message_size {
        cfg.publish.message_size = message_size;
    }
    if let Some(idle_limit) = overrides.idle_limit {
        cfg.consume.idle_poll_limit = idle_limit;
    }
    if let Some(report_path) = &overrides.report_path {
        cfg.report.report_path = Some(report_path.clone());
    }
    if let Some(run_log_path) = &overrides.run_log_path {
        cfg.report.run_log_path = run_log_path.clone();
    }
}

pub fn validate(cfg: &AppConfig) -> Result<(), ReplayCheckError> {
    if cfg.publish.message_count == 0 {
        return Err(ReplayCheckError::InvalidConfig(
            "publish.message_count must be greater than zero".to_string(),
        ));
    }
    if cfg.publish.message_size < 8 {
        return Err(ReplayCheckError::InvalidConfig(
            "publish.message_size must be at least 8 bytes (i64 payload)".to_string(),
        ));
    }
    if cfg.stream.channel == cfg.stream.replay_channel
        && cfg.stream.stream_id == cfg.stream.replay_stream_id
    {
        return Err(ReplayCheckError::InvalidConfig(
            "replay stream must differ from the recorded stream on a shared channel".to_string(),
        ));
    }
    if cfg.connect.max_polls == 0 {
        return Err(ReplayCheckError::InvalidConfig(
            "connect.max_polls must be greater than zero".to_string(),
        ));
    }
    if cfg.locate.retry_attempts == 0 {
        return Err(ReplayCheckError::InvalidConfig(
            "locate.retry_attempts must be greater than zero".to_string(),
        ));
    }
    if cfg.consume.max_fragments_per_poll == 0 {
        return Err(ReplayCheckError::InvalidConfig(
            "consume.max_fragments_per_poll must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Defaults, overlaid with the TOML file when given, overlaid with CLI
/// flags, then validated.
pub fn load_config(overrides: &CliOverrides) -> Result<AppConfig, ReplayCheckError> {
    let base = match &overrides.config_path {
        Some(path) => {
            let raw = read_config_file(path)?;
            let partial: PartialAppConfig = toml::from_str(&raw)
                .map_err(|e| ReplayCheckError::ConfigParse(e.to_string()))?;
            merge(AppConfig::default(), partial)
        }
        None => AppConfig::default(),
    };
    let mut cfg = base;
    apply_overrides(&mut cfg, overrides);
    validate(&cfg)?;
    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<String, ReplayCheckError> {
    std::fs::read_to_string(path)
        .map_err(|e| ReplayCheckError::Io(format!("{}: {e}", path.display())))
}
