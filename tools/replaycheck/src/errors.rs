use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplayCheckError {
    #[error("io error: {0}")]
    Io(String),
    #[error("config parse error: {0}")]
    ConfigParse(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("cli error: {0}")]
    Cli(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("archive error: {0}")]
    Archive(String),
    #[error("{endpoint} endpoint on {channel}:{stream_id} not connected after {polls} polls")]
    ConnectTimeout {
        endpoint: &'static str,
        channel: String,
        stream_id: i32,
        polls: u32,
    },
    #[error(
        "no recording for {channel}:{stream_id} session {session_id} after {attempts} attempts"
    )]
    RecordingNotFound {
        channel: String,
        stream_id: i32,
        session_id: i32,
        attempts: u32,
    },
    #[error("replay session {0} already stopped")]
    ReplayAlreadyStopped(i64),
}
