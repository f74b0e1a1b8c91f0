use std::io;

/// Error type for everything that can go wrong while handling an update
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to start '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Command task ended abnormally: {0}")]
    CommandTaskFailed(#[from] tokio::task::JoinError),

    #[error("Could not read request body: {0}")]
    BodyReadFailed(String),

    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("Log setup failed: {0}")]
    LogSetupFailed(#[from] tracing_appender::rolling::InitError),
}

/// Helper type for Results that use DeployError
pub type Result<T> = std::result::Result<T, DeployError>;
