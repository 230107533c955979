use std::path::PathBuf;
use std::time::Duration;

/// Central error type for deckplug.
#[derive(Debug, thiserror::Error)]
pub enum DeckError {
    #[error("config error: {0}")]
    Config(String),

    #[error("config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("device error: {0}")]
    Device(String),

    #[error("no Stream Deck found")]
    NoDevice,

    #[error("render error: {0}")]
    Render(String),

    #[error("font error: {}: {message}", .path.display())]
    Font { path: PathBuf, message: String },

    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("`{command}` exited {}: {output}", .code.map_or_else(|| "by signal".to_string(), |c| c.to_string()))]
    Exec {
        command: String,
        code: Option<i32>,
        output: String,
    },

    #[error("{what} timed out after {after:?}")]
    Timeout { what: String, after: Duration },

    #[error("request {request} failed: {status}")]
    Request { request: String, status: String },

    #[error("websocket error: {0}")]
    WebSocket(#[from] async_tungstenite::tungstenite::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("discovery error: {0}")]
    Discovery(String),

    #[error("{0} is not available")]
    NotLive(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HID error: {0}")]
    Hid(String),
}

impl DeckError {
    /// Failures caused by an external resource going away between the
    /// liveness check and the call. Logged as warnings, not errors.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::Request { .. }
                | Self::WebSocket(_)
                | Self::Http(_)
                | Self::NotLive(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DeckError>;
