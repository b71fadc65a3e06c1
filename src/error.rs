use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("browser initialization failed: {0}")]
    BrowserInit(String),

    #[error("page fetch failed: {0}")]
    Fetch(String),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, WatchError>;
