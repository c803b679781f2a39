use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Failed to launch Chrome: {0}")]
    LaunchFailed(String),

    #[error("Chrome connection lost")]
    ConnectionLost,

    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("No session for tab {0}")]
    SessionNotFound(i64),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Script injection failed: {0}")]
    InjectionFailed(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid port: {0}")]
    InvalidPort(u16),

    #[error("File I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDeError(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    #[error("General error: {0}")]
    General(String),
}

impl EditorError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::LaunchFailed(_) | Self::ConnectionLost => 3,
            Self::UnsupportedEncoding(_) => 4,
            Self::SessionNotFound(_) => 5,
            Self::NavigationFailed(_) | Self::InjectionFailed(_) => 6,
            Self::ConfigError(_)
            | Self::TomlDeError(_)
            | Self::TomlSerError(_)
            | Self::InvalidPort(_) => 7,
            Self::InvalidUrl(_) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(EditorError::ConnectionLost.exit_code(), 3);
        assert_eq!(EditorError::UnsupportedEncoding("grpc".into()).exit_code(), 4);
        assert_eq!(EditorError::SessionNotFound(1).exit_code(), 5);
        assert_eq!(EditorError::NavigationFailed("x".into()).exit_code(), 6);
        assert_eq!(EditorError::InjectionFailed("x".into()).exit_code(), 6);
        assert_eq!(EditorError::InvalidPort(80).exit_code(), 7);
        assert_eq!(EditorError::InvalidUrl("x".into()).exit_code(), 2);
        assert_eq!(EditorError::General("x".into()).exit_code(), 1);
    }
}
