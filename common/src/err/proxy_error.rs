use std::io;

use thiserror::Error;

/// Infrastructure-level error for the proxy process: configuration,
/// startup, listener and backend wiring faults. Per-query rejections are
/// a separate type owned by the pipeline.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to parse configuration file: {0}")]
    ConfigFileParse(String),

    #[error("backend connection error: {0}")]
    Connection(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(String),
}

impl ProxyError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        ProxyError::Config(msg.into())
    }

    pub fn connection<S: Into<String>>(msg: S) -> Self {
        ProxyError::Connection(msg.into())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_display() {
        let e = ProxyError::config("missing [backend] section");
        assert_eq!(
            e.to_string(),
            "configuration error: missing [backend] section"
        );
    }
}
