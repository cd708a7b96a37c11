use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("network error: {0}")]
    Network(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("digest mismatch for {file}: expected {expected}, got {actual}")]
    DigestMismatch {
        file: String,
        expected: String,
        actual: String,
    },
    #[error("refusing remote file name {0:?}")]
    InvalidFileName(String),
    #[error("cancelled")]
    Cancelled,
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(code, response) => {
                Error::Network(format!("HTTP {code} from {}", response.get_url()))
            }
            ureq::Error::Transport(transport) => Error::Network(transport.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err.to_string())
    }
}

#[derive(Debug, Error)]
#[error("failed to update {package} to {file_name}: {source}")]
pub struct UpdateError {
    pub package: String,
    pub file_name: String,
    #[source]
    pub source: Error,
}

pub type Result<T> = std::result::Result<T, Error>;
