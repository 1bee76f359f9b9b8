use thiserror::Error;

/// Failure inside one metadata provider. Never fatal for a resolution.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{provider} request failed: {source}")]
    Http {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider} returned {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },
    #[error("{provider} response could not be decoded: {message}")]
    Decode {
        provider: &'static str,
        message: String,
    },
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

/// Failure talking to the remote file storage.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("storage API error {status} on {endpoint}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("local file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected storage response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("storage authentication failed: {0}")]
    Auth(String),
}
