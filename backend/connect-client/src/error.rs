use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Transport failure; the request may not have reached the server
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("{message} (status {status})")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            ClientError::Decode(_) => None,
        }
    }

    /// Machine-readable error kind reported by the server
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
