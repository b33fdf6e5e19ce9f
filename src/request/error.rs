use thiserror::Error;

use crate::config::TIMEOUT_MESSAGE;

#[derive(Error, Debug)]
pub enum RequestError {
    #[error("{}", TIMEOUT_MESSAGE)]
    Timeout,

    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid header: {name}")]
    InvalidHeader { name: String },

    #[error("Failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to save attachment: {0}")]
    Save(anyhow::Error),
}

impl RequestError {
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Status { status, .. } => Some(*status),
            RequestError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, RequestError::Timeout)
    }
}
