use shared::error::{ApiError, ErrorCode};
use thiserror::Error;

/// Failure of a single backend call.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("{method} rejected with status {status}: {error}")]
    Status {
        method: String,
        status: u16,
        error: ApiError,
    },
    #[error("failed to encode {method} request: {message}")]
    Encode { method: String, message: String },
    #[error("failed to decode {method} response: {message}")]
    Decode { method: String, message: String },
}

impl RpcError {
    pub fn api_code(&self) -> Option<ErrorCode> {
        match self {
            RpcError::Status { error, .. } => Some(error.code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RpcError {
    fn from(err: reqwest::Error) -> Self {
        RpcError::Transport(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("{0}")]
    Validation(String),
    #[error("session storage failure: {0}")]
    Storage(String),
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        ClientError::Validation(message.into())
    }

    /// Text suitable for a notice shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Validation(message) => message.clone(),
            ClientError::Rpc(RpcError::Status { error, .. }) => match error.code {
                ErrorCode::Unauthorized => "Session expired, please log in again.".to_string(),
                ErrorCode::Validation => error.message.clone(),
                _ => "Request failed, please try again later.".to_string(),
            },
            ClientError::Rpc(_) => "Request failed, please try again later.".to_string(),
            ClientError::Storage(message) => format!("Could not save the session: {message}"),
        }
    }
}
