use std::time::Duration;

use thiserror::Error;

use crate::DialogInstance;

pub type Result<T> = std::result::Result<T, DialogError>;

#[derive(Debug, Error)]
pub enum DialogError {
    #[error("No dialog registered under name: {0}")]
    DialogNotFound(String),

    #[error("No stored data for dialog instance {0}")]
    InstanceNotFound(DialogInstance),

    #[error("Invalid stack transition: {0}")]
    InvalidTransition(String),

    #[error("Dialog handler failed: {0}")]
    HandlerFailure(anyhow::Error),

    #[error("Dialog handler did not settle within {}ms", .0.as_millis())]
    HandlerTimeout(Duration),

    #[error("No such method: {0}")]
    UnknownMethod(String),

    #[error("Dialog already registered: {0}")]
    DuplicateDialog(String),

    #[error("Invalid matcher pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Task execution failed: {0}")]
    TaskFailure(anyhow::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Remote engine reported {kind}: {message}")]
    Remote { kind: String, message: String },
}

impl DialogError {
    /// Stable identifier reported on the wire.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::DialogNotFound(_) | Self::InstanceNotFound(_) => "notFound",
            Self::InvalidTransition(_) => "invalidTransition",
            Self::HandlerFailure(_) => "handlerFailure",
            Self::HandlerTimeout(_) => "handlerTimeout",
            Self::UnknownMethod(_) => "unknownMethod",
            Self::DuplicateDialog(_) => "duplicateDialog",
            Self::InvalidPattern(_) => "invalidPattern",
            Self::InvalidRequest(_) => "invalidRequest",
            Self::Serialization(_) => "serialization",
            Self::TaskFailure(_) => "taskFailure",
            Self::Transport(_) => "transport",
            Self::Remote { .. } => "remote",
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::DialogNotFound(_) | Self::InstanceNotFound(_) => true,
            Self::Remote { kind, .. } => kind == "notFound",
            _ => false,
        }
    }
}
