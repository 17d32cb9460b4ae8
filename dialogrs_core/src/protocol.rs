//! Wire format of the `activate` / `tryMatch` exchange.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{DialogError, DialogInstance, RemoteMatch, Result, Task};

pub const ACTIVATE: &str = "activate";
pub const TRY_MATCH: &str = "tryMatch";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum DialogRequest {
    #[serde(rename = "activate")]
    Activate {
        name: String,
        #[serde(rename = "match", alias = "message", default)]
        context: RemoteMatch,
        #[serde(default)]
        args: Value,
    },
    #[serde(rename = "tryMatch")]
    TryMatch {
        name: String,
        instance: String,
        #[serde(rename = "match", alias = "message", default)]
        context: RemoteMatch,
    },
}

impl DialogRequest {
    /// Parse a request body, telling an unknown `method` apart from a
    /// malformed body.
    pub fn from_value(body: Value) -> Result<Self> {
        let method = body
            .get("method")
            .and_then(Value::as_str)
            .ok_or_else(|| DialogError::InvalidRequest("missing \"method\"".to_string()))?;
        if method != ACTIVATE && method != TRY_MATCH {
            return Err(DialogError::UnknownMethod(method.to_string()));
        }
        serde_json::from_value(body).map_err(|e| DialogError::InvalidRequest(e.to_string()))
    }

    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::Activate { .. } => ACTIVATE,
            Self::TryMatch { .. } => TRY_MATCH,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Activate { name, .. } | Self::TryMatch { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    #[default]
    Continue,
    Replace,
    End,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DialogResponse {
    /// Side effects for the caller to run, in order.
    #[serde(default)]
    pub tasks: Vec<Task>,
    /// The root instance after the call; absent once the dialog ended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<DialogInstance>,
    #[serde(default)]
    pub matched: bool,
    #[serde(default)]
    pub transition: TransitionKind,
    /// Value handed back by an `end` transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// Body of a failed protocol exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl From<&DialogError> for ErrorBody {
    fn from(err: &DialogError) -> Self {
        Self {
            error: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

impl ErrorBody {
    /// Rebuild a local error from what a remote engine reported.
    #[must_use]
    pub fn into_error(self) -> DialogError {
        match self.error.as_str() {
            "unknownMethod" => DialogError::UnknownMethod(self.message),
            "invalidTransition" => DialogError::InvalidTransition(self.message),
            "invalidRequest" => DialogError::InvalidRequest(self.message),
            "handlerFailure" | "handlerTimeout" => {
                DialogError::HandlerFailure(anyhow::anyhow!(self.message))
            }
            _ => DialogError::Remote {
                kind: self.error,
                message: self.message,
            },
        }
    }
}
