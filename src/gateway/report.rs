//! Uniform operation response

use crate::error::GatewayError;
use serde::Serialize;

/// Text block returned by every gateway operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolResponse {
    pub text: String,
    pub is_error: bool,
}

impl ToolResponse {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn failure(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }

    /// Pick the success or failure text
    pub fn judged(success: bool, ok: impl FnOnce() -> String, err: impl FnOnce() -> String) -> Self {
        if success {
            Self::success(ok())
        } else {
            Self::failure(err())
        }
    }

    /// Collapse an operation result into a response
    pub fn from_result(result: Result<Self, GatewayError>) -> Self {
        result.unwrap_or_else(Self::from)
    }
}

impl From<GatewayError> for ToolResponse {
    fn from(err: GatewayError) -> Self {
        Self::failure(err.to_string())
    }
}
