//! Error taxonomy of a flow invocation.

use std::time::Duration;

use healthlens_core::{describe, Violation};
use thiserror::Error;

/// Errors from model providers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Malformed response envelope: {0}")]
    ParseError(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Unsupported request: {0}")]
    Unsupported(String),
}

impl ProviderError {
    /// Whether the same request may succeed if sent again.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::HttpError(_)
            | ProviderError::RateLimited { .. }
            | ProviderError::Timeout(_) => true,
            ProviderError::ApiError { status, .. } => *status == 408 || *status >= 500,
            _ => false,
        }
    }
}

/// Why a flow invocation failed.
///
/// The runner surfaces the first error it meets and never returns a partial
/// result.
#[derive(Error, Debug, Clone)]
pub enum FlowError {
    /// The request does not satisfy the input contract; nothing was sent to
    /// the model.
    #[error("Invalid input for '{flow}': {}", describe(.violations))]
    InputValidation {
        flow: String,
        violations: Vec<Violation>,
    },

    /// Transport failure, non-success status, malformed envelope or timeout.
    #[error("Model invocation failed for '{flow}': {source}")]
    ModelInvocation { flow: String, source: ProviderError },

    /// The model answered without any usable content.
    #[error("Model returned no usable output for '{flow}'")]
    EmptyModelOutput { flow: String },

    /// The model answered with content that does not match the output
    /// contract. Indicates model or schema drift.
    #[error("Model output for '{flow}' does not match its contract: {reason}")]
    OutputValidation {
        flow: String,
        reason: String,
        violations: Vec<Violation>,
    },
}

impl FlowError {
    pub fn flow(&self) -> &str {
        match self {
            FlowError::InputValidation { flow, .. }
            | FlowError::ModelInvocation { flow, .. }
            | FlowError::EmptyModelOutput { flow }
            | FlowError::OutputValidation { flow, .. } => flow,
        }
    }

    /// Stable identifier for logs and API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            FlowError::InputValidation { .. } => "input_validation",
            FlowError::ModelInvocation { .. } => "model_invocation",
            FlowError::EmptyModelOutput { .. } => "empty_model_output",
            FlowError::OutputValidation { .. } => "output_validation",
        }
    }

    /// Whether a caller should offer the user a manual retry.
    pub fn is_retryable_by_caller(&self) -> bool {
        matches!(
            self,
            FlowError::ModelInvocation { .. } | FlowError::EmptyModelOutput { .. }
        )
    }

    /// Field-level detail for validation failures.
    pub fn violations(&self) -> &[Violation] {
        match self {
            FlowError::InputValidation { violations, .. }
            | FlowError::OutputValidation { violations, .. } => violations,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthlens_core::ViolationKind;

    #[test]
    fn test_transient_provider_errors() {
        assert!(ProviderError::HttpError("reset".into()).is_transient());
        assert!(ProviderError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(ProviderError::RateLimited { retry_after: None }.is_transient());
        assert!(ProviderError::ApiError {
            status: 503,
            message: "overloaded".into()
        }
        .is_transient());
        assert!(!ProviderError::ApiError {
            status: 400,
            message: "bad".into()
        }
        .is_transient());
        assert!(!ProviderError::AuthError.is_transient());
        assert!(!ProviderError::Unsupported("image".into()).is_transient());
    }

    #[test]
    fn test_retryable_by_caller() {
        let input = FlowError::InputValidation {
            flow: "f".into(),
            violations: vec![Violation::new("age", ViolationKind::Missing)],
        };
        let empty = FlowError::EmptyModelOutput { flow: "f".into() };
        let invocation = FlowError::ModelInvocation {
            flow: "f".into(),
            source: ProviderError::AuthError,
        };
        let drift = FlowError::OutputValidation {
            flow: "f".into(),
            reason: "payload does not match".into(),
            violations: Vec::new(),
        };
        assert!(!input.is_retryable_by_caller());
        assert!(empty.is_retryable_by_caller());
        assert!(invocation.is_retryable_by_caller());
        assert!(!drift.is_retryable_by_caller());
        assert_eq!(input.violations().len(), 1);
        assert_eq!(drift.kind(), "output_validation");
    }

    #[test]
    fn test_input_error_message_lists_fields() {
        let err = FlowError::InputValidation {
            flow: "generate_meal_plan".into(),
            violations: vec![
                Violation::new("age", ViolationKind::Missing),
                Violation::new("gender", ViolationKind::Missing),
            ],
        };
        let message = err.to_string();
        assert!(message.contains("generate_meal_plan"));
        assert!(message.contains("age"));
        assert!(message.contains("gender"));
    }
}
