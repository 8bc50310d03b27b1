//! The record of one flow invocation.
//!
//! Invocations are transient: the runner returns the record to the caller
//! and keeps nothing.

use chrono::{DateTime, Utc};
use healthlens_core::Record;
use serde_json::Value;

use crate::error::FlowError;

/// What happened during one call to a flow.
#[derive(Debug, Clone)]
pub struct FlowInvocation {
    pub flow: String,

    pub started_at: DateTime<Utc>,

    pub finished_at: DateTime<Utc>,

    /// The request as received
    pub request: Value,

    /// The request after validation and defaults, if it was valid
    pub validated_request: Option<Record>,

    /// The rendered prompt, if one was rendered
    pub prompt: Option<String>,

    /// Response text from the model, if it was called and answered
    pub raw_text: Option<String>,

    /// Whether the model returned any media
    pub media_returned: bool,

    /// Crisis phrase that replaced the model result with the safe fallback
    pub safety_keyword: Option<String>,

    /// Model calls made (0 when validation or the safety check ended the flow)
    pub attempts: u32,

    /// The validated, post-processed output or the first error met
    pub outcome: Result<Value, FlowError>,
}

impl FlowInvocation {
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Whether the safe fallback was returned instead of a model result.
    pub fn overridden(&self) -> bool {
        self.safety_keyword.is_some()
    }

    pub fn into_result(self) -> Result<Value, FlowError> {
        self.outcome
    }
}

/// Collects invocation details while the runner works.
#[derive(Debug)]
pub(crate) struct InvocationRecorder {
    started_at: DateTime<Utc>,
    pub(crate) validated_request: Option<Record>,
    pub(crate) prompt: Option<String>,
    pub(crate) raw_text: Option<String>,
    pub(crate) media_returned: bool,
    pub(crate) safety_keyword: Option<String>,
    pub(crate) attempts: u32,
}

impl InvocationRecorder {
    pub(crate) fn start() -> Self {
        Self {
            started_at: Utc::now(),
            validated_request: None,
            prompt: None,
            raw_text: None,
            media_returned: false,
            safety_keyword: None,
            attempts: 0,
        }
    }

    pub(crate) fn finish(
        self,
        flow: &str,
        request: Value,
        outcome: Result<Value, FlowError>,
    ) -> FlowInvocation {
        FlowInvocation {
            flow: flow.to_string(),
            started_at: self.started_at,
            finished_at: Utc::now(),
            request,
            validated_request: self.validated_request,
            prompt: self.prompt,
            raw_text: self.raw_text,
            media_returned: self.media_returned,
            safety_keyword: self.safety_keyword,
            attempts: self.attempts,
            outcome,
        }
    }
}
