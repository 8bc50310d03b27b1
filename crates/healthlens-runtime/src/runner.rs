//! The typed flow runner.
//!
//! One invocation is a straight pipeline:
//! 1. Validate the request against the input contract
//! 2. Screen it for crisis phrases (pre-call guards)
//! 3. Render the prompt
//! 4. Call the model under a timeout, retrying idempotent flows at most once
//! 5. Extract and validate the payload against the output contract
//! 6. Apply the post-processing rules
//!
//! The first failing step ends the invocation with its [`FlowError`]. A
//! post-call guard match replaces steps 4 to 6 with the safe fallback once
//! the call has been made, even when the call failed.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use backon::{ExponentialBuilder, Retryable};
use healthlens_core::{FlowDefinition, PayloadError, Record, SafetyMatch, SafetyMode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::RuntimeConfig;
use crate::error::FlowError;
use crate::invocation::{FlowInvocation, InvocationRecorder};
use crate::providers::{
    CompletionConfig, ModelProvider, ModelRequest, ModelResponse, ProviderError,
};

/// Runs compiled flows against a model provider.
///
/// Holds only immutable configuration and a shared provider, so one runner
/// can serve any number of concurrent invocations.
pub struct FlowRunner {
    provider: Arc<dyn ModelProvider>,
    config: RuntimeConfig,
}

impl std::fmt::Debug for FlowRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowRunner")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .finish()
    }
}

impl FlowRunner {
    pub fn new(provider: Arc<dyn ModelProvider>, config: RuntimeConfig) -> Self {
        Self { provider, config }
    }

    pub fn provider(&self) -> &Arc<dyn ModelProvider> {
        &self.provider
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Run a flow and return its validated, post-processed output.
    pub async fn run(&self, flow: &FlowDefinition, request: Value) -> Result<Value, FlowError> {
        self.invoke(flow, request).await.into_result()
    }

    /// Run a flow with typed request and result.
    pub async fn run_typed<I, O>(
        &self,
        flow: &FlowDefinition,
        request: &I,
    ) -> Result<O, FlowError>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        // A request that cannot be serialized fails input validation at `$`.
        let request = serde_json::to_value(request).unwrap_or_else(|e| {
            tracing::warn!(flow = %flow.name(), error = %e, "Request could not be serialized");
            Value::Null
        });
        let output = self.run(flow, request).await?;

        serde_json::from_value(output).map_err(|e| FlowError::OutputValidation {
            flow: flow.name().to_string(),
            reason: format!("result does not fit the requested type: {}", e),
            violations: Vec::new(),
        })
    }

    /// Run a flow and return the full invocation record.
    pub async fn invoke(&self, flow: &FlowDefinition, request: Value) -> FlowInvocation {
        let mut recorder = InvocationRecorder::start();
        let started = Instant::now();

        let outcome = self.execute(flow, &request, &mut recorder).await;

        match &outcome {
            Ok(_) => tracing::info!(
                flow = %flow.name(),
                attempts = recorder.attempts,
                overridden = recorder.safety_keyword.is_some(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Flow completed"
            ),
            Err(e) => tracing::info!(
                flow = %flow.name(),
                kind = e.kind(),
                attempts = recorder.attempts,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Flow failed"
            ),
        }

        recorder.finish(flow.name(), request, outcome)
    }

    async fn execute(
        &self,
        flow: &FlowDefinition,
        request: &Value,
        recorder: &mut InvocationRecorder,
    ) -> Result<Value, FlowError> {
        let name = flow.name();

        let input = flow.validate_input(request).map_err(|violations| {
            tracing::debug!(flow = %name, violations = violations.len(), "Request rejected");
            FlowError::InputValidation {
                flow: name.to_string(),
                violations,
            }
        })?;
        recorder.validated_request = Some(input.clone());

        if let Some(found) = self.screen(flow, &input, SafetyMode::PreCall) {
            return self.fallback(flow, &input, found, recorder);
        }

        // Post-call guards still make the call, but the fallback wins whatever it returns.
        let post_call = self.screen(flow, &input, SafetyMode::PostCall);
        let output = self.model_output(flow, &input, recorder).await;

        if let Some(found) = post_call {
            if let Err(e) = &output {
                tracing::warn!(
                    flow = %name,
                    kind = e.kind(),
                    error = %e,
                    "Model call failed under a post-call guard"
                );
            }
            return self.fallback(flow, &input, found, recorder);
        }
        let output = output?;

        flow.post_process(&input, output)
            .map(Value::Object)
            .map_err(|violations| {
                tracing::error!(
                    flow = %name,
                    violations = %healthlens_core::describe(&violations),
                    "Post-processing produced an invalid output"
                );
                FlowError::OutputValidation {
                    flow: name.to_string(),
                    reason: "post-processed output does not match the output contract".to_string(),
                    violations,
                }
            })
    }

    /// Render, call the model and validate what comes back.
    async fn model_output(
        &self,
        flow: &FlowDefinition,
        input: &Record,
        recorder: &mut InvocationRecorder,
    ) -> Result<Record, FlowError> {
        let name = flow.name();

        let prompt = flow.render_prompt(input);
        recorder.prompt = Some(prompt.clone());

        let generation = flow.generation();
        let mut model_request =
            ModelRequest::text(prompt).with_modalities(generation.modalities.clone());
        if let Some(system) = flow.render_system(input) {
            model_request = model_request.with_system(system);
        }
        if generation.structured() {
            model_request = model_request.with_schema(flow.response_schema().clone());
        }
        let completion = self.config.completion_config(generation);

        let response = self
            .call_model(flow, &model_request, &completion, recorder)
            .await
            .map_err(|source| FlowError::ModelInvocation {
                flow: name.to_string(),
                source,
            })?;
        recorder.raw_text = response.text.clone();
        recorder.media_returned = !response.media.is_empty();

        let payload = flow
            .extract_payload(
                response.text.as_deref(),
                response.first_media().map(|m| m.url.as_str()),
            )
            .map_err(|e| match e {
                PayloadError::Empty => {
                    tracing::warn!(
                        flow = %name,
                        stop_reason = ?response.stop_reason,
                        "Model returned no usable output"
                    );
                    FlowError::EmptyModelOutput {
                        flow: name.to_string(),
                    }
                }
                PayloadError::Malformed(_) => {
                    tracing::warn!(
                        target: "healthlens::drift",
                        flow = %name,
                        error = %e,
                        "Model payload is not JSON"
                    );
                    FlowError::OutputValidation {
                        flow: name.to_string(),
                        reason: e.to_string(),
                        violations: Vec::new(),
                    }
                }
            })?;

        flow.validate_output(&payload).map_err(|violations| {
            tracing::warn!(
                target: "healthlens::drift",
                flow = %name,
                model = %response.model,
                violations = %healthlens_core::describe(&violations),
                "Model output does not match the output contract"
            );
            FlowError::OutputValidation {
                flow: name.to_string(),
                reason: "payload does not match the output contract".to_string(),
                violations,
            }
        })
    }

    fn screen(
        &self,
        flow: &FlowDefinition,
        input: &Record,
        mode: SafetyMode,
    ) -> Option<SafetyMatch> {
        flow.safety()
            .filter(|guard| guard.mode() == mode)
            .and_then(|guard| guard.screen(input))
    }

    fn fallback(
        &self,
        flow: &FlowDefinition,
        input: &Record,
        found: SafetyMatch,
        recorder: &mut InvocationRecorder,
    ) -> Result<Value, FlowError> {
        tracing::warn!(
            flow = %flow.name(),
            field = %found.field,
            attempts = recorder.attempts,
            "Crisis phrase detected, returning safe fallback"
        );
        recorder.safety_keyword = Some(found.keyword);

        match flow.safe_fallback(input) {
            Some(Ok(output)) => Ok(Value::Object(output)),
            Some(Err(violations)) => Err(FlowError::OutputValidation {
                flow: flow.name().to_string(),
                reason: "safe fallback does not match the output contract".to_string(),
                violations,
            }),
            None => Err(FlowError::OutputValidation {
                flow: flow.name().to_string(),
                reason: "no safe fallback for the request language".to_string(),
                violations: Vec::new(),
            }),
        }
    }

    /// Call the provider, each attempt bounded by the configured timeout.
    async fn call_model(
        &self,
        flow: &FlowDefinition,
        request: &ModelRequest,
        completion: &CompletionConfig,
        recorder: &mut InvocationRecorder,
    ) -> Result<ModelResponse, ProviderError> {
        let retries = if flow.idempotent() {
            self.config.retry.effective_retries()
        } else {
            0
        };
        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.config.retry.initial_delay)
            .with_max_times(retries as usize);

        let attempts = AtomicU32::new(0);
        let (provider, attempts_ref, name) = (&self.provider, &attempts, flow.name());
        let timeout = completion.timeout;

        let result = (|| async move {
            let attempt = attempts_ref.fetch_add(1, Ordering::Relaxed) + 1;
            let started = Instant::now();
            let call = provider.generate(request, completion);
            let result = match tokio::time::timeout(timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(timeout)),
            };
            tracing::debug!(
                flow = %name,
                provider = %provider.name(),
                model = %completion.model,
                attempt,
                elapsed_ms = started.elapsed().as_millis() as u64,
                ok = result.is_ok(),
                "Model call finished"
            );
            result
        })
        .retry(backoff)
        .when(|e: &ProviderError| e.is_transient())
        .notify(|e: &ProviderError, delay| {
            tracing::warn!(flow = %name, error = %e, delay = ?delay, "Retrying model call");
        })
        .await;

        recorder.attempts = attempts.load(Ordering::Relaxed);
        if let Err(e) = &result {
            tracing::warn!(
                flow = %name,
                provider = %self.provider.name(),
                error = %e,
                attempts = recorder.attempts,
                "Model invocation failed"
            );
        }
        result
    }
}
