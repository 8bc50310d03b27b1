//! # healthlens-runtime
//!
//! Runs HealthLens flows against a hosted model.
//!
//! `healthlens-core` decides what a valid request, prompt and result look
//! like; this crate performs the one non-deterministic step, the model call,
//! and turns every way it can go wrong into a [`FlowError`].
//!
//! ## Providers
//!
//! Providers are selected with cargo features:
//! - `gemini`: Google Gemini, structured output and image generation
//! - `anthropic`: Anthropic Claude, text only
//!
//! The scripted [`StubProvider`] is always available for tests and offline
//! runs.
//!
//! ## Example
//!
//! ```rust,ignore
//! use healthlens_runtime::{FlowRunner, HealthLens, ProviderRegistry, RuntimeConfig};
//!
//! let config = RuntimeConfig::from_file("healthlens.yaml")?.apply_env()?;
//! let provider = config.build_provider(&ProviderRegistry::with_defaults())?;
//! let lens = HealthLens::new(FlowRunner::new(provider, config))?;
//!
//! match lens.check_symptoms(&request).await {
//!     Ok(assessment) => println!("urgency: {:?}", assessment.urgency),
//!     Err(e) if e.is_retryable_by_caller() => println!("Please try again"),
//!     Err(e) => println!("{}", e),
//! }
//! ```

pub mod config;
pub mod error;
pub mod flows;
pub mod invocation;
pub mod providers;
pub mod runner;

pub use config::{ConfigError, RetryConfig, RuntimeConfig};
pub use error::{FlowError, ProviderError};
pub use flows::HealthLens;
pub use invocation::FlowInvocation;
pub use providers::{
    CompletionConfig, Media, ModelProvider, ModelRequest, ModelResponse, ProviderRegistry,
    StubProvider, StubReply, TokenUsage,
};
pub use runner::FlowRunner;
