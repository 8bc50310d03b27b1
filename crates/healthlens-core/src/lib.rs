//! # healthlens-core
//!
//! Deterministic half of the HealthLens typed flow runtime.
//!
//! A flow turns a typed request into a typed, post-processed result:
//! validate the request against the input contract, render the prompt,
//! (call a model, in `healthlens-runtime`), validate the payload against the
//! output contract, then apply the declared post-processing rules.
//!
//! ## Key Guarantees
//!
//! 1. **Checked once**: templates, rules and safety sections are verified
//!    against the contracts when a flow is compiled, never per call
//! 2. **No unvalidated output**: every result, including a safe fallback,
//!    has passed output-contract validation after post-processing
//! 3. **Injection-safe prompts**: request values are inserted as text after
//!    parsing and never change the template's structure
//! 4. **No I/O**: nothing here calls a model or the network
//!
//! ## Example
//!
//! ```rust,ignore
//! use healthlens_core::Catalog;
//!
//! let catalog = Catalog::builtin()?;
//! let flow = catalog.get("check_symptoms").unwrap();
//! let input = flow.validate_input(&request)?;
//! if let Some(found) = flow.screen(&input) {
//!     println!("Crisis phrase '{}' in {}", found.keyword, found.field);
//! }
//! println!("{}", flow.render_prompt(&input));
//! ```

pub mod catalog;
pub mod contract;
pub mod definition;
pub mod path;
pub mod rules;
pub mod safety;
pub mod template;

// Re-export main types at crate root
pub use catalog::{Catalog, BUILTIN_FLOWS};
pub use contract::{
    describe, Contract, FieldSpec, FieldType, Pattern, Record, Violation, ViolationKind,
};
pub use definition::{
    DefinitionError, FlowDefinition, FlowDocument, GenerationSpec, Modality, OutputMapping,
    PayloadError,
};
pub use path::{FieldPath, PathError};
pub use rules::{EnsureDisclaimer, PostRule};
pub use safety::{KeywordMatcher, SafetyGuard, SafetyMatch, SafetyMode, SafetySpec};
pub use template::{Template, TemplateError, TemplateResolutionError};
