//! `healthlens`: check, render and run HealthLens flows.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use healthlens_core::{describe, Catalog, FlowDefinition};
use healthlens_runtime::{FlowError, FlowRunner, ProviderRegistry, RuntimeConfig};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "healthlens")]
#[command(version)]
#[command(about = "Check, render and run HealthLens prompt flows")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the built-in flows
    Flows {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load and compile flow definition files, reporting every problem
    Check {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },

    /// Validate a request and print the prompt it renders, without calling a model
    Render {
        /// Flow name
        flow: String,

        /// Request file (JSON or YAML), or `-` for stdin
        #[arg(long, short)]
        input: String,

        /// Load the flow from this definition file instead of the built-ins
        #[arg(long)]
        definition: Option<PathBuf>,
    },

    /// Run a flow against the configured model provider
    Run {
        /// Flow name
        flow: String,

        /// Request file (JSON or YAML), or `-` for stdin
        #[arg(long, short)]
        input: String,

        /// Runtime config file (YAML or JSON)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Load the flow from this definition file instead of the built-ins
        #[arg(long)]
        definition: Option<PathBuf>,

        /// Print the full invocation record instead of just the output
        #[arg(long)]
        trace: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("healthlens=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Flows { json } => list_flows(json),
        Command::Check { files } => check(&files),
        Command::Render {
            flow,
            input,
            definition,
        } => render(&flow, &input, definition.as_deref()),
        Command::Run {
            flow,
            input,
            config,
            definition,
            trace,
        } => run(&flow, &input, config.as_deref(), definition.as_deref(), trace).await,
    }
}

fn list_flows(as_json: bool) -> Result<()> {
    let catalog = Catalog::builtin().context("built-in flows failed to compile")?;

    if as_json {
        let flows: Vec<Value> = catalog
            .iter()
            .map(|flow| {
                json!({
                    "name": flow.name(),
                    "version": flow.version(),
                    "description": flow.description(),
                    "idempotent": flow.idempotent(),
                    "input": flow.input().iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
                    "output": flow.output().iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&flows)?);
        return Ok(());
    }

    for flow in catalog.iter() {
        println!(
            "{:<24} v{:<5} {}",
            flow.name(),
            flow.version(),
            flow.description().unwrap_or("")
        );
    }
    Ok(())
}

fn check(files: &[PathBuf]) -> Result<()> {
    let mut failed = 0;

    for file in files {
        match FlowDefinition::from_file(file) {
            Ok(flow) => println!("ok      {} ({})", file.display(), flow.name()),
            Err(e) => {
                failed += 1;
                println!("FAILED  {}", file.display());
                let problems = e.problems();
                if problems.is_empty() {
                    println!("  - {}", e);
                }
                for problem in problems {
                    println!("  - {}", problem);
                }
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} definitions failed", failed, files.len());
    }
    Ok(())
}

fn render(flow: &str, input: &str, definition: Option<&Path>) -> Result<()> {
    let flow = resolve_flow(flow, definition)?;
    let request = read_request(input)?;

    let validated = match flow.validate_input(&request) {
        Ok(validated) => validated,
        Err(violations) => {
            for violation in &violations {
                eprintln!("  - {}", violation);
            }
            bail!("request is not valid for '{}'", flow.name());
        }
    };

    if let Some(found) = flow.screen(&validated) {
        eprintln!(
            "Crisis phrase '{}' found in {}: the safe fallback would be returned",
            found.keyword, found.field
        );
    }

    if let Some(system) = flow.render_system(&validated) {
        println!("--- system ---\n{}", system);
    }
    println!("--- prompt ---\n{}", flow.render_prompt(&validated));
    Ok(())
}

async fn run(
    flow: &str,
    input: &str,
    config: Option<&Path>,
    definition: Option<&Path>,
    trace: bool,
) -> Result<()> {
    let flow = resolve_flow(flow, definition)?;
    let request = read_request(input)?;

    let config = match config {
        Some(path) => RuntimeConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => RuntimeConfig::default(),
    }
    .apply_env()
    .context("invalid HEALTHLENS_* environment override")?;

    let provider = config
        .build_provider(&ProviderRegistry::with_defaults())
        .with_context(|| format!("failed to create provider '{}'", config.provider))?;
    tracing::debug!(provider = %provider.name(), flow = %flow.name(), "Provider ready");
    let runner = FlowRunner::new(provider, config);

    let invocation = runner.invoke(&flow, request).await;

    if trace {
        let record = json!({
            "flow": &invocation.flow,
            "startedAt": invocation.started_at.to_rfc3339(),
            "elapsedMs": invocation.elapsed().num_milliseconds(),
            "attempts": invocation.attempts,
            "safetyKeyword": &invocation.safety_keyword,
            "prompt": &invocation.prompt,
            "rawText": &invocation.raw_text,
            "mediaReturned": invocation.media_returned,
            "outcome": match &invocation.outcome {
                Ok(output) => json!({"ok": output}),
                Err(e) => error_json(e),
            },
        });
        println!("{}", serde_json::to_string_pretty(&record)?);
    }

    match invocation.outcome {
        Ok(output) => {
            if !trace {
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            Ok(())
        }
        Err(e) => {
            if !e.violations().is_empty() {
                eprintln!("{}", describe(e.violations()));
            }
            if e.is_retryable_by_caller() {
                eprintln!("The model call failed; trying again may help.");
            }
            Err(e.into())
        }
    }
}

fn error_json(error: &FlowError) -> Value {
    json!({
        "error": error.kind(),
        "message": error.to_string(),
        "retryable": error.is_retryable_by_caller(),
        "violations": error.violations(),
    })
}

/// A flow from a definition file, or a built-in by name.
fn resolve_flow(name: &str, definition: Option<&Path>) -> Result<Arc<FlowDefinition>> {
    if let Some(path) = definition {
        let flow = FlowDefinition::from_file(path)
            .with_context(|| format!("failed to load definition {}", path.display()))?;
        if flow.name() != name {
            bail!(
                "{} defines '{}', not '{}'",
                path.display(),
                flow.name(),
                name
            );
        }
        return Ok(Arc::new(flow));
    }

    let catalog = Catalog::builtin().context("built-in flows failed to compile")?;
    catalog.get(name).with_context(|| {
        format!(
            "unknown flow '{}' (available: {})",
            name,
            catalog.names().collect::<Vec<_>>().join(", ")
        )
    })
}

/// Read a request document from a file or stdin. YAML is a superset of JSON,
/// so one parser covers both.
fn read_request(input: &str) -> Result<Value> {
    let contents = if input == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read request from stdin")?;
        buffer
    } else {
        fs::read_to_string(input).with_context(|| format!("failed to read request {}", input))?
    };

    parse_request(&contents).with_context(|| format!("request {} is not JSON or YAML", input))
}

fn parse_request(contents: &str) -> Result<Value> {
    Ok(serde_yaml::from_str(contents)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use healthlens_runtime::ProviderError;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_arguments() {
        let cli = Cli::try_parse_from([
            "healthlens",
            "run",
            "check_symptoms",
            "--input",
            "-",
            "--config",
            "healthlens.yaml",
        ])
        .unwrap();
        match cli.command {
            Command::Run {
                flow, input, config, ..
            } => {
                assert_eq!(flow, "check_symptoms");
                assert_eq!(input, "-");
                assert_eq!(config, Some(PathBuf::from("healthlens.yaml")));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_request_json_and_yaml() {
        assert_eq!(
            parse_request(r#"{"entry": "hi", "moodRating": 4}"#).unwrap(),
            json!({"entry": "hi", "moodRating": 4})
        );
        assert_eq!(
            parse_request("entry: hi\ntags: [rest]\n").unwrap(),
            json!({"entry": "hi", "tags": ["rest"]})
        );
    }

    #[test]
    fn test_resolve_builtin_flow() {
        assert_eq!(resolve_flow("check_symptoms", None).unwrap().name(), "check_symptoms");
        let err = resolve_flow("diagnose_everything", None).unwrap_err();
        assert!(err.to_string().contains("generate_meal_plan"));
    }

    #[test]
    fn test_error_json() {
        let error = FlowError::ModelInvocation {
            flow: "check_symptoms".into(),
            source: ProviderError::AuthError,
        };
        let value = error_json(&error);
        assert_eq!(value["error"], "model_invocation");
        assert_eq!(value["retryable"], true);
        assert_eq!(value["violations"], json!([]));
    }
}
