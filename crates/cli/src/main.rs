mod config;
mod input;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use modlink_core::{LinkError, LinkFailure, LinkedModule, LinkerConfig, ModuleGraph};
use tracing_subscriber::EnvFilter;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Module definition linker.
#[derive(Parser)]
#[command(name = "modlink", version, about = "Module definition linker")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log linker progress to stderr (overrides MODLINK_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Linker configuration file (defaults to ./modlink.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Link a module document and print the resolved entity graph
    Link {
        /// Path to the module document (.json, .yaml)
        module: PathBuf,
        /// Type catalog restricting attribute references
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Link a module document and print the provider template
    Template {
        /// Path to the module document (.json, .yaml)
        module: PathBuf,
        /// Type catalog restricting attribute references
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Link a module document and print function environment bindings
    Env {
        /// Path to the module document (.json, .yaml)
        module: PathBuf,
        /// Only print the environment of this function
        #[arg(long)]
        function: Option<String>,
        /// Type catalog restricting attribute references
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Validate a module document against the module JSON Schema
    Validate {
        /// Path to the module document (.json, .yaml)
        module: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => fail(&format!("{:#}", e), cli.output, cli.quiet),
    };

    match cli.command {
        Commands::Link { module, catalog } => {
            cmd_link(&module, catalog.as_deref(), &config, cli.output, cli.quiet);
        }
        Commands::Template { module, catalog } => {
            cmd_template(&module, catalog.as_deref(), &config, cli.output, cli.quiet);
        }
        Commands::Env {
            module,
            function,
            catalog,
        } => {
            cmd_env(
                &module,
                function.as_deref(),
                catalog.as_deref(),
                &config,
                cli.output,
                cli.quiet,
            );
        }
        Commands::Validate { module } => {
            cmd_validate(&module, cli.output, cli.quiet);
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("MODLINK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Load, link, and return the module, or report every diagnostic and exit.
fn link_module(
    module: &Path,
    catalog: Option<&Path>,
    config: &LinkerConfig,
    output: OutputFormat,
    quiet: bool,
) -> LinkedModule {
    let doc = match input::read_document(module) {
        Ok(doc) => doc,
        Err(e) => fail(&format!("{:#}", e), output, quiet),
    };
    let catalog = match input::read_catalog(catalog) {
        Ok(c) => c,
        Err(e) => fail(&format!("{:#}", e), output, quiet),
    };
    let graph = match ModuleGraph::from_document(doc, config) {
        Ok(g) => g,
        Err(errors) => {
            report_diagnostics(&errors, output, quiet);
            process::exit(1);
        }
    };

    match modlink_core::link(graph, config, &*catalog) {
        Ok(linked) => linked,
        Err(LinkFailure::Diagnostics(errors)) => {
            report_diagnostics(&errors, output, quiet);
            process::exit(1);
        }
        Err(e @ LinkFailure::Structural(_)) => fail(&e.to_string(), output, quiet),
    }
}

fn cmd_link(
    module: &Path,
    catalog: Option<&Path>,
    config: &LinkerConfig,
    output: OutputFormat,
    quiet: bool,
) {
    let linked = link_module(module, catalog, config, output, quiet);
    print_json(&linked.to_json_value());
}

fn cmd_template(
    module: &Path,
    catalog: Option<&Path>,
    config: &LinkerConfig,
    output: OutputFormat,
    quiet: bool,
) {
    let linked = link_module(module, catalog, config, output, quiet);
    print_json(&linked.template(config));
}

fn cmd_env(
    module: &Path,
    function: Option<&str>,
    catalog: Option<&Path>,
    config: &LinkerConfig,
    output: OutputFormat,
    quiet: bool,
) {
    let linked = link_module(module, catalog, config, output, quiet);

    let selected: Vec<_> = match function {
        Some(name) => match linked.environments.get(name) {
            Some(env) => vec![env],
            None => fail(
                &format!("'{}' is not a function of module '{}'", name, linked.graph.name),
                output,
                quiet,
            ),
        },
        None => linked.environments.values().collect(),
    };

    match output {
        OutputFormat::Json => {
            let envs: serde_json::Map<String, serde_json::Value> = selected
                .iter()
                .map(|env| {
                    let vars: serde_json::Map<String, serde_json::Value> = env
                        .variables
                        .iter()
                        .map(|(k, v)| (k.clone(), v.to_json()))
                        .collect();
                    (env.function.clone(), serde_json::Value::Object(vars))
                })
                .collect();
            print_json(&serde_json::Value::Object(envs));
        }
        OutputFormat::Text => {
            for env in selected {
                println!("[{}]", env.function);
                for (name, value) in &env.variables {
                    let rendered = match value.as_str() {
                        Some(s) => s.to_owned(),
                        None => value.to_json().to_string(),
                    };
                    println!("{}={}", name, rendered);
                }
            }
        }
    }
}

static MODULE_SCHEMA_STR: &str = include_str!("../../../schema/module-schema.json");

fn cmd_validate(module: &Path, output: OutputFormat, quiet: bool) {
    let schema: serde_json::Value = match serde_json::from_str(MODULE_SCHEMA_STR) {
        Ok(s) => s,
        Err(e) => fail(
            &format!("internal error: failed to parse embedded module schema: {}", e),
            output,
            quiet,
        ),
    };
    let validator = match jsonschema::validator_for(&schema) {
        Ok(v) => v,
        Err(e) => fail(
            &format!("internal error: failed to compile schema: {}", e),
            output,
            quiet,
        ),
    };

    let doc: serde_json::Value = match input::read_structured(module) {
        Ok(v) => v,
        Err(e) => fail(&format!("{:#}", e), output, quiet),
    };

    let errors: Vec<String> = validator
        .iter_errors(&doc)
        .map(|e| format!("{}", e))
        .collect();

    if errors.is_empty() {
        if !quiet {
            match output {
                OutputFormat::Text => println!("valid"),
                OutputFormat::Json => println!("{{\"valid\": true}}"),
            }
        }
        return;
    }

    match output {
        OutputFormat::Text => {
            if !quiet {
                eprintln!("invalid module document");
                for err in &errors {
                    eprintln!("  - {}", err);
                }
            }
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "valid": false,
                "errors": errors,
            });
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string())
            );
        }
    }
    process::exit(1);
}

fn print_json(value: &serde_json::Value) {
    let pretty = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("serialization error: {}", e));
    println!("{}", pretty);
}

/// Print linker diagnostics. JSON output is emitted even with `--quiet`.
fn report_diagnostics(errors: &[LinkError], output: OutputFormat, quiet: bool) {
    match output {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "errors": errors.iter().map(LinkError::to_json_value).collect::<Vec<_>>(),
            });
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string())
            );
        }
        OutputFormat::Text => {
            if !quiet {
                for e in errors {
                    eprintln!("error[{}]: {}", e.kind.as_str(), e);
                }
                eprintln!("linking failed with {} error(s)", errors.len());
            }
        }
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}

fn fail(msg: &str, output: OutputFormat, quiet: bool) -> ! {
    report_error(msg, output, quiet);
    process::exit(1);
}
