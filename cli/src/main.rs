use std::fs;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand};
use rayon::prelude::*;
use registry_contract_api::endpoints;
use registry_contract_core::{Compiler, ValidationError, ValidationResult};
use registry_contract_document::{ContractConfig, DocumentFormat, SchemaDocument, convert};
use serde_json::Value;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "registry-contract")]
#[command(about = "Schema document conversion and registry document validation")]
#[command(version)]
struct Cli {
    /// Path to a YAML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Convert the YAML schema document to JSON.
    Convert(ConvertArgs),
    /// Validate JSON or YAML documents against an entity.
    Validate(ValidateArgs),
    /// List the entities of a schema document.
    Entities(EntitiesArgs),
    /// List the API endpoints.
    Endpoints,
}

#[derive(Debug, Args)]
struct ConvertArgs {
    /// YAML document to read (default from configuration).
    #[arg(long)]
    input: Option<PathBuf>,
    /// JSON document to write (default from configuration).
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ValidateArgs {
    /// Entity to validate against (e.g. ServerList).
    #[arg(long)]
    entity: String,
    /// Schema document to load instead of the configured or bundled one.
    #[arg(long)]
    document: Option<PathBuf>,
    /// Number of parallel validation jobs.
    #[arg(long)]
    jobs: Option<usize>,
    /// Documents to validate.
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[derive(Debug, Args)]
struct EntitiesArgs {
    /// Schema document to load instead of the configured or bundled one.
    #[arg(long)]
    document: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Command::Convert(args) => run_convert(&config, args),
        Command::Validate(args) => run_validate(config, args),
        Command::Entities(args) => run_entities(config, args),
        Command::Endpoints => run_endpoints(),
    });

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<ContractConfig, String> {
    match path {
        Some(path) => {
            let config = ContractConfig::load(path).map_err(|err| {
                format!("Failed to load config '{}': {err}", path.display())
            })?;
            debug!(path = %path.display(), "Loaded configuration");
            Ok(config)
        }
        None => Ok(ContractConfig::default()),
    }
}

fn load_document(mut config: ContractConfig, document: Option<PathBuf>) -> Result<SchemaDocument, String> {
    if document.is_some() {
        config.document = document;
    }
    config.load_document().map_err(|err| match &config.document {
        Some(path) => format!("Failed to load document '{}': {err}", path.display()),
        None => format!("Failed to load bundled document: {err}"),
    })
}

fn run_convert(config: &ContractConfig, args: ConvertArgs) -> Result<(), String> {
    let input = args.input.unwrap_or_else(|| config.conversion.input.clone());
    let output = args.output.unwrap_or_else(|| config.conversion.output.clone());

    convert(&input, &output).map_err(|err| {
        format!("Failed to convert '{}': {err}", input.display())
    })?;

    println!("Converted '{}' to '{}'.", input.display(), output.display());
    Ok(())
}

/// Outcome of one input file.
enum FileOutcome {
    Valid,
    Invalid(Vec<ValidationError>),
    Unreadable(String),
}

fn run_validate(config: ContractConfig, args: ValidateArgs) -> Result<(), String> {
    let jobs = args.jobs.unwrap_or(config.validation.jobs).max(1);
    let document = load_document(config, args.document)?;
    let registry = document.registry().map_err(|err| err.to_string())?;
    let validator = Compiler::new(&registry)
        .compile(&args.entity)
        .map_err(|err| err.to_string())?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| format!("Failed to create thread pool: {e}"))?;

    let outcomes: Vec<FileOutcome> = pool.install(|| {
        args.files
            .par_iter()
            .map(|path| match read_input(path) {
                Ok(value) => match validator.validate(&value) {
                    ValidationResult::Valid(_) => FileOutcome::Valid,
                    ValidationResult::Invalid(errors) => FileOutcome::Invalid(errors),
                },
                Err(err) => FileOutcome::Unreadable(err),
            })
            .collect()
    });

    let mut failed = 0usize;
    for (path, outcome) in args.files.iter().zip(&outcomes) {
        match outcome {
            FileOutcome::Valid => println!("{}: valid", path.display()),
            FileOutcome::Invalid(errors) => {
                failed += 1;
                for error in errors {
                    if error.path.is_root() {
                        println!("{}: {}", path.display(), error.message);
                    } else {
                        println!("{}: {}: {}", path.display(), error.path, error.message);
                    }
                }
            }
            FileOutcome::Unreadable(err) => {
                failed += 1;
                eprintln!("{}: {err}", path.display());
            }
        }
    }

    info!(
        entity = %args.entity,
        files = outcomes.len(),
        failed,
        "Validation finished"
    );

    if failed > 0 {
        return Err(format!(
            "{failed} of {} document(s) failed validation against {}",
            outcomes.len(),
            args.entity
        ));
    }
    Ok(())
}

fn read_input(path: &Path) -> Result<Value, String> {
    let raw = fs::read_to_string(path).map_err(|err| format!("Failed to read: {err}"))?;
    match DocumentFormat::from_path(path) {
        Some(DocumentFormat::Yaml) => {
            serde_yaml::from_str(&raw).map_err(|err| format!("Invalid YAML: {err}"))
        }
        _ => serde_json::from_str(&raw).map_err(|err| format!("Invalid JSON: {err}")),
    }
}

fn run_entities(config: ContractConfig, args: EntitiesArgs) -> Result<(), String> {
    let document = load_document(config, args.document)?;
    let registry = document.registry().map_err(|err| err.to_string())?;

    for entity in registry.entities() {
        let references = entity.shape().references();
        if references.is_empty() {
            println!("{}", entity.name());
        } else {
            println!("{} -> {}", entity.name(), references.join(", "));
        }
    }
    println!("fingerprint: {}", document.fingerprint());
    Ok(())
}

fn run_endpoints() -> Result<(), String> {
    for endpoint in endpoints() {
        println!(
            "{:<6} {:<44} {}",
            endpoint.method.as_str(),
            endpoint.path,
            endpoint.alias
        );
    }
    Ok(())
}
