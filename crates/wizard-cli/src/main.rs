use clap::{Parser, Subcommand};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use wizard_component::search_with;
use wizard_spec::{
    DiagnosticReport, Engine, EngineConfig, FormState, HttpTransport, SchemaDocument,
    check_update, diagnose, document_json_schema, materialize, resolve_visibility,
};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Metadata wizard schema engine",
    long_about = "Evaluates a metadata wizard schema: field visibility, upstream API searches and output document materialization"
)]
struct Cli {
    /// Schema document describing sections, fields and APIs.
    #[arg(long, global = true, env = "WIZARD_SCHEMA", value_name = "SCHEMA")]
    schema: Option<PathBuf>,
    /// Default upstream timeout in milliseconds.
    #[arg(long, global = true, env = "WIZARD_TIMEOUT_MS", value_name = "MS")]
    timeout_ms: Option<u64>,
    /// Log engine activity at debug level on stderr.
    #[arg(long, global = true, alias = "debug")]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Query one of the schema's APIs and print normalized candidates.
    Search {
        /// API identifier from the schema's `apis` table.
        #[arg(long)]
        api: String,
        /// Search text forwarded as the API's query parameter.
        #[arg(long)]
        query: String,
        /// Form state JSON supplying context parameters.
        #[arg(long, value_name = "STATE")]
        state: Option<PathBuf>,
    },
    /// Print the visibility of every section and field.
    Visible {
        #[arg(long, value_name = "STATE")]
        state: Option<PathBuf>,
    },
    /// Build the output document from a form state.
    Materialize {
        #[arg(long, value_name = "STATE")]
        state: PathBuf,
        /// Write the document here instead of stdout.
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Report authoring problems in the schema.
    Check,
    /// Print the JSON Schema of the schema document format.
    Schema,
    /// Compare the local schema version with a published copy.
    CheckUpdate {
        /// URL serving the published schema document.
        #[arg(long)]
        url: String,
    },
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let mut config = EngineConfig::default();
    if let Some(timeout_ms) = cli.timeout_ms {
        config = config.with_timeout_ms(timeout_ms);
    }
    match cli.command {
        Command::Search { api, query, state } => {
            run_search(cli.schema.as_deref(), config, &api, &query, state.as_deref())
        }
        Command::Visible { state } => run_visible(cli.schema.as_deref(), state.as_deref()),
        Command::Materialize { state, out } => {
            run_materialize(cli.schema.as_deref(), &state, out.as_deref())
        }
        Command::Check => run_check(cli.schema.as_deref()),
        Command::Schema => print_json(&document_json_schema()),
        Command::CheckUpdate { url } => run_check_update(cli.schema.as_deref(), config, &url),
    }
}

fn log_filter(verbose: bool, from_env: Option<EnvFilter>) -> EnvFilter {
    if verbose {
        return EnvFilter::new("debug");
    }
    from_env.unwrap_or_else(|| EnvFilter::new("warn"))
}

fn init_tracing(verbose: bool) {
    let filter = log_filter(verbose, EnvFilter::try_from_default_env().ok());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_schema(path: Option<&Path>) -> CliResult<SchemaDocument> {
    let path = path.ok_or("no schema given; pass --schema or set WIZARD_SCHEMA")?;
    Ok(SchemaDocument::load(path)?)
}

fn load_state(path: Option<&Path>) -> CliResult<FormState> {
    match path {
        Some(path) => {
            let contents = fs::read_to_string(path)?;
            Ok(serde_json::from_str(&contents)?)
        }
        None => Ok(FormState::default()),
    }
}

fn print_json(value: &Value) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_search(
    schema: Option<&Path>,
    config: EngineConfig,
    api: &str,
    query: &str,
    state: Option<&Path>,
) -> CliResult<()> {
    let schema = load_schema(schema)?;
    let state_json = match state {
        Some(path) => fs::read_to_string(path)?,
        None => String::new(),
    };
    let engine = Engine::new(schema, config)?;
    let envelope: Value = serde_json::from_str(&search_with(&engine, api, query, &state_json))?;
    print_json(&envelope)?;
    match envelope.get("error").and_then(Value::as_str) {
        Some(error) => {
            let kind = envelope
                .get("kind")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            Err(format!("search failed ({kind}): {error}").into())
        }
        None => Ok(()),
    }
}

fn run_visible(schema: Option<&Path>, state: Option<&Path>) -> CliResult<()> {
    let schema = load_schema(schema)?;
    let state = load_state(state)?;
    print_json(&serde_json::to_value(resolve_visibility(&schema, &state))?)
}

fn run_materialize(schema: Option<&Path>, state: &Path, out: Option<&Path>) -> CliResult<()> {
    let schema = load_schema(schema)?;
    let state = load_state(Some(state))?;
    let document = materialize(&schema, &state)?;
    match out {
        Some(out) => {
            fs::write(out, serde_json::to_string_pretty(&document)?)?;
            println!("Output document written to {}", out.display());
            Ok(())
        }
        None => print_json(&document),
    }
}

fn run_check(schema: Option<&Path>) -> CliResult<()> {
    let schema = load_schema(schema)?;
    let report = diagnose(&schema);
    println!(
        "Schema {}: {}",
        schema.version,
        if report.valid { "valid" } else { "invalid" }
    );
    describe_report(&report);
    if report.valid {
        Ok(())
    } else {
        Err(format!("{} schema issue(s) found", report.issues.len()).into())
    }
}

fn describe_report(report: &DiagnosticReport) {
    for issue in &report.issues {
        println!("  [{}] {} - {}", issue.code, issue.location, issue.message);
    }
}

fn run_check_update(schema: Option<&Path>, config: EngineConfig, url: &str) -> CliResult<()> {
    let schema = load_schema(schema)?;
    let transport = HttpTransport::new(&config)?;
    let status = check_update(&schema, url, &transport);
    print_json(&serde_json::to_value(&status)?)?;
    match status.error {
        Some(error) => Err(format!("update check failed: {error}").into()),
        None => Ok(()),
    }
}
