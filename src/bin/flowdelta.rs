//! Flowdelta CLI - Command-line interface for Flowdelta
//!
//! Commands:
//! - compare: Compare As-Is and To-Be event files
//! - timeline: Build per-user timelines for a single event file
//! - validate: Validate event rows
//! - doctor: Diagnose configuration and environment
//! - schema: Print schema information

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use flowdelta::schema::{parse_timestamp, EventRowAdapter, SCHEMA_VERSION};
use flowdelta::source::RowFormat;
use flowdelta::{
    BacktrackPolicy, ComparisonEngine, EngineConfig, EventQuery, FileEventSource,
    TotalDurationPolicy, FLOWDELTA_VERSION, PRODUCER_NAME,
};

/// Flowdelta - Compare As-Is and To-Be process telemetry
#[derive(Parser)]
#[command(name = "flowdelta")]
#[command(version = FLOWDELTA_VERSION)]
#[command(about = "Compare baseline and redesigned process event logs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare As-Is and To-Be event files
    Compare {
        /// As-Is (baseline) event file
        #[arg(long)]
        as_is: PathBuf,

        /// To-Be (redesigned) event file
        #[arg(long)]
        to_be: PathBuf,

        /// Input format (guessed from the file extension when omitted)
        #[arg(long)]
        input_format: Option<InputFormat>,

        /// Engine configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Backtrack definition (consecutive-step, action-revisit, step-revisit)
        #[arg(long)]
        backtrack_policy: Option<BacktrackPolicy>,

        /// Total duration definition (span, sum-of-steps)
        #[arg(long)]
        total_policy: Option<TotalDurationPolicy>,

        /// Only events at or after this time
        #[arg(long)]
        from: Option<String>,

        /// Only events at or before this time
        #[arg(long)]
        to: Option<String>,

        /// Only events of this exact user identifier
        #[arg(long)]
        user: Option<String>,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Build per-user timelines for a single event file
    Timeline {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Engine configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Only events of this exact user identifier
        #[arg(long)]
        user: Option<String>,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Validate event rows
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check this configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input, output or config)
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one row per line)
    Ndjson,
    /// JSON array of rows
    Json,
}

impl From<InputFormat> for RowFormat {
    fn from(format: InputFormat) -> Self {
        match format {
            InputFormat::Ndjson => RowFormat::Ndjson,
            InputFormat::Json => RowFormat::Json,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (flowdelta.event_row.v1)
    Input,
    /// Output schema (comparison payload)
    Output,
    /// Default engine configuration as TOML
    Config,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), FlowdeltaCliError> {
    match cli.command {
        Commands::Compare {
            as_is,
            to_be,
            input_format,
            config,
            backtrack_policy,
            total_policy,
            from,
            to,
            user,
            output,
            output_format,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(policy) = backtrack_policy {
                config.backtrack_policy = policy;
            }
            if let Some(policy) = total_policy {
                config.total_duration_policy = policy;
            }

            let query = EventQuery {
                from: from.as_deref().map(|v| parse_timestamp("from", v)).transpose()?,
                to: to.as_deref().map(|v| parse_timestamp("to", v)).transpose()?,
                user,
            };

            let mut source = FileEventSource::new(as_is, to_be);
            if let Some(format) = input_format {
                source = source.with_format(format.into());
            }

            cmd_compare(config, &source, &query, &output, &output_format)
        }

        Commands::Timeline {
            input,
            input_format,
            config,
            user,
            output_format,
        } => cmd_timeline(&input, input_format, config.as_deref(), user, &output_format),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),

        Commands::Schema {
            schema_type,
            json_schema,
        } => cmd_schema(schema_type, json_schema),
    }
}

fn cmd_compare(
    config: EngineConfig,
    source: &FileEventSource,
    query: &EventQuery,
    output: &Path,
    output_format: &OutputFormat,
) -> Result<(), FlowdeltaCliError> {
    let engine = ComparisonEngine::new(config);
    let comparison = engine.compare_source(source, query)?;

    if comparison.as_is_summaries.is_empty() && comparison.to_be_summaries.is_empty() {
        return Err(FlowdeltaCliError::NoEvents);
    }

    let output_data = format_output(&comparison, output_format)?;

    if output.to_string_lossy() == "-" {
        println!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_timeline(
    input: &Path,
    input_format: InputFormat,
    config: Option<&Path>,
    user: Option<String>,
    output_format: &OutputFormat,
) -> Result<(), FlowdeltaCliError> {
    let engine = ComparisonEngine::new(load_config(config)?);
    let query = EventQuery {
        user,
        ..EventQuery::default()
    };

    let events: Vec<_> = RowFormat::from(input_format)
        .parse(&read_input(input)?)?
        .into_iter()
        .filter(|e| query.matches(e))
        .collect();

    if events.is_empty() {
        return Err(FlowdeltaCliError::NoEvents);
    }

    println!("{}", format_output(&engine.timelines(&events), output_format)?);
    Ok(())
}

fn cmd_validate(
    input: &Path,
    input_format: InputFormat,
    json: bool,
) -> Result<(), FlowdeltaCliError> {
    let input_data = read_input(input)?;

    let rows = match input_format {
        InputFormat::Ndjson => EventRowAdapter::parse_ndjson(&input_data)?,
        InputFormat::Json => EventRowAdapter::parse_array(&input_data)?,
    };

    let failures = EventRowAdapter::validate_rows(&rows);

    let report = ValidationReport {
        schema_version: SCHEMA_VERSION.to_string(),
        total_rows: rows.len(),
        valid_rows: rows.len() - failures.len(),
        invalid_rows: failures.len(),
        errors: failures
            .iter()
            .map(|f| ValidationErrorDetail {
                index: f.index,
                user_identifier: f.user_identifier.clone(),
                error: f.error.clone(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total rows:   {}", report.total_rows);
        println!("Valid rows:   {}", report.valid_rows);
        println!("Invalid rows: {}", report.invalid_rows);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - Row {} (user {}): {}",
                    err.index,
                    err.user_identifier.as_deref().unwrap_or("unknown"),
                    err.error
                );
            }
        }
    }

    if report.invalid_rows > 0 {
        Err(FlowdeltaCliError::ValidationFailed(report.invalid_rows))
    } else {
        Ok(())
    }
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), FlowdeltaCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "flowdelta_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Flowdelta version {}", FLOWDELTA_VERSION),
    });

    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Input schema: {}", SCHEMA_VERSION),
    });

    match config {
        Some(path) if !path.exists() => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Warning,
            message: "Configuration file does not exist".to_string(),
        }),
        Some(path) => match EngineConfig::load(path) {
            Ok(config) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "Configuration valid (backtrack={}, total={}, {} mapped steps, {} phases)",
                    config.backtrack_policy.as_str(),
                    config.total_duration_policy.as_str(),
                    config.phase_table.steps.len(),
                    config.phase_table.known_phases().len()
                ),
            }),
            Err(e) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            }),
        },
        None => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "Using built-in defaults".to_string(),
        }),
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (rows can be piped to validate/timeline)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: FLOWDELTA_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Flowdelta Doctor Report");
        println!("=======================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(FlowdeltaCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), FlowdeltaCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", get_input_json_schema());
            } else {
                println!("Input Schema: {}", SCHEMA_VERSION);
                println!();
                println!("One row per logged action (aliases in parentheses):");
                println!("  - user_identifier (email, user_id)    optional, \"unknown\" if absent");
                println!("  - step_label (step)                   optional");
                println!("  - action_label (action)               optional");
                println!("  - detail                              any JSON, passed through");
                println!("  - occurred_at (ts, timestamp)         required");
                println!("  - next_occurred_at (next_ts)          optional");
                println!("  - duration_to_next_seconds (dur_to_next_sec)  number or numeric string");
                println!("  - prev_step_label (prev_step), next_step_label (next_step)");
                println!();
                println!("Timestamps: RFC 3339, YYYY-MM-DD HH:MM[:SS[.fff]] (UTC), YYYY-MM-DD");
            }
        }
        SchemaType::Output => {
            if json_schema {
                println!("{}", get_output_json_schema());
            } else {
                println!("Output: comparison payload");
                println!();
                println!("- producer: {{ name, version, instance_id }}");
                println!("- computed_at, policies: {{ backtrack, total_duration }}, user_filter, query: {{ from, to, user }}");
                println!("- as_is_summaries / to_be_summaries: per-user");
                println!("  {{ user, total_min, event_count, transitions, backtracks, step_avg_sec }}");
                println!("- phase_rows: {{ phase, asis_avg_min, asis_total_min, tobe_avg_min, tobe_total_min }}");
                println!("- as_is_timeline / to_be_timeline: user -> [{{ user, step, phase, start, end, duration_min }}]");
            }
        }
        SchemaType::Config => {
            println!("{}", EngineConfig::default().to_toml_string()?);
        }
    }

    Ok(())
}

// Helper functions

fn load_config(path: Option<&Path>) -> Result<EngineConfig, FlowdeltaCliError> {
    match path {
        Some(path) => Ok(EngineConfig::load(path)?),
        None => Ok(EngineConfig::default()),
    }
}

fn read_input(input: &Path) -> Result<String, FlowdeltaCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn format_output<T: serde::Serialize>(
    value: &T,
    format: &OutputFormat,
) -> Result<String, FlowdeltaCliError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(value)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(value)?),
    }
}

fn get_input_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": SCHEMA_VERSION,
        "description": "Flowdelta event row",
        "type": "object",
        "required": ["occurred_at"],
        "properties": {
            "user_identifier": { "type": ["string", "null"] },
            "step_label": { "type": ["string", "null"] },
            "action_label": { "type": ["string", "null"] },
            "detail": {},
            "occurred_at": { "type": "string" },
            "next_occurred_at": { "type": ["string", "null"] },
            "duration_to_next_seconds": { "type": ["number", "string", "null"] },
            "prev_step_label": { "type": ["string", "null"] },
            "next_step_label": { "type": ["string", "null"] }
        }
    })
    .to_string()
}

fn get_output_json_schema() -> String {
    let segment = serde_json::json!({
        "type": "object",
        "properties": {
            "user": { "type": "string" },
            "step": { "type": "string" },
            "phase": { "type": "string" },
            "start": { "type": "string", "format": "date-time" },
            "end": { "type": "string", "format": "date-time" },
            "duration_min": { "type": "number" }
        }
    });
    let summary = serde_json::json!({
        "type": "object",
        "properties": {
            "user": { "type": "string" },
            "total_min": { "type": "number" },
            "event_count": { "type": "integer" },
            "transitions": { "type": "integer" },
            "backtracks": { "type": "integer" },
            "step_avg_sec": { "type": "object", "additionalProperties": { "type": "number" } }
        }
    });

    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "flowdelta.comparison",
        "type": "object",
        "required": ["producer", "computed_at", "policies", "as_is_summaries", "to_be_summaries",
                     "phase_rows", "as_is_timeline", "to_be_timeline"],
        "properties": {
            "producer": {
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "version": { "type": "string" },
                    "instance_id": { "type": "string" }
                }
            },
            "computed_at": { "type": "string", "format": "date-time" },
            "policies": {
                "type": "object",
                "properties": {
                    "backtrack": { "enum": ["consecutive-step", "action-revisit", "step-revisit"] },
                    "total_duration": { "enum": ["span", "sum-of-steps"] }
                }
            },
            "user_filter": { "type": "string" },
            "query": {
                "type": "object",
                "properties": {
                    "from": { "type": "string", "format": "date-time" },
                    "to": { "type": "string", "format": "date-time" },
                    "user": { "type": "string" }
                }
            },
            "as_is_summaries": { "type": "array", "items": summary.clone() },
            "to_be_summaries": { "type": "array", "items": summary },
            "phase_rows": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "phase": { "type": "string" },
                        "asis_avg_min": { "type": "number" },
                        "asis_total_min": { "type": "number" },
                        "tobe_avg_min": { "type": "number" },
                        "tobe_total_min": { "type": "number" }
                    }
                }
            },
            "as_is_timeline": {
                "type": "object",
                "additionalProperties": { "type": "array", "items": segment.clone() }
            },
            "to_be_timeline": {
                "type": "object",
                "additionalProperties": { "type": "array", "items": segment }
            }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum FlowdeltaCliError {
    Io(io::Error),
    Compute(flowdelta::ComputeError),
    Json(serde_json::Error),
    NoEvents,
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for FlowdeltaCliError {
    fn from(e: io::Error) -> Self {
        FlowdeltaCliError::Io(e)
    }
}

impl From<flowdelta::ComputeError> for FlowdeltaCliError {
    fn from(e: flowdelta::ComputeError) -> Self {
        FlowdeltaCliError::Compute(e)
    }
}

impl From<serde_json::Error> for FlowdeltaCliError {
    fn from(e: serde_json::Error) -> Self {
        FlowdeltaCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<FlowdeltaCliError> for CliError {
    fn from(e: FlowdeltaCliError) -> Self {
        use flowdelta::ComputeError;

        match e {
            FlowdeltaCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            FlowdeltaCliError::Compute(e) => {
                let (code, hint) = match &e {
                    ComputeError::InvalidInput(_) => {
                        ("INVALID_INPUT", "Check the event groups passed in")
                    }
                    ComputeError::MalformedTimestamp { .. } => (
                        "MALFORMED_TIMESTAMP",
                        "Use RFC 3339 or YYYY-MM-DD HH:MM:SS timestamps",
                    ),
                    ComputeError::UpstreamFailure { .. } => {
                        ("UPSTREAM_FAILURE", "Check that both event files are readable")
                    }
                    ComputeError::ConfigError(_) => {
                        ("CONFIG_ERROR", "Run 'flowdelta schema config' for a valid example")
                    }
                    ComputeError::Io(_) => ("IO_ERROR", "Check file paths and permissions"),
                    ComputeError::ParseError(_) | ComputeError::JsonError(_) => (
                        "PARSE_ERROR",
                        "Ensure input matches flowdelta.event_row.v1 schema",
                    ),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            FlowdeltaCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            FlowdeltaCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No events matched the query".to_string(),
                hint: Some("Widen --from/--to or drop --user".to_string()),
            },
            FlowdeltaCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} rows failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            FlowdeltaCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    schema_version: String,
    total_rows: usize,
    valid_rows: usize,
    invalid_rows: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    user_identifier: Option<String>,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
