// crates/northstar-cli/src/main.rs
// ============================================================================
// Module: Northstar CLI Entry Point
// Description: Command dispatcher for audit ledger and configuration tasks.
// Purpose: Give operators and compliance reviewers offline ledger tooling.
// Dependencies: clap, northstar-config, northstar-core, serde, thiserror.
// ============================================================================

//! ## Overview
//! The `northstar` binary verifies tenant audit chains, queries and exports
//! audit records, and checks configuration files. Ledger commands run against
//! the durable `SQLite` store, located either through `northstar.toml` or an
//! explicit `--store-path`. Output is canonical JSON on stdout; a chain that
//! fails verification exits non-zero. Security posture: inputs are untrusted
//! and every filter is validated before the store is touched.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use northstar_config::AlertSinkType;
use northstar_config::NorthstarConfig;
use northstar_config::StoreType;
use northstar_config::bootstrap;
use northstar_core::AuditEventType;
use northstar_core::AuditLedger;
use northstar_core::AuditQuery;
use northstar_core::ChainVerification;
use northstar_core::CorrelationId;
use northstar_core::PageRequest;
use northstar_core::PrincipalId;
use northstar_core::SequenceRange;
use northstar_core::TenantContext;
use northstar_core::TenantId;
use northstar_core::Timestamp;
use northstar_core::runtime::ledger::DEFAULT_PAGE_SIZE;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "northstar", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Audit ledger verification, query, and export.
    Ledger {
        /// Selected ledger subcommand.
        #[command(subcommand)]
        command: LedgerCommand,
    },
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Ledger subcommands.
#[derive(Subcommand, Debug)]
enum LedgerCommand {
    /// Recompute a tenant chain and report broken links.
    Verify(LedgerVerifyCommand),
    /// Query audit records with filters.
    Query(LedgerQueryCommand),
    /// Export a tenant chain range as JSON lines.
    Export(LedgerExportCommand),
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate a configuration file.
    Check(ConfigCheckCommand),
}

/// Store location arguments shared by ledger commands.
#[derive(Args, Debug, Clone)]
struct StoreLocationArgs {
    /// Optional config file path (defaults to northstar.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Optional direct `SQLite` store path (overrides config).
    #[arg(long = "store-path", value_name = "PATH")]
    store_path: Option<PathBuf>,
}

/// Sequence range arguments.
#[derive(Args, Debug, Clone, Copy)]
struct RangeArgs {
    /// First sequence number (inclusive).
    #[arg(long = "from-seq", value_name = "SEQ")]
    from_seq: Option<u64>,
    /// Last sequence number (inclusive); defaults to the chain head.
    #[arg(long = "to-seq", value_name = "SEQ")]
    to_seq: Option<u64>,
}

/// Output formats for verification.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Canonical JSON output.
    Json,
    /// Human-readable text output.
    Text,
}

/// Arguments for `ledger verify`.
#[derive(Args, Debug)]
struct LedgerVerifyCommand {
    /// Store location settings.
    #[command(flatten)]
    location: StoreLocationArgs,
    /// Tenant whose chain is verified.
    #[arg(long, value_name = "TENANT_ID")]
    tenant: String,
    /// Sequence range to verify.
    #[command(flatten)]
    range: RangeArgs,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

/// Arguments for `ledger query`.
#[derive(Args, Debug)]
struct LedgerQueryCommand {
    /// Store location settings.
    #[command(flatten)]
    location: StoreLocationArgs,
    /// Tenant to query.
    #[arg(long, value_name = "TENANT_ID")]
    tenant: String,
    /// Actor filter.
    #[arg(long, value_name = "PRINCIPAL_ID")]
    actor: Option<String>,
    /// Entity type filter.
    #[arg(long = "entity-type", value_name = "TYPE")]
    entity_type: Option<String>,
    /// Entity id filter (requires `--entity-type`).
    #[arg(long = "entity-id", value_name = "ID", requires = "entity_type")]
    entity_id: Option<String>,
    /// Event type filter (snake case label).
    #[arg(long = "event-type", value_name = "EVENT")]
    event_type: Option<String>,
    /// Correlation id filter.
    #[arg(long, value_name = "CORRELATION_ID")]
    correlation: Option<String>,
    /// Inclusive lower time bound in unix milliseconds.
    #[arg(long = "from-ms", value_name = "MILLIS")]
    from_ms: Option<i64>,
    /// Exclusive upper time bound in unix milliseconds.
    #[arg(long = "to-ms", value_name = "MILLIS")]
    to_ms: Option<i64>,
    /// Return records after this sequence number.
    #[arg(long, value_name = "SEQ")]
    after: Option<u64>,
    /// Maximum records to return.
    #[arg(long, value_name = "COUNT", default_value_t = DEFAULT_PAGE_SIZE)]
    limit: usize,
}

/// Arguments for `ledger export`.
#[derive(Args, Debug)]
struct LedgerExportCommand {
    /// Store location settings.
    #[command(flatten)]
    location: StoreLocationArgs,
    /// Tenant whose chain is exported.
    #[arg(long, value_name = "TENANT_ID")]
    tenant: String,
    /// Sequence range to export.
    #[command(flatten)]
    range: RangeArgs,
    /// Output file for JSON lines; must not already exist.
    #[arg(long, value_name = "PATH")]
    output: PathBuf,
}

/// Arguments for `config check`.
#[derive(Args, Debug)]
struct ConfigCheckCommand {
    /// Optional config file path (defaults to northstar.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Commands::Ledger {
            command,
        } => match command {
            LedgerCommand::Verify(command) => command_ledger_verify(&command),
            LedgerCommand::Query(command) => command_ledger_query(&command),
            LedgerCommand::Export(command) => command_ledger_export(&command),
        },
        Commands::Config {
            command,
        } => match command {
            ConfigCommand::Check(command) => command_config_check(&command),
        },
    }
}

// ============================================================================
// SECTION: Ledger Commands
// ============================================================================

/// Executes `ledger verify`.
fn command_ledger_verify(command: &LedgerVerifyCommand) -> CliResult<ExitCode> {
    let ledger = open_ledger(&command.location)?;
    let ctx = tenant_context(&command.tenant)?;
    let range = parse_range(command.range)?;
    let report = ledger
        .verify_chain(&ctx, range)
        .map_err(|err| CliError::new(format!("chain verification failed: {err}")))?;
    match command.format {
        OutputFormat::Json => write_canonical_json(&report)?,
        OutputFormat::Text => write_stdout(&render_verification_text(&report))?,
    }
    Ok(if report.valid { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Executes `ledger query`.
fn command_ledger_query(command: &LedgerQueryCommand) -> CliResult<ExitCode> {
    let ctx = tenant_context(&command.tenant)?;
    let query = build_query(&ctx, command)?;
    let page = PageRequest {
        after_sequence: command.after,
        limit: command.limit,
    };
    let ledger = open_ledger(&command.location)?;
    let result =
        ledger.query(&query, page).map_err(|err| CliError::new(format!("query failed: {err}")))?;
    write_canonical_json(&result)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `ledger export`.
fn command_ledger_export(command: &LedgerExportCommand) -> CliResult<ExitCode> {
    let ctx = tenant_context(&command.tenant)?;
    let range = parse_range(command.range)?;
    let ledger = open_ledger(&command.location)?;
    let file = File::create_new(&command.output).map_err(|err| {
        CliError::new(format!("cannot create {}: {err}", command.output.display()))
    })?;
    let mut writer = BufWriter::new(file);
    let mut summary = ExportSummary {
        tenant_id: ctx.tenant_id().clone(),
        records: 0,
        first_sequence: None,
        last_sequence: None,
        output: command.output.display().to_string(),
    };
    for record in ledger.stream(&ctx, range) {
        let record = record.map_err(|err| CliError::new(format!("export failed: {err}")))?;
        let mut line = canonical_bytes(&record)?;
        line.push(b'\n');
        writer.write_all(&line).map_err(|err| write_error(&command.output, &err))?;
        summary.first_sequence.get_or_insert(record.sequence_number);
        summary.last_sequence = Some(record.sequence_number);
        summary.records += 1;
    }
    writer.flush().map_err(|err| write_error(&command.output, &err))?;
    write_canonical_json(&summary)?;
    Ok(ExitCode::SUCCESS)
}

/// Output for `ledger export`.
#[derive(Debug, Serialize)]
struct ExportSummary {
    /// Exported tenant.
    tenant_id: TenantId,
    /// Number of records written.
    records: u64,
    /// First exported sequence.
    first_sequence: Option<u64>,
    /// Last exported sequence.
    last_sequence: Option<u64>,
    /// Output file path.
    output: String,
}

/// Renders verification output in text form.
fn render_verification_text(report: &ChainVerification) -> String {
    let status = if report.valid { "valid" } else { "BROKEN" };
    let mut text = format!(
        "tenant {}: chain {status} ({} records checked)\n",
        report.tenant_id, report.records_checked
    );
    if !report.violations.is_empty() {
        let listed: Vec<String> = report.violations.iter().map(u64::to_string).collect();
        text.push_str(&format!("violations at sequence: {}\n", listed.join(", ")));
    }
    text
}

// ============================================================================
// SECTION: Config Command
// ============================================================================

/// Executes `config check`.
fn command_config_check(command: &ConfigCheckCommand) -> CliResult<ExitCode> {
    let config = NorthstarConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("config load failed: {err}")))?;
    let output = ConfigCheckOutput {
        status: "ok",
        store: match config.store.store_type {
            StoreType::Memory => "memory",
            StoreType::Sqlite => "sqlite",
        },
        alerts: match config.alerts.sink {
            AlertSinkType::Stderr => "stderr",
            AlertSinkType::File => "file",
            AlertSinkType::None => "none",
        },
        sensitive_permissions: config.authz.sensitive_permissions.len(),
        conflict_rules: config.authz.exclusive_roles.len(),
    };
    write_canonical_json(&output)?;
    Ok(ExitCode::SUCCESS)
}

/// Output for `config check`.
#[derive(Debug, Serialize)]
struct ConfigCheckOutput {
    /// Validation outcome.
    status: &'static str,
    /// Store backend.
    store: &'static str,
    /// Alert sink.
    alerts: &'static str,
    /// Number of sensitive permissions.
    sensitive_permissions: usize,
    /// Number of conflict rules.
    conflict_rules: usize,
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the configuration used by ledger commands.
fn resolve_ledger_config(location: &StoreLocationArgs) -> CliResult<NorthstarConfig> {
    let mut config = match (&location.config, &location.store_path) {
        (None, Some(_)) => NorthstarConfig::default(),
        (path, _) => NorthstarConfig::load(path.as_deref())
            .map_err(|err| CliError::new(format!("config load failed: {err}")))?,
    };
    if let Some(store_path) = &location.store_path {
        config.store.store_type = StoreType::Sqlite;
        config.store.path = Some(store_path.clone());
    }
    if config.store.store_type != StoreType::Sqlite {
        return Err(CliError::new("ledger commands require a sqlite store"));
    }
    let path = config
        .store
        .path
        .as_deref()
        .ok_or_else(|| CliError::new("sqlite store requires path"))?;
    if !path.is_file() {
        return Err(CliError::new(format!("store not found: {}", path.display())));
    }
    Ok(config)
}

/// Opens the audit ledger over the configured durable store.
fn open_ledger(location: &StoreLocationArgs) -> CliResult<Arc<AuditLedger>> {
    let config = resolve_ledger_config(location)?;
    let runtime =
        bootstrap(&config).map_err(|err| CliError::new(format!("store open failed: {err}")))?;
    Ok(runtime.ledger)
}

/// Builds a tenant context from a CLI argument.
fn tenant_context(tenant: &str) -> CliResult<TenantContext> {
    let tenant_id = TenantId::parse(tenant.trim())
        .map_err(|err| CliError::new(format!("invalid tenant: {err}")))?;
    TenantContext::for_tenant(tenant_id)
        .map_err(|err| CliError::new(format!("invalid tenant: {err}")))
}

/// Converts range arguments into a sequence range.
fn parse_range(range: RangeArgs) -> CliResult<SequenceRange> {
    let start = range.from_seq.unwrap_or(1);
    let parsed = match range.to_seq {
        Some(end) => SequenceRange::bounded(start, end),
        None => SequenceRange::from(start),
    };
    parsed.map_err(|err| CliError::new(format!("invalid range: {err}")))
}

/// Builds an audit query from CLI filters.
fn build_query(ctx: &TenantContext, command: &LedgerQueryCommand) -> CliResult<AuditQuery> {
    let mut query = AuditQuery::for_tenant(ctx);
    if let Some(actor) = &command.actor {
        let actor = PrincipalId::parse(actor.trim())
            .map_err(|err| CliError::new(format!("invalid actor: {err}")))?;
        query = query.actor(actor);
    }
    if let Some(entity_type) = &command.entity_type {
        query = query.entity(entity_type.trim(), command.entity_id.clone());
    }
    if let Some(label) = &command.event_type {
        let event_type = AuditEventType::parse(label.trim())
            .map_err(|err| CliError::new(format!("invalid event type: {err}")))?;
        query = query.event_type(event_type);
    }
    if let Some(correlation) = &command.correlation {
        let correlation = CorrelationId::parse(correlation.trim())
            .map_err(|err| CliError::new(format!("invalid correlation id: {err}")))?;
        query = query.correlation(correlation);
    }
    Ok(query.between(
        command.from_ms.map(Timestamp::from_unix_millis),
        command.to_ms.map(Timestamp::from_unix_millis),
    ))
}

/// Serializes a value as canonical JSON bytes.
fn canonical_bytes<T: Serialize>(value: &T) -> CliResult<Vec<u8>> {
    serde_jcs::to_vec(value).map_err(|err| CliError::new(format!("json encoding failed: {err}")))
}

/// Writes canonical JSON and a trailing newline to stdout.
fn write_canonical_json<T: Serialize>(value: &T) -> CliResult<()> {
    let mut bytes = canonical_bytes(value)?;
    bytes.push(b'\n');
    std::io::stdout()
        .write_all(&bytes)
        .map_err(|err| CliError::new(format!("failed to write stdout: {err}")))
}

/// Writes text to stdout.
fn write_stdout(text: &str) -> CliResult<()> {
    std::io::stdout()
        .write_all(text.as_bytes())
        .map_err(|err| CliError::new(format!("failed to write stdout: {err}")))
}

/// Formats an export write failure.
fn write_error(path: &Path, error: &std::io::Error) -> CliError {
    CliError::new(format!("failed to write {}: {error}", path.display()))
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let mut stderr = std::io::stderr();
    let _ = writeln!(&mut stderr, "{message}");
    ExitCode::FAILURE
}
