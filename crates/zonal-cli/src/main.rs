// crates/zonal-cli/src/main.rs
// ============================================================================
// Module: Zonal CLI Entry Point
// Description: Command dispatcher for decisioning, matching, and training.
// Purpose: Drive the Zonal runtime and trainer from one configuration file.
// Dependencies: clap, serde_json, zonal-config, zonal-core, zonal-policy,
//               zonal-providers, zonal-store-sqlite, zonal-trainer
// ============================================================================

//! ## Overview
//! The Zonal CLI wires the configured backends (SQLite rule store, policy
//! checkpoint, HTTP narrative generator, filesystem artifact stores) into
//! the decision runtime and exposes the operational surface: `decide`,
//! `match-rules`, `load-rules`, `feedback`, and `retrain`. All inputs are
//! untrusted and validated before use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use zonal_config::ZonalConfig;
use zonal_core::Case;
use zonal_core::CaseId;
use zonal_core::CaseParameters;
use zonal_core::City;
use zonal_core::DecisionRuntime;
use zonal_core::ProjectId;
use zonal_core::RawRule;
use zonal_core::Rule;
use zonal_core::RuleStore;
use zonal_core::RuntimeConfig;
use zonal_core::UpsertOutcome;
use zonal_core::Vote;
use zonal_policy::load_checkpoint;
use zonal_providers::FsFeedbackLedger;
use zonal_providers::FsReportStore;
use zonal_providers::HttpNarrativeConfig;
use zonal_providers::HttpNarrativeGenerator;
use zonal_providers::StlGeometryWriter;
use zonal_store_sqlite::SqliteRuleStore;
use zonal_store_sqlite::SqliteStoreConfig;
use zonal_trainer::LedgerStats;
use zonal_trainer::TrainerConfig;
use zonal_trainer::TrainerObserver;
use zonal_trainer::TrainerPhase;
use zonal_trainer::retrain;

// ============================================================================
// SECTION: Arguments
// ============================================================================

/// Zonal command-line interface.
#[derive(Parser, Debug)]
#[command(name = "zonal", version, about = "Zoning-compliance decision engine")]
struct Cli {
    /// Configuration file path.
    #[arg(long, global = true, default_value = "zonal.toml")]
    config: PathBuf,
    /// Command to run.
    #[command(subcommand)]
    command: Commands,
}

/// Vote values accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum VoteArg {
    /// The report was helpful.
    Up,
    /// The report was wrong or unhelpful.
    Down,
}

impl From<VoteArg> for Vote {
    fn from(vote: VoteArg) -> Self {
        match vote {
            VoteArg::Up => Self::Up,
            VoteArg::Down => Self::Down,
        }
    }
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs the full decision pipeline for one case and prints the report.
    Decide {
        /// Project identifier.
        #[arg(long)]
        project: String,
        /// Case identifier.
        #[arg(long)]
        case: String,
        /// City whose rulebook applies.
        #[arg(long)]
        city: String,
        /// JSON file holding the case parameters.
        #[arg(long)]
        input: PathBuf,
    },
    /// Prints the rules matching a parameter set, without deciding.
    MatchRules {
        /// City whose rulebook applies.
        #[arg(long)]
        city: String,
        /// JSON file holding the case parameters.
        #[arg(long)]
        input: PathBuf,
    },
    /// Loads a JSON array of rules into the rule store.
    LoadRules {
        /// JSON file holding an array of raw rules.
        #[arg(long)]
        rules: PathBuf,
    },
    /// Records one human feedback vote for a compiled report.
    Feedback {
        /// Project identifier.
        #[arg(long)]
        project: String,
        /// Case identifier.
        #[arg(long)]
        case: String,
        /// JSON file holding the case parameters the report was decided on.
        #[arg(long)]
        input: PathBuf,
        /// Action the report took.
        #[arg(long)]
        action: u32,
        /// Vote on the report.
        #[arg(long, value_enum)]
        vote: VoteArg,
    },
    /// Runs one offline retraining pass and prints the checkpoint path.
    Retrain {
        /// Seed override for case and action sampling.
        #[arg(long)]
        seed: Option<u64>,
    },
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Terminal CLI error carrying a user-facing message.
#[derive(Debug)]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Creates an error from a prepared message.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }

    /// Creates an error from any displayable source.
    fn from_display(error: impl std::fmt::Display) -> Self {
        Self::new(error.to_string())
    }
}

/// Result alias used throughout the CLI.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(error) => {
            let _ = write_stderr_line(&format!("error: {}", error.message));
            ExitCode::FAILURE
        }
    }
}

/// Loads configuration and dispatches the selected command.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let config = ZonalConfig::load(&cli.config).map_err(CliError::from_display)?;
    match cli.command {
        Commands::Decide {
            project,
            case,
            city,
            input,
        } => command_decide(&config, project, case, city, &input),
        Commands::MatchRules {
            city,
            input,
        } => command_match_rules(&config, city, &input),
        Commands::LoadRules {
            rules,
        } => command_load_rules(&config, &rules),
        Commands::Feedback {
            project,
            case,
            input,
            action,
            vote,
        } => command_feedback(&config, project, case, &input, action, vote.into()),
        Commands::Retrain {
            seed,
        } => command_retrain(&config, seed),
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Runs the full decision pipeline and prints the compiled report.
fn command_decide(
    config: &ZonalConfig,
    project: String,
    case: String,
    city: String,
    input: &Path,
) -> CliResult<ExitCode> {
    let runtime = build_runtime(config)?;
    let case = Case {
        project_id: ProjectId::from(project),
        case_id: CaseId::from(case),
        city: City::from(city),
        parameters: read_parameters(input)?,
    };
    let report = runtime.decide_case(&case).map_err(CliError::from_display)?;
    if report.narrative_degraded {
        write_stderr_line("warning: narrative generation failed; report holds a placeholder")
            .map_err(|error| CliError::new(format!("write stderr: {error}")))?;
    }
    print_json(&report)
}

/// Prints the matching rules for a parameter set without deciding.
fn command_match_rules(config: &ZonalConfig, city: String, input: &Path) -> CliResult<ExitCode> {
    let store = open_store(config)?;
    let parameters = read_parameters(input)?;
    parameters.validate().map_err(CliError::from_display)?;
    let matched = zonal_core::match_case(&store, &City::from(city), &parameters)
        .map_err(CliError::from_display)?;
    let raw: Vec<RawRule> = matched.iter().map(Rule::to_raw).collect();
    print_json(&raw)
}

/// Loads a JSON rule array into the durable store.
fn command_load_rules(config: &ZonalConfig, rules_path: &Path) -> CliResult<ExitCode> {
    let store = open_store(config)?;
    let payload = fs::read_to_string(rules_path)
        .map_err(|error| CliError::new(format!("read {}: {error}", rules_path.display())))?;
    let raw_rules: Vec<RawRule> = serde_json::from_str(&payload)
        .map_err(|error| CliError::new(format!("parse {}: {error}", rules_path.display())))?;

    let mut inserted = 0usize;
    let mut updated = 0usize;
    for (index, raw) in raw_rules.into_iter().enumerate() {
        let rule = Rule::resolve(raw)
            .map_err(|error| CliError::new(format!("rule at index {index}: {error}")))?;
        match store.upsert_rule(rule).map_err(CliError::from_display)? {
            UpsertOutcome::Inserted => inserted += 1,
            UpsertOutcome::Updated => updated += 1,
        }
    }
    write_stdout_line(&format!("loaded rules: {inserted} inserted, {updated} updated"))
        .map_err(|error| CliError::new(format!("write stdout: {error}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Appends one human feedback vote to the ledger.
fn command_feedback(
    config: &ZonalConfig,
    project: String,
    case: String,
    input: &Path,
    action: u32,
    vote: Vote,
) -> CliResult<ExitCode> {
    let runtime = build_runtime(config)?;
    runtime
        .record_feedback(
            ProjectId::from(project),
            CaseId::from(case),
            read_parameters(input)?,
            action,
            vote,
        )
        .map_err(CliError::from_display)?;
    write_stdout_line("feedback recorded")
        .map_err(|error| CliError::new(format!("write stdout: {error}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Runs one offline retraining pass against the configured dataset.
fn command_retrain(config: &ZonalConfig, seed: Option<u64>) -> CliResult<ExitCode> {
    let mut trainer_config =
        TrainerConfig::new(config.trainer.checkpoint_dir.clone(), config.policy.action_count);
    trainer_config.oracle_path = config.trainer.oracle_path.clone();
    trainer_config.ledger_path = Some(config.feedback.ledger_path.clone());
    trainer_config.episodes = config.trainer.episodes;
    trainer_config.learning_rate = config.trainer.learning_rate;
    trainer_config.seed = seed.unwrap_or(config.trainer.seed);
    trainer_config.skip_warn_threshold = config.trainer.skip_warn_threshold;
    if config.policy.checkpoint_path.exists() {
        trainer_config.resume_from = Some(config.policy.checkpoint_path.clone());
    }

    let summary =
        retrain(&trainer_config, &StderrTrainerObserver).map_err(CliError::from_display)?;
    write_stdout_line(&format!(
        "checkpoint written: {} ({} oracle cases, {} human cases, mean reward {:.3})",
        summary.checkpoint_path.display(),
        summary.oracle_cases,
        summary.human_cases,
        summary.mean_reward
    ))
    .map_err(|error| CliError::new(format!("write stdout: {error}")))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Wiring
// ============================================================================

/// Opens the configured SQLite rule store.
fn open_store(config: &ZonalConfig) -> CliResult<SqliteRuleStore> {
    SqliteRuleStore::open(&config.store.db_path, SqliteStoreConfig::default())
        .map_err(CliError::from_display)
}

/// Wires the configured backends into a decision runtime.
fn build_runtime(config: &ZonalConfig) -> CliResult<DecisionRuntime> {
    let store = Arc::new(open_store(config)?);
    let policy = load_checkpoint(&config.policy.checkpoint_path, config.policy.action_count)
        .map_err(CliError::from_display)?;
    let narrative = HttpNarrativeGenerator::new(HttpNarrativeConfig {
        endpoint: config.narrative.endpoint.clone(),
        timeout_ms: config.narrative.timeout_ms,
        max_response_bytes: config.narrative.max_response_bytes,
    })
    .map_err(CliError::from_display)?;
    Ok(DecisionRuntime::new(
        store,
        Arc::new(policy),
        Arc::new(narrative),
        Arc::new(FsReportStore::new(config.artifacts.root.clone())),
        Arc::new(StlGeometryWriter::new(config.artifacts.root.clone())),
        Arc::new(FsFeedbackLedger::new(config.feedback.ledger_path.clone())),
        RuntimeConfig::default(),
    ))
}

/// Reads and validates case parameters from a JSON file.
fn read_parameters(path: &Path) -> CliResult<CaseParameters> {
    let payload = fs::read_to_string(path)
        .map_err(|error| CliError::new(format!("read {}: {error}", path.display())))?;
    let value: serde_json::Value = serde_json::from_str(&payload)
        .map_err(|error| CliError::new(format!("parse {}: {error}", path.display())))?;
    CaseParameters::from_json(&value).map_err(CliError::from_display)
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Pretty-prints a serializable value to stdout.
fn print_json(value: &impl serde::Serialize) -> CliResult<ExitCode> {
    let payload = serde_json::to_string_pretty(value)
        .map_err(|error| CliError::new(format!("serialize output: {error}")))?;
    write_stdout_line(&payload).map_err(|error| CliError::new(format!("write stdout: {error}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

// ============================================================================
// SECTION: Trainer Observer
// ============================================================================

/// Trainer observer reporting progress and warnings on stderr.
struct StderrTrainerObserver;

impl TrainerObserver for StderrTrainerObserver {
    fn phase_started(&self, phase: TrainerPhase) {
        let label = match phase {
            TrainerPhase::LoadOracle => "load-oracle",
            TrainerPhase::LoadFeedback => "load-feedback",
            TrainerPhase::Merge => "merge",
            TrainerPhase::Train => "train",
            TrainerPhase::Checkpoint => "checkpoint",
        };
        let _ = write_stderr_line(&format!("trainer: {label}"));
    }

    fn ledger_quality_warning(&self, stats: LedgerStats, threshold: f64) {
        let _ = write_stderr_line(&format!(
            "warning: skipped {}/{} ledger lines ({:.1}% > {:.1}% threshold)",
            stats.skipped,
            stats.total,
            stats.skipped_fraction() * 100.0,
            threshold * 100.0
        ));
    }

    fn training_finished(&self, episodes: usize, mean_reward: f64) {
        let _ = write_stderr_line(&format!(
            "trainer: {episodes} episodes, mean reward {mean_reward:.3}"
        ));
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
#[allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]
mod tests {
    use std::io::Write as _;

    use super::*;

    #[test]
    fn parameters_file_round_trips_through_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"plot_area": 1000.0, "location": "urban", "road_width": 10.0}"#)
            .unwrap();
        let parameters = read_parameters(file.path()).unwrap();
        assert!((parameters.plot_area - 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_required_parameter_is_a_terminal_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"plot_area": 1000.0, "location": "urban"}"#).unwrap();
        let error = read_parameters(file.path()).unwrap_err();
        assert!(error.message.contains("road_width"));
    }

    #[test]
    fn vote_argument_maps_onto_the_domain_vote() {
        assert_eq!(Vote::from(VoteArg::Up), Vote::Up);
        assert_eq!(Vote::from(VoteArg::Down), Vote::Down);
    }

    #[test]
    fn cli_arguments_parse_for_every_command() {
        Cli::parse_from([
            "zonal",
            "decide",
            "--project",
            "p",
            "--case",
            "c",
            "--city",
            "Pune",
            "--input",
            "case.json",
        ]);
        Cli::parse_from(["zonal", "match-rules", "--city", "Pune", "--input", "case.json"]);
        Cli::parse_from(["zonal", "load-rules", "--rules", "rules.json"]);
        Cli::parse_from([
            "zonal", "feedback", "--project", "p", "--case", "c", "--input", "case.json",
            "--action", "2", "--vote", "up",
        ]);
        Cli::parse_from(["zonal", "retrain", "--seed", "7"]);
    }
}
