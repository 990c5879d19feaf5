//! CLI entry point for the data doctor.

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum};
use doctor_processing::diagnosis::RuleBook;
use doctor_processing::{
    CleaningRequest, Diagnosis, Doctor, DoctorConfig, Profile, ai::AIProvider,
};
use dotenv::dotenv;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[cfg(feature = "ai")]
use doctor_processing::ai::{GeminiConfig, GeminiProvider, OpenRouterConfig, OpenRouterProvider};
#[cfg(feature = "ai")]
use std::env;
#[cfg(feature = "ai")]
use tracing::warn;

/// Model backends selectable from the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliProvider {
    /// Google Gemini (GEMINI_API_KEY or GOOGLE_API_KEY)
    Gemini,
    /// OpenRouter (OPENROUTER_API_KEY)
    #[value(name = "openrouter")]
    OpenRouter,
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Profile a dataset, let a model diagnose it, and run the cleaning code it writes",
    long_about = "Profiles a CSV or Excel dataset, asks a language model for a diagnosis and a\n\
                  pandas cleaning routine, runs that routine in a sandbox and reports\n\
                  before/after health metrics.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  GEMINI_API_KEY        API key for Google Gemini (GOOGLE_API_KEY also accepted)\n  \
                  OPENROUTER_API_KEY    API key for OpenRouter\n\n\
                  EXAMPLES:\n  \
                  # Preview the profile and what the cleaning rules suggest\n  \
                  data-doctor profile data.csv\n\n  \
                  # Diagnose and keep the diagnosis for review\n  \
                  data-doctor analyze data.csv --save-diagnosis diagnosis.json\n\n  \
                  # Clean the staged file with the reviewed diagnosis\n  \
                  data-doctor clean data.csv --diagnosis diagnosis.json\n\n  \
                  # Everything in one go\n  \
                  data-doctor run data.xlsx --provider openrouter"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Working directory for staged inputs, cleaned files and reports
    #[arg(short, long, global = true, default_value = doctor_processing::config::DEFAULT_WORKDIR)]
    workdir: PathBuf,

    /// Model backend used for diagnosis
    #[arg(long, global = true, value_enum, default_value = "gemini")]
    provider: CliProvider,

    /// Override the provider's default model
    #[arg(long, global = true)]
    model: Option<String>,

    /// Timeout for one diagnosis request, in seconds
    #[arg(long, global = true, default_value_t = doctor_processing::config::DEFAULT_DIAGNOSIS_TIMEOUT_SECS)]
    diagnosis_timeout: u64,

    /// Retries after a transient provider failure
    #[arg(long, global = true, default_value_t = doctor_processing::config::DEFAULT_MAX_RETRIES)]
    max_retries: u32,

    /// Wall-clock budget for the generated code, in seconds
    #[arg(long, global = true, default_value_t = doctor_sandbox::DEFAULT_TIMEOUT_SECS)]
    sandbox_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings and errors)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output JSON only
    ///
    /// Disables all logging so stdout carries nothing but the JSON document.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Profile a file and preview what the cleaning rules suggest
    Profile {
        /// CSV or Excel file
        file: PathBuf,
    },

    /// Stage a file, profile it and ask the model for a diagnosis
    Analyze {
        /// CSV or Excel file
        file: PathBuf,

        /// Also write the diagnosis to this path
        #[arg(long)]
        save_diagnosis: Option<PathBuf>,
    },

    /// Run cleaning code against a staged file
    Clean(CleanArgs),

    /// Analyze a file, then clean it with the model's code
    Run {
        /// CSV or Excel file
        file: PathBuf,
    },
}

#[derive(Args, Debug)]
struct CleanArgs {
    /// Name of a file in the working directory (as printed by `analyze`)
    filename: String,

    /// Diagnosis JSON saved by `analyze --save-diagnosis`
    #[arg(long, conflicts_with = "code", required_unless_present = "code")]
    diagnosis: Option<PathBuf>,

    /// Python file with the cleaning code
    #[arg(long)]
    code: Option<PathBuf>,

    /// Executive summary for the report (with --code)
    #[arg(long)]
    summary: Option<String>,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.quiet, cli.json);

    // Load environment variables from .env file
    dotenv().ok();

    let config = DoctorConfig::builder()
        .workdir(&cli.workdir)
        .diagnosis_timeout_secs(cli.diagnosis_timeout)
        .max_retries(cli.max_retries)
        .sandbox_timeout_secs(cli.sandbox_timeout)
        .build()?;

    match &cli.command {
        Command::Profile { file } => run_profile(&cli, &config, file),
        Command::Analyze {
            file,
            save_diagnosis,
        } => run_analyze(&cli, config, file, save_diagnosis.as_deref()),
        Command::Clean(args) => run_clean(config, args),
        Command::Run { file } => run_full(&cli, config, file),
    }
}

fn run_profile(cli: &Cli, config: &DoctorConfig, file: &Path) -> Result<()> {
    let doctor = Doctor::builder().config(config.clone()).build()?;
    let profile = doctor.profile_file(file)?;
    let recommended = RuleBook::default().recommend(&profile);

    if cli.json {
        let output = json!({
            "filename": file.display().to_string(),
            "data_stats": profile,
            "recommended_strategies": recommended,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print_profile(file, &profile);

    println!("RULE BOOK PREVIEW");
    println!("{}", "-".repeat(40));
    if recommended.is_empty() {
        println!("  Nothing to clean according to the rules");
    } else {
        for strategy in &recommended {
            println!(
                "  - {}: {} ({})",
                truncate_str(&strategy.column, 30),
                strategy.action,
                strategy.issue
            );
        }
    }
    println!();
    Ok(())
}

fn run_analyze(
    cli: &Cli,
    config: DoctorConfig,
    file: &Path,
    save_diagnosis: Option<&Path>,
) -> Result<()> {
    let doctor = build_doctor(cli, config)?;
    let filename = doctor.stage(file)?;
    let analysis = doctor.analyze(&filename)?;

    if let Some(path) = save_diagnosis {
        write_json(path, &analysis.ai_diagnosis)?;
        info!("Diagnosis saved: {}", path.display());
    }

    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}

fn run_clean(config: DoctorConfig, args: &CleanArgs) -> Result<()> {
    // Cleaning never talks to the model
    let doctor = Doctor::builder().config(config).build()?;

    let request = match (&args.diagnosis, &args.code) {
        (Some(path), _) => {
            let diagnosis: Diagnosis = serde_json::from_str(
                &fs::read_to_string(path)
                    .with_context(|| format!("Reading diagnosis {}", path.display()))?,
            )
            .with_context(|| format!("Parsing diagnosis {}", path.display()))?;
            CleaningRequest::from_diagnosis(&args.filename, &diagnosis)
        }
        (None, Some(path)) => CleaningRequest {
            filename: args.filename.clone(),
            code: fs::read_to_string(path)
                .with_context(|| format!("Reading code {}", path.display()))?,
            strategies: Vec::new(),
            summary: args.summary.clone(),
        },
        (None, None) => return Err(anyhow!("Either --diagnosis or --code is required")),
    };

    let report = doctor.clean(&request)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_full(cli: &Cli, config: DoctorConfig, file: &Path) -> Result<()> {
    let doctor = build_doctor(cli, config)?;
    let filename = doctor.stage(file)?;
    let report = doctor.run(&filename)?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Build the pipeline with a diagnosis provider when one is configured.
fn build_doctor(cli: &Cli, config: DoctorConfig) -> Result<Doctor> {
    let mut builder = Doctor::builder();
    if let Some(provider) = build_provider(cli, &config)? {
        info!(
            "Running with model diagnosis ({} / {})",
            provider.name(),
            provider.model().unwrap_or("default")
        );
        builder = builder.ai_provider(provider);
    }
    Ok(builder.config(config).build()?)
}

#[cfg(feature = "ai")]
fn build_provider(cli: &Cli, config: &DoctorConfig) -> Result<Option<Arc<dyn AIProvider>>> {
    let provider: Arc<dyn AIProvider> = match cli.provider {
        CliProvider::Gemini => {
            let Some(api_key) = env_key(&["GEMINI_API_KEY", "GOOGLE_API_KEY"]) else {
                warn!("GEMINI_API_KEY not set. Diagnosis will be unavailable.");
                return Ok(None);
            };
            let mut builder = GeminiConfig::builder().timeout_secs(config.diagnosis_timeout_secs);
            if let Some(model) = &cli.model {
                builder = builder.model(model);
            }
            Arc::new(GeminiProvider::with_config(api_key, builder.build())?)
        }
        CliProvider::OpenRouter => {
            let Some(api_key) = env_key(&["OPENROUTER_API_KEY"]) else {
                warn!("OPENROUTER_API_KEY not set. Diagnosis will be unavailable.");
                return Ok(None);
            };
            let mut builder =
                OpenRouterConfig::builder().timeout_secs(config.diagnosis_timeout_secs);
            if let Some(model) = &cli.model {
                builder = builder.model(model);
            }
            Arc::new(OpenRouterProvider::with_config(api_key, builder.build())?)
        }
    };
    Ok(Some(provider))
}

#[cfg(not(feature = "ai"))]
fn build_provider(cli: &Cli, _config: &DoctorConfig) -> Result<Option<Arc<dyn AIProvider>>> {
    info!(
        "Built without the `ai` feature; {:?} is unavailable and diagnosis will degrade",
        cli.provider
    );
    Ok(None)
}

#[cfg(feature = "ai")]
fn env_key(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| env::var(name).ok())
        .find(|value| !value.trim().is_empty())
}

fn write_json(path: &Path, value: &impl serde::Serialize) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(value)?)
        .with_context(|| format!("Writing {}", path.display()))
}

/// Print the profile as a table.
///
/// Note: this uses `println!` intentionally for user-facing output; it must
/// stay visible regardless of log level settings.
fn print_profile(file: &Path, profile: &Profile) {
    println!("\n{}", "=".repeat(80));
    println!("DATASET PROFILE");
    println!("{}\n", "=".repeat(80));

    println!("  File: {}", file.display());
    println!("  Rows: {}", profile.rows);
    println!("  Columns: {}", profile.columns);
    println!("  Duplicate rows: {}", profile.duplicates);
    println!("  Missing values: {}", profile.total_missing());
    println!();

    println!(
        "{:<24} {:<16} {:>9} {:>8} {:>9} {:>9}  {:<16}",
        "Column", "Type", "Missing %", "Unique", "Skew", "Outliers", "Top value"
    );
    println!("{}", "-".repeat(100));

    for (name, stats) in &profile.column_details {
        let (skew, outliers) = match &stats.numeric {
            Some(n) => (format!("{:.2}", n.skewness), n.outlier_count.to_string()),
            None => ("-".to_string(), "-".to_string()),
        };
        println!(
            "{:<24} {:<16} {:>9.2} {:>8} {:>9} {:>9}  {:<16}",
            truncate_str(name, 23),
            truncate_str(&stats.dtype, 15),
            stats.missing_percentage,
            stats.unique_values,
            skew,
            outliers,
            truncate_str(stats.top_value.as_deref().unwrap_or("-"), 16)
        );
    }
    println!();
}

fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
