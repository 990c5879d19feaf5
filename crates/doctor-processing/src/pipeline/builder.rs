//! The request pipeline.
//!
//! [`Doctor`] ties the loader, profiler, diagnosis client, sandbox and
//! report generator together over one working directory.

use super::reports::{AnalysisReport, CleaningReport, CleaningRequest, RunReport};
use crate::ai::AIProvider;
use crate::config::{ConfigValidationError, DoctorConfig};
use crate::diagnosis::DiagnosisClient;
use crate::error::{DoctorError, Result, ResultExt};
use crate::loader::{InputFormat, load_dataset, write_csv};
use crate::profiler::DataProfiler;
use crate::reporting::{ReportGenerator, ReportParams};
use crate::types::{DiagnosisOutcome, Profile};
use doctor_sandbox::SandboxExecutor;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Profiles, diagnoses and cleans files staged in a working directory.
///
/// Use [`Doctor::builder()`] to create one.
///
/// # Example
///
/// ```rust,ignore
/// use doctor_processing::{Doctor, DoctorConfig};
/// use doctor_processing::ai::GeminiProvider;
/// use std::sync::Arc;
///
/// let doctor = Doctor::builder()
///     .config(DoctorConfig::builder().workdir("temp").build()?)
///     .ai_provider(Arc::new(GeminiProvider::new(api_key)?))
///     .build()?;
///
/// let filename = doctor.stage("uploads/patients.csv")?;
/// let analysis = doctor.analyze(&filename)?;
/// let cleaning = doctor.clean(&analysis.cleaning_request())?;
/// println!("Cleaned data written to {}", cleaning.clean_file.display());
/// ```
pub struct Doctor {
    config: DoctorConfig,
    diagnosis: Option<DiagnosisClient>,
    executor: SandboxExecutor,
    reporter: ReportGenerator,
}

static_assertions::assert_impl_all!(Doctor: Send, Sync);

impl Doctor {
    /// Create a new builder.
    pub fn builder() -> DoctorBuilder {
        DoctorBuilder::default()
    }

    pub fn config(&self) -> &DoctorConfig {
        &self.config
    }

    /// Copy `source` into the working directory and return its file name.
    ///
    /// The extension is checked first, so unsupported files are never staged.
    pub fn stage(&self, source: impl AsRef<Path>) -> Result<String> {
        let source = source.as_ref();
        InputFormat::from_path(source)?;

        let filename = source
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                DoctorError::InvalidRequest(format!("'{}' has no file name", source.display()))
            })?
            .to_string();

        fs::create_dir_all(&self.config.workdir).context("Creating working directory")?;
        let target = self.config.workdir.join(&filename);
        if !same_file(source, &target) {
            fs::copy(source, &target).context(format!("Staging {}", source.display()))?;
        }

        info!("Staged {} as {}", source.display(), target.display());
        Ok(filename)
    }

    /// Profile any supported file without staging it.
    pub fn profile_file(&self, path: impl AsRef<Path>) -> Result<Profile> {
        let df = load_dataset(path)?;
        DataProfiler::profile(&df)
    }

    /// Diagnose a profile. Degrades instead of failing.
    pub fn diagnose(&self, profile: &Profile) -> DiagnosisOutcome {
        match &self.diagnosis {
            Some(client) => client.diagnose(profile),
            None => {
                warn!("No diagnosis provider configured");
                DiagnosisOutcome::failed("No diagnosis provider configured")
            }
        }
    }

    /// Profile and diagnose a staged file.
    ///
    /// Only loading and profiling can fail; a failed diagnosis is reported
    /// inside the returned [`AnalysisReport`].
    pub fn analyze(&self, filename: &str) -> Result<AnalysisReport> {
        let start = Instant::now();
        let path = self.staged_path(filename)?;

        info!("Step 1: Loading {}...", filename);
        let df = load_dataset(&path)?;

        info!("Step 2: Profiling dataset...");
        let profile = DataProfiler::profile(&df).context(format!("Profiling {filename}"))?;

        info!("Step 3: Requesting diagnosis...");
        let outcome = self.diagnose(&profile);

        info!(
            rows = profile.rows,
            columns = profile.columns,
            diagnosed = outcome.is_diagnosed(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Analysis complete"
        );
        Ok(AnalysisReport::new(filename.to_string(), profile, outcome))
    }

    /// Execute a code unit against a staged file and write the cleaned CSV
    /// and the report.
    ///
    /// Nothing is written when execution fails.
    pub fn clean(&self, request: &CleaningRequest) -> Result<CleaningReport> {
        match self.clean_internal(request) {
            Ok(report) => Ok(report),
            Err(e) => {
                error!("Cleaning error: {}", e);
                Err(e)
            }
        }
    }

    /// Analyze a staged file, then clean it with the diagnosis' code.
    pub fn run(&self, filename: &str) -> Result<RunReport> {
        let analysis = self.analyze(filename)?;

        if let Some(reason) = &analysis.diagnosis_error {
            return Err(DoctorError::DiagnosisUnavailable(reason.clone()));
        }
        if !analysis.ai_diagnosis.has_code() {
            return Err(DoctorError::DiagnosisUnavailable(
                "the model returned no cleaning code".to_string(),
            ));
        }

        let cleaning = self.clean(&analysis.cleaning_request())?;
        Ok(RunReport { analysis, cleaning })
    }

    fn clean_internal(&self, request: &CleaningRequest) -> Result<CleaningReport> {
        let start = Instant::now();
        if request.code.trim().is_empty() {
            return Err(DoctorError::InvalidRequest("Missing filename or code.".to_string()));
        }
        let path = self.staged_path(&request.filename)?;

        info!("Step 1: Loading {}...", request.filename);
        let df = load_dataset(&path)?;
        let before = DataProfiler::profile(&df).context("Profiling original data")?;

        info!("Step 2: Executing cleaning code...");
        let cleaned = self.executor.execute(&df, &request.code)?;

        info!("Step 3: Profiling cleaned data...");
        let after = DataProfiler::profile(&cleaned).context("Profiling cleaned data")?;

        info!("Step 4: Saving output files...");
        let stem = file_stem(&request.filename);
        let clean_name = format!("clean_{stem}.csv");
        let clean_file = self.config.workdir.join(&clean_name);
        write_csv(&cleaned, &clean_file)?;

        let report = ReportGenerator::build(ReportParams {
            source_file: &request.filename,
            clean_file: &clean_name,
            summary: request.summary_or_default(),
            strategies: &request.strategies,
            before: &before,
            after: &after,
        });
        let report_file = self.reporter.write(&report, stem)?;

        info!(
            rows_before = before.rows,
            rows_after = after.rows,
            missing_before = before.total_missing(),
            missing_after = after.total_missing(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Cleaning complete"
        );

        Ok(CleaningReport {
            status: "success".to_string(),
            message: "Cleaning complete".to_string(),
            clean_file,
            report_file,
            after_stats: after,
            health_metrics: report.health_metrics,
        })
    }

    /// Resolve a bare file name inside the working directory.
    fn staged_path(&self, filename: &str) -> Result<PathBuf> {
        if filename.trim().is_empty() {
            return Err(DoctorError::InvalidRequest("Missing filename or code.".to_string()));
        }
        let name = Path::new(filename);
        if name.file_name().and_then(|n| n.to_str()) != Some(filename) {
            return Err(DoctorError::InvalidRequest(format!(
                "'{filename}' must be a plain file name inside the working directory"
            )));
        }

        let path = self.config.workdir.join(name);
        if !path.is_file() {
            return Err(DoctorError::Load {
                path: path.display().to_string(),
                reason: "Original file not found.".to_string(),
            });
        }
        Ok(path)
    }
}

fn file_stem(filename: &str) -> &str {
    Path::new(filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(filename)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Builder for [`Doctor`].
#[derive(Default)]
pub struct DoctorBuilder {
    config: Option<DoctorConfig>,
    ai_provider: Option<Arc<dyn AIProvider>>,
}

impl DoctorBuilder {
    /// Set the configuration.
    pub fn config(mut self, config: DoctorConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the model backend used for diagnosis.
    ///
    /// Without one, every diagnosis degrades; cleaning with explicit code
    /// still works.
    pub fn ai_provider(mut self, provider: Arc<dyn AIProvider>) -> Self {
        self.ai_provider = Some(provider);
        self
    }

    /// Build the pipeline. Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<Doctor, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let diagnosis = self
            .ai_provider
            .map(|provider| DiagnosisClient::with_config(provider, &config));

        Ok(Doctor {
            executor: SandboxExecutor::new(config.sandbox),
            reporter: ReportGenerator::new(config.workdir.clone()),
            diagnosis,
            config,
        })
    }
}
