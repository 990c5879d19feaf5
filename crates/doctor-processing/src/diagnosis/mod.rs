//! Model-backed diagnosis of a dataset profile.
//!
//! [`DiagnosisClient::diagnose`] condenses a [`Profile`], sends the prompt to
//! an [`AIProvider`] and parses the answer into a [`Diagnosis`]. It never
//! returns an error: every failure becomes [`DiagnosisOutcome::Failed`] with
//! the cause, so the caller can still show the profile.
//!
//! Transient provider failures are retried with exponential backoff before
//! giving up.

mod condense;
mod prompt;
mod response;
mod rules;

pub use condense::{CondensedColumn, condense};
pub use prompt::{CLEANING_RULES, build_diagnosis_prompt};
pub use response::parse_diagnosis;
pub use rules::{DROP_MISSING_PERCENT, RuleBook, SKEW_THRESHOLD};

use crate::ai::{AIProvider, CompletionRequest, is_transient};
use crate::config::{DEFAULT_MAX_RETRIES, DoctorConfig};
use crate::error::DiagnosisError;
use crate::types::{Diagnosis, DiagnosisOutcome, Profile};
use anyhow::Context;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Wait before the first retry; doubled for every further retry.
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

const BACKOFF_MULTIPLIER: u32 = 2;

/// Asks a model for a diagnosis of a profile.
#[derive(Clone)]
pub struct DiagnosisClient {
    provider: Arc<dyn AIProvider>,
    max_retries: u32,
    initial_backoff: Duration,
    rules: RuleBook,
}

static_assertions::assert_impl_all!(DiagnosisClient: Send, Sync);

impl DiagnosisClient {
    /// Create a client with the default retry policy.
    pub fn new(provider: Arc<dyn AIProvider>) -> Self {
        Self {
            provider,
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: INITIAL_BACKOFF,
            rules: RuleBook::default(),
        }
    }

    /// Create a client using the retry settings of `config`.
    pub fn with_config(provider: Arc<dyn AIProvider>, config: &DoctorConfig) -> Self {
        Self::new(provider).max_retries(config.max_retries)
    }

    /// Set the number of retries after a transient failure.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the wait before the first retry.
    pub fn initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Name of the configured provider.
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Diagnose `profile`. Never fails; see [`DiagnosisOutcome`].
    pub fn diagnose(&self, profile: &Profile) -> DiagnosisOutcome {
        let start = Instant::now();
        info!(
            provider = self.provider.name(),
            model = self.provider.model().unwrap_or("default"),
            columns = profile.columns,
            "Requesting diagnosis"
        );

        match self.try_diagnose(profile) {
            Ok(diagnosis) => {
                info!(
                    strategies = diagnosis.strategies.len(),
                    has_code = diagnosis.has_code(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Diagnosis received"
                );
                for finding in self.rules.audit(profile, &diagnosis) {
                    warn!(finding = %finding, "Diagnosis departs from cleaning rules");
                }
                DiagnosisOutcome::Diagnosed(diagnosis)
            }
            Err(err) => {
                match &err {
                    DiagnosisError::Backend(_) => {
                        error!(error = %err, elapsed_ms = start.elapsed().as_millis() as u64, "Diagnosis failed")
                    }
                    _ => warn!(error = %err, "Model response could not be used"),
                }
                DiagnosisOutcome::failed(err.to_string())
            }
        }
    }

    fn try_diagnose(&self, profile: &Profile) -> Result<Diagnosis, DiagnosisError> {
        let prompt = build_diagnosis_prompt(profile).context("Rendering diagnosis prompt")?;
        let raw = self.complete_with_retry(&CompletionRequest::json(prompt))?;
        debug!(response = %raw, "Raw model response");
        parse_diagnosis(&raw)
    }

    fn complete_with_retry(&self, request: &CompletionRequest) -> anyhow::Result<String> {
        let mut retry_count = 0;
        loop {
            match self.provider.complete(request) {
                Ok(text) => return Ok(text),
                Err(err) if is_transient(&err) && retry_count < self.max_retries => {
                    retry_count += 1;
                    let wait = self.backoff(retry_count);
                    warn!(
                        error = %err,
                        retry = retry_count,
                        max_retries = self.max_retries,
                        wait_ms = wait.as_millis() as u64,
                        "Transient provider failure, retrying"
                    );
                    std::thread::sleep(wait);
                }
                Err(err) if retry_count > 0 => {
                    return Err(err.context(format!("Giving up after {retry_count} retries")));
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn backoff(&self, retry_count: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(BACKOFF_MULTIPLIER.saturating_pow(retry_count.saturating_sub(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::TransientError;
    use crate::profiler::DataProfiler;
    use crate::types::FAILED_DIAGNOSIS_SUMMARY;
    use anyhow::anyhow;
    use polars::prelude::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const VALID: &str = r#"{
        "diagnosis_summary": "City is mostly missing.",
        "strategies_defined": [{"column": "city", "issue": "Missing 60%", "action": "Drop"}],
        "generated_python_code": "def clean_data(df):\n    return df.drop(columns=['city'])"
    }"#;

    /// Replays canned answers in order, then fails.
    struct ScriptedProvider {
        answers: Mutex<VecDeque<anyhow::Result<String>>>,
        calls: AtomicUsize,
        last_request: Mutex<Option<CompletionRequest>>,
    }

    impl ScriptedProvider {
        fn new(answers: Vec<anyhow::Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.into()),
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl AIProvider for ScriptedProvider {
        fn complete(&self, request: &CompletionRequest) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request.clone());
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow!("script exhausted")))
        }

        fn name(&self) -> &str {
            "Scripted"
        }
    }

    fn transient() -> anyhow::Result<String> {
        Err(TransientError::new("HTTP 503").into())
    }

    fn profile() -> Profile {
        let df = df! {
            "age" => &[Some(20i64), Some(21), Some(22), Some(23), Some(1000)],
            "city" => &[Some("Lagos"), None, None, Some("Lima"), None],
        }
        .unwrap();
        DataProfiler::profile(&df).unwrap()
    }

    fn client(provider: Arc<ScriptedProvider>) -> DiagnosisClient {
        DiagnosisClient::new(provider).initial_backoff(Duration::ZERO)
    }

    #[test]
    fn test_successful_diagnosis() {
        let provider = ScriptedProvider::new(vec![Ok(VALID.to_string())]);
        let outcome = client(provider.clone()).diagnose(&profile());

        assert!(outcome.is_diagnosed());
        let diagnosis = outcome.into_diagnosis();
        assert_eq!(diagnosis.strategies[0].column, "city");
        assert_eq!(provider.calls(), 1);

        let request = provider.last_request.lock().unwrap().clone().unwrap();
        assert!(request.json_output);
        assert!(request.prompt.contains("\"city\""));
    }

    #[test]
    fn test_fenced_answer_is_accepted() {
        let provider = ScriptedProvider::new(vec![Ok(format!("```json\n{VALID}\n```"))]);
        assert!(client(provider).diagnose(&profile()).is_diagnosed());
    }

    #[test]
    fn test_malformed_answer_degrades() {
        let provider = ScriptedProvider::new(vec![Ok("not json at all".to_string())]);
        let outcome = client(provider.clone()).diagnose(&profile());

        assert!(!outcome.is_diagnosed());
        assert!(outcome.failure_reason().unwrap().contains("no JSON object"));
        let diagnosis = outcome.into_diagnosis();
        assert_eq!(diagnosis.summary, FAILED_DIAGNOSIS_SUMMARY);
        assert!(!diagnosis.has_code());
        assert!(diagnosis.strategies.is_empty());
        // Parse failures are not retried
        assert_eq!(provider.calls(), 1);
    }

    #[test]
    fn test_transient_failures_are_retried() {
        let provider = ScriptedProvider::new(vec![transient(), transient(), Ok(VALID.to_string())]);
        let outcome = client(provider.clone()).diagnose(&profile());

        assert!(outcome.is_diagnosed());
        assert_eq!(provider.calls(), 3);
    }

    #[test]
    fn test_retries_are_bounded() {
        let provider = ScriptedProvider::new(vec![transient(), transient(), transient(), transient()]);
        let outcome = client(provider.clone()).max_retries(2).diagnose(&profile());

        assert!(!outcome.is_diagnosed());
        assert!(outcome.failure_reason().unwrap().contains("Giving up after 2 retries"));
        assert_eq!(provider.calls(), 3);
    }

    #[test]
    fn test_permanent_failure_is_not_retried() {
        let provider = ScriptedProvider::new(vec![Err(anyhow!("HTTP 401: invalid key"))]);
        let outcome = client(provider.clone()).diagnose(&profile());

        assert!(outcome.failure_reason().unwrap().contains("invalid key"));
        assert_eq!(provider.calls(), 1);
    }

    #[test]
    fn test_empty_answer_degrades() {
        let provider = ScriptedProvider::new(vec![Ok("  ".to_string())]);
        let outcome = client(provider).diagnose(&profile());
        assert!(outcome.failure_reason().unwrap().contains("empty"));
    }

    #[test]
    fn test_backoff_doubles() {
        let client = DiagnosisClient::new(ScriptedProvider::new(vec![]));
        assert_eq!(client.backoff(1), Duration::from_secs(1));
        assert_eq!(client.backoff(2), Duration::from_secs(2));
        assert_eq!(client.backoff(3), Duration::from_secs(4));
    }

    #[test]
    fn test_with_config_uses_retry_setting() {
        let config = DoctorConfig::builder().max_retries(0).build().unwrap();
        let provider = ScriptedProvider::new(vec![transient(), Ok(VALID.to_string())]);
        let outcome = DiagnosisClient::with_config(provider.clone(), &config).diagnose(&profile());

        assert!(!outcome.is_diagnosed());
        assert_eq!(provider.calls(), 1);
    }
}
