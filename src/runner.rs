//! Case runner -- execute one test case end to end and aggregate its
//! per-metric outcomes.
//!
//! The runner never returns an error: case-level faults become the
//! `fatal` field of the report so one broken case cannot stop the suite.

use anyhow::Result;
use serde::Serialize;
use thiserror::Error;

use crate::cases::TestCase;
use crate::config::HarnessConfig;
use crate::expr::{self, MetricOutcome};
use crate::netem;

/// Fatal, case-level failures. Any of these skips the metric phase for the
/// affected case; the suite continues with the next case.
#[derive(Debug, Clone, Error, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum CaseFailure {
    #[error("container failed to run: {0}")]
    ContainerExecution(String),

    #[error("container provided no output")]
    NoOutput,

    #[error("client output was not decodable: {0}")]
    MalformedOutput(String),
}

/// The complete execution environment handed to the orchestrator for one
/// case. Built fresh per case and passed by value -- nothing is inherited
/// from a previous case, so stale emulation commands cannot leak across
/// runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CaseEnvironment {
    /// Full upstream `tc` invocation, or empty for no upstream impairment.
    pub up_netem_command: String,
    /// Full downstream `tc` invocation, or empty for no downstream impairment.
    pub down_netem_command: String,
    pub server_args: String,
    pub client_args: String,
}

/// Output captured from the system under test's client container.
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Seam to the external container orchestration. The production
/// implementation shells out to docker compose; tests substitute a mock.
///
/// `execute` has blocking semantics: it resolves only once the system under
/// test has run to completion and its output has been collected. No timeout
/// is enforced at this layer.
#[async_trait::async_trait]
pub trait Orchestrator: Send + Sync {
    /// One-time pre-suite setup (image builds).
    async fn build(&self) -> Result<()>;

    /// Run the system under test with the given environment and capture
    /// the client's output.
    async fn execute(&self, env: &CaseEnvironment) -> Result<CapturedOutput>;

    /// Post-suite teardown (container and image removal).
    async fn cleanup(&self) -> Result<()>;
}

/// Report for one executed case: either a fatal failure, or one outcome per
/// declared metric.
#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub case: String,
    pub environment: CaseEnvironment,
    pub fatal: Option<CaseFailure>,
    pub checks: Vec<MetricOutcome>,
}

impl CaseReport {
    fn fatal(case: &TestCase, environment: CaseEnvironment, failure: CaseFailure) -> Self {
        Self {
            case: case.name().to_string(),
            environment,
            fatal: Some(failure),
            checks: Vec::new(),
        }
    }

    /// A case passes when it has no fatal failure and every check passed.
    /// A case with no declared metrics passes vacuously.
    pub fn passed(&self) -> bool {
        self.fatal.is_none() && self.checks.iter().all(|c| c.verdict.passed())
    }
}

/// Assemble the per-case environment: both emulation commands (wrapped in
/// the configured `tc` invocation when non-empty) plus the CLI argument
/// strings for each side.
pub fn build_environment(case: &TestCase, config: &HarnessConfig) -> CaseEnvironment {
    let (up, down) = netem::build_emulation_commands(case);
    CaseEnvironment {
        up_netem_command: config.tc_command(&up),
        down_netem_command: config.tc_command(&down),
        server_args: case.server_cli().to_string(),
        client_args: case.client_cli().to_string(),
    }
}

/// Run one case to completion: impairment setup, container run, output
/// decode, and evaluation of every declared metric (never short-circuiting
/// on the first failed metric).
pub async fn run_case(
    orchestrator: &dyn Orchestrator,
    case: &TestCase,
    config: &HarnessConfig,
) -> CaseReport {
    let environment = build_environment(case, config);
    tracing::info!(
        case = case.name(),
        up = %environment.up_netem_command,
        down = %environment.down_netem_command,
        "running case"
    );

    let captured = match orchestrator.execute(&environment).await {
        Ok(captured) => captured,
        Err(err) => {
            return CaseReport::fatal(
                case,
                environment,
                CaseFailure::ContainerExecution(format!("{err:#}")),
            );
        }
    };

    if !captured.stderr.is_empty() {
        return CaseReport::fatal(
            case,
            environment,
            CaseFailure::ContainerExecution(captured.stderr),
        );
    }
    if captured.stdout.is_empty() {
        return CaseReport::fatal(case, environment, CaseFailure::NoOutput);
    }

    let results: serde_json::Value = match serde_json::from_str(&captured.stdout) {
        Ok(value) => value,
        Err(err) => {
            return CaseReport::fatal(case, environment, CaseFailure::MalformedOutput(err.to_string()));
        }
    };

    let checks = case
        .metrics()
        .into_iter()
        .map(|(name, expression)| expr::evaluate_metric(name, expression, case.as_json(), &results))
        .collect();

    CaseReport {
        case: case.name().to_string(),
        environment,
        fatal: None,
        checks,
    }
}
