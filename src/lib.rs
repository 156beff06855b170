//! impairtest -- network-impairment test harness for a containerized UDP
//! speed-test client/server pair.
//!
//! This crate turns declarative YAML test cases into tc/netem emulation
//! commands, drives the system under test through docker compose, and
//! evaluates tester-authored boolean metric expressions against the
//! client's JSON output.

pub mod cases;
pub mod config;
pub mod docker;
pub mod expr;
pub mod netem;
pub mod report;
pub mod runner;

use anyhow::Result;
use chrono::Utc;

use crate::cases::TestCase;
use crate::config::HarnessConfig;
use crate::report::SuiteReport;
use crate::runner::Orchestrator;

/// Run a whole suite: build images once, execute every case strictly one
/// at a time, tear down afterwards.
///
/// Cases run sequentially: concurrent netem state on the shared container
/// network path would corrupt results across cases. A fatal failure in one
/// case is recorded in its report and the suite moves on.
pub async fn run_suite(
    orchestrator: &dyn Orchestrator,
    cases: &[TestCase],
    config: &HarnessConfig,
) -> Result<SuiteReport> {
    let started_at = Utc::now();

    // 1. Pre-suite image build; a broken build fails the session up front.
    orchestrator.build().await?;

    // 2. One case at a time, each to full completion.
    let mut reports = Vec::with_capacity(cases.len());
    for case in cases {
        let report = runner::run_case(orchestrator, case, config).await;
        match &report.fatal {
            Some(failure) => tracing::error!(case = case.name(), %failure, "case failed fatally"),
            None => tracing::info!(
                case = case.name(),
                checks = report.checks.len(),
                passed = report.passed(),
                "case finished"
            ),
        }
        reports.push(report);
    }

    // 3. Best-effort teardown; a cleanup failure should not mask results.
    if let Err(err) = orchestrator.cleanup().await {
        tracing::warn!(%err, "post-suite cleanup failed");
    }

    Ok(SuiteReport::new(started_at, reports))
}
