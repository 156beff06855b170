//! Suite-level integration tests -- drive `run_suite` over a real case file
//! with a scripted orchestrator in place of docker compose.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use impairtest::cases::parse_cases;
use impairtest::config::HarnessConfig;
use impairtest::expr::Verdict;
use impairtest::runner::{CapturedOutput, CaseEnvironment, CaseFailure, Orchestrator};

/// Returns canned output per client argument string and records every
/// environment it was handed, so tests can assert on cross-case isolation.
#[derive(Default)]
struct Scripted {
    outputs: HashMap<String, CapturedOutput>,
    seen: Mutex<Vec<CaseEnvironment>>,
    built: Mutex<bool>,
    cleaned: Mutex<bool>,
}

impl Scripted {
    fn with_output(mut self, client_args: &str, stdout: &str) -> Self {
        self.outputs.insert(
            client_args.to_string(),
            CapturedOutput { stdout: stdout.to_string(), stderr: String::new() },
        );
        self
    }
}

#[async_trait::async_trait]
impl Orchestrator for Scripted {
    async fn build(&self) -> Result<()> {
        *self.built.lock().unwrap() = true;
        Ok(())
    }

    async fn execute(&self, env: &CaseEnvironment) -> Result<CapturedOutput> {
        self.seen.lock().unwrap().push(env.clone());
        Ok(self.outputs.get(&env.client_args).cloned().unwrap_or_default())
    }

    async fn cleanup(&self) -> Result<()> {
        *self.cleaned.lock().unwrap() = true;
        Ok(())
    }
}

const CASES: &str = r#"
- impaired-upstream:
    netem:
      upstream:
        delay:
          params: [100ms, 10ms]
    client-cli: "-u -f json 172.20.0.2"
    server-cli: "-v"
    metrics:
      delivered: "within_range(results['DeliveredPercent'], 95, 100)"
      loss: "results['LossRatio'] <= 0.02"
- clean-link:
    client-cli: "-f json 172.20.0.2"
    server-cli: ""
    metrics:
      delivered: "results['DeliveredPercent'] >= 99"
- broken-output:
    client-cli: "-f text 172.20.0.2"
    server-cli: ""
    metrics:
      never_evaluated: "results['anything'] == 1"
"#;

#[tokio::test]
async fn test_suite_runs_every_case_and_isolates_environments() {
    let cases = parse_cases(CASES).unwrap();
    let config = HarnessConfig::default();
    let orch = Scripted::default()
        .with_output(
            "-u -f json 172.20.0.2",
            r#"{"DeliveredPercent": 99.1, "LossRatio": 0.01}"#,
        )
        .with_output("-f json 172.20.0.2", r#"{"DeliveredPercent": 99.8}"#)
        .with_output("-f text 172.20.0.2", "DeliveredPercent: 99.8");

    let suite = impairtest::run_suite(&orch, &cases, &config).await.unwrap();

    assert!(*orch.built.lock().unwrap());
    assert!(*orch.cleaned.lock().unwrap());
    assert_eq!(suite.cases.len(), 3);

    // First case: impaired, both metrics pass.
    let first = &suite.cases[0];
    assert!(first.passed());
    assert_eq!(first.checks.len(), 2);
    assert!(first.checks.iter().all(|c| c.verdict == Verdict::Pass));

    // Third case: non-JSON output is fatal for that case only.
    let third = &suite.cases[2];
    assert!(matches!(third.fatal, Some(CaseFailure::MalformedOutput(_))));
    assert!(third.checks.is_empty());

    // Suite fails overall, but every case ran.
    assert!(!suite.all_passed());
    assert_eq!(suite.tally(), (2, 1));

    // Environments are rebuilt per case: the clean-link case must not
    // inherit the previous case's netem command.
    let seen = orch.seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert_eq!(
        seen[0].up_netem_command,
        "tc qdisc replace dev eth0 root netem delay 100ms 10ms"
    );
    assert_eq!(seen[1].up_netem_command, "");
    assert_eq!(seen[1].down_netem_command, "");
    assert_eq!(seen[2].up_netem_command, "");
}

#[tokio::test]
async fn test_fatal_case_does_not_stop_later_cases() {
    let cases = parse_cases(
        r#"
- no-output:
    client-cli: "silent"
    server-cli: ""
    metrics:
      anything: "1 == 1"
- still-runs:
    client-cli: "talkative"
    server-cli: ""
    metrics:
      ok: "results['x'] == 1"
"#,
    )
    .unwrap();
    let orch = Scripted::default()
        .with_output("silent", "")
        .with_output("talkative", r#"{"x": 1}"#);

    let suite = impairtest::run_suite(&orch, &cases, &HarnessConfig::default())
        .await
        .unwrap();

    assert_eq!(suite.cases[0].fatal, Some(CaseFailure::NoOutput));
    assert!(suite.cases[0].checks.is_empty());
    assert!(suite.cases[1].passed());
}

#[tokio::test]
async fn test_suite_report_serializes_attributed_checks() {
    let cases = parse_cases(
        r#"
- one:
    client-cli: "args"
    server-cli: ""
    metrics:
      named_check: "results['v'] > 10"
"#,
    )
    .unwrap();
    let orch = Scripted::default().with_output("args", r#"{"v": 5}"#);

    let suite = impairtest::run_suite(&orch, &cases, &HarnessConfig::default())
        .await
        .unwrap();
    let json = serde_json::to_value(&suite).unwrap();

    assert_eq!(json["cases"][0]["checks"][0]["metric"], "named_check");
    assert_eq!(json["cases"][0]["checks"][0]["expression"], "results['v'] > 10");
    assert_eq!(json["cases"][0]["checks"][0]["verdict"]["kind"], "fail");
}
