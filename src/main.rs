use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use impairtest::cases;
use impairtest::config::HarnessConfig;
use impairtest::docker::DockerCompose;
use impairtest::expr;
use impairtest::netem;
use impairtest::report::SuiteReport;

#[derive(Parser)]
#[command(
    name = "impairtest",
    about = "Network-impairment test harness for containerized UDP speed-test runs",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every case in a YAML case file against the containerized system
    Run {
        /// YAML case file
        #[arg(long, default_value = "test_cases.yaml")]
        cases: PathBuf,

        /// Optional TOML harness config
        #[arg(long)]
        config: Option<PathBuf>,

        /// Emit the full suite report as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the synthesized tc/netem commands for every case, without running anything
    Render {
        /// YAML case file
        #[arg(long, default_value = "test_cases.yaml")]
        cases: PathBuf,

        /// Optional TOML harness config
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Evaluate a single metric expression against a results JSON file
    Check {
        /// The metric expression text
        #[arg(long)]
        expr: String,

        /// Results JSON file (as captured from the client container)
        #[arg(long)]
        results: PathBuf,

        /// Case file providing the test_case binding
        #[arg(long)]
        cases: Option<PathBuf>,

        /// Name of the case to bind as test_case (requires --cases)
        #[arg(long)]
        case: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { cases: case_file, config, json } => {
            let config = HarnessConfig::load(config.as_deref())?;
            let cases = cases::load_cases(&case_file)?;
            tracing::info!(cases = cases.len(), "starting suite");

            let orchestrator = DockerCompose::new(config.clone());
            let suite = impairtest::run_suite(&orchestrator, &cases, &config).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&suite)?);
            } else {
                print_suite(&suite);
            }

            if !suite.all_passed() {
                std::process::exit(1);
            }
        }
        Commands::Render { cases: case_file, config } => {
            let config = HarnessConfig::load(config.as_deref())?;
            let cases = cases::load_cases(&case_file)?;
            for case in &cases {
                let (up, down) = netem::build_emulation_commands(case);
                println!("{}", case.name());
                println!("  upstream:   {}", display_command(&config.tc_command(&up)));
                println!("  downstream: {}", display_command(&config.tc_command(&down)));
            }
        }
        Commands::Check { expr: expression, results, cases: case_file, case } => {
            let results_text = std::fs::read_to_string(&results)
                .with_context(|| format!("reading results {}", results.display()))?;
            let results: serde_json::Value = serde_json::from_str(&results_text)
                .with_context(|| format!("decoding results {}", results.display()))?;

            let test_case = match (&case_file, &case) {
                (Some(path), Some(name)) => {
                    let all = cases::load_cases(path)?;
                    let found = all
                        .iter()
                        .find(|c| c.name() == *name)
                        .with_context(|| format!("no case named '{name}' in {}", path.display()))?;
                    found.as_json().clone()
                }
                (None, None) => serde_json::json!({}),
                _ => bail!("--cases and --case must be given together"),
            };

            let outcome = expr::evaluate_metric("check", &expression, &test_case, &results);
            println!("{} : {}", outcome.verdict, outcome.expression);
            if !outcome.verdict.passed() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn display_command(command: &str) -> &str {
    if command.is_empty() {
        "(none)"
    } else {
        command
    }
}

fn print_suite(suite: &SuiteReport) {
    println!("\n=== impairtest suite {} ===", suite.run_id);
    for case in &suite.cases {
        let status = if case.passed() { "PASS" } else { "FAIL" };
        println!("\n[{status}] {}", case.case);
        if let Some(failure) = &case.fatal {
            println!("  fatal: {failure}");
            continue;
        }
        for check in &case.checks {
            println!(
                "  {:<24} {:<8} {}",
                check.metric,
                check.verdict.to_string(),
                check.expression
            );
        }
    }
    let (passed, failed) = suite.tally();
    println!("\n{} passed, {} failed ({} cases)", passed, failed, suite.cases.len());
}
