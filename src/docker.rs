//! Docker compose orchestrator -- the production [`Orchestrator`] that runs
//! the client/server pair under compose and collects the client's logs.
//!
//! Each case run is: `down` + `rm -f` (clear anything a previous or aborted
//! run left behind), `up --abort-on-container-exit` (blocks until the client
//! exits), then `docker logs <client>` for the JSON results. The four
//! environment values are set explicitly on every spawned command, so a
//! case always sees exactly its own environment.

use anyhow::{bail, Context, Result};
use tokio::process::Command;

use crate::config::HarnessConfig;
use crate::runner::{CapturedOutput, CaseEnvironment, Orchestrator};

/// Environment variable names the compose file consumes. These are the
/// contract with the docker-compose.yml shipped alongside the system under
/// test.
const UP_NETEM_VAR: &str = "UP_NETEM_COMMAND";
const DOWN_NETEM_VAR: &str = "DOWN_NETEM_COMMAND";
const SERVER_ARGS_VAR: &str = "SERVER_ARGS";
const CLIENT_ARGS_VAR: &str = "CLIENT_ARGS";

pub struct DockerCompose {
    config: HarnessConfig,
}

impl DockerCompose {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    /// Base `docker compose` invocation with project name and optional
    /// compose file applied.
    fn compose(&self, env: Option<&CaseEnvironment>) -> Command {
        let mut cmd = Command::new("docker");
        cmd.arg("compose");
        cmd.args(["--project-name", &self.config.project_name]);
        if let Some(file) = &self.config.compose_file {
            cmd.arg("-f").arg(file);
        }
        if let Some(env) = env {
            cmd.env(UP_NETEM_VAR, &env.up_netem_command);
            cmd.env(DOWN_NETEM_VAR, &env.down_netem_command);
            cmd.env(SERVER_ARGS_VAR, &env.server_args);
            cmd.env(CLIENT_ARGS_VAR, &env.client_args);
        }
        cmd
    }

    async fn run_to_completion(mut cmd: Command, what: &str) -> Result<()> {
        let status = cmd
            .status()
            .await
            .with_context(|| format!("spawning {what}"))?;
        if !status.success() {
            bail!("{what} exited with {status}");
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Orchestrator for DockerCompose {
    async fn build(&self) -> Result<()> {
        tracing::info!(project = %self.config.project_name, "building container images");
        let mut cmd = self.compose(None);
        cmd.arg("build");
        Self::run_to_completion(cmd, "docker compose build").await
    }

    async fn execute(&self, env: &CaseEnvironment) -> Result<CapturedOutput> {
        // Clear out anything hanging around from a previous run.
        let mut down = self.compose(Some(env));
        down.arg("down");
        if let Err(err) = Self::run_to_completion(down, "docker compose down").await {
            tracing::warn!(%err, "pre-run compose down failed");
        }
        let mut rm = self.compose(Some(env));
        rm.args(["rm", "-f"]);
        if let Err(err) = Self::run_to_completion(rm, "docker compose rm").await {
            tracing::warn!(%err, "pre-run compose rm failed");
        }

        // Blocks until the client container exits.
        let mut up = self.compose(Some(env));
        up.args(["up", "--abort-on-container-exit"]);
        Self::run_to_completion(up, "docker compose up").await?;

        // The client writes its JSON results to its own stdout; fetch them
        // from the container log.
        let output = Command::new("docker")
            .args(["logs", &self.config.client_container])
            .output()
            .await
            .context("spawning docker logs")?;

        Ok(CapturedOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn cleanup(&self) -> Result<()> {
        tracing::info!(project = %self.config.project_name, "cleaning up containers and images");
        let mut rm = self.compose(None);
        rm.args(["rm", "-f"]);
        if let Err(err) = Self::run_to_completion(rm, "docker compose rm").await {
            tracing::warn!(%err, "post-suite compose rm failed");
        }

        // Remove the built images so the next session rebuilds from fresh
        // code instead of testing a stale image.
        let (client_image, server_image) = self.config.image_names();
        for image in [client_image, server_image] {
            let status = Command::new("docker")
                .args(["image", "rm", &image])
                .status()
                .await
                .context("spawning docker image rm")?;
            if !status.success() {
                tracing::warn!(%image, "image removal failed (may not exist)");
            }
        }
        Ok(())
    }
}
