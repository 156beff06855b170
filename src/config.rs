//! Harness configuration -- compose project naming, the impaired interface,
//! and where the compose file lives. Loaded from an optional TOML file;
//! every field has a default matching the stock udpst-testing compose
//! setup.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Docker compose project name.
    pub project_name: String,

    /// Name of the client container whose logs carry the JSON results.
    pub client_container: String,

    /// Interface inside each container that netem is applied to.
    pub interface: String,

    /// Compose file to use; `None` lets docker compose pick up the default.
    pub compose_file: Option<PathBuf>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            project_name: "udpst-testing".to_string(),
            client_container: "udpst-testing-client-1".to_string(),
            interface: "eth0".to_string(),
            compose_file: None,
        }
    }
}

impl HarnessConfig {
    /// Load from a TOML file, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            None => Ok(Self::default()),
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                toml::from_str(&text)
                    .with_context(|| format!("parsing config {}", path.display()))
            }
        }
    }

    /// Wrap rendered netem options in the full `tc` invocation, or pass an
    /// empty command through untouched.
    pub fn tc_command(&self, netem_opts: &str) -> String {
        if netem_opts.is_empty() {
            String::new()
        } else {
            format!("tc qdisc replace dev {} root {}", self.interface, netem_opts)
        }
    }

    /// Image names the compose build produces, removed during cleanup.
    pub fn image_names(&self) -> (String, String) {
        (
            format!("{}_client", self.project_name),
            format!("{}_server", self.project_name),
        )
    }
}
