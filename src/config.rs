use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The public grid endpoint; job status updates only exist there.
pub const DEFAULT_ENDPOINT: &str = "ondemand.saucelabs.com";
pub const DEFAULT_PORT: u16 = 80;

/// Grid account credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    pub user: String,
    pub key: String,
}

/// One browser to run against. List order in the run file is launch order,
/// and the final report keeps it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BrowserSpec {
    /// Browser name (e.g. "chrome", "firefox", "internet explorer")
    pub name: String,
    /// Browser version; empty means whatever the grid considers latest
    #[serde(default)]
    pub version: String,
    /// Platform identifier (e.g. "Windows 10", "Linux")
    #[serde(default)]
    pub platform: String,
}

impl BrowserSpec {
    /// Human-readable session name: `name version (platform)`, empty parts
    /// omitted.
    pub fn display_name(&self) -> String {
        let mut name = self.name.clone();
        if !self.version.is_empty() {
            name.push(' ');
            name.push_str(&self.version);
        }
        if !self.platform.is_empty() {
            name.push_str(&format!(" ({})", self.platform));
        }
        name
    }
}

/// Local tunnel process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// Tunnel binary to launch. Credentials are passed through the child's
    /// environment, not argv.
    pub command: String,
    /// Extra arguments for the tunnel binary
    pub args: Vec<String>,
    /// Regex matched against stdout lines to detect readiness
    pub ready_pattern: String,
    pub verbose: bool,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            command: "sc".to_string(),
            args: Vec::new(),
            ready_pattern: "Sauce Connect is up".to_string(),
            verbose: false,
        }
    }
}

/// Settings for the built-in results poller the CLI drives sessions with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Script returning the page-published results object, or null while the
    /// suite is still running
    pub results_script: String,
    pub poll_interval_ms: u64,
    pub timeout_secs: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            results_script: "return window.mochaResults;".to_string(),
            poll_interval_ms: 2000,
            timeout_secs: 300,
        }
    }
}

/// Full description of one orchestrated run, as loaded from a YAML run file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Human-readable run name, prefixed to every session name on the grid
    pub name: String,
    /// Grid endpoint host
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Account credentials; resolved from the environment when omitted
    #[serde(default)]
    pub credentials: Option<Credentials>,
    /// URL each session loads before the test callback runs
    #[serde(default)]
    pub url: Option<String>,
    /// Launch a local tunnel before any session starts
    #[serde(default)]
    pub tunnel: Option<TunnelConfig>,
    /// Browsers to run, in launch order
    pub browsers: Vec<BrowserSpec>,
    #[serde(default)]
    pub poller: PollerConfig,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl RunConfig {
    /// Load a run file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read run file: {}", path.display()))?;
        let config: RunConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse run file: {}", path.display()))?;
        Ok(config)
    }

    /// Fill credentials from `SAUCE_USERNAME` / `SAUCE_ACCESS_KEY` when the
    /// run file omits them. Returns whether credentials are now present.
    pub fn resolve_credentials(&mut self) -> bool {
        if self.credentials.is_none() {
            if let (Ok(user), Ok(key)) = (
                std::env::var("SAUCE_USERNAME"),
                std::env::var("SAUCE_ACCESS_KEY"),
            ) {
                self.credentials = Some(Credentials { user, key });
            }
        }
        self.credentials.is_some()
    }

    /// Whether this run targets the public grid.
    pub fn uses_default_grid(&self) -> bool {
        self.endpoint == DEFAULT_ENDPOINT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_display_name_variants() {
        let full = BrowserSpec {
            name: "chrome".to_string(),
            version: "120".to_string(),
            platform: "Linux".to_string(),
        };
        assert_eq!(full.display_name(), "chrome 120 (Linux)");

        let bare = BrowserSpec {
            name: "firefox".to_string(),
            ..Default::default()
        };
        assert_eq!(bare.display_name(), "firefox");

        let no_platform = BrowserSpec {
            name: "safari".to_string(),
            version: "17".to_string(),
            ..Default::default()
        };
        assert_eq!(no_platform.display_name(), "safari 17");
    }

    #[test]
    fn test_load_run_file() {
        let yaml = r#"
name: smoke tests
url: http://localhost:8080/test/
tunnel:
  command: sc
browsers:
  - name: chrome
    version: "120"
    platform: Linux
  - name: firefox
"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = RunConfig::load(file.path()).unwrap();
        assert_eq!(config.name, "smoke tests");
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.uses_default_grid());
        assert_eq!(config.browsers.len(), 2);
        assert_eq!(config.browsers[0].version, "120");
        assert_eq!(config.browsers[1].display_name(), "firefox");
        let tunnel = config.tunnel.unwrap();
        assert_eq!(tunnel.command, "sc");
        assert_eq!(tunnel.ready_pattern, "Sauce Connect is up");
    }

    #[test]
    fn test_custom_endpoint_disables_grid_reporting() {
        let yaml = r#"
name: local grid
endpoint: grid.internal
port: 4444
browsers:
  - name: chrome
"#;
        let config: RunConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(!config.uses_default_grid());
        assert_eq!(config.port, 4444);
    }
}
