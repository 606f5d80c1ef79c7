use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Capability payload sent when a remote session is initialized.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescriptor {
    /// Session name shown on the grid dashboard
    pub name: String,
    pub browser_name: String,
    pub platform: String,
    pub version: String,
    /// Shared build identifier grouping this run's sessions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,
    pub tags: Vec<String>,
}

/// A remote browser session under automated control.
///
/// The production implementation speaks the grid's wire protocol over HTTP;
/// tests substitute scripted fakes behind the same trait.
#[async_trait]
pub trait RemoteDriver: Send {
    /// Request session initialization. Returns the grid-assigned job id.
    async fn init(&mut self, desired: &SessionDescriptor) -> Result<String>;

    /// Point the session's browser at a URL.
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Execute a script in the page and return its value.
    async fn execute(&mut self, script: &str) -> Result<serde_json::Value>;

    /// Terminate the remote session.
    async fn quit(&mut self) -> Result<()>;
}

/// Creates one driver per browser launch.
pub trait DriverFactory: Send + Sync {
    /// Build a driver for one session. `session_name` is the browser's
    /// display name, used to prefix wire logging.
    fn connect(&self, session_name: &str) -> Result<Box<dyn RemoteDriver>>;
}
