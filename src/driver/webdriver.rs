//! Wire-protocol client for remote grid sessions.
//!
//! Talks to the grid's HTTP endpoint directly with typed wrappers around the
//! handful of calls the orchestrator needs. Session ids come back in
//! different places depending on the grid implementation, so extraction
//! checks both.

use anyhow::{Context, Result};
use async_trait::async_trait;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::Credentials;
use crate::driver::traits::{DriverFactory, RemoteDriver, SessionDescriptor};

/// Per-request timeout. Session init on a busy grid can queue for a while.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize)]
struct InitRequest<'a> {
    #[serde(rename = "desiredCapabilities")]
    desired_capabilities: &'a SessionDescriptor,
}

#[derive(Debug, Deserialize)]
struct InitResponse {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
    value: Option<InitValue>,
}

#[derive(Debug, Deserialize)]
struct InitValue {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct NavigateRequest<'a> {
    url: &'a str,
}

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    script: &'a str,
    args: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ValueResponse {
    #[serde(default)]
    value: serde_json::Value,
}

/// One remote session over the grid's HTTP wire protocol.
pub struct WebDriverSession {
    base_url: String,
    client: reqwest::Client,
    credentials: Credentials,
    session_name: String,
    session_id: Option<String>,
}

impl WebDriverSession {
    pub fn new(
        endpoint: &str,
        port: u16,
        credentials: Credentials,
        session_name: &str,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: format!("http://{}:{}/wd/hub", endpoint, port),
            client,
            credentials,
            session_name: session_name.to_string(),
            session_id: None,
        })
    }

    fn session_url(&self, path: &str) -> Result<String> {
        let id = self
            .session_id
            .as_deref()
            .context("No active session")?;
        Ok(format!("{}/session/{}{}", self.base_url, id, path))
    }

    fn log_command(&self, method: &str, path: &str) {
        println!(
            "{} : > {}: {}",
            self.session_name,
            method.yellow(),
            path
        );
    }
}

#[async_trait]
impl RemoteDriver for WebDriverSession {
    async fn init(&mut self, desired: &SessionDescriptor) -> Result<String> {
        let url = format!("{}/session", self.base_url);
        self.log_command("POST", "/session");

        let resp = self
            .client
            .post(&url)
            .basic_auth(&self.credentials.user, Some(&self.credentials.key))
            .json(&InitRequest {
                desired_capabilities: desired,
            })
            .send()
            .await
            .context("Failed to request session initialization")?
            .error_for_status()
            .context("Grid refused session initialization")?;

        let init: InitResponse = resp
            .json()
            .await
            .context("Failed to parse session response")?;

        let session_id = init
            .session_id
            .or_else(|| init.value.and_then(|v| v.session_id))
            .context("No session id in grid response")?;

        log::debug!("{}: session {} ready", self.session_name, session_id);
        self.session_id = Some(session_id.clone());
        Ok(session_id)
    }

    async fn navigate(&mut self, url: &str) -> Result<()> {
        let target = self.session_url("/url")?;
        self.log_command("POST", "/url");

        self.client
            .post(&target)
            .basic_auth(&self.credentials.user, Some(&self.credentials.key))
            .json(&NavigateRequest { url })
            .send()
            .await
            .context("Failed to navigate session")?
            .error_for_status()
            .context("Navigation rejected by grid")?;

        Ok(())
    }

    async fn execute(&mut self, script: &str) -> Result<serde_json::Value> {
        let target = self.session_url("/execute")?;
        log::debug!("{}: > POST: /execute", self.session_name);

        let resp = self
            .client
            .post(&target)
            .basic_auth(&self.credentials.user, Some(&self.credentials.key))
            .json(&ExecuteRequest {
                script,
                args: Vec::new(),
            })
            .send()
            .await
            .context("Failed to execute script in session")?
            .error_for_status()
            .context("Script execution rejected by grid")?;

        let value: ValueResponse = resp
            .json()
            .await
            .context("Failed to parse script result")?;
        Ok(value.value)
    }

    async fn quit(&mut self) -> Result<()> {
        if self.session_id.is_none() {
            return Ok(());
        }
        let target = self.session_url("")?;
        self.log_command("DELETE", "/");

        self.client
            .delete(&target)
            .basic_auth(&self.credentials.user, Some(&self.credentials.key))
            .send()
            .await
            .context("Failed to terminate session")?;

        self.session_id = None;
        Ok(())
    }
}

/// Connects sessions to one grid endpoint with shared credentials.
pub struct WebDriverFactory {
    endpoint: String,
    port: u16,
    credentials: Credentials,
}

impl WebDriverFactory {
    pub fn new(endpoint: &str, port: u16, credentials: Credentials) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            port,
            credentials,
        }
    }
}

impl DriverFactory for WebDriverFactory {
    fn connect(&self, session_name: &str) -> Result<Box<dyn RemoteDriver>> {
        Ok(Box::new(WebDriverSession::new(
            &self.endpoint,
            self.port,
            self.credentials.clone(),
            session_name,
        )?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn descriptor() -> SessionDescriptor {
        SessionDescriptor {
            name: "smoke - chrome".to_string(),
            browser_name: "chrome".to_string(),
            platform: "Linux".to_string(),
            version: "".to_string(),
            build: Some("42".to_string()),
            tags: vec!["travis".to_string(), "42".to_string()],
        }
    }

    async fn session_for(server: &MockServer) -> WebDriverSession {
        let addr = server.address();
        WebDriverSession::new(
            &addr.ip().to_string(),
            addr.port(),
            Credentials {
                user: "user".to_string(),
                key: "key".to_string(),
            },
            "chrome",
        )
        .unwrap()
    }

    #[test]
    fn test_base_url() {
        let session = WebDriverSession::new(
            "ondemand.saucelabs.com",
            80,
            Credentials::default(),
            "chrome",
        )
        .unwrap();
        assert_eq!(session.base_url, "http://ondemand.saucelabs.com:80/wd/hub");
    }

    #[tokio::test]
    async fn test_init_top_level_session_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/wd/hub/session"))
            .and(body_partial_json(
                json!({"desiredCapabilities": {"browserName": "chrome"}}),
            ))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"sessionId": "abc123"})),
            )
            .mount(&server)
            .await;

        let mut session = session_for(&server).await;
        let id = session.init(&descriptor()).await.unwrap();
        assert_eq!(id, "abc123");
    }

    #[tokio::test]
    async fn test_init_nested_session_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/wd/hub/session"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"value": {"sessionId": "xyz789"}})),
            )
            .mount(&server)
            .await;

        let mut session = session_for(&server).await;
        let id = session.init(&descriptor()).await.unwrap();
        assert_eq!(id, "xyz789");
    }

    #[tokio::test]
    async fn test_init_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/wd/hub/session"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut session = session_for(&server).await;
        assert!(session.init(&descriptor()).await.is_err());
    }

    #[tokio::test]
    async fn test_execute_returns_value() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/wd/hub/session"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"sessionId": "s1"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/wd/hub/session/s1/execute"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"value": {"passed": true}})),
            )
            .mount(&server)
            .await;

        let mut session = session_for(&server).await;
        session.init(&descriptor()).await.unwrap();
        let value = session.execute("return window.mochaResults;").await.unwrap();
        assert_eq!(value, json!({"passed": true}));
    }

    #[tokio::test]
    async fn test_quit_without_session_is_noop() {
        let server = MockServer::start().await;
        let mut session = session_for(&server).await;
        session.quit().await.unwrap();
    }
}
