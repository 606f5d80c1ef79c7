pub mod poller;
pub mod state;

pub use poller::ResultsPoller;
pub use state::{run_tags, RunState};

use anyhow::{Context, Result};
use async_trait::async_trait;
use colored::Colorize;
use indicatif::ProgressBar;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RunConfig;
use crate::driver::traits::{DriverFactory, RemoteDriver, SessionDescriptor};
use crate::driver::webdriver::WebDriverFactory;
use crate::report::console;
use crate::report::types::{RawReport, SessionOutcome};
use crate::reporter::{JobReporter, RestReporter};
use crate::tunnel::{Tunnel, TunnelError};

/// Environment variable carrying the CI build number.
const BUILD_ENV: &str = "TRAVIS_BUILD_NUMBER";

/// Delay between the last session completing and the summary rendering, so
/// trailing status lines from the grid flush first.
const SUMMARY_DELAY: Duration = Duration::from_secs(1);

/// Caller-supplied test driver: given a live session, runs the suite and
/// returns the raw status report. Resolving exactly once is the completion
/// signal for that session's tests.
#[async_trait]
pub trait SessionTest: Send + Sync {
    async fn run(&self, session: &mut dyn RemoteDriver) -> Result<RawReport>;
}

/// Remote test orchestrator. Owns the full lifecycle of a multi-browser
/// grid run: tunnel startup, session launches, result capture and
/// reporting, teardown, and the final summary.
pub struct Remote {
    config: RunConfig,
    on_test: Arc<dyn SessionTest>,
    factory: Arc<dyn DriverFactory>,
    reporter: Option<Arc<dyn JobReporter>>,
    build: Option<String>,
    tags: Vec<String>,
    summary_delay: Duration,
}

impl Remote {
    /// Wire the orchestrator to the real grid collaborators.
    pub fn new(config: RunConfig, on_test: Arc<dyn SessionTest>) -> Result<Self> {
        let credentials = config
            .credentials
            .clone()
            .context("Missing grid credentials")?;
        let factory = Arc::new(WebDriverFactory::new(
            &config.endpoint,
            config.port,
            credentials.clone(),
        ));
        // Job status updates only exist on the public grid API.
        let reporter: Option<Arc<dyn JobReporter>> = if config.uses_default_grid() {
            Some(Arc::new(RestReporter::new(credentials)))
        } else {
            None
        };
        Ok(Self::with_collaborators(config, on_test, factory, reporter))
    }

    /// Inject the collaborators directly. Embedders and tests use this to
    /// substitute their own driver factory or reporter.
    pub fn with_collaborators(
        config: RunConfig,
        on_test: Arc<dyn SessionTest>,
        factory: Arc<dyn DriverFactory>,
        reporter: Option<Arc<dyn JobReporter>>,
    ) -> Self {
        let build = std::env::var(BUILD_ENV).ok();
        let tags = state::run_tags(build.as_deref());
        Self {
            config,
            on_test,
            factory,
            reporter,
            build,
            tags,
            summary_delay: SUMMARY_DELAY,
        }
    }

    /// Override the build identifier (normally read from the environment).
    pub fn with_build(mut self, build: Option<String>) -> Self {
        self.tags = state::run_tags(build.as_deref());
        self.build = build;
        self
    }

    #[cfg(test)]
    fn with_summary_delay(mut self, delay: Duration) -> Self {
        self.summary_delay = delay;
        self
    }

    /// Tag set attached to every session of this run.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Run every configured browser and render the consolidated summary.
    ///
    /// Returns the number of failed browsers, or `None` when the tunnel was
    /// shut down from outside before the run could start (nothing launched,
    /// not an error).
    pub async fn run(&self) -> Result<Option<u32>> {
        let tunnel = match self.start_tunnel().await {
            Ok(tunnel) => tunnel,
            Err(TunnelError::Terminated) => {
                println!(
                    "{}",
                    "Tunnel was shut down before the run started".yellow()
                );
                return Ok(None);
            }
            Err(e) => {
                return Err(anyhow::Error::new(e).context("Error launching tunnel"));
            }
        };

        let (run_state, mut done_rx) = RunState::new(self.config.browsers.len());
        let run_state = Arc::new(run_state);

        self.launch_sessions(run_state.clone()).await;

        // Join barrier: one signal per browser. Teardown is unreachable
        // before the last one.
        let mut remaining = self.config.browsers.len();
        while remaining > 0 && done_rx.recv().await.is_some() {
            remaining -= 1;
        }

        if let Some(tunnel) = tunnel {
            tunnel.close().await;
        }

        tokio::time::sleep(self.summary_delay).await;

        let outcomes = run_state.snapshot();
        let failures = console::display_results(&self.config.browsers, &outcomes);
        Ok(Some(failures))
    }

    async fn start_tunnel(&self) -> Result<Option<Tunnel>, TunnelError> {
        let Some(tunnel_config) = &self.config.tunnel else {
            return Ok(None);
        };
        let credentials = self.config.credentials.clone().unwrap_or_default();

        let spinner = ProgressBar::new_spinner();
        spinner.set_message("Starting tunnel...");
        spinner.enable_steady_tick(Duration::from_millis(120));

        match Tunnel::start(tunnel_config, &credentials).await {
            Ok(tunnel) => {
                spinner.finish_with_message("Tunnel ready");
                Ok(Some(tunnel))
            }
            Err(e) => {
                spinner.finish_and_clear();
                Err(e)
            }
        }
    }

    /// Launch sessions in list order. Each launch awaits only session
    /// initialization before moving on, so tests overlap across browsers
    /// while launch order stays deterministic.
    async fn launch_sessions(&self, run_state: Arc<RunState>) {
        for browser in &self.config.browsers {
            let name = browser.display_name();
            let desired = SessionDescriptor {
                name: format!("{} - {}", self.config.name, name),
                browser_name: browser.name.clone(),
                platform: browser.platform.clone(),
                version: browser.version.clone(),
                build: self.build.clone(),
                tags: self.tags.clone(),
            };

            let mut driver = match self.factory.connect(&name) {
                Ok(driver) => driver,
                Err(e) => {
                    println!(
                        "{} : {}",
                        name,
                        format!("failed to create session client: {:#}", e).red()
                    );
                    run_state.record(&name, SessionOutcome::no_results());
                    run_state.session_done().await;
                    continue;
                }
            };

            match driver.init(&desired).await {
                Ok(job_id) => {
                    tokio::spawn(drive_session(
                        driver,
                        job_id,
                        name,
                        self.config.url.clone(),
                        self.on_test.clone(),
                        self.reporter.clone(),
                        run_state.clone(),
                    ));
                }
                Err(e) => {
                    // This browser still counts: record the empty outcome
                    // and signal completion so the barrier stays balanced.
                    println!(
                        "{} : {}",
                        name,
                        format!("failed to start session: {:#}", e).red()
                    );
                    run_state.record(&name, SessionOutcome::no_results());
                    run_state.session_done().await;
                }
            }
        }
    }
}

/// Drive one live session to completion: navigate, run the test callback,
/// terminate the session, record and report the outcome, then signal the
/// barrier. Everything past navigation is absorbed into the outcome; only
/// the completion signal must happen.
async fn drive_session(
    mut driver: Box<dyn RemoteDriver>,
    job_id: String,
    name: String,
    url: Option<String>,
    on_test: Arc<dyn SessionTest>,
    reporter: Option<Arc<dyn JobReporter>>,
    run_state: Arc<RunState>,
) {
    if let Some(url) = &url {
        if let Err(e) = driver.navigate(url).await {
            log::warn!("{}: navigation failed: {:#}", name, e);
        }
    }

    let test_result = on_test.run(driver.as_mut()).await;

    if let Err(e) = driver.quit().await {
        log::warn!("{}: failed to terminate session: {:#}", name, e);
    }

    let outcome = match test_result {
        Ok(raw) => SessionOutcome::from_raw(&raw),
        Err(e) => {
            println!(
                "{} : {}",
                name,
                format!("test run produced no report: {:#}", e).red()
            );
            SessionOutcome::no_results()
        }
    };
    run_state.record(&name, outcome.clone());

    if let Some(reporter) = &reporter {
        let passed = outcome.job_passed();
        match reporter
            .update_job(&job_id, passed, outcome.summary.as_ref())
            .await
        {
            Ok(()) => println!(
                "{} : > job {} marked as {}",
                name,
                job_id,
                if passed {
                    "passed".green()
                } else {
                    "failed".red()
                }
            ),
            Err(e) => println!(
                "{} : > job {}: unable to set status: {:#}",
                name, job_id, e
            ),
        }
    }

    run_state.session_done().await;
}
