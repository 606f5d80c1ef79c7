//! Built-in per-session test driver: waits for the page under test to
//! publish its results object.
//!
//! The test page runs its own suite once loaded and assigns the raw report
//! to a well-known global; all this side has to do is poll for it.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use crate::config::PollerConfig;
use crate::driver::traits::RemoteDriver;
use crate::report::types::RawReport;
use crate::runner::SessionTest;

/// Polls the session until the results script returns a non-null report or
/// the timeout elapses.
pub struct ResultsPoller {
    config: PollerConfig,
}

impl ResultsPoller {
    pub fn new(config: PollerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionTest for ResultsPoller {
    async fn run(&self, session: &mut dyn RemoteDriver) -> Result<RawReport> {
        let deadline = Instant::now() + Duration::from_secs(self.config.timeout_secs);

        loop {
            let value = session.execute(&self.config.results_script).await?;
            if !value.is_null() {
                return serde_json::from_value(value)
                    .context("Results object has an unexpected shape");
            }
            if Instant::now() >= deadline {
                bail!(
                    "Timed out after {}s waiting for test results",
                    self.config.timeout_secs
                );
            }
            sleep(Duration::from_millis(self.config.poll_interval_ms)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::traits::SessionDescriptor;
    use serde_json::{json, Value};

    /// Driver whose execute yields null a fixed number of times before the
    /// report appears.
    struct CountdownDriver {
        nulls_left: u32,
        report: Value,
    }

    #[async_trait]
    impl RemoteDriver for CountdownDriver {
        async fn init(&mut self, _desired: &SessionDescriptor) -> Result<String> {
            Ok("job".to_string())
        }

        async fn navigate(&mut self, _url: &str) -> Result<()> {
            Ok(())
        }

        async fn execute(&mut self, _script: &str) -> Result<Value> {
            if self.nulls_left > 0 {
                self.nulls_left -= 1;
                Ok(Value::Null)
            } else {
                Ok(self.report.clone())
            }
        }

        async fn quit(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_report_appears() {
        let mut driver = CountdownDriver {
            nulls_left: 3,
            report: json!({"passed": true, "durationSec": 0.5}),
        };
        let poller = ResultsPoller::new(PollerConfig::default());

        let report = poller.run(&mut driver).await.unwrap();
        assert!(report.passed);
        assert_eq!(report.duration_sec, 0.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_without_report() {
        let mut driver = CountdownDriver {
            nulls_left: u32::MAX,
            report: Value::Null,
        };
        let poller = ResultsPoller::new(PollerConfig {
            timeout_secs: 10,
            poll_interval_ms: 100,
            ..Default::default()
        });

        let err = poller.run(&mut driver).await.unwrap_err();
        assert!(err.to_string().contains("Timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_report_is_an_error() {
        let mut driver = CountdownDriver {
            nulls_left: 0,
            report: json!("not a report"),
        };
        let poller = ResultsPoller::new(PollerConfig::default());

        assert!(poller.run(&mut driver).await.is_err());
    }
}
