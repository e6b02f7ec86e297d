//! Batch execution across discovered suites.
//!
//! Suites run one at a time. With a `[server]` section the configured
//! [`Topology`] decides whether every suite talks to one shared analysis
//! server or each gets its own.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::backend::{self, BackendSession};
use crate::config::{HarnessConfig, Topology};
use crate::discovery::{self, TestFilter};
use crate::launcher::Launcher;
use crate::models::{RunSummary, SuiteResult};
use crate::{HarnessError, Result};

/// Runs batches of suites and summarises them.
#[derive(Debug)]
pub struct Aggregator {
    config: Arc<HarnessConfig>,
    launcher: Launcher,
    timeout: Duration,
}

impl Aggregator {
    /// Aggregator using the configured per-suite timeout.
    #[must_use]
    pub fn new(config: Arc<HarnessConfig>, launcher: Launcher) -> Self {
        let timeout = config.timeout();
        Self {
            config,
            launcher,
            timeout,
        }
    }

    /// Override the per-suite timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Every discovered test id, sorted.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Config` if the test pattern is invalid.
    pub fn list(&self) -> Result<Vec<String>> {
        discovery::discover(&self.config.test_dir(), &self.config.test_pattern)
    }

    /// Run every selected suite in order, one result per selected id.
    ///
    /// # Errors
    ///
    /// Returns an error only if discovery fails; per-suite failures are
    /// reported as failed results.
    pub async fn run_all(&self, filter: &TestFilter) -> Result<Vec<SuiteResult>> {
        let ids = filter.select(self.list()?);
        if ids.is_empty() {
            warn!(dir = %self.config.test_dir().display(), "no tests found");
            return Ok(Vec::new());
        }
        info!(count = ids.len(), "running suites");

        let mut results = Vec::with_capacity(ids.len());
        if self.config.server.is_none() {
            for id in &ids {
                results.push(self.launcher.run(id, self.timeout, None).await);
            }
            return Ok(results);
        }

        if !backend::check_prerequisites(&self.config) {
            warn!("suites that need the analysis server will fail");
        }
        match self.config.topology {
            Topology::Shared => {
                let session = BackendSession::start(&self.config, "shared").await;
                for id in &ids {
                    if !self.launcher.has_definition(id) {
                        results.push(self.launcher.run(id, self.timeout, None).await);
                        continue;
                    }
                    results.push(self.run_against(id, session.as_ref()).await);
                }
                if let Ok(session) = session {
                    session.shutdown().await;
                }
            }
            Topology::Isolated => {
                for id in &ids {
                    if !self.launcher.has_definition(id) {
                        results.push(self.launcher.run(id, self.timeout, None).await);
                        continue;
                    }
                    let session = BackendSession::start(&self.config, id).await;
                    results.push(self.run_against(id, session.as_ref()).await);
                    if let Ok(session) = session {
                        session.shutdown().await;
                    }
                }
            }
        }
        Ok(results)
    }

    async fn run_against(
        &self,
        id: &str,
        session: std::result::Result<&BackendSession, &HarnessError>,
    ) -> SuiteResult {
        match session {
            Ok(session) => self.launcher.run(id, self.timeout, Some(session)).await,
            Err(err) => SuiteResult::process_error(
                id,
                Duration::ZERO,
                format!("analysis server unavailable: {err}"),
            ),
        }
    }

    /// Totals over `results`.
    #[must_use]
    pub fn summarize(results: &[SuiteResult]) -> RunSummary {
        RunSummary::from_results(results)
    }
}
