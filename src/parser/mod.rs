//! Reduction of captured editor output into a [`SuiteResult`].
//!
//! Parsing is a chain of [`ResultStrategy`] implementations tried in order.
//! The default chain is:
//!
//! | Order | Strategy                     | Source                         |
//! |-------|------------------------------|--------------------------------|
//! | 1     | [`MarkerPayload`]            | JSON after the marker prefix   |
//! | 2     | [`TokenCount`]               | `[PASS]` / `[FAIL]` occurrences |
//!
//! The heuristic tier always answers, so [`OutputParser::parse`] is total.

use std::time::Duration;

use tracing::debug;

use crate::config::ParserConfig;
use crate::models::SuiteResult;
use crate::Result;

pub mod marker;
pub mod tokens;

pub use marker::MarkerPayload;
pub use tokens::TokenCount;

/// One tier of result extraction.
pub trait ResultStrategy: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    /// Produce a result from `raw`, or `None` if this tier does not apply.
    fn extract(&self, suite: &str, raw: &str, observed: Duration) -> Option<SuiteResult>;
}

/// Ordered chain of result strategies ending in the token heuristic.
pub struct OutputParser {
    strategies: Vec<Box<dyn ResultStrategy>>,
    fallback: TokenCount,
}

impl std::fmt::Debug for OutputParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.strategies.iter().map(|s| s.name()).collect();
        f.debug_struct("OutputParser")
            .field("strategies", &names)
            .finish_non_exhaustive()
    }
}

impl OutputParser {
    /// Marker payload first, token counting second.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Config` if a configured token cannot be compiled
    /// into a pattern.
    pub fn from_config(config: &ParserConfig) -> Result<Self> {
        let fallback = TokenCount::new(&config.pass_token, &config.fail_token)?;
        Ok(Self {
            strategies: vec![
                Box::new(MarkerPayload::new(&config.marker)?),
                Box::new(fallback.clone()),
            ],
            fallback,
        })
    }

    /// Parser using the default marker and tokens.
    ///
    /// # Errors
    ///
    /// See [`OutputParser::from_config`].
    pub fn with_defaults() -> Result<Self> {
        Self::from_config(&ParserConfig::default())
    }

    /// Replace the strategy chain. The token heuristic built from `config`
    /// still answers when no strategy in `strategies` matches.
    ///
    /// # Errors
    ///
    /// See [`OutputParser::from_config`].
    pub fn with_strategies(
        config: &ParserConfig,
        strategies: Vec<Box<dyn ResultStrategy>>,
    ) -> Result<Self> {
        Ok(Self {
            strategies,
            fallback: TokenCount::new(&config.pass_token, &config.fail_token)?,
        })
    }

    /// Reduce `raw` to a result for `suite`, observed to take `observed`.
    #[must_use]
    pub fn parse(&self, suite: &str, raw: &str, observed: Duration) -> SuiteResult {
        for strategy in &self.strategies {
            if let Some(result) = strategy.extract(suite, raw, observed) {
                debug!(suite, strategy = strategy.name(), "suite result extracted");
                return result;
            }
        }
        debug!(suite, "no strategy matched, estimating from tokens");
        self.fallback.estimate(suite, raw, observed)
    }
}
