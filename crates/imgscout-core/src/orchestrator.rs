//! Run driver: catalog in, resumable result store out.
//!
//! ```text
//! Init --[nothing pending]--------------------------------------> Done
//!   |
//!   +--> WarmUp --> Running --[queue exhausted]--> Draining --> Done
//! ```
//!
//! `Init` aborts the run on a bad catalog or a corrupt prior store. Once
//! `Running` starts, per-target failures are recorded as `null` results and
//! never stop the run.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::catalog::{self, DEFAULT_URL_FIELD};
use crate::error::AppError;
use crate::fetch::{ImageFetcher, origin_of};
use crate::models::{RunSummary, Target};
use crate::store::ResultStore;
use crate::traits::{ImageExtractor, Transport};

/// Settings for one orchestrated run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub catalog_path: PathBuf,
    pub output_path: PathBuf,
    /// Catalog record field holding the target address.
    pub url_field: String,
    /// Flush the store every N completed targets.
    pub batch_save_every: usize,
    /// Report progress every N completed targets (and on the last one).
    pub progress_every: usize,
    /// Skip the session warm-up entirely when false.
    pub warm_up: bool,
    /// Warm-up URL. Defaults to the origin of the first pending target.
    pub warmup_url: Option<String>,
    /// Pause after a successful warm-up.
    pub warmup_pause: Duration,
    /// Fixed seed for the queue shuffle; random when unset.
    pub shuffle_seed: Option<u64>,
}

impl RunConfig {
    pub fn new(catalog_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            catalog_path: catalog_path.into(),
            output_path: output_path.into(),
            url_field: DEFAULT_URL_FIELD.to_string(),
            batch_save_every: 20,
            progress_every: 5,
            warm_up: true,
            warmup_url: None,
            warmup_pause: Duration::from_secs(3),
            shuffle_seed: None,
        }
    }

    pub fn with_url_field(mut self, field: impl Into<String>) -> Self {
        self.url_field = field.into();
        self
    }

    pub fn with_batch_save_every(mut self, every: usize) -> Self {
        self.batch_save_every = every;
        self
    }

    pub fn with_progress_every(mut self, every: usize) -> Self {
        self.progress_every = every;
        self
    }

    pub fn with_warmup_url(mut self, url: impl Into<String>) -> Self {
        self.warmup_url = Some(url.into());
        self
    }

    pub fn with_warmup_pause(mut self, pause: Duration) -> Self {
        self.warmup_pause = pause;
        self
    }

    pub fn without_warm_up(mut self) -> Self {
        self.warm_up = false;
        self
    }

    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.batch_save_every == 0 {
            return Err(AppError::ConfigError(
                "batch_save_every must be at least 1".into(),
            ));
        }
        if self.progress_every == 0 {
            return Err(AppError::ConfigError(
                "progress_every must be at least 1".into(),
            ));
        }
        if self.url_field.is_empty() {
            return Err(AppError::ConfigError("url_field must not be empty".into()));
        }
        Ok(())
    }
}

/// Phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    WarmUp,
    Running,
    Draining,
    Done,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Init => "init",
            RunState::WarmUp => "warmup",
            RunState::Running => "running",
            RunState::Draining => "draining",
            RunState::Done => "done",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-run counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub completed: usize,
    pub found: usize,
    pub consecutive_fails: u32,
}

impl RunCounters {
    /// Count one finished target. A hit clears the failure streak.
    pub fn record(&mut self, found: bool) {
        self.completed += 1;
        if found {
            self.found += 1;
            self.consecutive_fails = 0;
        } else {
            self.consecutive_fails += 1;
        }
    }

    pub fn reset_streak(&mut self) {
        self.consecutive_fails = 0;
    }
}

/// Events emitted during a run for monitoring/logging.
#[derive(Debug, Clone)]
pub enum RunEvent<'a> {
    StateChanged {
        state: RunState,
    },
    Loaded {
        total: usize,
        resolved: usize,
        pending: usize,
    },
    SessionEstablished {
        url: &'a str,
    },
    SessionFailed {
        url: &'a str,
        error: &'a str,
    },
    TargetFinished {
        target: &'a str,
        found: bool,
    },
    Cooldown {
        consecutive: u32,
        wait: Duration,
    },
    Progress {
        completed: usize,
        pending: usize,
        found: usize,
        previously_resolved: usize,
    },
    Flushed {
        path: &'a Path,
        entries: usize,
        completed: usize,
    },
    Finished {
        summary: &'a RunSummary,
    },
}

/// Trait for receiving run events (decoupled logging).
pub trait RunReporter: Send + Sync {
    fn report(&self, event: RunEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRunReporter;

impl RunReporter for TracingRunReporter {
    fn report(&self, event: RunEvent<'_>) {
        match event {
            RunEvent::StateChanged { state } => {
                tracing::debug!(%state, "Run state changed");
            }
            RunEvent::Loaded {
                total,
                resolved,
                pending,
            } => {
                tracing::info!(%total, %resolved, %pending, "Catalog loaded");
            }
            RunEvent::SessionEstablished { url } => {
                tracing::info!(%url, "Session established");
            }
            RunEvent::SessionFailed { url, error } => {
                tracing::warn!(%url, %error, "Could not establish session, proceeding anyway");
            }
            RunEvent::TargetFinished { target, found } => {
                tracing::debug!(url = %target, %found, "Target finished");
            }
            RunEvent::Cooldown { consecutive, wait } => {
                tracing::warn!(
                    %consecutive,
                    wait_secs = wait.as_secs(),
                    "Consecutive failures, pausing"
                );
            }
            RunEvent::Progress {
                completed,
                pending,
                found,
                previously_resolved,
            } => {
                let pct = if pending == 0 {
                    100.0
                } else {
                    completed as f64 * 100.0 / pending as f64
                };
                tracing::info!(
                    "[{pct:5.1}%] {completed}/{pending} | found {found} this run, {previously_resolved} earlier"
                );
            }
            RunEvent::Flushed {
                path,
                entries,
                completed,
            } => {
                tracing::debug!(path = %path.display(), %entries, %completed, "Results saved");
            }
            RunEvent::Finished { summary } => {
                tracing::info!(
                    found = summary.found,
                    total = summary.total,
                    newly_found = summary.newly_found,
                    cooldowns = summary.cooldowns,
                    "Run complete"
                );
            }
        }
    }
}

/// Targets not yet resolved, in shuffled order.
///
/// The base order is sorted first so that a seeded shuffle is reproducible.
pub fn plan_pending(
    targets: &HashSet<Target>,
    store: &ResultStore,
    seed: Option<u64>,
) -> Vec<Target> {
    let mut pending: Vec<Target> = targets
        .iter()
        .filter(|t| !store.is_resolved(t))
        .cloned()
        .collect();
    pending.sort();
    match seed {
        Some(seed) => pending.shuffle(&mut StdRng::seed_from_u64(seed)),
        None => pending.shuffle(&mut rand::rng()),
    }
    pending
}

/// Drives a whole run over a catalog.
pub struct Orchestrator<T, X>
where
    T: Transport,
    X: ImageExtractor,
{
    fetcher: ImageFetcher<T, X>,
    config: RunConfig,
}

impl<T, X> Orchestrator<T, X>
where
    T: Transport,
    X: ImageExtractor,
{
    pub fn new(fetcher: ImageFetcher<T, X>, config: RunConfig) -> Self {
        Self { fetcher, config }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run to completion.
    ///
    /// Returns an error only for invalid configuration, a bad catalog, a
    /// corrupt prior store or a failed store write.
    pub async fn run<R: RunReporter>(&self, reporter: &R) -> Result<RunSummary, AppError> {
        self.config.validate()?;
        self.fetcher.throttle().config().validate()?;

        // Init
        reporter.report(RunEvent::StateChanged {
            state: RunState::Init,
        });
        let targets = catalog::load_targets(&self.config.catalog_path, &self.config.url_field)?;
        let mut store = ResultStore::resume(&self.config.output_path)?;
        let pending = plan_pending(&targets, &store, self.config.shuffle_seed);
        let previously_resolved = store.stats(&targets).resolved;

        reporter.report(RunEvent::Loaded {
            total: targets.len(),
            resolved: previously_resolved,
            pending: pending.len(),
        });

        if pending.is_empty() {
            let summary = RunSummary {
                total: targets.len(),
                found: previously_resolved,
                ..RunSummary::default()
            };
            return Ok(self.finish(reporter, summary));
        }

        // WarmUp
        reporter.report(RunEvent::StateChanged {
            state: RunState::WarmUp,
        });
        self.warm_up(&pending[0], reporter).await;

        // Running
        reporter.report(RunEvent::StateChanged {
            state: RunState::Running,
        });
        let throttle = self.fetcher.throttle();
        let mut counters = RunCounters::default();
        let mut cooldowns = 0;

        for target in &pending {
            tokio::time::sleep(throttle.base_delay()).await;

            let result = self.fetcher.fetch(target).await;
            let found = result.is_some();
            store.put(target.as_str(), result);
            counters.record(found);
            reporter.report(RunEvent::TargetFinished { target, found });

            if let Some(wait) = throttle.on_consecutive_failures(counters.consecutive_fails) {
                reporter.report(RunEvent::Cooldown {
                    consecutive: counters.consecutive_fails,
                    wait,
                });
                tokio::time::sleep(wait).await;
                counters.reset_streak();
                cooldowns += 1;
            }

            if counters.completed % self.config.progress_every == 0
                || counters.completed == pending.len()
            {
                reporter.report(RunEvent::Progress {
                    completed: counters.completed,
                    pending: pending.len(),
                    found: counters.found,
                    previously_resolved,
                });
            }

            if counters.completed % self.config.batch_save_every == 0 {
                self.flush(&store, counters.completed, reporter)?;
            }
        }

        // Draining
        reporter.report(RunEvent::StateChanged {
            state: RunState::Draining,
        });
        self.flush(&store, counters.completed, reporter)?;

        let summary = RunSummary {
            total: targets.len(),
            found: store.stats(&targets).resolved,
            newly_found: counters.found,
            attempted: counters.completed,
            cooldowns,
        };
        Ok(self.finish(reporter, summary))
    }

    async fn warm_up<R: RunReporter>(&self, first_target: &str, reporter: &R) {
        if !self.config.warm_up {
            return;
        }
        let Some(url) = self
            .config
            .warmup_url
            .clone()
            .or_else(|| origin_of(first_target))
        else {
            tracing::debug!(url = %first_target, "No warm-up URL could be derived");
            return;
        };

        match self.fetcher.warm_up(&url).await {
            Ok(()) => {
                reporter.report(RunEvent::SessionEstablished { url: &url });
                tokio::time::sleep(self.config.warmup_pause).await;
            }
            Err(e) => {
                let error = e.to_string();
                reporter.report(RunEvent::SessionFailed {
                    url: &url,
                    error: &error,
                });
            }
        }
    }

    fn flush<R: RunReporter>(
        &self,
        store: &ResultStore,
        completed: usize,
        reporter: &R,
    ) -> Result<(), AppError> {
        store.flush(&self.config.output_path)?;
        reporter.report(RunEvent::Flushed {
            path: &self.config.output_path,
            entries: store.len(),
            completed,
        });
        Ok(())
    }

    fn finish<R: RunReporter>(&self, reporter: &R, summary: RunSummary) -> RunSummary {
        reporter.report(RunEvent::StateChanged {
            state: RunState::Done,
        });
        reporter.report(RunEvent::Finished { summary: &summary });
        summary
    }
}
