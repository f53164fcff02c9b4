// SPDX-License-Identifier: AGPL-3.0-only

//! Subscriber setup and stage timing.

use std::time::{Duration, Instant};

use tracing::info;
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber. `RUST_LOG` selects the level,
/// `info` otherwise. A second call is a no-op.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Wall-clock timer of the pipeline stages.
#[derive(Clone, Debug)]
pub struct CpuTimer {
    start: Instant,
    last: Instant,
    stages: Vec<(String, Duration)>,
}

impl Default for CpuTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuTimer {
    /// Start timing now.
    #[must_use]
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last: now,
            stages: Vec::new(),
        }
    }

    /// Close a stage: log the time since the previous stage and since start.
    pub fn log_stage(&mut self, task: &str) -> Duration {
        let now = Instant::now();
        let stage = now - self.last;
        self.last = now;
        info!(
            task,
            stage_s = stage.as_secs_f64(),
            total_s = (now - self.start).as_secs_f64(),
            "stage finished"
        );
        self.stages.push((task.to_owned(), stage));
        stage
    }

    /// Time since start.
    #[must_use]
    pub fn total(&self) -> Duration {
        self.start.elapsed()
    }

    /// Recorded stages in order.
    #[must_use]
    pub fn stages(&self) -> &[(String, Duration)] {
        &self.stages
    }
}
