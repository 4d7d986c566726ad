//! Operator-facing host services: notifications and long-running progress.

use std::future::Future;
use std::time::{Duration, Instant};

/// How often a long-running task reports that it is still in progress.
const PROGRESS_TICK: Duration = Duration::from_secs(5);

/// Direct operator notifications, reported in addition to the returned envelope.
pub trait Notifier: Send + Sync {
    fn show_error(&self, message: &str);
    fn show_warning(&self, message: &str);
}

/// Notifier that writes operator messages to the log under target `operator`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn show_error(&self, message: &str) {
        tracing::error!(target: "operator", "{}", message);
    }

    fn show_warning(&self, message: &str) {
        tracing::warn!(target: "operator", "{}", message);
    }
}

/// Run `task` while reporting progress under `label`.
///
/// Logs the start, a tick every few seconds while the task is pending, and
/// the completion time. The task's output is returned unchanged.
pub async fn long_running<F, T>(label: &str, task: F) -> T
where
    F: Future<Output = T>,
{
    let start = Instant::now();
    tracing::info!(target: "operator", "{}", label);

    tokio::pin!(task);
    let first_tick = tokio::time::Instant::now() + PROGRESS_TICK;
    let mut ticks = tokio::time::interval_at(first_tick, PROGRESS_TICK);

    let output = loop {
        tokio::select! {
            output = &mut task => break output,
            _ = ticks.tick() => {
                tracing::info!(
                    target: "operator",
                    elapsed_secs = %start.elapsed().as_secs(),
                    "{} (still running)",
                    label
                );
            }
        }
    };

    tracing::debug!(
        duration_ms = %start.elapsed().as_millis(),
        "{} finished",
        label
    );
    output
}
