use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("periodic job '{0}' was already stopped")]
    AlreadyStopped(String),
    #[error("periodic job '{0}' panicked")]
    Panicked(String),
}

/// Work executed on every tick of a [`PeriodicWorker`].
#[async_trait::async_trait]
pub trait PeriodicJob: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn run_once(&self);
}

/// Background loop running a job at a fixed interval until stopped.
///
/// The stop signal is observed between iterations; an iteration in progress always
/// runs to completion.
pub struct PeriodicWorker {
    name: String,
    shutdown_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PeriodicWorker {
    /// Spawns the loop. The first run happens one `interval` after start.
    pub fn start(job: Arc<dyn PeriodicJob>, interval: Duration) -> Self {
        let name = job.name().to_string();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(job, interval, shutdown_rx));
        info!("Periodic job '{}' started (every {:?})", name, interval);

        Self {
            name,
            shutdown_tx,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn is_running(&self) -> bool {
        self.handle
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Signals the loop and waits for it to exit. Only the first call stops the
    /// worker; later calls return [`JobError::AlreadyStopped`].
    pub async fn stop(&self) -> Result<(), JobError> {
        let handle = self
            .handle
            .lock()
            .await
            .take()
            .ok_or_else(|| JobError::AlreadyStopped(self.name.clone()))?;

        // Never blocks, even if the loop has already exited.
        let _ = self.shutdown_tx.send(true);

        match handle.await {
            Ok(()) => {
                info!("Periodic job '{}' stopped", self.name);
                Ok(())
            }
            Err(err) => {
                error!("Periodic job '{}' ended abnormally: {}", self.name, err);
                Err(JobError::Panicked(self.name.clone()))
            }
        }
    }
}

impl Drop for PeriodicWorker {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

async fn run_loop(
    job: Arc<dyn PeriodicJob>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                debug!("Running periodic job '{}'", job.name());
                job.run_once().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingJob {
        runs: AtomicUsize,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl PeriodicJob for CountingJob {
        fn name(&self) -> &str {
            "counting"
        }

        async fn run_once(&self) {
            tokio::time::sleep(self.delay).await;
            self.runs.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn job(delay: Duration) -> Arc<CountingJob> {
        Arc::new(CountingJob {
            runs: AtomicUsize::new(0),
            delay,
        })
    }

    #[tokio::test]
    async fn runs_repeatedly_until_stopped() {
        let job = job(Duration::ZERO);
        let worker = PeriodicWorker::start(job.clone(), Duration::from_millis(10));
        assert!(worker.is_running().await);

        tokio::time::sleep(Duration::from_millis(80)).await;
        worker.stop().await.unwrap();
        let runs = job.runs.load(Ordering::SeqCst);
        assert!(runs >= 2, "ran {runs} times");

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), runs);
        assert!(!worker.is_running().await);
    }

    #[tokio::test]
    async fn does_not_run_before_first_interval() {
        let job = job(Duration::ZERO);
        let worker = PeriodicWorker::start(job.clone(), Duration::from_secs(60));
        tokio::time::sleep(Duration::from_millis(20)).await;
        worker.stop().await.unwrap();
        assert_eq!(job.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn second_stop_is_rejected() {
        let worker = PeriodicWorker::start(job(Duration::ZERO), Duration::from_millis(10));
        worker.stop().await.unwrap();
        assert_eq!(
            worker.stop().await,
            Err(JobError::AlreadyStopped("counting".to_string()))
        );
    }

    #[tokio::test]
    async fn stop_waits_for_iteration_in_progress() {
        let job = job(Duration::from_millis(50));
        let worker = PeriodicWorker::start(job.clone(), Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(20)).await;

        worker.stop().await.unwrap();
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
    }
}
