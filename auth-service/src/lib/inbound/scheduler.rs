use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::domain::token::ports::TokenRecordStore;
use crate::domain::token::service::RefreshTokenStore;
use crate::domain::user::ports::UserDirectory;

/// Shortest pause between cleanup passes.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Periodic deletion of refresh tokens past their retention window.
pub struct CleanupScheduler<TS, UD>
where
    TS: TokenRecordStore,
    UD: UserDirectory,
{
    tokens: Arc<RefreshTokenStore<TS, UD>>,
    interval: Duration,
    retention_days: i64,
}

impl<TS, UD> CleanupScheduler<TS, UD>
where
    TS: TokenRecordStore,
    UD: UserDirectory,
{
    /// `interval` is raised to [`MIN_INTERVAL`] when shorter.
    pub fn new(tokens: Arc<RefreshTokenStore<TS, UD>>, interval: Duration, retention_days: i64) -> Self {
        Self {
            tokens,
            interval: interval.max(MIN_INTERVAL),
            retention_days,
        }
    }

    /// Run one cleanup pass, logging failures.
    ///
    /// # Returns
    /// Number of tokens deleted (0 on failure)
    pub async fn run_once(&self) -> u64 {
        match self.tokens.cleanup_expired(self.retention_days).await {
            Ok(deleted) => deleted,
            Err(e) => {
                tracing::error!(error = %e, "Refresh token cleanup failed");
                0
            }
        }
    }

    /// Spawn the cleanup loop. The first pass runs immediately.
    ///
    /// The task exits once `shutdown` carries `true` or its sender is dropped.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!(
                interval_secs = self.interval.as_secs(),
                retention_days = self.retention_days,
                "Refresh token cleanup scheduled"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_once().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("Refresh token cleanup stopped");
        })
    }
}
