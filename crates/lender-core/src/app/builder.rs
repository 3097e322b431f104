//! LoanSchedulerBuilder - 構築とワイヤリング
//!
//! # Fail-fast
//! - 何より先に config を検証
//! - LoanStore を一度だけ読む。読めないファイルならビルド失敗（空マッピングで起動しない）

use std::sync::Arc;

use tracing::info;

use super::config::{ConfigError, LoanConfig};
use super::scheduler::LoanScheduler;
use crate::domain::StorageError;
use crate::ports::{Clock, LoanStore, Messenger, SystemClock};

/// Builds a [`LoanScheduler`].
///
/// ```ignore
/// let scheduler = LoanSchedulerBuilder::new(store, messenger)
///     .config(LoanConfig::from_file("lender.toml")?)
///     .build()?;
/// scheduler.start().await?;
/// ```
pub struct LoanSchedulerBuilder {
    store: Arc<dyn LoanStore>,
    messenger: Arc<dyn Messenger>,
    clock: Arc<dyn Clock>,
    config: LoanConfig,
}

/// BuildError はスケジューラ構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    #[error("cannot load persisted loans: {0}")]
    Storage(#[from] StorageError),
}

impl LoanSchedulerBuilder {
    /// Defaults: `LoanConfig::default()` and the system clock.
    pub fn new(store: Arc<dyn LoanStore>, messenger: Arc<dyn Messenger>) -> Self {
        Self {
            store,
            messenger,
            clock: Arc::new(SystemClock),
            config: LoanConfig::default(),
        }
    }

    pub fn config(mut self, config: LoanConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate, load persisted loans, and return a stopped scheduler.
    pub fn build(self) -> Result<LoanScheduler, BuildError> {
        self.config.validate()?;
        let loans = self.store.load()?;
        info!(loans = loans.len(), "loaded persisted loans");

        Ok(LoanScheduler::from_parts(
            loans,
            self.store,
            self.messenger,
            self.clock,
            self.config,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ItemId, LoanMap, LoanRecord, UserId};
    use crate::impls::{InMemoryLoanStore, RecordingMessenger};
    use chrono::Utc;

    fn parts() -> (Arc<InMemoryLoanStore>, Arc<RecordingMessenger>) {
        (
            Arc::new(InMemoryLoanStore::new()),
            Arc::new(RecordingMessenger::new()),
        )
    }

    #[tokio::test]
    async fn build_loads_persisted_loans_without_starting() {
        let user = UserId::new("1");
        let mut loans = LoanMap::new();
        loans.insert(
            user.clone(),
            LoanRecord::new(user.clone(), ItemId::new("a.pdf"), Utc::now()),
        );
        let store = Arc::new(InMemoryLoanStore::with_loans(loans));

        let scheduler = LoanSchedulerBuilder::new(store, Arc::new(RecordingMessenger::new()))
            .build()
            .unwrap();

        assert!(scheduler.get_loan(&user).await.is_some());
        let status = scheduler.status().await;
        assert!(!status.running);
        assert_eq!(status.live_tasks, 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let (store, messenger) = parts();
        let config = LoanConfig {
            reminder_interval_secs: 0,
            ..LoanConfig::default()
        };

        let result = LoanSchedulerBuilder::new(store, messenger)
            .config(config)
            .build();

        assert!(matches!(result, Err(BuildError::InvalidConfig(_))));
    }

    #[test]
    fn unreadable_store_is_fatal() {
        let (store, messenger) = parts();
        store.fail_loads(true);

        let result = LoanSchedulerBuilder::new(store, messenger).build();

        assert!(matches!(result, Err(BuildError::Storage(_))));
    }
}
