//! SweepLoop - 定期的な突き合わせ（セーフティネット）
//!
//! `reconciliation_sweep_interval` ごとに:
//! 1. LoanStore を読み直し、スケジューラが知らない貸出を取り込む
//! 2. 生きたタスクが無い貸出に lifecycle タスクを起動する
//!
//! メモリ上の貸出は上書きせず、タスクも止めない（止めるのは `return_item` と `stop` だけ）。
//! `stop()` 後に回ってきた pass は何もしない。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::lifecycle_loop::FirstTick;
use super::scheduler::Shared;

pub(crate) struct SweepLoop {
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl SweepLoop {
    pub(crate) fn new(shared: Arc<Shared>, cancel: CancellationToken) -> Self {
        Self { shared, cancel }
    }

    pub(crate) async fn run(self) {
        let interval = self.shared.config.reconciliation_sweep_interval();
        debug!(interval_secs = interval.as_secs(), "reconciliation sweep started");

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
            self.sweep().await;
        }

        debug!("reconciliation sweep stopped");
    }

    /// One pass. Returns how many lifecycle tasks were (re)started.
    pub(crate) async fn sweep(&self) -> usize {
        let mut state = self.shared.state.lock().await;
        if self.cancel.is_cancelled() || !state.running {
            return 0;
        }

        match self.shared.store.load() {
            Ok(persisted) => {
                let added = Shared::merge_persisted(&mut state, persisted);
                if added > 0 {
                    info!(added, "sweep adopted loans from store");
                }
            }
            Err(e) => warn!("sweep cannot read store, using in-memory loans: {e}"),
        }

        let restarted = self.shared.reconcile(&mut state, FirstTick::Immediate);
        if restarted > 0 {
            info!(restarted, "sweep restarted lifecycle tasks");
        }
        restarted
    }
}

#[cfg(test)]
mod tests {
    use super::SweepLoop;
    use crate::app::{LoanConfig, LoanScheduler};
    use crate::domain::{ItemId, LoanMap, LoanRecord, UserId};
    use crate::impls::{InMemoryLoanStore, RecordingMessenger};
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    const SWEEP: Duration = Duration::from_secs(600);

    fn scheduler() -> (LoanScheduler, Arc<InMemoryLoanStore>, Arc<RecordingMessenger>) {
        let store = Arc::new(InMemoryLoanStore::new());
        let messenger = Arc::new(RecordingMessenger::new());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        ));
        let scheduler = LoanScheduler::builder(store.clone(), messenger.clone())
            .config(LoanConfig::default())
            .clock(clock)
            .build()
            .unwrap();
        (scheduler, store, messenger)
    }

    fn loan(user: &str, item: &str) -> LoanRecord {
        LoanRecord::new(
            UserId::new(user),
            ItemId::new(item),
            Utc.with_ymd_and_hms(2024, 2, 28, 9, 0, 0).unwrap(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_adopts_loans_written_behind_its_back() {
        let (scheduler, store, messenger) = scheduler();
        scheduler.start().await.unwrap();

        let mut loans = LoanMap::new();
        loans.insert(UserId::new("9"), loan("9", "late.pdf"));
        store.replace(loans);

        tokio::time::sleep(SWEEP - Duration::from_secs(1)).await;
        assert!(scheduler.get_loan(&UserId::new("9")).await.is_none());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(scheduler.get_loan(&UserId::new("9")).await.is_some());
        assert_eq!(scheduler.status().await.live_tasks, 1);
        assert_eq!(messenger.texts_for(&UserId::new("9")).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_keeps_in_memory_loans_when_store_is_unreadable() {
        let (scheduler, store, messenger) = scheduler();
        scheduler.start().await.unwrap();
        scheduler
            .borrow(UserId::new("1"), ItemId::new("a.pdf"))
            .await
            .unwrap();
        store.fail_loads(true);

        tokio::time::sleep(SWEEP * 3).await;

        assert!(scheduler.get_loan(&UserId::new("1")).await.is_some());
        assert_eq!(scheduler.status().await.live_tasks, 1);
        // Lifecycle already live: the sweep never adds a second reminder stream.
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_that_waited_out_a_stop_starts_nothing() {
        let (scheduler, store, messenger) = scheduler();
        let mut loans = LoanMap::new();
        loans.insert(UserId::new("1"), loan("1", "a.pdf"));
        loans.insert(UserId::new("2"), loan("2", "b.pdf"));
        store.replace(loans);
        scheduler.start().await.unwrap();

        // stop() queues on the lock first, then a pass whose timer already
        // fired with a token stop() never saw.
        let guard = scheduler.shared().state.lock().await;
        let stopping = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.stop().await }
        });
        tokio::task::yield_now().await;
        let late = SweepLoop::new(Arc::clone(scheduler.shared()), CancellationToken::new());
        let pass = tokio::spawn(async move { late.sweep().await });
        tokio::task::yield_now().await;
        drop(guard);

        stopping.await.unwrap();
        assert_eq!(pass.await.unwrap(), 0);
        assert_eq!(scheduler.status().await.live_tasks, 0);
        let before = messenger.sent().len();
        tokio::time::sleep(std::time::Duration::from_secs(3 * 86_400)).await;
        assert_eq!(messenger.sent().len(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_scheduler_does_not_sweep() {
        let (scheduler, store, messenger) = scheduler();
        scheduler.start().await.unwrap();
        scheduler.stop().await;

        let mut loans = LoanMap::new();
        loans.insert(UserId::new("9"), loan("9", "late.pdf"));
        store.replace(loans);
        tokio::time::sleep(SWEEP * 2).await;

        assert!(scheduler.get_loan(&UserId::new("9")).await.is_none());
        assert!(messenger.sent().is_empty());
    }
}
