//! LoanScheduler - 貸出の状態機械とタスクレジストリ
//!
//! # 所有
//! - `SchedulerState.loans`: LoanStore のメモリ上コピー（稼働中はこちらが正）
//! - `SchedulerState.tasks`: lifecycle タスクごとの `user_id -> TaskHandle`
//! - どちらも 1 つの `tokio::sync::Mutex` の内側。store への書き込みもこのロック下
//!
//! # Lockstep ルール
//! レコードがある ⇔ 生きた lifecycle タスクがある。`borrow` / `return_item` は
//! ロック下で両方を変え、store への書き込みが失敗したらレコードを戻す。
//! 例外はビルドから `start()` までの間と、`stop()` の後だけ。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::builder::LoanSchedulerBuilder;
use super::config::LoanConfig;
use super::lifecycle_loop::{FirstTick, LifecycleLoop};
use super::status::{LoanStatement, SchedulerStatus};
use super::sweep_loop::SweepLoop;
use crate::domain::{FinePolicy, ItemId, LoanError, LoanMap, LoanRecord, StorageError, UserId};
use crate::ports::{Clock, LoanStore, Messenger};

/// Cancellation handle + join handle of one background task.
pub(crate) struct TaskHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl TaskHandle {
    fn spawn<F>(cancel: CancellationToken, fut: F) -> Self
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        Self {
            cancel,
            join: tokio::spawn(fut),
        }
    }

    pub(crate) fn is_live(&self) -> bool {
        !self.join.is_finished()
    }

    fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the task to exit. Call `cancel()` first.
    async fn join(self) {
        if let Err(e) = self.join.await
            && e.is_panic()
        {
            error!("background task panicked: {e}");
        }
    }
}

/// ロックの内側にあるものすべて
#[derive(Default)]
pub(crate) struct SchedulerState {
    pub(crate) loans: LoanMap,
    pub(crate) tasks: HashMap<UserId, TaskHandle>,
    pub(crate) sweep: Option<TaskHandle>,
    pub(crate) running: bool,
    /// The last store write failed; the next write opportunity retries it.
    pub(crate) dirty: bool,
}

/// バックグラウンドタスクと共有する状態と依存
pub(crate) struct Shared {
    pub(crate) state: Mutex<SchedulerState>,
    pub(crate) store: Arc<dyn LoanStore>,
    pub(crate) messenger: Arc<dyn Messenger>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: LoanConfig,
    pub(crate) policy: FinePolicy,
}

impl Shared {
    /// Write the full mapping, tracking failure for the next retry.
    pub(crate) fn persist(&self, state: &mut SchedulerState) -> Result<(), StorageError> {
        match self.store.save(&state.loans) {
            Ok(()) => {
                state.dirty = false;
                Ok(())
            }
            Err(e) => {
                state.dirty = true;
                Err(e)
            }
        }
    }

    /// Start a lifecycle task for `user_id` unless a live one exists.
    ///
    /// Returns whether a task was spawned.
    pub(crate) fn ensure_lifecycle(
        self: &Arc<Self>,
        state: &mut SchedulerState,
        user_id: &UserId,
        first_tick: FirstTick,
    ) -> bool {
        if let Some(handle) = state.tasks.get(user_id)
            && handle.is_live()
        {
            return false;
        }

        let cancel = CancellationToken::new();
        let lifecycle = LifecycleLoop::new(
            Arc::clone(self),
            user_id.clone(),
            cancel.clone(),
            first_tick,
        );
        state
            .tasks
            .insert(user_id.clone(), TaskHandle::spawn(cancel, lifecycle.run()));
        true
    }

    /// Add persisted loans the in-memory map does not know about.
    ///
    /// Loans already in memory win: they may carry a newer fine than a
    /// snapshot whose last write failed.
    pub(crate) fn merge_persisted(state: &mut SchedulerState, persisted: LoanMap) -> usize {
        let mut added = 0;
        for (user_id, loan) in persisted {
            if let std::collections::btree_map::Entry::Vacant(slot) = state.loans.entry(user_id) {
                slot.insert(loan);
                added += 1;
            }
        }
        added
    }

    /// Ensure one live lifecycle task per loan. Returns how many were started.
    pub(crate) fn reconcile(self: &Arc<Self>, state: &mut SchedulerState, first_tick: FirstTick) -> usize {
        let users: Vec<UserId> = state.loans.keys().cloned().collect();
        users
            .iter()
            .filter(|user_id| self.ensure_lifecycle(state, user_id, first_tick))
            .count()
    }
}

/// The loan engine handle. Cheap to clone; all clones drive the same engine.
///
/// Background tasks keep running until [`stop`](Self::stop) is called, even
/// if every handle is dropped.
#[derive(Clone)]
pub struct LoanScheduler {
    shared: Arc<Shared>,
}

impl LoanScheduler {
    /// Shortcut for [`LoanSchedulerBuilder::new`].
    pub fn builder(store: Arc<dyn LoanStore>, messenger: Arc<dyn Messenger>) -> LoanSchedulerBuilder {
        LoanSchedulerBuilder::new(store, messenger)
    }

    pub(crate) fn from_parts(
        loans: LoanMap,
        store: Arc<dyn LoanStore>,
        messenger: Arc<dyn Messenger>,
        clock: Arc<dyn Clock>,
        config: LoanConfig,
    ) -> Self {
        let policy = config.fine_policy();
        let state = SchedulerState {
            loans,
            ..SchedulerState::default()
        };
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                store,
                messenger,
                clock,
                config,
                policy,
            }),
        }
    }

    #[cfg(test)]
    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    pub fn config(&self) -> &LoanConfig {
        &self.shared.config
    }

    pub fn fine_policy(&self) -> FinePolicy {
        self.shared.policy
    }

    /// Lend `item_id` to `user_id`.
    ///
    /// Persists the new loan, then starts its lifecycle task (first reminder
    /// after one `reminder_interval`). Sends nothing.
    pub async fn borrow(&self, user_id: UserId, item_id: ItemId) -> Result<LoanRecord, LoanError> {
        let mut state = self.shared.state.lock().await;

        if state.loans.contains_key(&user_id) {
            debug!(user_id = %user_id, "borrow refused: loan already active");
            return Err(LoanError::AlreadyBorrowed(user_id));
        }

        let loan = LoanRecord::new(user_id.clone(), item_id, self.shared.clock.now());
        state.loans.insert(user_id.clone(), loan.clone());

        if let Err(e) = self.shared.persist(&mut state) {
            state.loans.remove(&user_id);
            warn!(user_id = %user_id, "borrow rolled back, cannot persist: {e}");
            return Err(e.into());
        }

        self.shared
            .ensure_lifecycle(&mut state, &user_id, FirstTick::AfterInterval);
        info!(user_id = %user_id, item_id = %loan.item_id, "loan opened");
        Ok(loan)
    }

    /// Close `user_id`'s loan and return the closed record.
    ///
    /// When this returns the lifecycle task has exited: a reminder that was
    /// already being sent has finished, and no new one will start.
    pub async fn return_item(&self, user_id: &UserId) -> Result<LoanRecord, LoanError> {
        let (loan, handle) = {
            let mut state = self.shared.state.lock().await;

            let Some(loan) = state.loans.remove(user_id) else {
                debug!(user_id = %user_id, "return refused: no active loan");
                return Err(LoanError::NoActiveLoan(user_id.clone()));
            };

            if let Err(e) = self.shared.persist(&mut state) {
                state.loans.insert(user_id.clone(), loan);
                warn!(user_id = %user_id, "return rolled back, cannot persist: {e}");
                return Err(e.into());
            }

            let handle = state.tasks.remove(user_id);
            if let Some(handle) = &handle {
                handle.cancel();
            }
            (loan, handle)
        };

        // The task may need the lock to notice cancellation, so join outside it.
        if let Some(handle) = handle {
            handle.join().await;
        }

        info!(user_id = %user_id, item_id = %loan.item_id, fine = loan.fine, "loan closed");
        Ok(loan)
    }

    /// Current record for `user_id`, if any.
    pub async fn get_loan(&self, user_id: &UserId) -> Option<LoanRecord> {
        self.shared.state.lock().await.loans.get(user_id).cloned()
    }

    /// Record plus its standing as of now ("what do I owe").
    pub async fn statement(&self, user_id: &UserId) -> Option<LoanStatement> {
        let loan = self.get_loan(user_id).await?;
        let assessment = self
            .shared
            .policy
            .assess(loan.borrowed_at, self.shared.clock.now());
        Some(LoanStatement { loan, assessment })
    }

    /// All active loans ordered by user id.
    pub async fn loans(&self) -> Vec<LoanRecord> {
        self.shared
            .state
            .lock()
            .await
            .loans
            .values()
            .cloned()
            .collect()
    }

    pub async fn status(&self) -> SchedulerStatus {
        let state = self.shared.state.lock().await;
        let now = self.shared.clock.now();

        let mut status = SchedulerStatus {
            running: state.running,
            active_loans: state.loans.len(),
            live_tasks: state.tasks.values().filter(|h| h.is_live()).count(),
            unsaved_changes: state.dirty,
            ..SchedulerStatus::default()
        };
        for loan in state.loans.values() {
            let assessment = self.shared.policy.assess(loan.borrowed_at, now);
            if assessment.is_overdue() {
                status.overdue_loans += 1;
            }
            status.outstanding_fine = status.outstanding_fine.saturating_add(assessment.fine);
        }
        status
    }

    /// Reconcile with LoanStore and start one lifecycle task per loan, plus
    /// the background sweep. Safe to call repeatedly.
    ///
    /// Returns how many lifecycle tasks were started by this call.
    pub async fn start(&self) -> Result<usize, LoanError> {
        let mut state = self.shared.state.lock().await;

        // Read under the lock so a concurrent return cannot be resurrected.
        let persisted = self.shared.store.load()?;
        let added = Shared::merge_persisted(&mut state, persisted);
        if added > 0 {
            info!(added, "picked up loans from store");
        }

        let started = self.shared.reconcile(&mut state, FirstTick::Immediate);

        let sweep_live = state.sweep.as_ref().is_some_and(TaskHandle::is_live);
        if !sweep_live {
            let cancel = CancellationToken::new();
            let sweep = SweepLoop::new(Arc::clone(&self.shared), cancel.clone());
            state.sweep = Some(TaskHandle::spawn(cancel, sweep.run()));
        }

        state.running = true;
        info!(
            loans = state.loans.len(),
            started, "loan scheduler started"
        );
        Ok(started)
    }

    /// Cancel every lifecycle task and the sweep, and wait for them to exit.
    ///
    /// Loans stay in memory and in the store; the next `start()` resumes them.
    pub async fn stop(&self) {
        let handles: Vec<TaskHandle> = {
            let mut state = self.shared.state.lock().await;
            state.running = false;
            let mut handles: Vec<TaskHandle> = state.tasks.drain().map(|(_, h)| h).collect();
            handles.extend(state.sweep.take());
            // Cancel before releasing the lock so a sweep queued behind us sees it.
            for handle in &handles {
                handle.cancel();
            }
            handles
        };

        let stopped = handles.len();
        for handle in handles {
            handle.join().await;
        }
        info!(stopped, "loan scheduler stopped");
    }
}
