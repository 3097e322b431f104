//! LifecycleLoop - 貸出ごとのバックグラウンドタスク
//!
//! # フロー
//! 1. （borrow のときだけ）`reminder_interval` 待つ
//! 2. tick: ロック下で罰金を再計算し、変わっていれば永続化
//! 3. ロックの外でリマインドを送信
//! 4. `reminder_interval` 待って 2 へ
//!
//! キャンセルは tick の前、ロック下、送信直前で確認する。
//! `return_item` がトークンをキャンセルした後に始まるリマインドは無い。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::scheduler::Shared;
use crate::domain::{UserId, compose_reminder};

/// When the first tick happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FirstTick {
    /// Loans restored by `start()` or the sweep.
    Immediate,
    /// Fresh loans from `borrow()`.
    AfterInterval,
}

pub(crate) struct LifecycleLoop {
    shared: Arc<Shared>,
    user_id: UserId,
    cancel: CancellationToken,
    first_tick: FirstTick,
}

impl LifecycleLoop {
    pub(crate) fn new(
        shared: Arc<Shared>,
        user_id: UserId,
        cancel: CancellationToken,
        first_tick: FirstTick,
    ) -> Self {
        Self {
            shared,
            user_id,
            cancel,
            first_tick,
        }
    }

    pub(crate) async fn run(self) {
        debug!(user_id = %self.user_id, first_tick = ?self.first_tick, "loan lifecycle started");

        if self.first_tick == FirstTick::AfterInterval && !self.wait().await {
            debug!(user_id = %self.user_id, "loan lifecycle cancelled before first tick");
            return;
        }

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let Some(reminder) = self.tick().await else {
                break;
            };

            if self.cancel.is_cancelled() {
                break;
            }
            if let Err(e) = self.shared.messenger.send_text(&self.user_id, &reminder).await {
                warn!(user_id = %self.user_id, "reminder not delivered: {e}");
            }

            if !self.wait().await {
                break;
            }
        }

        debug!(user_id = %self.user_id, "loan lifecycle stopped");
    }

    /// Sleep one interval. `false` if cancelled first.
    async fn wait(&self) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.shared.config.reminder_interval()) => true,
        }
    }

    /// Bring the fine up to date and compose the reminder.
    ///
    /// `None` once the task is cancelled or the loan no longer exists.
    async fn tick(&self) -> Option<String> {
        let mut state = self.shared.state.lock().await;
        if self.cancel.is_cancelled() {
            return None;
        }

        let now = self.shared.clock.now();
        let loan = state.loans.get_mut(&self.user_id)?;
        let assessment = self.shared.policy.assess(loan.borrowed_at, now);

        let fine_changed = loan.fine != assessment.fine;
        if fine_changed {
            loan.fine = assessment.fine;
            info!(
                user_id = %self.user_id,
                overdue_days = assessment.overdue_days,
                fine = assessment.fine,
                "fine updated"
            );
        }
        let reminder = compose_reminder(loan, &assessment);

        // A failed write stays dirty and is retried here next tick.
        if (fine_changed || state.dirty)
            && let Err(e) = self.shared.persist(&mut state)
        {
            warn!(user_id = %self.user_id, "cannot persist loans: {e}");
        }

        debug!(
            user_id = %self.user_id,
            days_left = assessment.days_left,
            overdue_days = assessment.overdue_days,
            "loan ticked"
        );
        Some(reminder)
    }
}
