//! Status - スケジューラの読み取り専用ビュー

use serde::{Deserialize, Serialize};

use crate::domain::{LoanAssessment, LoanRecord};

/// SchedulerStatus はエンジン全体のカウンタ（問い合わせ時点の時計で計算）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub active_loans: usize,
    pub live_tasks: usize,
    pub overdue_loans: usize,
    pub outstanding_fine: u64,
    /// The last store write failed and has not been retried successfully yet.
    pub unsaved_changes: bool,
}

/// LoanStatement は 1 件の貸出と現時点での状況
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanStatement {
    pub loan: LoanRecord,
    pub assessment: LoanAssessment,
}
