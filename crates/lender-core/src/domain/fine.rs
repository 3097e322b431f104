//! Fine - 罰金計算
//!
//! すべて `(borrowed_at, now)` の純粋関数。lifecycle タスクも
//! 「いくら払う？」の問い合わせも [`FinePolicy::assess`] を通る。

use chrono::{DateTime, TimeDelta, Utc};

/// FinePolicy は貸出期間と 1 日あたりの罰金
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinePolicy {
    max_borrow_period: TimeDelta,
    fine_per_day: u64,
}

/// LoanAssessment はある時点での貸出の状況
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanAssessment {
    /// When the loan stops being free.
    pub due_at: DateTime<Utc>,
    /// Whole days past `due_at` (floor).
    pub overdue_days: u64,
    /// `overdue_days * fine_per_day`.
    pub fine: u64,
    /// Whole days left until `due_at` (floor, 0 once due).
    pub days_left: u64,
}

impl LoanAssessment {
    /// Overdue means at least one whole day past due; the fine is zero before that.
    pub fn is_overdue(&self) -> bool {
        self.overdue_days > 0
    }
}

impl FinePolicy {
    pub fn new(max_borrow_period: TimeDelta, fine_per_day: u64) -> Self {
        Self {
            max_borrow_period,
            fine_per_day,
        }
    }

    pub fn max_borrow_period(&self) -> TimeDelta {
        self.max_borrow_period
    }

    pub fn fine_per_day(&self) -> u64 {
        self.fine_per_day
    }

    pub fn due_at(&self, borrowed_at: DateTime<Utc>) -> DateTime<Utc> {
        borrowed_at
            .checked_add_signed(self.max_borrow_period)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Assess a loan borrowed at `borrowed_at` as of `now`.
    pub fn assess(&self, borrowed_at: DateTime<Utc>, now: DateTime<Utc>) -> LoanAssessment {
        let due_at = self.due_at(borrowed_at);

        let overdue_days = whole_days(now.signed_duration_since(due_at));
        let days_left = whole_days(due_at.signed_duration_since(now));

        LoanAssessment {
            due_at,
            overdue_days,
            fine: overdue_days.saturating_mul(self.fine_per_day),
            days_left,
        }
    }
}

/// Floor of a duration in days, clamped at zero.
fn whole_days(delta: TimeDelta) -> u64 {
    if delta <= TimeDelta::zero() {
        return 0;
    }
    // num_days truncates toward zero, which is floor for positive values.
    u64::try_from(delta.num_days()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[rstest]
    #[case::half_a_day(TimeDelta::hours(12), 0)]
    #[case::exactly_due(TimeDelta::days(1), 0)]
    #[case::just_under_one_day_late(TimeDelta::hours(47), 0)]
    #[case::one_and_a_half_days_late(TimeDelta::hours(60), 5)]
    #[case::exactly_two_days_late(TimeDelta::days(3), 10)]
    #[case::ten_days_late(TimeDelta::days(11) + TimeDelta::minutes(1), 50)]
    fn fine_is_whole_overdue_days_times_rate(#[case] elapsed: TimeDelta, #[case] expected: u64) {
        let policy = FinePolicy::new(TimeDelta::days(1), 5);
        let assessment = policy.assess(t0(), t0() + elapsed);
        assert_eq!(assessment.fine, expected);
    }

    #[test]
    fn days_left_counts_down_until_due() {
        let policy = FinePolicy::new(TimeDelta::days(14), 10);

        let fresh = policy.assess(t0(), t0());
        assert_eq!(fresh.days_left, 14);
        assert!(!fresh.is_overdue());

        let later = policy.assess(t0(), t0() + TimeDelta::days(10) + TimeDelta::hours(1));
        assert_eq!(later.days_left, 3);

        let due = policy.assess(t0(), t0() + TimeDelta::days(14) + TimeDelta::hours(2));
        assert_eq!(due.days_left, 0);
        assert_eq!(due.overdue_days, 0);
        assert_eq!(due.fine, 0);
    }

    #[test]
    fn clock_before_borrow_time_is_not_overdue() {
        let policy = FinePolicy::new(TimeDelta::days(1), 5);
        let assessment = policy.assess(t0(), t0() - TimeDelta::days(3));
        assert_eq!(assessment.fine, 0);
        assert_eq!(assessment.overdue_days, 0);
    }

    #[test]
    fn huge_rate_saturates_instead_of_overflowing() {
        let policy = FinePolicy::new(TimeDelta::zero(), u64::MAX);
        let assessment = policy.assess(t0(), t0() + TimeDelta::days(2));
        assert_eq!(assessment.fine, u64::MAX);
    }
}
