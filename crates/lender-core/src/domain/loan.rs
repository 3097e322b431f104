//! Loan record - 誰が・いつから・何を借りていて、いくら罰金があるか

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::ids::{ItemId, UserId};

/// One active loan.
///
/// - `borrowed_at` is set on creation and never changes.
/// - `fine` is only written by the loan's lifecycle task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanRecord {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub borrowed_at: DateTime<Utc>,
    pub fine: u64,
}

impl LoanRecord {
    /// A fresh loan starting at `borrowed_at` with nothing owed.
    pub fn new(user_id: UserId, item_id: ItemId, borrowed_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            item_id,
            borrowed_at,
            fine: 0,
        }
    }
}

/// All active loans keyed by borrower.
///
/// A `BTreeMap` keeps iteration (and therefore the persisted file) in a stable order.
pub type LoanMap = BTreeMap<UserId, LoanRecord>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn new_loan_owes_nothing() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let loan = LoanRecord::new(UserId::new("1"), ItemId::new("a.pdf"), at);

        assert_eq!(loan.fine, 0);
        assert_eq!(loan.borrowed_at, at);
    }

    #[test]
    fn loan_map_allows_one_record_per_user() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let mut loans = LoanMap::new();
        loans.insert(
            UserId::new("1"),
            LoanRecord::new(UserId::new("1"), ItemId::new("a.pdf"), at),
        );
        let previous = loans.insert(
            UserId::new("1"),
            LoanRecord::new(UserId::new("1"), ItemId::new("b.pdf"), at),
        );

        assert!(previous.is_some());
        assert_eq!(loans.len(), 1);
    }
}
