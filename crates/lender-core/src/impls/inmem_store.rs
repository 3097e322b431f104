//! InMemoryLoanStore - テスト・デモ用の LoanStore
//!
//! 最後に保存したスナップショットをメモリに持ち、書き込み回数を数える。
//! load / save の失敗を注入してスケジューラのエラー経路を試せる。

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::domain::{LoanMap, StorageError};
use crate::ports::LoanStore;

#[derive(Debug, Default)]
pub struct InMemoryLoanStore {
    loans: Mutex<LoanMap>,
    saves: AtomicUsize,
    fail_loads: AtomicBool,
    fail_saves: AtomicBool,
}

impl InMemoryLoanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an existing snapshot (as if a previous process saved it).
    pub fn with_loans(loans: LoanMap) -> Self {
        Self {
            loans: Mutex::new(loans),
            ..Self::default()
        }
    }

    /// Last successfully saved snapshot.
    pub fn snapshot(&self) -> LoanMap {
        self.loans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Overwrite the snapshot without counting a save (simulates an operator edit).
    pub fn replace(&self, loans: LoanMap) {
        *self.loans.lock().unwrap_or_else(PoisonError::into_inner) = loans;
    }

    /// Number of successful `save()` calls.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

impl LoanStore for InMemoryLoanStore {
    fn load(&self) -> Result<LoanMap, StorageError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(StorageError::Other("injected load failure".to_string()));
        }
        Ok(self.snapshot())
    }

    fn save(&self, loans: &LoanMap) -> Result<(), StorageError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::Other("injected save failure".to_string()));
        }
        *self.loans.lock().unwrap_or_else(PoisonError::into_inner) = loans.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ItemId, LoanRecord, UserId};
    use chrono::Utc;

    #[test]
    fn save_then_load_round_trips() {
        let store = InMemoryLoanStore::new();
        let mut loans = LoanMap::new();
        loans.insert(
            UserId::new("1"),
            LoanRecord::new(UserId::new("1"), ItemId::new("a.pdf"), Utc::now()),
        );

        store.save(&loans).unwrap();
        assert_eq!(store.load().unwrap(), loans);
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn injected_failures_leave_snapshot_untouched() {
        let store = InMemoryLoanStore::new();
        store.fail_saves(true);
        store.fail_loads(true);

        let mut loans = LoanMap::new();
        loans.insert(
            UserId::new("1"),
            LoanRecord::new(UserId::new("1"), ItemId::new("a.pdf"), Utc::now()),
        );

        assert!(store.save(&loans).is_err());
        assert!(store.load().is_err());
        assert!(store.snapshot().is_empty());
        assert_eq!(store.save_count(), 0);
    }
}
