//! Errors - エラー型と分類
//!
//! # 分類
//! - `LoanError::AlreadyBorrowed` / `LoanError::NoActiveLoan`: 想定内のユーザー向けエラー。
//!   呼び出し側に返すだけで、error レベルではログしない
//! - `StorageError`: 永続状態の読み書き失敗。起動時は致命的、
//!   通常運転中は回復して呼び出し側に一度だけ返す
//! - `DeliveryError`: Messenger 呼び出しの失敗。lifecycle タスク内でログするのみ
//! - `CatalogError`: アイテムファイル操作（フロントエンド用）

use std::path::PathBuf;

use thiserror::Error;

use super::ids::{ItemId, UserId};

/// StorageError は永続状態を読み書きできなかったときのエラー
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("cannot read loan state at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse loan state at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot serialize loan state: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("cannot write loan state at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

/// LoanError は貸出操作が返すエラー
#[derive(Debug, Error)]
pub enum LoanError {
    #[error("user {0} already has an active loan")]
    AlreadyBorrowed(UserId),

    #[error("user {0} has no active loan")]
    NoActiveLoan(UserId),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A message could not be delivered.
#[derive(Debug, Error)]
#[error("cannot deliver message to {user_id}: {reason}")]
pub struct DeliveryError {
    pub user_id: UserId,
    pub reason: String,
}

impl DeliveryError {
    pub fn new(user_id: UserId, reason: impl Into<String>) -> Self {
        Self {
            user_id,
            reason: reason.into(),
        }
    }
}

/// Catalog (item file) operation failed.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("item {0} is not in the catalog")]
    NotFound(ItemId),

    #[error("item {0} is not checked out")]
    NotLent(ItemId),

    #[error("invalid item name {0:?}")]
    InvalidItem(String),

    #[error("catalog I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
