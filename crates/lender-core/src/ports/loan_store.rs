//! LoanStore port - `user_id -> LoanRecord` の永続マッピング
//!
//! # 実装
//! - `JsonFileLoanStore`: 整形済み JSON ファイル（本番用）
//! - `InMemoryLoanStore`: テスト用（書き込み失敗を注入できる）

use crate::domain::{LoanMap, StorageError};

/// LoanStore は貸出マッピング全体を永続化
///
/// # 契約
/// - ファイルが無ければ `load()` は空マップ
/// - ファイルがあってもパースできなければ（空ファイル含む）`StorageError`
/// - `save()` はスナップショット全体をアトミックに置き換える。読み手が書きかけを見ることはない
/// - キャッシュしない。メモリ上のコピーはスケジューラが持つ
pub trait LoanStore: Send + Sync {
    fn load(&self) -> Result<LoanMap, StorageError>;

    fn save(&self, loans: &LoanMap) -> Result<(), StorageError>;
}
