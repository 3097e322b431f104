//! Impls - ports の実装
//!
//! # 含まれるもの
//! - **JsonFileLoanStore**: 本番用 LoanStore（JSON ファイル 1 つ）
//! - **InMemoryLoanStore**: テスト用 LoanStore
//! - **RecordingMessenger**: Messenger のテストダブル
//! - **DirectoryCatalog**: アイテムファイルのディレクトリを Catalog として扱う
//!
//! 実際のチャットフロントエンドは自分のクレートで `Messenger` を実装する。

pub mod dir_catalog;
pub mod inmem_store;
pub mod json_store;
pub mod recording_messenger;

pub use self::dir_catalog::DirectoryCatalog;
pub use self::inmem_store::InMemoryLoanStore;
pub use self::json_store::JsonFileLoanStore;
pub use self::recording_messenger::{Outbound, RecordingMessenger};
