//! lender-core
//!
//! 貸出トラッカーの中核（貸出ライフサイクルとリマインド/罰金スケジューリング）。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, loan, fine, reminder, errors）
//! - **ports**: 抽象化レイヤー（LoanStore, Messenger, Catalog, Clock）
//! - **app**: アプリケーションロジック（LoanScheduler, lifecycle/sweep ループ, config, builder）
//! - **impls**: 実装（JSON ファイル store, InMemory store, DirectoryCatalog, RecordingMessenger）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{
    BuildError, ConfigError, LoanConfig, LoanScheduler, LoanSchedulerBuilder, LoanStatement,
    SchedulerStatus,
};
pub use domain::{
    CatalogError, DeliveryError, FinePolicy, ItemId, LoanAssessment, LoanError, LoanMap,
    LoanRecord, StorageError, UserId,
};
