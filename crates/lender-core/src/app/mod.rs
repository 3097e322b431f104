//! App - アプリケーション層（貸出エンジン）
//!
//! # 主要コンポーネント
//! - **LoanSchedulerBuilder**: ワイヤリングと起動時検証
//! - **LoanScheduler**: borrow / return / 問い合わせ / start / stop
//! - **LifecycleLoop**: 貸出ごとのリマインド・罰金タスク
//! - **SweepLoop**: LoanStore との定期的な突き合わせ
//! - **LoanConfig**: TOML 設定

pub mod builder;
pub mod config;
mod lifecycle_loop;
pub mod scheduler;
pub mod status;
mod sweep_loop;

pub use self::builder::{BuildError, LoanSchedulerBuilder};
pub use self::config::{ConfigError, LoanConfig};
pub use self::scheduler::LoanScheduler;
pub use self::status::{LoanStatement, SchedulerStatus};
