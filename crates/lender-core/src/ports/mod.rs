//! Ports - 抽象化レイヤー
//!
//! 各 trait はエンジンの外側（ディスク、チャットのフロントエンド、アイテムファイル、時刻）
//! との境界。テストでは InMemory 実装だけでスケジューラを動かせる。

pub mod catalog;
pub mod clock;
pub mod loan_store;
pub mod messenger;

pub use self::catalog::Catalog;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::loan_store::LoanStore;
pub use self::messenger::Messenger;
