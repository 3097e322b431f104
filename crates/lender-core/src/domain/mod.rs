//! Domain - ドメインモデル（ids, 貸出記録, 罰金計算, リマインド文面, エラー）
//!
//! ここでは I/O をせず、時計も読まない。`now` は呼び出し側が渡す。

pub mod errors;
pub mod fine;
pub mod ids;
pub mod loan;
pub mod reminder;

pub use errors::{CatalogError, DeliveryError, LoanError, StorageError};
pub use fine::{FinePolicy, LoanAssessment};
pub use ids::{ItemId, UserId};
pub use loan::{LoanMap, LoanRecord};
pub use reminder::compose_reminder;
