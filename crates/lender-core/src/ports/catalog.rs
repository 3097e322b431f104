//! Catalog port - 貸出可能なアイテム
//!
//! フロントエンドが `borrow` / `return_item` の前後で使う。
//! スケジューラ自身は `ItemId` しか見ない。

use std::path::PathBuf;

use crate::domain::{CatalogError, ItemId};

/// Catalog はアイテムを列挙し、貸出・返却で出し入れする
pub trait Catalog: Send + Sync {
    /// Items currently available, sorted.
    fn list_items(&self) -> Result<Vec<ItemId>, CatalogError>;

    fn contains(&self, item: &ItemId) -> Result<bool, CatalogError>;

    /// Take an item out of the catalog. Returns where the file now lives so it
    /// can be delivered to the borrower.
    fn remove(&self, item: &ItemId) -> Result<PathBuf, CatalogError>;

    /// Put a returned item back.
    fn restore(&self, item: &ItemId) -> Result<(), CatalogError>;
}
