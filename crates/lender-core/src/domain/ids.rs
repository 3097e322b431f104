//! Domain identifiers (strongly-typed string IDs).
//!
//! ユーザーとアイテムはどちらもフロントエンドから渡される不透明な文字列
//! （chat id、ファイル名）で識別する。
//!
//! ## Phantom Type パターン
//! `Id<T>` で共通実装を持ち、`T` はコンパイル時だけのマーカー型。
//! UserId と ItemId は混同できないが、ディスク上はただの文字列のまま。

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Marker trait for each ID kind.
pub trait IdMarker: Send + Sync + 'static {
    /// Name used in `Debug` output (e.g. `UserId("42")`).
    const KIND: &'static str;
}

/// Generic string ID.
///
/// `T` only exists at compile time; `Id<T>` is the same size as a `String`.
pub struct Id<T: IdMarker> {
    value: String,
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

// Manual impls: derives would put bounds on the uninhabited marker types.

impl<T: IdMarker> Clone for Id<T> {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl<T: IdMarker> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: IdMarker> Eq for Id<T> {}

impl<T: IdMarker> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: IdMarker> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl<T: IdMarker> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T: IdMarker> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", T::KIND, self.value)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl<T: IdMarker> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

impl<'de, T: IdMarker> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

// ========================================
// Marker types
// ========================================

/// Borrower marker.
pub enum User {}

impl IdMarker for User {
    const KIND: &'static str = "UserId";
}

/// Lendable item marker.
pub enum Item {}

impl IdMarker for Item {
    const KIND: &'static str = "ItemId";
}

/// Identifier of a borrower (the front-end's chat/user id).
pub type UserId = Id<User>;

/// Identifier of a catalog item (unique within the catalog).
pub type ItemId = Id<Item>;
