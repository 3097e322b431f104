//! JsonFileLoanStore - 貸出状態を 1 つの整形済み JSON ファイルで保存
//!
//! # レイアウト
//! ```json
//! {
//!   "123456": {
//!     "item_id": "rust-book.pdf",
//!     "borrowed_at": "2024-05-01T12:00:00.123456Z",
//!     "fine": 0
//!   }
//! }
//! ```
//! 古いファイルは `item_id` の代わりに `book` を使い、タイムスタンプにオフセットが無い（UTC）。
//! どちらも読み込める。空ファイルは壊れた状態として扱う。

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{ItemId, LoanMap, LoanRecord, StorageError, UserId};
use crate::ports::LoanStore;

/// On-disk shape of one loan (the user id is the map key).
#[derive(Debug, Serialize, Deserialize)]
struct StoredLoan {
    #[serde(alias = "book")]
    item_id: ItemId,
    #[serde(with = "timestamp")]
    borrowed_at: DateTime<Utc>,
    #[serde(default)]
    fine: u64,
}

/// File-backed LoanStore.
///
/// `save()` writes a sibling temp file and renames it over the target, so a
/// crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct JsonFileLoanStore {
    path: PathBuf,
}

impl JsonFileLoanStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Sibling of the target with `.tmp` appended (`loans.json.tmp`).
    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl LoanStore for JsonFileLoanStore {
    fn load(&self) -> Result<LoanMap, StorageError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no loan state yet, starting empty");
                return Ok(LoanMap::new());
            }
            Err(source) => {
                return Err(StorageError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let stored: BTreeMap<UserId, StoredLoan> =
            serde_json::from_slice(&bytes).map_err(|source| StorageError::Parse {
                path: self.path.clone(),
                source,
            })?;

        Ok(stored
            .into_iter()
            .map(|(user_id, loan)| {
                let record = LoanRecord {
                    user_id: user_id.clone(),
                    item_id: loan.item_id,
                    borrowed_at: loan.borrowed_at,
                    fine: loan.fine,
                };
                (user_id, record)
            })
            .collect())
    }

    fn save(&self, loans: &LoanMap) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let stored: BTreeMap<&UserId, StoredLoan> = loans
            .iter()
            .map(|(user_id, loan)| {
                let stored = StoredLoan {
                    item_id: loan.item_id.clone(),
                    borrowed_at: loan.borrowed_at,
                    fine: loan.fine,
                };
                (user_id, stored)
            })
            .collect();

        let json = serde_json::to_string_pretty(&stored).map_err(StorageError::Serialize)?;

        let tmp_path = self.tmp_path();
        let write_tmp = || -> std::io::Result<()> {
            let mut file = std::fs::File::create(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()
        };
        write_tmp().map_err(|source| StorageError::Write {
            path: tmp_path.clone(),
            source,
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|source| StorageError::Write {
            path: self.path.clone(),
            source,
        })?;

        debug!(path = %self.path.display(), loans = loans.len(), "loan state saved");
        Ok(())
    }
}

/// RFC 3339 in, RFC 3339 out; naive ISO-8601 is read as UTC.
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        match DateTime::parse_from_rfc3339(raw) {
            Ok(at) => Ok(at.with_timezone(&Utc)),
            Err(err) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| naive.and_utc())
                .map_err(|_| err),
        }
    }
}
