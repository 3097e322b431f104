//! RecordingMessenger - 送信を頼まれたものをすべて記録する Messenger
//!
//! テストダブルや dry run 用。`set_failing(true)` で全呼び出しが
//! `DeliveryError` になる（試行回数は数える）。

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::domain::{DeliveryError, UserId};
use crate::ports::Messenger;

/// One delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text { user_id: UserId, text: String },
    Document { user_id: UserId, path: PathBuf },
}

#[derive(Debug, Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<Outbound>>,
    attempts: AtomicUsize,
    failing: AtomicBool,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Everything delivered so far, in order.
    pub fn sent(&self) -> Vec<Outbound> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Texts delivered to `user_id`, in order.
    pub fn texts_for(&self, user_id: &UserId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|out| match out {
                Outbound::Text { user_id: to, text } if &to == user_id => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Calls made, including failed ones.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn record(&self, user_id: &UserId, out: Outbound) -> Result<(), DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeliveryError::new(user_id.clone(), "messenger offline"));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(out);
        Ok(())
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, user_id: &UserId, text: &str) -> Result<(), DeliveryError> {
        self.record(
            user_id,
            Outbound::Text {
                user_id: user_id.clone(),
                text: text.to_string(),
            },
        )
    }

    async fn send_document(&self, user_id: &UserId, path: &Path) -> Result<(), DeliveryError> {
        self.record(
            user_id,
            Outbound::Document {
                user_id: user_id.clone(),
                path: path.to_path_buf(),
            },
        )
    }
}
