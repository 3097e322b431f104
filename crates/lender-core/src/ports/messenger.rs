//! Messenger port - 借り手へのメッセージ送信

use std::path::Path;

use async_trait::async_trait;

use crate::domain::{DeliveryError, UserId};

/// Messenger はユーザーにテキストとファイルを届ける
///
/// スケジューラが呼ぶのは `send_text` だけ。`send_document` はアイテムファイルを
/// 渡すフロントエンド用。
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, user_id: &UserId, text: &str) -> Result<(), DeliveryError>;

    async fn send_document(&self, user_id: &UserId, path: &Path) -> Result<(), DeliveryError>;
}
