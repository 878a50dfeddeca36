//! Outbound replies through the chat platform.
//!
//! Routing is a transport concern: one-to-one chats get a new message sent
//! to the chat, group chats get a reply threaded onto the triggering
//! message. Send failures are logged and swallowed; a lost reply must not
//! fail the command that produced it.

use serde::Deserialize;
use std::time::Duration;

use crate::config::ChatConfig;
use crate::token::tenant_access_token;

pub struct Messenger {
    config: ChatConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    code: i64,
    #[serde(default)]
    msg: String,
}

impl Messenger {
    pub fn new(config: ChatConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    /// Deliver `text` back to the chat the triggering message came from.
    pub async fn reply(&self, chat_id: &str, chat_type: &str, message_id: &str, text: &str) {
        let result = if chat_type == "p2p" {
            self.send_to_chat(chat_id, text).await
        } else {
            self.reply_to_message(message_id, text).await
        };
        if let Err(e) = result {
            tracing::error!(chat_id, error = %e, "failed to send reply");
        }
    }

    async fn send_to_chat(&self, chat_id: &str, text: &str) -> anyhow::Result<()> {
        let token = self.token().await?;
        let url = format!(
            "{}/open-apis/im/v1/messages?receive_id_type=chat_id",
            self.config.api_base
        );
        let resp: SendResponse = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&serde_json::json!({
                "receive_id": chat_id,
                "msg_type": "text",
                "content": text_payload(text),
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        check_code(resp)
    }

    async fn reply_to_message(&self, message_id: &str, text: &str) -> anyhow::Result<()> {
        let token = self.token().await?;
        let url = format!(
            "{}/open-apis/im/v1/messages/{message_id}/reply",
            self.config.api_base
        );
        let resp: SendResponse = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&serde_json::json!({
                "msg_type": "text",
                "content": text_payload(text),
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        check_code(resp)
    }

    async fn token(&self) -> anyhow::Result<String> {
        tenant_access_token(
            &self.client,
            &self.config.api_base,
            &self.config.app_id,
            &self.config.app_secret,
        )
        .await
    }
}

/// Message content is itself a JSON document inside the send payload.
fn text_payload(text: &str) -> String {
    serde_json::json!({ "text": text }).to_string()
}

fn check_code(resp: SendResponse) -> anyhow::Result<()> {
    if resp.code != 0 {
        anyhow::bail!("chat API refused message: {} (code {})", resp.msg, resp.code);
    }
    Ok(())
}
