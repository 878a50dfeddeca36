//! Feedback generation for check-ins.
//!
//! One chat-completion call per check-in, with bounded retries. Generation
//! failure must never block the check-in itself: after the last attempt the
//! client falls back to a deterministic reply that still reports the
//! sequence number.

use std::time::Duration;

use cadence_core::types::{CheckinRecord, TARGET_CHECKINS};
use serde::Deserialize;

use crate::config::LlmConfig;
use crate::retry::with_retry;

/// Distinguishes the in-flight check-in reply from the end-of-round
/// commendation generated for a participant's final check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackKind {
    Progress,
    Final,
}

/// Everything the prompt needs. `history` is all prior check-ins in
/// chronological order; the newest record is carried separately.
pub struct FeedbackContext<'a> {
    pub nickname: &'a str,
    pub goals: &'a str,
    pub history: &'a [CheckinRecord],
    pub content: &'a str,
    pub seq: u32,
    pub kind: FeedbackKind,
}

pub struct FeedbackClient {
    config: LlmConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

const SYSTEM_PROMPT: &str = "你是一个超级活泼可爱的AI助手，善于分析用户的学习进展并给出鼓励。\
你的回复要既体现对用户目标和历史的关注，又保持轻松愉快的语气。";

impl FeedbackClient {
    pub fn new(config: LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    /// Generate the reply for a recorded check-in. Infallible by contract:
    /// after `attempts` failed calls this returns the templated fallback.
    pub async fn generate(&self, ctx: &FeedbackContext<'_>) -> String {
        let prompt = build_prompt(ctx);
        let delay = Duration::from_millis(self.config.retry_delay_ms);

        let result = with_retry(self.config.attempts.max(1), delay, || {
            self.complete(&prompt)
        })
        .await;

        match result {
            Ok(text) => format!(
                "✨ 打卡成功！\n📝 第 {}/{} 次打卡\n\n{}",
                ctx.seq, TARGET_CHECKINS, text
            ),
            Err(e) => {
                tracing::warn!(nickname = ctx.nickname, error = %e, "feedback generation exhausted retries");
                fallback_reply(ctx.seq)
            }
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String, anyhow::Error> {
        let url = format!("{}/v1/chat/completions", self.config.endpoint);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&serde_json::json!({
                "model": self.config.model,
                "messages": [
                    { "role": "system", "content": SYSTEM_PROMPT },
                    { "role": "user", "content": prompt },
                ],
                "temperature": 0.8,
                "max_tokens": 100,
            }))
            .send()
            .await?
            .error_for_status()?;

        let body: CompletionResponse = resp.json().await?;
        let text = body
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();
        if text.is_empty() {
            anyhow::bail!("completion response had no content");
        }
        Ok(text)
    }
}

/// Deterministic reply when generation is unavailable.
pub fn fallback_reply(seq: u32) -> String {
    format!(
        "✅ 打卡成功！\n📊 第 {seq}/{TARGET_CHECKINS} 次打卡\n\n💪 继续加油，期待您的下次分享！"
    )
}

fn build_prompt(ctx: &FeedbackContext<'_>) -> String {
    let mut history = String::new();
    for (i, record) in ctx.history.iter().enumerate() {
        history.push_str(&format!("第{}次打卡内容：{}\n", i + 1, record.content));
    }

    let header = format!(
        "用户 {} 的学习情况：\n\n【报名目标】\n{}\n\n【历史打卡记录】\n{}\n【本次打卡】（第{}次）\n{}\n\n",
        ctx.nickname, ctx.goals, history, ctx.seq, ctx.content
    );

    let instructions = match ctx.kind {
        FeedbackKind::Progress => {
            "请根据以上信息生成一段活泼的回复（50字左右），要求：\n\
             1. 将本次打卡内容与用户目标关联，体现进展\n\
             2. 参考历史打卡，体现连续性和进步\n\
             3. 用充满活力的语气表达惊喜和赞赏\n\
             4. 加入emoji表情，增添趣味性\n\
             5. 给出温暖有趣的鼓励"
        }
        FeedbackKind::Final => {
            "请生成一个简短的总结（20-30字），要求：\n\
             1. 首先说明用户具体的目标内容\n\
             2. 然后说明该目标的完成程度（已完成/部分完成/刚起步）\n\
             3. 结合打卡内容，具体说明在目标上取得了什么进展\n\
             4. 加入1个emoji表情点缀\n\
             5. 语气要积极但实事求是"
        }
    };

    format!("{header}{instructions}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
