//! 任务执行器：单个命名步骤的执行
//!
//! TaskWorker 无状态、默认不重试。LlmTaskWorker 将步骤映射为一次结构化 LLM 调用：
//! prompt 中内嵌 schemars 生成的 JSON Schema，响应在边界处解析为带类型的结果，
//! 不符合 schema 即按步骤失败处理。TimedWorker 为每次调用包一层超时。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::llm::{ChatMessage, LlmClient};
use crate::workflow::error::StepError;
use crate::workflow::types::{Participant, Section};

/// 工作流任务执行器 trait
#[async_trait]
pub trait TaskWorker: Send + Sync {
    /// 名册生成步骤：为话题生成至多 max_participants 位分析员
    async fn generate_participants(
        &self,
        topic: &str,
        max_participants: usize,
    ) -> Result<Vec<Participant>, StepError>;

    /// 单场访谈步骤：由一位分析员围绕话题（与可选反馈）产出一节内容
    async fn conduct_interview(
        &self,
        topic: &str,
        feedback: Option<&str>,
        participant: &Participant,
    ) -> Result<Section, StepError>;
}

/// LLM 结构化输出：名册
#[derive(Debug, Deserialize, JsonSchema)]
struct AnalystRoster {
    participants: Vec<Participant>,
}

/// LLM 结构化输出：访谈正文
#[derive(Debug, Deserialize, JsonSchema)]
struct InterviewNotes {
    content: String,
}

/// 基于 LLM 的任务执行器
pub struct LlmTaskWorker {
    llm: Arc<dyn LlmClient>,
}

impl LlmTaskWorker {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// 结构化调用：schema 注入 system prompt，响应剥掉 code fence 后按 T 解析
    async fn invoke_structured<T: DeserializeOwned + JsonSchema>(
        &self,
        system: &str,
        user: &str,
    ) -> Result<(T, u64, u64), StepError> {
        let schema = serde_json::to_string_pretty(&schemars::schema_for!(T))
            .map_err(|e| StepError::InvalidResponse(e.to_string()))?;
        let system = format!(
            "{}\n\nReply with ONLY a JSON object matching this schema. No prose, no markdown.\n```json\n{}\n```",
            system, schema
        );

        let completion = self
            .llm
            .complete(&[ChatMessage::system(system), ChatMessage::user(user)])
            .await?;

        let parsed = serde_json::from_str(extract_json(&completion.content))
            .map_err(|e| StepError::InvalidResponse(format!("{}: {}", e, completion.content)))?;
        Ok((parsed, completion.prompt_tokens, completion.completion_tokens))
    }
}

/// 从 LLM 输出中截取 JSON 正文（容忍 ```json fence 与前后说明文字）
fn extract_json(raw: &str) -> &str {
    let start = raw.find('{');
    let end = raw.rfind('}');
    match (start, end) {
        (Some(s), Some(e)) if e >= s => &raw[s..=e],
        _ => raw,
    }
}

#[async_trait]
impl TaskWorker for LlmTaskWorker {
    async fn generate_participants(
        &self,
        topic: &str,
        max_participants: usize,
    ) -> Result<Vec<Participant>, StepError> {
        let system = "You are an editorial planner assembling a panel of analyst personas \
                      for a research report. Each analyst must have a distinct perspective.";
        let user = format!(
            "Topic: {}\nCreate up to {} analysts. Fill every field: name, role, affiliation, description.",
            topic, max_participants
        );

        let (roster, _, _) = self
            .invoke_structured::<AnalystRoster>(system, &user)
            .await?;

        if roster.participants.is_empty() {
            return Err(StepError::InvalidResponse("empty analyst roster".into()));
        }
        if let Some(bad) = roster.participants.iter().find(|p| !p.is_complete()) {
            return Err(StepError::InvalidResponse(format!(
                "incomplete participant in roster: {:?}",
                bad.name
            )));
        }

        let mut participants = roster.participants;
        participants.truncate(max_participants);
        Ok(participants)
    }

    async fn conduct_interview(
        &self,
        topic: &str,
        feedback: Option<&str>,
        participant: &Participant,
    ) -> Result<Section, StepError> {
        let system = format!(
            "You are {}, {} at {}. {} Write one self-contained report section from your perspective.",
            participant.name, participant.role, participant.affiliation, participant.description
        );
        let user = match feedback {
            Some(fb) => format!("Topic: {}\nEditor guidance: {}", topic, fb),
            None => format!("Topic: {}", topic),
        };

        let (notes, prompt_tokens, completion_tokens) = self
            .invoke_structured::<InterviewNotes>(&system, &user)
            .await?;

        if notes.content.trim().is_empty() {
            return Err(StepError::InvalidResponse("empty interview content".into()));
        }

        Ok(Section {
            participant: participant.name.clone(),
            content: notes.content,
            prompt_tokens,
            completion_tokens,
            generated_at: chrono::Utc::now().timestamp_millis(),
        })
    }
}

/// 超时装饰器：为每次步骤调用套 tokio 超时，超时按步骤失败处理（不在核心层重试）
pub struct TimedWorker {
    inner: Arc<dyn TaskWorker>,
    timeout_secs: u64,
}

impl TimedWorker {
    pub fn new(inner: Arc<dyn TaskWorker>, timeout_secs: u64) -> Self {
        Self { inner, timeout_secs }
    }
}

#[async_trait]
impl TaskWorker for TimedWorker {
    async fn generate_participants(
        &self,
        topic: &str,
        max_participants: usize,
    ) -> Result<Vec<Participant>, StepError> {
        tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            self.inner.generate_participants(topic, max_participants),
        )
        .await
        .map_err(|_| StepError::Timeout(self.timeout_secs))?
    }

    async fn conduct_interview(
        &self,
        topic: &str,
        feedback: Option<&str>,
        participant: &Participant,
    ) -> Result<Section, StepError> {
        tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            self.inner.conduct_interview(topic, feedback, participant),
        )
        .await
        .map_err(|_| StepError::Timeout(self.timeout_secs))?
    }
}
