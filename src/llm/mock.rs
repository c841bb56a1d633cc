//! Mock LLM 客户端（用于测试与离线运行，无需 API）
//!
//! 根据 system prompt 判断当前步骤：名册生成返回固定三人名册，访谈返回围绕话题的一段正文。

use async_trait::async_trait;

use crate::llm::{ChatMessage, Completion, LlmClient, LlmError, Role};

/// Mock 客户端：按步骤返回确定性 JSON
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<Completion, LlmError> {
        let system = messages
            .iter()
            .find(|m| matches!(m.role, Role::System))
            .map(|m| m.content.as_str())
            .unwrap_or("");
        let user = messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::User))
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        let content = if system.contains("editorial planner") {
            r#"{"participants": [
                {"name": "Dr. Chen", "role": "AI Ethics Researcher", "affiliation": "Stanford", "description": "Studies governance of clinical AI systems."},
                {"name": "Dr. Torres", "role": "Healthcare CTO", "affiliation": "Mercy Health", "description": "Leads hospital-scale AI deployments."},
                {"name": "Dr. Okafor", "role": "Policy Analyst", "affiliation": "Brookings", "description": "Covers regulation and patient privacy."}
            ]}"#
                .to_string()
        } else {
            format!(
                r#"{{"content": "Mock interview findings for: {}"}}"#,
                user.replace('"', "'").chars().take(120).collect::<String>()
            )
        };

        Ok(Completion { content, prompt_tokens: 32, completion_tokens: 64 })
    }
}
