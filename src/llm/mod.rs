//! LLM 客户端：trait 与各后端实现

mod mock;
mod openai;
mod traits;

pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::{ChatMessage, Completion, LlmClient, LlmError, Role};
