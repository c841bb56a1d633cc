//! 编排错误类型
//!
//! 分层：StepError（单步外部调用失败）→ 并行阶段内被容忍；WorkflowError（运行级）→ 网关映射为 HTTP 状态码。

use thiserror::Error;

use crate::llm::LlmError;
use crate::workflow::types::RunStatus;

/// 运行级错误
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Thread not found: {0}")]
    NotFound(String),

    /// 当前状态下操作非法（如对非暂停运行提交反馈、重复 resume）
    #[error("Invalid state: expected {expected}, actual {actual}")]
    InvalidState { expected: RunStatus, actual: RunStatus },

    /// 串行步骤失败或并行阶段全军覆没，运行转入 Failed
    #[error("Step '{step}' failed: {cause}")]
    Unrecoverable { step: String, cause: String },

    #[error("Store error: {0}")]
    Store(String),
}

/// 单步执行错误（LLM 调用、装配、超时）
#[derive(Error, Debug)]
pub enum StepError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// 结构化输出不符合约定 schema
    #[error("Invalid structured response: {0}")]
    InvalidResponse(String),

    #[error("Timed out after {0}s")]
    Timeout(u64),

    #[error("Render error: {0}")]
    Render(String),
}

/// 存储层错误
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Thread not found: {0}")]
    NotFound(String),

    /// CAS 失败：当前状态与期望不符
    #[error("Status conflict: expected {expected}, actual {actual}")]
    StatusConflict { expected: RunStatus, actual: RunStatus },

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl WorkflowError {
    /// 将存储错误提升为运行级错误，保留 NotFound / 状态冲突语义
    pub fn from_store(err: StoreError, expected: RunStatus) -> Self {
        match err {
            StoreError::NotFound(id) => WorkflowError::NotFound(id),
            StoreError::StatusConflict { actual, .. } => {
                WorkflowError::InvalidState { expected, actual }
            }
            other => WorkflowError::Store(other.to_string()),
        }
    }
}
