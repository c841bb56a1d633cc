//! 编排核心
//!
//! 一次「运行」= 一个话题的报告生成，按 thread_id 标识：
//! 名册生成（同步）→ 暂停等待人工反馈（持久化挂起）→ 并行访谈（fan-out/join）→ 合并 → 装配 → 终态。

pub mod accumulator;
pub mod engine;
pub mod error;
pub mod store;
pub mod types;
pub mod worker;

pub use engine::WorkflowEngine;
pub use error::{StepError, StoreError, WorkflowError};
pub use store::{create_thread_store, MemoryThreadStore, ThreadStore};
pub use types::{Participant, RunError, RunState, RunStatus, Section, ThreadId};
pub use worker::{LlmTaskWorker, TaskWorker, TimedWorker};
