//! Hive - 多分析员报告生成编排服务
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **gateway**: HTTP 网关（启动报告 / 提交反馈 / 查询状态）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **observability**: tracing 初始化与运行指标
//! - **report**: 报告装配（Markdown 产物渲染）
//! - **workflow**: 编排核心（状态机、线程存储、并行访谈、结果合并）

pub mod config;
pub mod gateway;
pub mod llm;
pub mod observability;
pub mod report;
pub mod workflow;
