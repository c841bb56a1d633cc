//! HTTP 网关
//!
//! 对外的唯一交互面：创建运行、提交反馈、查询快照，外加健康检查与指标导出。
//! 网关只做参数校验与错误映射，编排语义全部在 WorkflowEngine。

pub mod routes;

pub use routes::{router, AppState};
