//! 编排核心数据类型
//!
//! RunState 是持久化单元：每次状态迁移后整体写回 ThreadStore，读方永远看不到半写状态。

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// 线程 ID：一次运行的唯一标识
pub type ThreadId = String;

/// 运行状态机
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// 已创建，尚未执行任何步骤
    Created,
    /// 名册生成中
    Running,
    /// 暂停等待人工反馈（无任何任务在运行，仅持久化状态存在）
    PausedForFeedback,
    /// 已收到反馈，访谈 / 装配阶段
    RunningPostFeedback,
    /// 已完成（终态）
    Completed,
    /// 执行失败（终态）
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Created => "created",
            RunStatus::Running => "running",
            RunStatus::PausedForFeedback => "paused_for_feedback",
            RunStatus::RunningPostFeedback => "running_post_feedback",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// 分析员画像：四个字段全部必填，缺任一字段即为无效领域对象
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Participant {
    pub name: String,
    pub role: String,
    pub affiliation: String,
    pub description: String,
}

impl Participant {
    /// 序列化格式允许空串，领域层不允许
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty()
            && !self.role.trim().is_empty()
            && !self.affiliation.trim().is_empty()
            && !self.description.trim().is_empty()
    }
}

/// 访谈产出的一节内容，带来源与 token 用量
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// 产出该节的分析员姓名
    pub participant: String,
    pub content: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    /// 生成时间（毫秒时间戳）
    pub generated_at: i64,
}

/// 失败信息：失败的步骤名与原因，随 RunState 持久化供事后排查
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
    pub step: String,
    pub cause: String,
}

/// 一次运行的全部持久化状态
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub thread_id: ThreadId,
    pub topic: String,
    pub max_participants: usize,
    pub status: RunStatus,
    /// 名册生成步骤一次性写入，之后只读
    pub participants: Vec<Participant>,
    /// 恢复时一次性写入
    pub feedback: Option<String>,
    /// 仅由合并步骤整体替换，只增不减
    pub sections: Vec<Section>,
    /// 仅 Completed 时存在：产物引用（文件路径）
    pub final_artifact: Option<String>,
    /// 仅 Failed 时存在
    pub error: Option<RunError>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl RunState {
    pub fn new(topic: impl Into<String>, max_participants: usize) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            thread_id: format!("thread_{}", uuid::Uuid::new_v4()),
            topic: topic.into(),
            max_participants,
            status: RunStatus::Created,
            participants: Vec::new(),
            feedback: None,
            sections: Vec::new(),
            final_artifact: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().timestamp_millis();
    }
}
