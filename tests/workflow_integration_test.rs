//! 编排核心集成测试：完整生命周期、并发恢复护栏、部分失败容忍、跨引擎续跑

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use hive::observability::MetricsCollector;
use hive::report::ArtifactRenderer;
use hive::workflow::{
    MemoryThreadStore, Participant, RunStatus, Section, StepError, TaskWorker, ThreadStore,
    WorkflowEngine, WorkflowError,
};

/// 脚本化执行器：固定三人名册，指定姓名的访谈必定失败
struct ScriptedWorker {
    failing: HashSet<String>,
    interview_calls: AtomicUsize,
}

impl ScriptedWorker {
    fn new(failing: &[&str]) -> Self {
        Self {
            failing: failing.iter().map(|s| s.to_string()).collect(),
            interview_calls: AtomicUsize::new(0),
        }
    }

    fn roster() -> Vec<Participant> {
        ["Dr. Chen", "Dr. Torres", "Dr. Okafor"]
            .iter()
            .map(|name| Participant {
                name: name.to_string(),
                role: "Analyst".into(),
                affiliation: "Test Lab".into(),
                description: "Scripted persona.".into(),
            })
            .collect()
    }
}

#[async_trait]
impl TaskWorker for ScriptedWorker {
    async fn generate_participants(
        &self,
        _topic: &str,
        max_participants: usize,
    ) -> Result<Vec<Participant>, StepError> {
        let mut roster = Self::roster();
        roster.truncate(max_participants);
        Ok(roster)
    }

    async fn conduct_interview(
        &self,
        topic: &str,
        feedback: Option<&str>,
        participant: &Participant,
    ) -> Result<Section, StepError> {
        self.interview_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&participant.name) {
            return Err(StepError::InvalidResponse(format!(
                "scripted failure for {}",
                participant.name
            )));
        }
        Ok(Section {
            participant: participant.name.clone(),
            content: format!(
                "{} on {} (guidance: {})",
                participant.name,
                topic,
                feedback.unwrap_or("none")
            ),
            prompt_tokens: 10,
            completion_tokens: 20,
            generated_at: chrono::Utc::now().timestamp_millis(),
        })
    }
}

/// 不落盘的渲染器，返回内联产物引用
struct InlineRenderer;

impl ArtifactRenderer for InlineRenderer {
    fn assemble(&self, topic: &str, sections: &[Section]) -> Result<String, StepError> {
        Ok(format!("artifact://{}?sections={}", topic, sections.len()))
    }
}

/// 装配失败的渲染器
struct BrokenRenderer;

impl ArtifactRenderer for BrokenRenderer {
    fn assemble(&self, _topic: &str, _sections: &[Section]) -> Result<String, StepError> {
        Err(StepError::Render("disk full".into()))
    }
}

fn build_engine(
    store: Arc<dyn ThreadStore>,
    worker: Arc<dyn TaskWorker>,
    renderer: Arc<dyn ArtifactRenderer>,
) -> WorkflowEngine {
    WorkflowEngine::new(store, worker, renderer, Arc::new(MetricsCollector::new()))
}

#[tokio::test]
async fn test_full_lifecycle_to_completed() {
    let store: Arc<dyn ThreadStore> = Arc::new(MemoryThreadStore::new());
    let engine = build_engine(
        Arc::clone(&store),
        Arc::new(ScriptedWorker::new(&[])),
        Arc::new(InlineRenderer),
    );

    let started = engine.start("AI in Healthcare", 3).await.unwrap();
    assert_eq!(started.status, RunStatus::PausedForFeedback);
    assert_eq!(started.participants.len(), 3);
    assert!(started.sections.is_empty());

    // 暂停点已持久化
    let persisted = store.load(&started.thread_id).await.unwrap();
    assert_eq!(persisted.status, RunStatus::PausedForFeedback);

    let resumed = engine
        .resume(&started.thread_id, "Focus on privacy")
        .await
        .unwrap();
    assert_eq!(resumed.status, RunStatus::RunningPostFeedback);

    let done = engine.drive(&started.thread_id).await.unwrap();
    assert_eq!(done.status, RunStatus::Completed);
    assert_eq!(done.sections.len(), 3);
    assert!(done.sections.iter().all(|s| s.content.contains("Focus on privacy")));
    assert_eq!(
        done.final_artifact.as_deref(),
        Some("artifact://AI in Healthcare?sections=3")
    );
}

#[tokio::test]
async fn test_concurrent_resume_exactly_one_wins() {
    let store: Arc<dyn ThreadStore> = Arc::new(MemoryThreadStore::new());
    let engine = build_engine(
        Arc::clone(&store),
        Arc::new(ScriptedWorker::new(&[])),
        Arc::new(InlineRenderer),
    );

    let started = engine.start("AI in Healthcare", 3).await.unwrap();
    let (a, b) = tokio::join!(
        engine.resume(&started.thread_id, "first"),
        engine.resume(&started.thread_id, "second"),
    );

    let oks = [a.is_ok(), b.is_ok()].iter().filter(|&&ok| ok).count();
    assert_eq!(oks, 1);
    let err = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
    assert!(matches!(err, WorkflowError::InvalidState { .. }));
}

#[tokio::test]
async fn test_resume_after_completion_rejected() {
    let engine = build_engine(
        Arc::new(MemoryThreadStore::new()),
        Arc::new(ScriptedWorker::new(&[])),
        Arc::new(InlineRenderer),
    );

    let started = engine.start("AI in Healthcare", 2).await.unwrap();
    engine.resume(&started.thread_id, "go").await.unwrap();
    engine.drive(&started.thread_id).await.unwrap();

    let err = engine.resume(&started.thread_id, "again").await.unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::InvalidState { actual: RunStatus::Completed, .. }
    ));
}

#[tokio::test]
async fn test_partial_interview_failure_tolerated() {
    let worker = Arc::new(ScriptedWorker::new(&["Dr. Torres"]));
    let engine = build_engine(
        Arc::new(MemoryThreadStore::new()),
        Arc::clone(&worker) as Arc<dyn TaskWorker>,
        Arc::new(InlineRenderer),
    );

    let started = engine.start("AI in Healthcare", 3).await.unwrap();
    engine.resume(&started.thread_id, "go").await.unwrap();
    let done = engine.drive(&started.thread_id).await.unwrap();

    // 每位参与者恰好派发一次，失败者不重试也不短路他人
    assert_eq!(worker.interview_calls.load(Ordering::SeqCst), 3);
    assert_eq!(done.status, RunStatus::Completed);
    assert_eq!(done.sections.len(), 2);
    assert!(done.sections.iter().all(|s| s.participant != "Dr. Torres"));
}

#[tokio::test]
async fn test_all_interviews_failed_marks_run_failed() {
    let store: Arc<dyn ThreadStore> = Arc::new(MemoryThreadStore::new());
    let engine = build_engine(
        Arc::clone(&store),
        Arc::new(ScriptedWorker::new(&["Dr. Chen", "Dr. Torres", "Dr. Okafor"])),
        Arc::new(InlineRenderer),
    );

    let started = engine.start("AI in Healthcare", 3).await.unwrap();
    engine.resume(&started.thread_id, "go").await.unwrap();
    let err = engine.drive(&started.thread_id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Unrecoverable { .. }));

    // 失败状态持久化，名册保留供排查
    let failed = store.load(&started.thread_id).await.unwrap();
    assert_eq!(failed.status, RunStatus::Failed);
    assert_eq!(failed.participants.len(), 3);
    let run_error = failed.error.unwrap();
    assert_eq!(run_error.step, "conduct_interviews");
}

#[tokio::test]
async fn test_render_failure_marks_run_failed() {
    let store: Arc<dyn ThreadStore> = Arc::new(MemoryThreadStore::new());
    let engine = build_engine(
        Arc::clone(&store),
        Arc::new(ScriptedWorker::new(&[])),
        Arc::new(BrokenRenderer),
    );

    let started = engine.start("AI in Healthcare", 2).await.unwrap();
    engine.resume(&started.thread_id, "go").await.unwrap();
    let err = engine.drive(&started.thread_id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Unrecoverable { .. }));

    let failed = store.load(&started.thread_id).await.unwrap();
    assert_eq!(failed.status, RunStatus::Failed);
    assert_eq!(failed.error.unwrap().step, "assemble_report");
    // 访谈产出保留
    assert_eq!(failed.sections.len(), 2);
}

#[tokio::test]
async fn test_runs_are_isolated() {
    let engine = build_engine(
        Arc::new(MemoryThreadStore::new()),
        Arc::new(ScriptedWorker::new(&[])),
        Arc::new(InlineRenderer),
    );

    let a = engine.start("Topic A", 2).await.unwrap();
    let b = engine.start("Topic B", 3).await.unwrap();

    engine.resume(&a.thread_id, "go").await.unwrap();
    engine.drive(&a.thread_id).await.unwrap();

    let a_done = engine.status(&a.thread_id).await.unwrap();
    let b_still = engine.status(&b.thread_id).await.unwrap();
    assert_eq!(a_done.status, RunStatus::Completed);
    assert_eq!(b_still.status, RunStatus::PausedForFeedback);
    assert!(b_still.sections.is_empty());
}

/// 跨引擎实例续跑：第一个实例「崩溃」后，新实例仅凭存储中的状态完成运行
#[tokio::test]
async fn test_resume_survives_engine_restart() {
    let store: Arc<dyn ThreadStore> = Arc::new(MemoryThreadStore::new());

    let thread_id = {
        let engine = build_engine(
            Arc::clone(&store),
            Arc::new(ScriptedWorker::new(&[])),
            Arc::new(InlineRenderer),
        );
        engine.start("AI in Healthcare", 3).await.unwrap().thread_id
    };

    let engine2 = build_engine(
        Arc::clone(&store),
        Arc::new(ScriptedWorker::new(&[])),
        Arc::new(InlineRenderer),
    );
    engine2.resume(&thread_id, "Focus on privacy").await.unwrap();
    let done = engine2.drive(&thread_id).await.unwrap();

    assert_eq!(done.status, RunStatus::Completed);
    assert_eq!(done.topic, "AI in Healthcare");
    assert_eq!(done.sections.len(), 3);
}
