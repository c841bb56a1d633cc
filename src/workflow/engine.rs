//! 工作流引擎：状态机推进与持久化协调
//!
//! 迁移不变量：每次状态迁移先写 ThreadStore 再继续（write-before-proceed），
//! 进程在任意点崩溃后可从最近持久化状态恢复。暂停不保留任何存活任务，
//! 恢复是全新调用；并发恢复由存储层 CAS 拒绝，不用锁。
//!
//! 运行路径拆成三段，均以 thread_id 为入口：
//! - start：创建 + 名册生成 → PausedForFeedback
//! - resume：反馈写入 + CAS → RunningPostFeedback（不做后续工作）
//! - drive：并行访谈 → 合并 → 装配 → Completed（纯由持久化状态重建续程）

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::observability::MetricsCollector;
use crate::report::ArtifactRenderer;
use crate::workflow::accumulator;
use crate::workflow::error::WorkflowError;
use crate::workflow::store::ThreadStore;
use crate::workflow::types::{RunError, RunState, RunStatus, Section};
use crate::workflow::worker::TaskWorker;

pub struct WorkflowEngine {
    store: Arc<dyn ThreadStore>,
    worker: Arc<dyn TaskWorker>,
    renderer: Arc<dyn ArtifactRenderer>,
    metrics: Arc<MetricsCollector>,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<dyn ThreadStore>,
        worker: Arc<dyn TaskWorker>,
        renderer: Arc<dyn ArtifactRenderer>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self { store, worker, renderer, metrics }
    }

    /// 创建运行并执行名册生成，至 PausedForFeedback 返回
    pub async fn start(
        &self,
        topic: &str,
        max_participants: usize,
    ) -> Result<RunState, WorkflowError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(WorkflowError::InvalidInput("topic must not be empty".into()));
        }
        if max_participants == 0 {
            return Err(WorkflowError::InvalidInput(
                "max_participants must be positive".into(),
            ));
        }

        let mut state = RunState::new(topic, max_participants);
        self.store
            .save(&state)
            .await
            .map_err(|e| WorkflowError::Store(e.to_string()))?;
        self.metrics.run_started();
        info!("Run started: thread_id={} topic={}", state.thread_id, topic);

        state.status = RunStatus::Running;
        state.touch();
        self.store
            .save(&state)
            .await
            .map_err(|e| WorkflowError::Store(e.to_string()))?;

        let begin = Instant::now();
        let result = self.worker.generate_participants(topic, max_participants).await;
        let latency = begin.elapsed().as_millis() as u64;
        self.metrics
            .record_step("generate_participants", latency, result.is_ok(), 0, 0)
            .await;

        let participants = match result {
            Ok(p) => p,
            Err(e) => {
                return Err(self
                    .fail_run(state, "generate_participants", &e.to_string())
                    .await);
            }
        };

        info!(
            "Roster ready: thread_id={} participants={}",
            state.thread_id,
            participants.len()
        );
        state.participants = participants;
        state.status = RunStatus::PausedForFeedback;
        state.touch();
        self.store
            .save(&state)
            .await
            .map_err(|e| WorkflowError::Store(e.to_string()))?;

        Ok(state)
    }

    /// 记录反馈并推进到 RunningPostFeedback，不执行后续工作
    ///
    /// 并发恢复保护完全靠存储层 CAS：两次同时 resume 恰有一次成功，
    /// 另一次拿到 InvalidState。
    pub async fn resume(
        &self,
        thread_id: &str,
        feedback: &str,
    ) -> Result<RunState, WorkflowError> {
        let feedback = feedback.trim();
        if feedback.is_empty() {
            return Err(WorkflowError::InvalidInput("feedback must not be empty".into()));
        }

        let mut state = self
            .store
            .load(thread_id)
            .await
            .map_err(|e| WorkflowError::from_store(e, RunStatus::PausedForFeedback))?;
        if state.status != RunStatus::PausedForFeedback {
            return Err(WorkflowError::InvalidState {
                expected: RunStatus::PausedForFeedback,
                actual: state.status,
            });
        }

        state.feedback = Some(feedback.to_string());
        state.status = RunStatus::RunningPostFeedback;
        state.touch();
        self.store
            .compare_and_swap(RunStatus::PausedForFeedback, &state)
            .await
            .map_err(|e| WorkflowError::from_store(e, RunStatus::PausedForFeedback))?;

        info!("Run resumed: thread_id={}", thread_id);
        Ok(state)
    }

    /// 从持久化状态续跑访谈 / 装配阶段，至终态返回
    ///
    /// 续程不依赖任何内存中的悬挂任务，仅由 RunState 重建。
    pub async fn drive(&self, thread_id: &str) -> Result<RunState, WorkflowError> {
        let mut state = self
            .store
            .load(thread_id)
            .await
            .map_err(|e| WorkflowError::from_store(e, RunStatus::RunningPostFeedback))?;
        if state.status != RunStatus::RunningPostFeedback {
            return Err(WorkflowError::InvalidState {
                expected: RunStatus::RunningPostFeedback,
                actual: state.status,
            });
        }

        let sections = self.run_interviews(&state).await;
        let failures = state.participants.len() - sections.len();
        if failures > 0 {
            warn!(
                "Interviews partially failed: thread_id={} ok={} failed={}",
                thread_id,
                sections.len(),
                failures
            );
        }
        if sections.is_empty() && !state.participants.is_empty() {
            return Err(self
                .fail_run(state, "conduct_interviews", "all interviews failed")
                .await);
        }

        state.sections = accumulator::merge(&state.sections, &sections);
        state.touch();
        self.store
            .save(&state)
            .await
            .map_err(|e| WorkflowError::Store(e.to_string()))?;

        let begin = Instant::now();
        let assembled = self.renderer.assemble(&state.topic, &state.sections);
        let latency = begin.elapsed().as_millis() as u64;
        self.metrics
            .record_step("assemble_report", latency, assembled.is_ok(), 0, 0)
            .await;

        let artifact = match assembled {
            Ok(a) => a,
            Err(e) => {
                return Err(self.fail_run(state, "assemble_report", &e.to_string()).await);
            }
        };

        state.final_artifact = Some(artifact);
        state.status = RunStatus::Completed;
        state.touch();
        self.store
            .save(&state)
            .await
            .map_err(|e| WorkflowError::Store(e.to_string()))?;
        self.metrics.run_completed();
        info!(
            "Run completed: thread_id={} sections={}",
            thread_id,
            state.sections.len()
        );

        Ok(state)
    }

    /// 只读状态快照
    pub async fn status(&self, thread_id: &str) -> Result<RunState, WorkflowError> {
        self.store
            .load(thread_id)
            .await
            .map_err(|e| WorkflowError::from_store(e, RunStatus::Created))
    }

    /// 并行访谈：每位参与者恰好一个任务，Semaphore 限并发，JoinSet 等全量完成。
    /// 单场失败只告警不短路，返回成功产出的各节。
    async fn run_interviews(&self, state: &RunState) -> Vec<Section> {
        let bound = state.max_participants.max(1);
        let semaphore = Arc::new(Semaphore::new(bound));
        let mut tasks: JoinSet<(String, Result<Section, String>)> = JoinSet::new();

        for participant in state.participants.clone() {
            let worker = Arc::clone(&self.worker);
            let metrics = Arc::clone(&self.metrics);
            let semaphore = Arc::clone(&semaphore);
            let topic = state.topic.clone();
            let feedback = state.feedback.clone();

            tasks.spawn(async move {
                // Semaphore 随引擎存活，acquire 不会失败
                let _permit = semaphore.acquire_owned().await.unwrap();
                let begin = Instant::now();
                let result = worker
                    .conduct_interview(&topic, feedback.as_deref(), &participant)
                    .await;
                let latency = begin.elapsed().as_millis() as u64;
                let (prompt, completion) = match &result {
                    Ok(s) => (s.prompt_tokens, s.completion_tokens),
                    Err(_) => (0, 0),
                };
                metrics
                    .record_step("conduct_interview", latency, result.is_ok(), prompt, completion)
                    .await;
                (participant.name, result.map_err(|e| e.to_string()))
            });
        }

        let mut sections = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(section))) => sections.push(section),
                Ok((name, Err(cause))) => {
                    warn!(
                        "Interview failed: thread_id={} participant={} cause={}",
                        state.thread_id, name, cause
                    );
                }
                Err(e) => {
                    warn!("Interview task panicked: thread_id={} cause={}", state.thread_id, e);
                }
            }
        }
        sections
    }

    /// 标记运行失败并持久化；参与者等已有进展保留供排查
    async fn fail_run(&self, mut state: RunState, step: &str, cause: &str) -> WorkflowError {
        error!(
            "Run failed: thread_id={} step={} cause={}",
            state.thread_id, step, cause
        );
        state.status = RunStatus::Failed;
        state.error = Some(RunError { step: step.to_string(), cause: cause.to_string() });
        state.touch();
        if let Err(e) = self.store.save(&state).await {
            error!("Failed to persist failure state: thread_id={} cause={}", state.thread_id, e);
        }
        self.metrics.run_failed();
        WorkflowError::Unrecoverable { step: step.to_string(), cause: cause.to_string() }
    }
}
