//! 路由与处理器
//!
//! 错误映射约定：InvalidInput→400，NotFound→404，InvalidState→409，
//! 其余一律 500 且对外不泄漏内部细节；具体失败步骤与原因只通过
//! 状态查询接口的 error 字段暴露。

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::observability::MetricsCollector;
use crate::workflow::{Participant, RunError, Section, WorkflowEngine, WorkflowError};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
    pub metrics: Arc<MetricsCollector>,
    /// 单次运行允许的参与者上限（配置项）
    pub max_participants_limit: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_prometheus))
        .route("/metrics/dashboard", get(metrics_dashboard))
        .route("/reports", post(create_report))
        .route("/reports/:thread_id/feedback", post(submit_feedback))
        .route("/reports/:thread_id", get(get_report))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct CreateReportRequest {
    pub topic: String,
    pub max_participants: usize,
}

#[derive(Debug, Serialize)]
pub struct CreateReportResponse {
    pub thread_id: String,
    pub status: String,
    pub participants: Vec<Participant>,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub feedback: String,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub thread_id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ReportSnapshot {
    pub thread_id: String,
    pub topic: String,
    pub status: String,
    pub participants: Vec<Participant>,
    pub sections_count: usize,
    pub sections: Vec<Section>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_artifact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// POST /reports：创建运行，同步执行到暂停点
async fn create_report(
    State(state): State<AppState>,
    Json(req): Json<CreateReportRequest>,
) -> Result<(StatusCode, Json<CreateReportResponse>), (StatusCode, String)> {
    if req.topic.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "topic must not be empty".into()));
    }
    if req.max_participants == 0 || req.max_participants > state.max_participants_limit {
        return Err((
            StatusCode::BAD_REQUEST,
            format!(
                "max_participants must be between 1 and {}",
                state.max_participants_limit
            ),
        ));
    }

    let run = state
        .engine
        .start(&req.topic, req.max_participants)
        .await
        .map_err(map_error)?;

    Ok((
        StatusCode::CREATED,
        Json(CreateReportResponse {
            thread_id: run.thread_id,
            status: run.status.to_string(),
            participants: run.participants,
        }),
    ))
}

/// POST /reports/:thread_id/feedback：提交反馈并在后台续跑
async fn submit_feedback(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, (StatusCode, String)> {
    if req.feedback.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "feedback must not be empty".into()));
    }

    let run = state
        .engine
        .resume(&thread_id, &req.feedback)
        .await
        .map_err(map_error)?;

    // 响应不等待访谈 / 装配，结果通过状态查询获取
    let engine = Arc::clone(&state.engine);
    let id = run.thread_id.clone();
    tokio::spawn(async move {
        if let Err(e) = engine.drive(&id).await {
            error!("Background drive failed: thread_id={} cause={}", id, e);
        }
    });

    info!("Feedback accepted: thread_id={}", run.thread_id);
    Ok(Json(FeedbackResponse {
        thread_id: run.thread_id,
        status: run.status.to_string(),
    }))
}

/// GET /reports/:thread_id：状态快照
async fn get_report(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<ReportSnapshot>, (StatusCode, String)> {
    let run = state.engine.status(&thread_id).await.map_err(map_error)?;
    Ok(Json(ReportSnapshot {
        thread_id: run.thread_id,
        topic: run.topic,
        status: run.status.to_string(),
        participants: run.participants,
        sections_count: run.sections.len(),
        sections: run.sections,
        final_artifact: run.final_artifact,
        error: run.error,
        created_at: run.created_at,
        updated_at: run.updated_at,
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "hive",
        "timestamp": chrono::Utc::now().timestamp_millis(),
    }))
}

async fn metrics_prometheus(State(state): State<AppState>) -> String {
    state.metrics.export_prometheus().await
}

async fn metrics_dashboard(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(state.metrics.summary().await)
}

/// 运行级错误 → HTTP 响应；内部错误对外只给通用提示
fn map_error(err: WorkflowError) -> (StatusCode, String) {
    match err {
        WorkflowError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
        WorkflowError::NotFound(id) => {
            (StatusCode::NOT_FOUND, format!("Thread not found: {}", id))
        }
        WorkflowError::InvalidState { expected, actual } => (
            StatusCode::CONFLICT,
            format!("Invalid state: expected {}, actual {}", expected, actual),
        ),
        WorkflowError::Unrecoverable { .. } | WorkflowError::Store(_) => {
            error!("Internal error: {}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error".into())
        }
    }
}
