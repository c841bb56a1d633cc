//! 线程存储抽象层
//!
//! 按 thread_id 持久化 RunState，支持内存和 SQLite 两种实现。
//! 约定：save 对单个 thread_id 原子（整值替换）；不同 thread_id 的写互不阻塞；
//! compare_and_swap 仅在当前 status 与期望一致时写入，是 resume 幂等护栏的基础。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::workflow::error::StoreError;
use crate::workflow::types::{RunState, RunStatus};

/// 线程存储接口
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// 整体写入（插入或替换）
    async fn save(&self, state: &RunState) -> Result<(), StoreError>;

    /// 读取快照
    async fn load(&self, thread_id: &str) -> Result<RunState, StoreError>;

    /// 仅当当前 status == expected 时整体替换为 state，否则返回 StatusConflict
    async fn compare_and_swap(&self, expected: RunStatus, state: &RunState) -> Result<(), StoreError>;
}

/// 内存线程存储
#[derive(Default)]
pub struct MemoryThreadStore {
    runs: RwLock<HashMap<String, RunState>>,
}

impl MemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThreadStore for MemoryThreadStore {
    async fn save(&self, state: &RunState) -> Result<(), StoreError> {
        self.runs
            .write()
            .await
            .insert(state.thread_id.clone(), state.clone());
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<RunState, StoreError> {
        self.runs
            .read()
            .await
            .get(thread_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(thread_id.to_string()))
    }

    async fn compare_and_swap(&self, expected: RunStatus, state: &RunState) -> Result<(), StoreError> {
        let mut runs = self.runs.write().await;
        let current = runs
            .get(&state.thread_id)
            .ok_or_else(|| StoreError::NotFound(state.thread_id.clone()))?;
        if current.status != expected {
            return Err(StoreError::StatusConflict { expected, actual: current.status });
        }
        runs.insert(state.thread_id.clone(), state.clone());
        Ok(())
    }
}

/// SQLite 线程存储：RunState 以 JSON 整体存取，status 单列冗余用于条件更新
#[cfg(feature = "async-sqlite")]
pub struct SqliteThreadStore {
    pool: sqlx::sqlite::SqlitePool,
}

#[cfg(feature = "async-sqlite")]
impl SqliteThreadStore {
    pub async fn new(db_path: impl AsRef<std::path::Path>) -> Result<Self, StoreError> {
        let db_url = format!("sqlite:{}?mode=rwc", db_path.as_ref().display());

        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(3)
            .connect(&db_url)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS runs (
                thread_id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                state TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_runs_status ON runs(status)")
            .execute(&pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self { pool })
    }

    fn encode(state: &RunState) -> Result<String, StoreError> {
        serde_json::to_string(state).map_err(|e| StoreError::Serialize(e.to_string()))
    }

    fn decode(json: &str) -> Result<RunState, StoreError> {
        serde_json::from_str(json).map_err(|e| StoreError::Serialize(e.to_string()))
    }
}

#[cfg(feature = "async-sqlite")]
#[async_trait]
impl ThreadStore for SqliteThreadStore {
    async fn save(&self, state: &RunState) -> Result<(), StoreError> {
        let json = Self::encode(state)?;
        sqlx::query(
            "INSERT OR REPLACE INTO runs (thread_id, status, state, updated_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&state.thread_id)
        .bind(state.status.to_string())
        .bind(&json)
        .bind(state.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<RunState, StoreError> {
        use sqlx::Row;

        let row = sqlx::query("SELECT state FROM runs WHERE thread_id = ?")
            .bind(thread_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?
            .ok_or_else(|| StoreError::NotFound(thread_id.to_string()))?;

        Self::decode(row.get::<String, _>("state").as_str())
    }

    async fn compare_and_swap(&self, expected: RunStatus, state: &RunState) -> Result<(), StoreError> {
        let json = Self::encode(state)?;
        let result = sqlx::query(
            "UPDATE runs SET status = ?, state = ?, updated_at = ?
             WHERE thread_id = ? AND status = ?",
        )
        .bind(state.status.to_string())
        .bind(&json)
        .bind(state.updated_at)
        .bind(&state.thread_id)
        .bind(expected.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        // 区分线程不存在与状态冲突
        let current = self.load(&state.thread_id).await?;
        Err(StoreError::StatusConflict { expected, actual: current.status })
    }
}

/// 创建线程存储
///
/// 如果提供了 db_path 且启用了 async-sqlite feature，则使用 SQLite 持久化；否则使用内存存储
pub async fn create_thread_store(db_path: Option<&std::path::Path>) -> Arc<dyn ThreadStore> {
    #[cfg(feature = "async-sqlite")]
    if let Some(path) = db_path {
        match SqliteThreadStore::new(path).await {
            Ok(store) => {
                tracing::info!("Using sqlite thread store: {:?}", path);
                return Arc::new(store);
            }
            Err(e) => {
                tracing::warn!("Failed to open sqlite store, falling back to memory: {}", e);
            }
        }
    }

    #[cfg(not(feature = "async-sqlite"))]
    if db_path.is_some() {
        tracing::warn!("Persistent thread store requested but async-sqlite feature not enabled, using memory store");
    }

    tracing::info!("Using in-memory thread store");
    Arc::new(MemoryThreadStore::new())
}
