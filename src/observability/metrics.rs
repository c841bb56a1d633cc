//! 运行指标收集
//!
//! 记录步骤级结果（耗时、成败、token 用量）与运行计数，供 /metrics 导出。
//! fire-and-forget：记录失败或落后绝不影响运行本身。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::RwLock;

/// 单步骤累计统计
#[derive(Debug, Clone, Default, Serialize)]
pub struct StepStats {
    pub invocations: u64,
    pub failures: u64,
    pub total_latency_ms: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// 指标收集器
#[derive(Default)]
pub struct MetricsCollector {
    steps: RwLock<HashMap<String, StepStats>>,
    runs_started: AtomicU64,
    runs_completed: AtomicU64,
    runs_failed: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次步骤结果
    pub async fn record_step(
        &self,
        step: &str,
        latency_ms: u64,
        ok: bool,
        prompt_tokens: u64,
        completion_tokens: u64,
    ) {
        let mut steps = self.steps.write().await;
        let stats = steps.entry(step.to_string()).or_default();
        stats.invocations += 1;
        if !ok {
            stats.failures += 1;
        }
        stats.total_latency_ms += latency_ms;
        stats.prompt_tokens += prompt_tokens;
        stats.completion_tokens += completion_tokens;
    }

    pub fn run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn run_completed(&self) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn run_failed(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// JSON 摘要（/metrics/dashboard）
    pub async fn summary(&self) -> serde_json::Value {
        let steps = self.steps.read().await;
        serde_json::json!({
            "runs": {
                "started": self.runs_started.load(Ordering::Relaxed),
                "completed": self.runs_completed.load(Ordering::Relaxed),
                "failed": self.runs_failed.load(Ordering::Relaxed),
            },
            "steps": &*steps,
        })
    }

    /// Prometheus 文本格式（/metrics）
    pub async fn export_prometheus(&self) -> String {
        let mut out = String::new();

        out.push_str("# TYPE hive_runs_started_total counter\n");
        out.push_str(&format!(
            "hive_runs_started_total {}\n",
            self.runs_started.load(Ordering::Relaxed)
        ));
        out.push_str("# TYPE hive_runs_completed_total counter\n");
        out.push_str(&format!(
            "hive_runs_completed_total {}\n",
            self.runs_completed.load(Ordering::Relaxed)
        ));
        out.push_str("# TYPE hive_runs_failed_total counter\n");
        out.push_str(&format!(
            "hive_runs_failed_total {}\n",
            self.runs_failed.load(Ordering::Relaxed)
        ));

        let steps = self.steps.read().await;
        out.push_str("# TYPE hive_step_invocations_total counter\n");
        out.push_str("# TYPE hive_step_failures_total counter\n");
        out.push_str("# TYPE hive_step_latency_ms_total counter\n");
        out.push_str("# TYPE hive_step_tokens_total counter\n");
        let mut names: Vec<_> = steps.keys().collect();
        names.sort();
        for name in names {
            let s = &steps[name];
            out.push_str(&format!(
                "hive_step_invocations_total{{step=\"{}\"}} {}\n",
                name, s.invocations
            ));
            out.push_str(&format!(
                "hive_step_failures_total{{step=\"{}\"}} {}\n",
                name, s.failures
            ));
            out.push_str(&format!(
                "hive_step_latency_ms_total{{step=\"{}\"}} {}\n",
                name, s.total_latency_ms
            ));
            out.push_str(&format!(
                "hive_step_tokens_total{{step=\"{}\",kind=\"prompt\"}} {}\n",
                name, s.prompt_tokens
            ));
            out.push_str(&format!(
                "hive_step_tokens_total{{step=\"{}\",kind=\"completion\"}} {}\n",
                name, s.completion_tokens
            ));
        }

        out
    }
}
