//! Hive 服务入口：装配存储 / LLM / 引擎并启动 HTTP 网关

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use hive::config::load_config;
use hive::gateway::{router, AppState};
use hive::llm::{LlmClient, MockLlmClient, OpenAiClient};
use hive::observability::{self, MetricsCollector};
use hive::report::MarkdownRenderer;
use hive::workflow::{create_thread_store, LlmTaskWorker, TimedWorker, WorkflowEngine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config(None).context("failed to load config")?;
    info!(
        "Config loaded: provider={} model={} port={}",
        cfg.llm.provider, cfg.llm.model, cfg.web.port
    );

    let llm: Arc<dyn LlmClient> = match cfg.llm.provider.as_str() {
        "mock" => Arc::new(MockLlmClient),
        _ => {
            let api_key = cfg
                .llm
                .api_key_env
                .as_deref()
                .and_then(|var| std::env::var(var).ok());
            Arc::new(OpenAiClient::new(
                cfg.llm.base_url.as_deref(),
                &cfg.llm.model,
                api_key.as_deref(),
            ))
        }
    };

    let worker = Arc::new(TimedWorker::new(
        Arc::new(LlmTaskWorker::new(llm)),
        cfg.workflow.step_timeout_secs,
    ));
    let store = create_thread_store(cfg.storage.db_path.as_deref()).await;
    let output_root = cfg
        .app
        .output_root
        .clone()
        .unwrap_or_else(|| "./generated_report".into());
    let renderer = Arc::new(MarkdownRenderer::new(output_root));
    let metrics = Arc::new(MetricsCollector::new());

    let engine = Arc::new(WorkflowEngine::new(
        store,
        worker,
        renderer,
        Arc::clone(&metrics),
    ));

    let state = AppState {
        engine,
        metrics,
        max_participants_limit: cfg.workflow.max_participants_limit,
    };

    let port = std::env::var("HIVE_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(cfg.web.port);
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Hive listening on {}", addr);

    axum::serve(listener, router(state)).await.context("server error")?;
    Ok(())
}
