//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HIVE__*` 覆盖（双下划线表示嵌套，如 `HIVE__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub web: WebSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub workflow: WorkflowSection,
    #[serde(default)]
    pub storage: StorageSection,
}

/// [app] 段：服务名与报告产物输出目录
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 报告产物根目录，未设置时用 ./generated_report
    pub output_root: Option<PathBuf>,
}

/// [web] 段：HTTP 监听端口
#[derive(Debug, Clone, Deserialize)]
pub struct WebSection {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for WebSection {
    fn default() -> Self {
        Self { port: default_port() }
    }
}

fn default_port() -> u16 {
    8080
}

/// [llm] 段：后端选择与模型
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmSection {
    /// 后端：openai / mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    /// 存放 API Key 的环境变量名，缺省 OPENAI_API_KEY
    pub api_key_env: Option<String>,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

/// [workflow] 段：单步超时与参与者上限
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowSection {
    /// 单次步骤调用超时（秒），生成与访谈均适用
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,
    /// 请求中 max_participants 允许的最大值
    #[serde(default = "default_max_participants_limit")]
    pub max_participants_limit: usize,
}

impl Default for WorkflowSection {
    fn default() -> Self {
        Self {
            step_timeout_secs: default_step_timeout_secs(),
            max_participants_limit: default_max_participants_limit(),
        }
    }
}

fn default_step_timeout_secs() -> u64 {
    60
}

fn default_max_participants_limit() -> usize {
    10
}

/// [storage] 段：线程状态持久化
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StorageSection {
    /// SQLite 文件路径；未设置或未启用 async-sqlite feature 时使用内存存储
    pub db_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSection::default(),
            web: WebSection::default(),
            llm: LlmSection::default(),
            workflow: WorkflowSection::default(),
            storage: StorageSection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 HIVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HIVE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HIVE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
