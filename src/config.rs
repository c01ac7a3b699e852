//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `DOJO__*` 覆盖（双下划线表示嵌套，如 `DOJO__LLM__MODEL=gpt-4o-mini`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::session::error::TrainingError;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub guest: GuestSection,
    #[serde(default)]
    pub scoring: ScoringSection,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmSection::default(),
            session: SessionSection::default(),
            guest: GuestSection::default(),
            scoring: ScoringSection::default(),
        }
    }
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmSection {
    /// 后端：openai / mock；mock 仅用于本地跑通流程
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// OpenAI 兼容端点，未设置时用官方端点
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmTimeoutsSection {
    /// 单次生成调用超时（秒）；超时后走确定性兜底，不重试
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

fn default_request_timeout() -> u64 {
    30
}

/// [session] 段：轮数上限、完成策略阈值、过期时间
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// 会话最大轮数（资源上限）
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    /// 关键错误累计达到此数即提前终止
    #[serde(default = "default_critical_error_threshold")]
    pub critical_error_threshold: usize,
    /// 自然收尾所需的最小轮数
    #[serde(default = "default_natural_close_min_turns")]
    pub natural_close_min_turns: u32,
    /// 自然收尾所需的步骤完成比例
    #[serde(default = "default_natural_close_ratio")]
    pub natural_close_ratio: f64,
    /// 空闲会话过期时间（秒）
    #[serde(default = "default_expiry_secs")]
    pub expiry_secs: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            critical_error_threshold: default_critical_error_threshold(),
            natural_close_min_turns: default_natural_close_min_turns(),
            natural_close_ratio: default_natural_close_ratio(),
            expiry_secs: default_expiry_secs(),
        }
    }
}

fn default_max_turns() -> u32 {
    20
}

fn default_critical_error_threshold() -> usize {
    3
}

fn default_natural_close_min_turns() -> u32 {
    5
}

fn default_natural_close_ratio() -> f64 {
    0.8
}

fn default_expiry_secs() -> u64 {
    3600
}

/// [guest] 段：客人回复生成
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GuestSection {
    /// 喂给生成提示的历史轮数
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
    /// 对话达到此轮数后生成器给出「不宜继续」软信号
    #[serde(default = "default_soft_stop_turns")]
    pub soft_stop_turns: usize,
}

impl Default for GuestSection {
    fn default() -> Self {
        Self {
            history_turns: default_history_turns(),
            soft_stop_turns: default_soft_stop_turns(),
        }
    }
}

fn default_history_turns() -> usize {
    6
}

fn default_soft_stop_turns() -> usize {
    20
}

/// [scoring] 段：关键词词表覆盖（留空使用内置默认）
///
/// 词表是可替换配置而非业务逻辑：阈值、单调性、钳制规则不随词表变化。
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ScoringSection {
    /// 覆盖「情绪外露」人设特质词表
    pub expressive_traits: Option<Vec<String>>,
    /// 覆盖负面情绪词表（关键错误判定用）
    pub negative_emotions: Option<Vec<String>>,
    /// 覆盖道歉关键词（步骤判定用）
    pub apology_keywords: Option<Vec<String>>,
}

/// 从 config 目录加载配置，环境变量 DOJO__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 DOJO__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, TrainingError> {
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
        config::Environment::with_prefix("DOJO")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder
        .build()
        .map_err(|e| TrainingError::Config(e.to_string()))?;
    c.try_deserialize()
        .map_err(|e| TrainingError::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.session.max_turns, 20);
        assert_eq!(cfg.session.critical_error_threshold, 3);
        assert_eq!(cfg.guest.history_turns, 6);
        assert!(cfg.scoring.expressive_traits.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("override.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "[session]\nmax_turns = 12\n\n[llm]\nmodel = \"test-model\"").unwrap();

        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.session.max_turns, 12);
        assert_eq!(cfg.llm.model, "test-model");
        // 未覆盖的键保持默认
        assert_eq!(cfg.session.natural_close_min_turns, 5);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "[session]\nmax_turns = \"twenty\"").unwrap();

        let err = load_config(Some(path)).unwrap_err();
        assert!(matches!(err, TrainingError::Config(_)));
    }
}
