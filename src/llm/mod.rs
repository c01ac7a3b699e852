//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock）

pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

pub use mock::{FailingLlmClient, MockLlmClient, ScriptedLlmClient};
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::LlmClient;

use crate::config::AppConfig;

/// 从配置构建 LLM 客户端：provider=mock 时走 Mock，否则 OpenAI 兼容端点
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    if cfg.llm.provider == "mock" {
        return Arc::new(MockLlmClient);
    }
    Arc::new(OpenAiClient::new(
        cfg.llm.base_url.as_deref(),
        &cfg.llm.model,
        None,
    ))
}
