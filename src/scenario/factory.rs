//! 情景与人设工厂
//!
//! 调用 LLM 生成情景/人设 JSON；解析或校验失败时落到确定性兜底，绝不让会话卡在 creating。
//! 每轮只兜底一次、不重试主路径，保证创建时延有界。

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::warn;

use crate::conversation::Message;
use crate::llm::LlmClient;
use crate::scenario::{Persona, Scenario};
use crate::session::error::TrainingError;

/// 从 LLM 输出中提取 JSON 块（```json ... ``` 或首个 { 到最后一个 }）
pub(crate) fn extract_json_block(output: &str) -> Option<&str> {
    let trimmed = output.trim();
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        return Some(rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim()));
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end > start {
        Some(&trimmed[start..=end])
    } else {
        None
    }
}

/// 工厂：持有 LLM 与超时配置，produce 失败时返回兜底产物
pub struct ScenarioFactory {
    llm: Arc<dyn LlmClient>,
    request_timeout: Duration,
}

impl ScenarioFactory {
    pub fn new(llm: Arc<dyn LlmClient>, request_timeout: Duration) -> Self {
        Self {
            llm,
            request_timeout,
        }
    }

    /// 生成情景；任何失败（超时/畸形 JSON/校验不过）都落到兜底情景
    pub async fn produce_scenario(&self, input: &str) -> Scenario {
        match self.generate_scenario(input).await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "scenario generation failed, using fallback");
                fallback_scenario()
            }
        }
    }

    /// 生成人设；失败时落到兜底人设
    pub async fn produce_persona(&self, scenario: &Scenario) -> Persona {
        match self.generate_persona(scenario).await {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "persona generation failed, using fallback");
                fallback_persona()
            }
        }
    }

    async fn generate_scenario(&self, input: &str) -> Result<Scenario, TrainingError> {
        let prompt = format!(
            "Design a customer-service training scenario based on this request:\n{}\n\n\
             Respond with ONLY a JSON object:\n\
             {{\"title\": \"...\", \"description\": \"...\", \
             \"required_steps\": [\"...\"], \"critical_errors\": [\"...\"], \
             \"time_pressure\": 5}}\n\
             required_steps: 3-5 ordered actions the trainee must take. \
             critical_errors: 2-4 severe mistakes. time_pressure: 1-10.",
            input
        );
        let output = self.call(&prompt).await?;
        let json = extract_json_block(&output)
            .ok_or_else(|| TrainingError::Validation("no JSON block in scenario output".to_string()))?;
        let scenario: Scenario =
            serde_json::from_str(json).map_err(|e| TrainingError::Validation(e.to_string()))?;
        scenario.validate().map_err(TrainingError::Validation)
    }

    async fn generate_persona(&self, scenario: &Scenario) -> Result<Persona, TrainingError> {
        let prompt = format!(
            "Create the guest persona for this training scenario:\n{} - {}\n\n\
             Respond with ONLY a JSON object:\n\
             {{\"name\": \"...\", \"background\": \"...\", \"traits\": [\"...\"], \
             \"hidden_motivations\": [\"...\"], \"communication_style\": \"...\", \
             \"arc\": [\"curious\", \"concerned\", \"frustrated\", \"satisfied\"]}}\n\
             arc: the ordered emotional stages the guest moves through.",
            scenario.title, scenario.description
        );
        let output = self.call(&prompt).await?;
        let json = extract_json_block(&output)
            .ok_or_else(|| TrainingError::Validation("no JSON block in persona output".to_string()))?;
        let persona: Persona =
            serde_json::from_str(json).map_err(|e| TrainingError::Validation(e.to_string()))?;
        persona.validate().map_err(TrainingError::Validation)
    }

    async fn call(&self, prompt: &str) -> Result<String, TrainingError> {
        let messages = vec![Message::system(prompt.to_string())];
        timeout(self.request_timeout, self.llm.complete(&messages))
            .await
            .map_err(|_| TrainingError::Generation("generation timed out".to_string()))?
            .map_err(TrainingError::Generation)
    }
}

/// 确定性兜底情景：账单争议演练
pub fn fallback_scenario() -> Scenario {
    Scenario {
        title: "Double-charged room bill".to_string(),
        description: "A guest discovers their card was charged twice for a one-night stay \
                      and wants it resolved before leaving for the airport."
            .to_string(),
        required_steps: vec![
            "acknowledge the issue".to_string(),
            "apologize for the inconvenience".to_string(),
            "verify the account details".to_string(),
            "offer a concrete resolution".to_string(),
        ],
        critical_errors: vec![
            "blame the customer".to_string(),
            "refuse to help".to_string(),
            "promise an unverified refund".to_string(),
        ],
        time_pressure: 6,
    }
}

/// 确定性兜底人设
pub fn fallback_persona() -> Persona {
    Persona {
        name: "Alex Morgan".to_string(),
        background: "A business traveler on a tight schedule who noticed the duplicate \
                     charge while checking out."
            .to_string(),
        traits: vec!["impatient".to_string(), "direct".to_string()],
        hidden_motivations: vec![
            "needs to catch a flight in two hours".to_string(),
            "was overcharged at this hotel once before".to_string(),
            "wants an apology more than the money".to_string(),
        ],
        communication_style: "short, pointed sentences".to_string(),
        arc: vec![
            "curious".to_string(),
            "concerned".to_string(),
            "frustrated".to_string(),
            "satisfied".to_string(),
        ],
    }
}
