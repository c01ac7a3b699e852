//! 情景与人设工厂：LLM 生成 + 校验 + 确定性兜底

pub mod factory;
pub mod types;

pub use factory::{fallback_persona, fallback_scenario, ScenarioFactory};
pub use types::{Persona, Scenario};
