//! Dojo - Rust 客服培训模拟引擎
//!
//! 学员与 AI 扮演的「客人」逐轮对话，后台静默评分，结束时汇总复盘反馈。
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **conversation**: 对话消息与转录（append-only）
//! - **emotion**: 情绪弧引擎（纯函数：人设 + 轮数 → 当前情绪/强度/透露策略）
//! - **feedback**: 复盘反馈聚合（趋势、加权总分、建议合成、降级兜底）
//! - **guest**: 客人回复生成（LLM + 确定性兜底、元评论剥离、一致性启发）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **observability**: tracing 初始化（RUST_LOG 环境过滤）
//! - **retrieval**: 语义检索能力（关键词重叠排序，失败时返回空上下文）
//! - **scenario**: 情景与人设工厂（LLM 生成 + 校验 + 确定性兜底）
//! - **scoring**: 五维评分与证据管线（解析、钳制、关键错误与步骤判定）
//! - **session**: 会话状态机、完成策略、注册表与视图投影

pub mod config;
pub mod conversation;
pub mod emotion;
pub mod feedback;
pub mod guest;
pub mod llm;
pub mod observability;
pub mod retrieval;
pub mod scenario;
pub mod scoring;
pub mod session;

pub use session::{SessionEngine, SessionRegistry, SessionView, TrainingError};
