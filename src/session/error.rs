//! 错误类型
//!
//! 分类对应恢复策略：Generation/Retrieval/Validation 都在组件内部就地恢复
//! （兜底产物、空上下文、钳制/默认），只有 State 与 SessionNotFound 作为
//! 被拒绝的操作暴露给调用方。

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrainingError {
    /// 上游文本生成失败或超时；组件内部兜底，不外泄
    #[error("Generation failed: {0}")]
    Generation(String),

    /// 语义检索失败；降级为空上下文，不外泄
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    /// 生成物结构校验不过；可钳制则钳制，否则走兜底产物
    #[error("Validation failed: {0}")]
    Validation(String),

    /// 违反状态机不变量（如向 complete 会话提交回合）；直接拒绝操作
    #[error("Invalid session state: {0}")]
    State(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Config error: {0}")]
    Config(String),
}
