//! Mock LLM 客户端（用于测试，无需 API）
//!
//! - MockLlmClient：回显最后一条学员消息，便于本地跑通会话流程
//! - ScriptedLlmClient：按序弹出预置回复，精确控制评分/生成内容
//! - FailingLlmClient：始终失败，验证全链路兜底保证

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::conversation::{Message, Speaker};
use crate::llm::LlmClient;

/// Mock 客户端：回显学员最后一条消息
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let last = messages
            .iter()
            .rev()
            .find(|m| matches!(m.speaker, Speaker::Trainee))
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        Ok(format!("Echo from Mock: {}", last))
    }
}

/// 按序返回预置回复；脚本耗尽后返回错误（等价于上游失效，触发兜底）
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedLlmClient {
    pub fn new(replies: Vec<String>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
        }
    }

    /// 追加一条脚本回复
    pub fn push(&self, reply: impl Into<String>) {
        self.replies.lock().unwrap().push_back(reply.into());
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, _messages: &[Message]) -> Result<String, String> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| "script exhausted".to_string())
    }
}

/// 始终失败的客户端：模拟上游超时/故障
#[derive(Debug, Default)]
pub struct FailingLlmClient;

#[async_trait]
impl LlmClient for FailingLlmClient {
    async fn complete(&self, _messages: &[Message]) -> Result<String, String> {
        Err("simulated provider failure".to_string())
    }
}
