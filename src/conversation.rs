//! 对话消息与转录
//!
//! 转录 append-only：会话内的完整对话历史只增不删，供评分上下文、客人生成与复盘使用。

use serde::{Deserialize, Serialize};

/// 发言方
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    /// 学员（受训客服）
    Trainee,
    /// AI 扮演的客人
    Guest,
    /// 系统提示（开场白等）
    System,
}

/// 单条消息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub speaker: Speaker,
    pub content: String,
}

impl Message {
    pub fn trainee(content: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Trainee,
            content: content.into(),
        }
    }

    pub fn guest(content: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Guest,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::System,
            content: content.into(),
        }
    }
}

/// 会话转录：append-only 消息序列
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// 最近 n 条消息（生成提示只带近窗口，避免 token 溢出）
    pub fn last_turns(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    /// 学员最后一条消息
    pub fn last_trainee(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.speaker == Speaker::Trainee)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_turns_window() {
        let mut t = Transcript::new();
        for i in 0..10 {
            t.push(Message::trainee(format!("msg {}", i)));
        }
        let window = t.last_turns(6);
        assert_eq!(window.len(), 6);
        assert_eq!(window[0].content, "msg 4");
    }

    #[test]
    fn test_last_turns_shorter_than_window() {
        let mut t = Transcript::new();
        t.push(Message::guest("hello"));
        assert_eq!(t.last_turns(6).len(), 1);
    }

    #[test]
    fn test_last_trainee() {
        let mut t = Transcript::new();
        t.push(Message::trainee("first"));
        t.push(Message::guest("reply"));
        t.push(Message::trainee("second"));
        t.push(Message::guest("reply again"));
        assert_eq!(t.last_trainee().unwrap().content, "second");
    }
}
