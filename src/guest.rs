//! 客人回复生成
//!
//! 按人设、情景、情绪状态与近 6 轮历史生成下一条客人发言；
//! 输出先剥离元评论（动作描写、出戏声明），再做启发式一致性打分（仅观测，不拦截）。
//! 生成失败落到固定的中性澄清语句池，绝不让回合中断。

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::warn;

use crate::conversation::{Message, Speaker, Transcript};
use crate::emotion::EmotionalState;
use crate::llm::LlmClient;
use crate::scenario::{Persona, Scenario};
use crate::scoring::Vocabulary;
use crate::session::error::TrainingError;

/// 兜底语句池：中性澄清话术，按轮数取模轮转（确定性）
const FALLBACK_POOL: [&str; 4] = [
    "Sorry, could you walk me through that once more?",
    "I'm not sure I follow. What does that mean for my situation?",
    "Okay... and what happens next on your end?",
    "Can you explain what you need from me to move this forward?",
];

/// 出戏声明与元评论的固定短语黑名单（整行剔除）
const META_DENYLIST: [&str; 6] = [
    "as an ai",
    "out of character",
    "ooc:",
    "in this roleplay",
    "as the guest,",
    "note:",
];

/// 生成的客人回复
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestReply {
    pub text: String,
    /// 生成时的情绪阶段
    pub emotion: String,
    /// 启发式一致性 [0,1]（观测数据，不做门控）
    pub consistency: f32,
    /// 是否来自兜底池
    pub fallback: bool,
}

/// 客人回复生成器
pub struct GuestResponder {
    llm: Arc<dyn LlmClient>,
    request_timeout: Duration,
    history_turns: usize,
    soft_stop_turns: usize,
    action_re: Regex,
}

impl GuestResponder {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        request_timeout: Duration,
        history_turns: usize,
        soft_stop_turns: usize,
    ) -> Self {
        Self {
            llm,
            request_timeout,
            history_turns,
            soft_stop_turns,
            // *sighs heavily* 之类的动作描写
            action_re: Regex::new(r"\*[^*]+\*").unwrap(),
        }
    }

    /// 生成下一条客人发言；任何失败都落到兜底池，永不返回错误
    pub async fn respond(
        &self,
        persona: &Persona,
        scenario: &Scenario,
        transcript: &Transcript,
        state: &EmotionalState,
        reveals: &[String],
        turn: u32,
        vocab: &Vocabulary,
    ) -> GuestReply {
        match self.generate(persona, scenario, transcript, state, reveals).await {
            Ok(raw) => {
                let text = self.strip_meta(&raw);
                if text.is_empty() {
                    warn!(turn, "guest output empty after meta stripping, using fallback");
                    return self.fallback_reply(persona, turn);
                }
                let consistency = consistency_score(&text, persona, state, vocab);
                GuestReply {
                    text,
                    emotion: state.emotion.clone(),
                    consistency,
                    fallback: false,
                }
            }
            Err(e) => {
                warn!(turn, error = %e, "guest generation failed, using fallback pool");
                self.fallback_reply(persona, turn)
            }
        }
    }

    /// 软信号：对话到达轮数上限后建议收尾（非权威，完成策略才是裁决者）
    pub fn should_continue(&self, turn: u32) -> bool {
        (turn as usize) < self.soft_stop_turns
    }

    /// 确定性兜底：按轮数取模选池内语句，情绪标为人设弧的第一阶段
    fn fallback_reply(&self, persona: &Persona, turn: u32) -> GuestReply {
        let text = FALLBACK_POOL[turn as usize % FALLBACK_POOL.len()].to_string();
        let emotion = persona
            .arc
            .first()
            .cloned()
            .unwrap_or_else(|| "neutral".to_string());
        GuestReply {
            text,
            emotion,
            consistency: 1.0,
            fallback: true,
        }
    }

    /// 剥离元评论：去掉 *动作描写*，整行剔除黑名单短语
    fn strip_meta(&self, raw: &str) -> String {
        let without_actions = self.action_re.replace_all(raw, "");
        without_actions
            .lines()
            .filter(|line| {
                let lower = line.to_lowercase();
                !META_DENYLIST.iter().any(|p| lower.contains(p))
            })
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }

    async fn generate(
        &self,
        persona: &Persona,
        scenario: &Scenario,
        transcript: &Transcript,
        state: &EmotionalState,
        reveals: &[String],
    ) -> Result<String, TrainingError> {
        let history = transcript
            .last_turns(self.history_turns * 2)
            .iter()
            .map(|m| {
                let who = match m.speaker {
                    Speaker::Trainee => "AGENT",
                    Speaker::Guest => "YOU",
                    Speaker::System => "SYSTEM",
                };
                format!("{}: {}", who, m.content)
            })
            .collect::<Vec<_>>()
            .join("\n");

        let reveal_block = if reveals.is_empty() {
            String::new()
        } else {
            format!("Naturally work in these facts this turn: {}\n", reveals.join("; "))
        };

        let prompt = format!(
            "You are {}, a customer in this situation: {}\n\
             Background: {}\nCommunication style: {}\n\
             Current emotion: {} (intensity {:.1}).\n{}\
             Conversation so far:\n{}\n\n\
             Reply with ONLY your next message as the customer, in character. \
             No stage directions, no commentary.",
            persona.name,
            scenario.description,
            persona.background,
            persona.communication_style,
            state.emotion,
            state.intensity,
            reveal_block,
            history
        );

        let messages = vec![Message::system(prompt)];
        timeout(self.request_timeout, self.llm.complete(&messages))
            .await
            .map_err(|_| TrainingError::Generation("guest request timed out".to_string()))?
            .map_err(TrainingError::Generation)
    }
}

/// 启发式一致性打分：沟通风格 + 当前情绪词表的命中情况
fn consistency_score(
    text: &str,
    persona: &Persona,
    state: &EmotionalState,
    vocab: &Vocabulary,
) -> f32 {
    let mut score: f32 = 0.5;

    let style = persona.communication_style.to_lowercase();
    let style_hit = if style.contains("short") || style.contains("terse") {
        text.chars().count() < 160
    } else {
        Vocabulary::match_count(text, &style_words(&style)) > 0
    };
    if style_hit {
        score += 0.25;
    }

    let emotion_words = vocab
        .emotion_words
        .get(&state.emotion.to_lowercase())
        .cloned()
        .unwrap_or_default();
    if Vocabulary::match_count(text, &emotion_words) > 0 {
        score += 0.25;
    }

    score.clamp(0.0, 1.0)
}

fn style_words(style: &str) -> Vec<String> {
    style
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 3)
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::emotional_state;
    use crate::llm::{FailingLlmClient, ScriptedLlmClient};
    use crate::scenario::{fallback_persona, fallback_scenario};

    fn responder(llm: Arc<dyn LlmClient>) -> GuestResponder {
        GuestResponder::new(llm, Duration::from_secs(1), 6, 20)
    }

    fn state() -> EmotionalState {
        emotional_state(&fallback_persona(), 0, 0, &Vocabulary::default())
    }

    #[tokio::test]
    async fn test_fallback_on_failure_is_deterministic() {
        let r = responder(Arc::new(FailingLlmClient));
        let persona = fallback_persona();
        let a = r
            .respond(&persona, &fallback_scenario(), &Transcript::new(), &state(), &[], 3, &Vocabulary::default())
            .await;
        let b = r
            .respond(&persona, &fallback_scenario(), &Transcript::new(), &state(), &[], 3, &Vocabulary::default())
            .await;
        assert!(a.fallback);
        assert_eq!(a.text, b.text);
        // 兜底情绪为弧的第一阶段
        assert_eq!(a.emotion, "curious");
    }

    #[tokio::test]
    async fn test_strips_action_text_and_ooc() {
        let raw = "*sighs heavily* This is the second time!\nOOC: playing up the frustration here.";
        let r = responder(Arc::new(ScriptedLlmClient::new(vec![raw.to_string()])));
        let reply = r
            .respond(
                &fallback_persona(),
                &fallback_scenario(),
                &Transcript::new(),
                &state(),
                &[],
                1,
                &Vocabulary::default(),
            )
            .await;
        assert!(!reply.fallback);
        assert_eq!(reply.text, "This is the second time!");
    }

    #[tokio::test]
    async fn test_empty_after_stripping_uses_fallback() {
        let raw = "*just gestures*";
        let r = responder(Arc::new(ScriptedLlmClient::new(vec![raw.to_string()])));
        let reply = r
            .respond(
                &fallback_persona(),
                &fallback_scenario(),
                &Transcript::new(),
                &state(),
                &[],
                0,
                &Vocabulary::default(),
            )
            .await;
        assert!(reply.fallback);
    }

    #[test]
    fn test_soft_stop_signal() {
        let r = responder(Arc::new(FailingLlmClient));
        assert!(r.should_continue(19));
        assert!(!r.should_continue(20));
    }

    #[test]
    fn test_consistency_heuristic() {
        let persona = fallback_persona(); // style: short, pointed sentences
        let s = EmotionalState {
            emotion: "frustrated".into(),
            intensity: 0.8,
            triggers: vec![],
        };
        let v = Vocabulary::default();
        // 短句 + 情绪词命中：满分
        let high = consistency_score("This is ridiculous. Again?", &persona, &s, &v);
        assert!((high - 1.0).abs() < f32::EPSILON);
        // 长句且无情绪词：只有基础分
        let long_text = "Well, I suppose that could potentially be acceptable depending on \
                         the circumstances and whatever the relevant policies might happen to say \
                         about situations of this general nature at this particular establishment today.";
        let low = consistency_score(long_text, &persona, &s, &v);
        assert!((low - 0.5).abs() < f32::EPSILON);
    }
}
