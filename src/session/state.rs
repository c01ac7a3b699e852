//! 会话状态：不可变值类型与纯转移函数
//!
//! 状态机独占 SessionState 的所有权与变更；转移函数消费 self 返回新值，
//! 杜绝部分更新的别名问题。不变量：completed ⊆ required、轮数单调、
//! 历史 append-only、状态只能 creating → active → complete。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conversation::{Message, Transcript};
use crate::scenario::Scenario;
use crate::scoring::{CriticalError, TurnEvidence};
use crate::session::error::TrainingError;

pub type SessionId = String;

/// 会话状态机的三个阶段，只能单向前进
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    /// 情景/人设生成中
    Creating,
    /// 接受学员回合
    Active,
    /// 终态，不再接受回合
    Complete,
}

/// 终止原因（封闭集合；多条件同时成立时只记优先级最高的一个）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionReason {
    AllStepsCompleted,
    CriticalErrorThreshold,
    MaxTurnsReached,
    NaturalConclusion,
}

impl CompletionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionReason::AllStepsCompleted => "all-steps-completed",
            CompletionReason::CriticalErrorThreshold => "critical-error-threshold",
            CompletionReason::MaxTurnsReached => "max-turns-reached",
            CompletionReason::NaturalConclusion => "natural-conclusion",
        }
    }
}

/// 会话状态值
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub id: SessionId,
    pub user_id: String,
    pub status: SessionStatus,
    /// 已接受的学员回合数，从 0 起单调递增
    pub turn: u32,
    /// 情景必做步骤（激活时快照，之后不可变）
    pub required_steps: Vec<String>,
    /// 已完成步骤：只增不减，保持首次完成顺序
    pub completed_steps: Vec<String>,
    /// 关键错误：append-only
    pub critical_errors: Vec<CriticalError>,
    /// 每轮评分快照：append-only
    pub score_history: Vec<TurnEvidence>,
    /// 完整对话：append-only
    pub transcript: Transcript,
    /// 已向学员透露的隐藏动机
    pub revealed_facts: Vec<String>,
    /// 终止原因：转 complete 时一次性设置
    pub completion_reason: Option<CompletionReason>,
    pub created_at: DateTime<Utc>,
    /// 最后一次状态转移时间（视图时长用它而非当前时刻，保证读取幂等）
    pub updated_at: DateTime<Utc>,
}

/// 一个回合对状态的全部增量
#[derive(Debug, Clone)]
pub struct TurnDelta {
    pub trainee_message: Message,
    pub guest_message: Message,
    pub evidence: TurnEvidence,
    pub critical_errors: Vec<CriticalError>,
    pub completed_steps: Vec<String>,
    pub revealed_facts: Vec<String>,
}

impl SessionState {
    pub fn new(user_id: String) -> Self {
        let now = Utc::now();
        Self {
            id: format!("session_{}", uuid::Uuid::new_v4()),
            user_id,
            status: SessionStatus::Creating,
            turn: 0,
            required_steps: Vec::new(),
            completed_steps: Vec::new(),
            critical_errors: Vec::new(),
            score_history: Vec::new(),
            transcript: Transcript::new(),
            revealed_facts: Vec::new(),
            completion_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// creating → active：快照情景步骤并写入开场白
    pub fn activate(mut self, scenario: &Scenario, opening: Message) -> Result<Self, TrainingError> {
        if self.status != SessionStatus::Creating {
            return Err(TrainingError::State(format!(
                "cannot activate session in {:?} state",
                self.status
            )));
        }
        self.required_steps = scenario.required_steps.clone();
        self.transcript.push(opening);
        self.status = SessionStatus::Active;
        self.updated_at = Utc::now();
        Ok(self)
    }

    /// active → active：应用一个完整回合的增量
    pub fn apply_turn(mut self, delta: TurnDelta) -> Result<Self, TrainingError> {
        if self.status != SessionStatus::Active {
            return Err(TrainingError::State(format!(
                "turn rejected: session is {:?}",
                self.status
            )));
        }
        self.transcript.push(delta.trainee_message);
        self.score_history.push(delta.evidence);
        self.critical_errors.extend(delta.critical_errors);
        // 单调并集，且只接受情景定义过的步骤
        for step in delta.completed_steps {
            if self.required_steps.contains(&step) && !self.completed_steps.contains(&step) {
                self.completed_steps.push(step);
            }
        }
        for fact in delta.revealed_facts {
            if !self.revealed_facts.contains(&fact) {
                self.revealed_facts.push(fact);
            }
        }
        self.transcript.push(delta.guest_message);
        self.turn += 1;
        self.updated_at = Utc::now();
        Ok(self)
    }

    /// → complete：终态转移，原因只设一次
    ///
    /// 允许从 creating 强制收尾（用已积累的状态出报告），complete 上重复调用被拒绝。
    pub fn complete(mut self, reason: CompletionReason) -> Result<Self, TrainingError> {
        if self.status == SessionStatus::Complete {
            return Err(TrainingError::State(
                "session is already complete".to_string(),
            ));
        }
        self.status = SessionStatus::Complete;
        self.completion_reason = Some(reason);
        self.updated_at = Utc::now();
        Ok(self)
    }

    /// 回合预检：非 active 一律拒绝
    pub fn ensure_active(&self) -> Result<(), TrainingError> {
        if self.status != SessionStatus::Active {
            return Err(TrainingError::State(format!(
                "operation requires an active session, current: {:?}",
                self.status
            )));
        }
        Ok(())
    }

    /// 步骤完成比例 [0,1]
    pub fn progress_ratio(&self) -> f64 {
        if self.required_steps.is_empty() {
            return 0.0;
        }
        self.completed_steps.len() as f64 / self.required_steps.len() as f64
    }

    /// 最近一轮评分快照
    pub fn latest_evidence(&self) -> Option<&TurnEvidence> {
        self.score_history.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::fallback_scenario;
    use crate::scoring::TurnEvidence;

    fn delta(steps: Vec<&str>) -> TurnDelta {
        TurnDelta {
            trainee_message: Message::trainee("hi"),
            guest_message: Message::guest("hello"),
            evidence: TurnEvidence::unavailable(),
            critical_errors: Vec::new(),
            completed_steps: steps.into_iter().map(String::from).collect(),
            revealed_facts: Vec::new(),
        }
    }

    fn active_state() -> SessionState {
        SessionState::new("user1".to_string())
            .activate(&fallback_scenario(), Message::guest("opening"))
            .unwrap()
    }

    #[test]
    fn test_lifecycle_forward_only() {
        let state = SessionState::new("user1".to_string());
        assert_eq!(state.status, SessionStatus::Creating);
        let state = state
            .activate(&fallback_scenario(), Message::guest("opening"))
            .unwrap();
        assert_eq!(state.status, SessionStatus::Active);
        let state = state.complete(CompletionReason::NaturalConclusion).unwrap();
        assert_eq!(state.status, SessionStatus::Complete);
        // 终态不可重复完成
        assert!(state.complete(CompletionReason::MaxTurnsReached).is_err());
    }

    #[test]
    fn test_activate_twice_rejected() {
        let state = active_state();
        assert!(state
            .activate(&fallback_scenario(), Message::guest("again"))
            .is_err());
    }

    #[test]
    fn test_turn_rejected_when_complete() {
        let state = active_state()
            .complete(CompletionReason::MaxTurnsReached)
            .unwrap();
        let err = state.apply_turn(delta(vec![])).unwrap_err();
        assert!(matches!(err, TrainingError::State(_)));
    }

    #[test]
    fn test_completed_steps_monotonic_and_subset() {
        let state = active_state();
        let state = state
            .apply_turn(delta(vec!["acknowledge the issue", "not a real step"]))
            .unwrap();
        assert_eq!(state.completed_steps, vec!["acknowledge the issue"]);

        // 重复完成不重复计，已有步骤不丢
        let state = state
            .apply_turn(delta(vec!["acknowledge the issue", "verify the account details"]))
            .unwrap();
        assert_eq!(
            state.completed_steps,
            vec!["acknowledge the issue", "verify the account details"]
        );
        assert_eq!(state.turn, 2);
    }

    #[test]
    fn test_reason_set_once() {
        let state = active_state()
            .complete(CompletionReason::AllStepsCompleted)
            .unwrap();
        assert_eq!(
            state.completion_reason,
            Some(CompletionReason::AllStepsCompleted)
        );
    }

    #[test]
    fn test_transcript_appends_trainee_then_guest() {
        let state = active_state().apply_turn(delta(vec![])).unwrap();
        let msgs = state.transcript.messages();
        // opening + trainee + guest
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[1].content, "hi");
        assert_eq!(msgs[2].content, "hello");
    }
}
