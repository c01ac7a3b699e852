//! 会话视图投影
//!
//! 调用方只看到轻量投影：状态、进度、最新分数、关键错误计数与时长，
//! 从不暴露原始证据文本。时长取「创建 → 最后一次转移」，两次读取之间
//! 无状态变更则视图逐字节相同（幂等读取）。

use serde::{Deserialize, Serialize};

use crate::scoring::Dimension;
use crate::session::state::{CompletionReason, SessionState, SessionStatus};

/// 步骤进度
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub percent: f64,
}

/// 最新一轮的五维分数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestScores {
    pub policy_adherence: u8,
    pub empathy_index: u8,
    pub completeness: u8,
    pub escalation_judgment: u8,
    pub time_efficiency: u8,
}

/// 对外会话视图
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: String,
    pub status: SessionStatus,
    pub turn: u32,
    pub progress: Progress,
    /// 尚无评分快照时为 None
    pub latest_scores: Option<LatestScores>,
    pub critical_error_count: usize,
    pub completion_reason: Option<CompletionReason>,
    pub duration_secs: i64,
}

impl SessionView {
    pub fn project(state: &SessionState) -> Self {
        let latest_scores = state.latest_evidence().map(|ev| LatestScores {
            policy_adherence: ev.get(Dimension::PolicyAdherence).score,
            empathy_index: ev.get(Dimension::EmpathyIndex).score,
            completeness: ev.get(Dimension::Completeness).score,
            escalation_judgment: ev.get(Dimension::EscalationJudgment).score,
            time_efficiency: ev.get(Dimension::TimeEfficiency).score,
        });

        Self {
            session_id: state.id.clone(),
            status: state.status,
            turn: state.turn,
            progress: Progress {
                completed: state.completed_steps.len(),
                total: state.required_steps.len(),
                percent: state.progress_ratio() * 100.0,
            },
            latest_scores,
            critical_error_count: state.critical_errors.len(),
            completion_reason: state.completion_reason,
            duration_secs: (state.updated_at - state.created_at).num_seconds(),
        }
    }
}
