//! 完成策略引擎
//!
//! 纯函数：累积状态 → 继续 / 终止 + 原因。按固定优先级短路求值：
//! 正确性（步骤全完成）> 失败（关键错误累计）> 资源耗尽（轮数上限）> 软启发（自然收尾）。
//! 多条件同时成立时只记优先级最高的原因。

use crate::config::SessionSection;
use crate::session::state::{CompletionReason, SessionState};

/// 完成策略参数（来自 [session] 配置段）
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    pub max_turns: u32,
    pub critical_error_threshold: usize,
    pub natural_close_min_turns: u32,
    pub natural_close_ratio: f64,
}

impl From<&SessionSection> for SessionPolicy {
    fn from(section: &SessionSection) -> Self {
        Self {
            max_turns: section.max_turns,
            critical_error_threshold: section.critical_error_threshold,
            natural_close_min_turns: section.natural_close_min_turns,
            natural_close_ratio: section.natural_close_ratio,
        }
    }
}

impl Default for SessionPolicy {
    fn default() -> Self {
        (&SessionSection::default()).into()
    }
}

/// 评估是否终止；None 表示继续
pub fn decide(state: &SessionState, policy: &SessionPolicy) -> Option<CompletionReason> {
    if !state.required_steps.is_empty()
        && state.completed_steps.len() >= state.required_steps.len()
    {
        return Some(CompletionReason::AllStepsCompleted);
    }
    if state.critical_errors.len() >= policy.critical_error_threshold {
        return Some(CompletionReason::CriticalErrorThreshold);
    }
    if state.turn >= policy.max_turns {
        return Some(CompletionReason::MaxTurnsReached);
    }
    if state.progress_ratio() >= policy.natural_close_ratio
        && state.turn >= policy.natural_close_min_turns
    {
        return Some(CompletionReason::NaturalConclusion);
    }
    None
}
