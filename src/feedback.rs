//! 复盘反馈聚合
//!
//! 会话转入 complete 时恰好执行一次：加权总分、字母等级、分维度趋势、
//! 弱项建议与完成摘要。LLM 叙述是锦上添花——生成失败时退回纯数值报告，
//! 完成的会话绝不缺反馈。

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::warn;

use crate::conversation::Message;
use crate::llm::LlmClient;
use crate::scoring::{Dimension, TurnEvidence};
use crate::session::error::TrainingError;
use crate::session::state::{CompletionReason, SessionState};

/// 趋势判定的均值差阈值
const TREND_MARGIN: f64 = 5.0;
/// 少于此快照数一律报 Stable
const TREND_MIN_SNAPSHOTS: usize = 3;
/// 建议触发线：维度均分低于此值
const RECOMMENDATION_CUTOFF: f64 = 70.0;
/// 强项线：维度均分不低于此值
const STRENGTH_CUTOFF: f64 = 80.0;

/// 分维度趋势
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

/// 建议优先级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    High,
    Normal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: Priority,
    pub text: String,
}

/// 完成摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionSummary {
    pub steps_completed: usize,
    pub steps_total: usize,
    pub critical_error_count: usize,
    pub turns: u32,
    pub reason: Option<CompletionReason>,
}

/// 复盘报告（构建后不可变）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackReport {
    pub overall_score: f64,
    pub grade: char,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub trends: Vec<(Dimension, Trend)>,
    pub recommendations: Vec<Recommendation>,
    pub summary: CompletionSummary,
    /// LLM 叙述；生成失败时为 None（纯数值报告）
    pub narrative: Option<String>,
    /// 兜底资源清单
    pub resources: Vec<String>,
}

/// 单维度趋势：前后半均值对比，差距超过阈值才偏离 Stable
pub fn dimension_trend(scores: &[u8]) -> Trend {
    if scores.len() < TREND_MIN_SNAPSHOTS {
        return Trend::Stable;
    }
    let mid = scores.len() / 2;
    let first: f64 = scores[..mid].iter().map(|&s| s as f64).sum::<f64>() / mid as f64;
    let second_len = scores.len() - mid;
    let second: f64 = scores[mid..].iter().map(|&s| s as f64).sum::<f64>() / second_len as f64;
    if second - first > TREND_MARGIN {
        Trend::Improving
    } else if first - second > TREND_MARGIN {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

fn dimension_series(history: &[TurnEvidence], dim: Dimension) -> Vec<u8> {
    history.iter().map(|ev| ev.get(dim).score).collect()
}

fn dimension_average(history: &[TurnEvidence], dim: Dimension) -> f64 {
    if history.is_empty() {
        return 0.0;
    }
    history.iter().map(|ev| ev.get(dim).score as f64).sum::<f64>() / history.len() as f64
}

fn grade_for(score: f64) -> char {
    if score >= 90.0 {
        'A'
    } else if score >= 80.0 {
        'B'
    } else if score >= 70.0 {
        'C'
    } else if score >= 60.0 {
        'D'
    } else {
        'F'
    }
}

fn recommendation_text(dim: Dimension) -> String {
    let tip = match dim {
        Dimension::PolicyAdherence => "review the policy excerpts before promising outcomes",
        Dimension::EmpathyIndex => "acknowledge the guest's feelings before moving to fixes",
        Dimension::Completeness => "cover every required step before closing the conversation",
        Dimension::EscalationJudgment => "practice recognizing when a supervisor should take over",
        Dimension::TimeEfficiency => "keep replies focused on the next concrete action",
    };
    format!("Work on {}: {}", dim.display_name(), tip)
}

/// 反馈聚合器
pub struct FeedbackAggregator {
    llm: Arc<dyn LlmClient>,
    request_timeout: Duration,
}

impl FeedbackAggregator {
    pub fn new(llm: Arc<dyn LlmClient>, request_timeout: Duration) -> Self {
        Self {
            llm,
            request_timeout,
        }
    }

    /// 构建复盘报告；数值部分确定性计算，叙述失败只丢叙述
    pub async fn aggregate(&self, state: &SessionState) -> FeedbackReport {
        let history = &state.score_history;

        let overall: f64 = Dimension::ALL
            .iter()
            .map(|d| dimension_average(history, *d) * d.weight())
            .sum();

        let mut strengths = Vec::new();
        let mut weaknesses = Vec::new();
        let mut trends = Vec::new();
        let mut recommendations = Vec::new();

        for dim in Dimension::ALL {
            let avg = dimension_average(history, dim);
            trends.push((dim, dimension_trend(&dimension_series(history, dim))));
            if avg >= STRENGTH_CUTOFF {
                strengths.push(format!("{} averaged {:.0}", dim.display_name(), avg));
            } else if avg < RECOMMENDATION_CUTOFF {
                weaknesses.push(format!("{} averaged {:.0}", dim.display_name(), avg));
                recommendations.push(Recommendation {
                    priority: Priority::Normal,
                    text: recommendation_text(dim),
                });
            }
        }

        // 任一关键错误都值得一条高优建议，排在最前
        if !state.critical_errors.is_empty() {
            let labels: Vec<&str> = state
                .critical_errors
                .iter()
                .map(|c| c.label.as_str())
                .collect();
            recommendations.insert(
                0,
                Recommendation {
                    priority: Priority::High,
                    text: format!(
                        "Critical errors occurred ({}). Revisit the scenario guidelines before the next session.",
                        labels.join(", ")
                    ),
                },
            );
        }

        if history.is_empty() {
            recommendations.push(Recommendation {
                priority: Priority::Normal,
                text: "Complete at least one full exchange to receive a detailed evaluation."
                    .to_string(),
            });
        }

        let summary = CompletionSummary {
            steps_completed: state.completed_steps.len(),
            steps_total: state.required_steps.len(),
            critical_error_count: state.critical_errors.len(),
            turns: state.turn,
            reason: state.completion_reason,
        };

        let narrative = match self.generate_narrative(state, overall).await {
            Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "feedback narrative generation failed, numeric report only");
                None
            }
        };

        FeedbackReport {
            overall_score: overall,
            grade: grade_for(overall),
            strengths,
            weaknesses,
            trends,
            recommendations,
            summary,
            narrative,
            resources: vec![
                "service-recovery playbook".to_string(),
                "escalation decision guide".to_string(),
            ],
        }
    }

    async fn generate_narrative(
        &self,
        state: &SessionState,
        overall: f64,
    ) -> Result<String, TrainingError> {
        let prompt = format!(
            "Write 3-4 sentences of coaching feedback for a customer-service trainee.\n\
             Overall score: {:.0}/100. Steps completed: {}/{}. Critical errors: {}.\n\
             Be specific and encouraging; address the trainee directly.",
            overall,
            state.completed_steps.len(),
            state.required_steps.len(),
            state.critical_errors.len()
        );
        let messages = vec![Message::system(prompt)];
        timeout(self.request_timeout, self.llm.complete(&messages))
            .await
            .map_err(|_| TrainingError::Generation("feedback request timed out".to_string()))?
            .map_err(TrainingError::Generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{FailingLlmClient, ScriptedLlmClient};
    use crate::scenario::fallback_scenario;
    use crate::session::state::SessionState;

    fn evidence_with(score: u8) -> TurnEvidence {
        let mut ev = TurnEvidence::unavailable();
        ev.policy_adherence.score = score;
        ev.empathy_index.score = score;
        ev.completeness.score = score;
        ev.escalation_judgment.score = score;
        ev.time_efficiency.score = score;
        ev
    }

    fn state_with_scores(scores: &[u8]) -> SessionState {
        let mut state = SessionState::new("user1".to_string());
        state.required_steps = fallback_scenario().required_steps;
        for &s in scores {
            state.score_history.push(evidence_with(s));
            state.turn += 1;
        }
        state
    }

    #[test]
    fn test_trend_improving() {
        // 前半均值 45，后半均值 85，差 > 5
        assert_eq!(dimension_trend(&[40, 45, 50, 80, 85, 90]), Trend::Improving);
    }

    #[test]
    fn test_trend_declining_and_stable() {
        assert_eq!(dimension_trend(&[90, 85, 80, 50, 45, 40]), Trend::Declining);
        assert_eq!(dimension_trend(&[70, 71, 72, 70, 69, 71]), Trend::Stable);
    }

    #[test]
    fn test_trend_needs_three_snapshots() {
        assert_eq!(dimension_trend(&[10, 90]), Trend::Stable);
        assert_eq!(dimension_trend(&[]), Trend::Stable);
    }

    #[test]
    fn test_grades() {
        assert_eq!(grade_for(95.0), 'A');
        assert_eq!(grade_for(80.0), 'B');
        assert_eq!(grade_for(72.5), 'C');
        assert_eq!(grade_for(61.0), 'D');
        assert_eq!(grade_for(30.0), 'F');
    }

    #[tokio::test]
    async fn test_numeric_report_when_llm_fails() {
        let agg = FeedbackAggregator::new(Arc::new(FailingLlmClient), Duration::from_secs(1));
        let state = state_with_scores(&[60, 60, 60]);
        let report = agg.aggregate(&state).await;
        assert!(report.narrative.is_none());
        assert!((report.overall_score - 60.0).abs() < 1e-9);
        assert_eq!(report.grade, 'D');
        // 全维度低于 70：每个维度都有一条建议
        assert_eq!(report.recommendations.len(), 5);
        assert!(!report.resources.is_empty());
    }

    #[tokio::test]
    async fn test_narrative_attached_on_success() {
        let agg = FeedbackAggregator::new(
            Arc::new(ScriptedLlmClient::new(vec!["Solid work overall.".to_string()])),
            Duration::from_secs(1),
        );
        let state = state_with_scores(&[85, 85, 85]);
        let report = agg.aggregate(&state).await;
        assert_eq!(report.narrative.as_deref(), Some("Solid work overall."));
        assert_eq!(report.grade, 'B');
        assert_eq!(report.strengths.len(), 5);
        assert!(report.recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_critical_error_adds_high_priority_first() {
        let agg = FeedbackAggregator::new(Arc::new(FailingLlmClient), Duration::from_secs(1));
        let mut state = state_with_scores(&[75, 75, 75]);
        state.critical_errors.push(crate::scoring::CriticalError {
            label: "blame the customer".to_string(),
            detail: "matched".to_string(),
            turn: 2,
        });
        let report = agg.aggregate(&state).await;
        assert_eq!(report.recommendations[0].priority, Priority::High);
    }

    #[tokio::test]
    async fn test_empty_history_still_produces_report() {
        let agg = FeedbackAggregator::new(Arc::new(FailingLlmClient), Duration::from_secs(1));
        let state = state_with_scores(&[]);
        let report = agg.aggregate(&state).await;
        assert_eq!(report.overall_score, 0.0);
        assert_eq!(report.grade, 'F');
        assert!(!report.recommendations.is_empty());
    }
}
