//! 评分维度与证据类型
//!
//! 五个维度各自持有分数、正向证据与负向条目；解析是否成功用显式标志记录，
//! 状态机永远不碰原始 LLM 文本。

use serde::{Deserialize, Serialize};

/// 评分维度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    PolicyAdherence,
    EmpathyIndex,
    Completeness,
    EscalationJudgment,
    TimeEfficiency,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::PolicyAdherence,
        Dimension::EmpathyIndex,
        Dimension::Completeness,
        Dimension::EscalationJudgment,
        Dimension::TimeEfficiency,
    ];

    /// 提示与解析用标签
    pub fn label(&self) -> &'static str {
        match self {
            Dimension::PolicyAdherence => "POLICY_ADHERENCE",
            Dimension::EmpathyIndex => "EMPATHY_INDEX",
            Dimension::Completeness => "COMPLETENESS",
            Dimension::EscalationJudgment => "ESCALATION_JUDGMENT",
            Dimension::TimeEfficiency => "TIME_EFFICIENCY",
        }
    }

    /// 复盘加权：policy 0.25 / empathy 0.20 / completeness 0.25 / escalation 0.15 / time 0.15
    pub fn weight(&self) -> f64 {
        match self {
            Dimension::PolicyAdherence => 0.25,
            Dimension::EmpathyIndex => 0.20,
            Dimension::Completeness => 0.25,
            Dimension::EscalationJudgment => 0.15,
            Dimension::TimeEfficiency => 0.15,
        }
    }

    /// 该维度的负向条目叫什么
    pub fn issue_label(&self) -> &'static str {
        match self {
            Dimension::PolicyAdherence => "violation",
            Dimension::EmpathyIndex => "missed opportunity",
            Dimension::Completeness => "missing element",
            Dimension::EscalationJudgment => "inappropriate action",
            Dimension::TimeEfficiency => "inefficiency",
        }
    }

    /// 人类可读名（反馈报告用）
    pub fn display_name(&self) -> &'static str {
        match self {
            Dimension::PolicyAdherence => "policy adherence",
            Dimension::EmpathyIndex => "empathy",
            Dimension::Completeness => "completeness",
            Dimension::EscalationJudgment => "escalation judgment",
            Dimension::TimeEfficiency => "time efficiency",
        }
    }
}

/// 单维度评分与证据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionScore {
    /// 分数 [0,100]（入库前统一钳制）
    pub score: u8,
    /// 正向证据
    pub evidence: Vec<String>,
    /// 负向条目（violation / missed opportunity / ...，按维度而定）
    pub issues: Vec<String>,
    /// 解析成功 or 默认值兜底
    pub parsed: bool,
}

impl DimensionScore {
    /// 解析失败时的默认：50 分 + 「analysis unavailable」标记
    pub fn unavailable() -> Self {
        Self {
            score: 50,
            evidence: vec!["analysis unavailable".to_string()],
            issues: Vec::new(),
            parsed: false,
        }
    }
}

/// 一轮的完整评分证据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnEvidence {
    pub policy_adherence: DimensionScore,
    pub empathy_index: DimensionScore,
    pub completeness: DimensionScore,
    pub escalation_judgment: DimensionScore,
    pub time_efficiency: DimensionScore,
}

impl TurnEvidence {
    /// 全维度解析失败时的兜底证据（不让任何一轮缺快照）
    pub fn unavailable() -> Self {
        Self {
            policy_adherence: DimensionScore::unavailable(),
            empathy_index: DimensionScore::unavailable(),
            completeness: DimensionScore::unavailable(),
            escalation_judgment: DimensionScore::unavailable(),
            time_efficiency: DimensionScore::unavailable(),
        }
    }

    pub fn get(&self, dim: Dimension) -> &DimensionScore {
        match dim {
            Dimension::PolicyAdherence => &self.policy_adherence,
            Dimension::EmpathyIndex => &self.empathy_index,
            Dimension::Completeness => &self.completeness,
            Dimension::EscalationJudgment => &self.escalation_judgment,
            Dimension::TimeEfficiency => &self.time_efficiency,
        }
    }

    /// 本轮加权分
    pub fn weighted(&self) -> f64 {
        Dimension::ALL
            .iter()
            .map(|d| self.get(*d).score as f64 * d.weight())
            .sum()
    }
}

/// 关键错误记录（append-only，计入提前终止）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriticalError {
    /// 情景定义的错误标签，或阈值规则名
    pub label: String,
    /// 触发说明
    pub detail: String,
    /// 发生在第几轮
    pub turn: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_sum_to_one() {
        let total: f64 = Dimension::ALL.iter().map(|d| d.weight()).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unavailable_marker() {
        let d = DimensionScore::unavailable();
        assert_eq!(d.score, 50);
        assert!(!d.parsed);
        assert_eq!(d.evidence[0], "analysis unavailable");
    }

    #[test]
    fn test_weighted_turn_score() {
        let mut ev = TurnEvidence::unavailable();
        ev.policy_adherence.score = 100;
        ev.empathy_index.score = 100;
        ev.completeness.score = 100;
        ev.escalation_judgment.score = 100;
        ev.time_efficiency.score = 100;
        assert!((ev.weighted() - 100.0).abs() < 1e-9);
    }
}
