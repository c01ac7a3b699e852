//! 必做步骤判定
//!
//! 每个步骤由「维度相关的关键词 + 分数阈值」首次满足即记完成；
//! 完成集合只做并集，永不回退（单调不变量由 SessionState 保证）。

use crate::scenario::Scenario;
use crate::scoring::types::{Dimension, TurnEvidence};
use crate::scoring::vocab::Vocabulary;

/// 步骤类别：由标签推断，决定用哪套关键词与哪个维度的阈值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepKind {
    Apologize,
    Acknowledge,
    Verify,
    Escalate,
    Resolve,
    Other,
}

fn classify(label: &str) -> StepKind {
    let lower = label.to_lowercase();
    if lower.contains("apolog") {
        StepKind::Apologize
    } else if lower.contains("acknowledge") || lower.contains("listen") {
        StepKind::Acknowledge
    } else if lower.contains("verify") || lower.contains("confirm") || lower.contains("check") {
        StepKind::Verify
    } else if lower.contains("escalat") || lower.contains("supervisor") {
        StepKind::Escalate
    } else if lower.contains("resol") || lower.contains("offer") || lower.contains("solution") {
        StepKind::Resolve
    } else {
        StepKind::Other
    }
}

/// 通用兜底：标签拆词后过半出现在文本中
fn label_overlap(label: &str, text: &str) -> bool {
    let lower = text.to_lowercase();
    let words: Vec<&str> = label.split_whitespace().filter(|w| w.len() > 3).collect();
    if words.is_empty() {
        return false;
    }
    let hits = words.iter().filter(|w| lower.contains(&w.to_lowercase())).count();
    hits * 2 >= words.len()
}

/// 单步骤是否在本轮满足
fn step_satisfied(
    label: &str,
    text: &str,
    evidence: &TurnEvidence,
    vocab: &Vocabulary,
) -> bool {
    match classify(label) {
        StepKind::Apologize => {
            Vocabulary::matches_any(text, &vocab.apology_keywords)
                && evidence.get(Dimension::EmpathyIndex).score > 60
        }
        StepKind::Acknowledge => {
            Vocabulary::matches_any(text, &vocab.acknowledgment_keywords)
                && evidence.get(Dimension::EmpathyIndex).score > 40
        }
        StepKind::Verify => {
            Vocabulary::matches_any(text, &vocab.verification_keywords)
                && evidence.get(Dimension::Completeness).score > 50
        }
        StepKind::Escalate => {
            Vocabulary::matches_any(text, &vocab.escalation_keywords)
                && evidence.get(Dimension::EscalationJudgment).score > 50
        }
        StepKind::Resolve => {
            Vocabulary::matches_any(text, &vocab.resolution_keywords)
                && evidence.get(Dimension::Completeness).score > 50
        }
        StepKind::Other => {
            label_overlap(label, text) && evidence.get(Dimension::Completeness).score > 60
        }
    }
}

/// 本轮新满足的步骤（只看尚未完成的）
pub fn detect_completed_steps(
    trainee_text: &str,
    evidence: &TurnEvidence,
    scenario: &Scenario,
    already_completed: &[String],
    vocab: &Vocabulary,
) -> Vec<String> {
    scenario
        .required_steps
        .iter()
        .filter(|s| !already_completed.contains(s))
        .filter(|s| step_satisfied(s, trainee_text, evidence, vocab))
        .cloned()
        .collect()
}
