//! 关键错误判定
//!
//! 两条路径：情景标签匹配（手写语义模式 + 通用关键词重叠兜底）
//! 与阈值规则（低分 + 对应负向条目）。同一标签一轮最多记一次。

use crate::scenario::{Persona, Scenario};
use crate::scoring::types::{CriticalError, TurnEvidence};
use crate::scoring::vocab::Vocabulary;

/// policy_adherence 低于此值且有 violation 记录时视为关键错误
const POLICY_BREAKDOWN_SCORE: u8 = 30;
/// escalation_judgment 低于此值且有 inappropriate action 记录时视为关键错误
const ESCALATION_MISJUDGMENT_SCORE: u8 = 20;
/// empathy_index 低于此值且人设情绪弧含负面阶段时视为关键错误
const EMPATHY_FAILURE_SCORE: u8 = 15;

/// 情景标签的语义模式：常见失误说法（指责 / 拒绝 / 无依据承诺）
fn semantic_patterns<'a>(label: &str, vocab: &'a Vocabulary) -> Option<&'a [String]> {
    let lower = label.to_lowercase();
    if lower.contains("blame") {
        Some(&vocab.blaming_phrases)
    } else if lower.contains("refuse") || lower.contains("refusal") {
        Some(&vocab.refusal_phrases)
    } else if lower.contains("unverified") || lower.contains("promise") {
        Some(&vocab.unverified_claim_phrases)
    } else {
        None
    }
}

/// 通用兜底：标签拆词后过半出现在学员文本中
fn keyword_overlap(label: &str, text: &str) -> bool {
    let lower = text.to_lowercase();
    let words: Vec<&str> = label
        .split_whitespace()
        .filter(|w| w.len() > 3)
        .collect();
    if words.is_empty() {
        return false;
    }
    let hits = words
        .iter()
        .filter(|w| lower.contains(&w.to_lowercase()))
        .count();
    hits * 2 >= words.len()
}

/// 判定本轮的关键错误
pub fn detect_critical_errors(
    trainee_text: &str,
    evidence: &TurnEvidence,
    scenario: &Scenario,
    persona: &Persona,
    turn: u32,
    vocab: &Vocabulary,
) -> Vec<CriticalError> {
    let mut errors = Vec::new();

    for label in &scenario.critical_errors {
        let matched = match semantic_patterns(label, vocab) {
            Some(patterns) => Vocabulary::matches_any(trainee_text, patterns),
            None => keyword_overlap(label, trainee_text),
        };
        if matched {
            errors.push(CriticalError {
                label: label.clone(),
                detail: "trainee message matched scenario-defined failure".to_string(),
                turn,
            });
        }
    }

    if evidence.policy_adherence.score < POLICY_BREAKDOWN_SCORE
        && !evidence.policy_adherence.issues.is_empty()
    {
        errors.push(CriticalError {
            label: "policy breakdown".to_string(),
            detail: format!(
                "policy adherence {} with violation: {}",
                evidence.policy_adherence.score, evidence.policy_adherence.issues[0]
            ),
            turn,
        });
    }

    if evidence.escalation_judgment.score < ESCALATION_MISJUDGMENT_SCORE
        && !evidence.escalation_judgment.issues.is_empty()
    {
        errors.push(CriticalError {
            label: "escalation misjudgment".to_string(),
            detail: format!(
                "escalation judgment {} with inappropriate action: {}",
                evidence.escalation_judgment.score, evidence.escalation_judgment.issues[0]
            ),
            turn,
        });
    }

    let has_negative_stage = persona
        .arc
        .iter()
        .any(|s| Vocabulary::matches_any(s, &vocab.negative_emotions));
    if evidence.empathy_index.score < EMPATHY_FAILURE_SCORE && has_negative_stage {
        errors.push(CriticalError {
            label: "empathy failure".to_string(),
            detail: format!(
                "empathy {} against a persona with a negative emotional stage",
                evidence.empathy_index.score
            ),
            turn,
        });
    }

    // 同一标签一轮只记一次
    errors.dedup_by(|a, b| a.label == b.label);
    errors
}
