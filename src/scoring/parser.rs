//! 评分输出解析
//!
//! LLM 被要求输出五个带标签的 SCORE/EVIDENCE/ISSUES 块；每个维度独立解析，
//! 单维度失败只让该维度落到 50 分默认值，不拖垮整轮。
//! 钳制集中在 clamp_score：入库分数不可能越出 [0,100]（必守不变量）。

use crate::scoring::types::{Dimension, DimensionScore, TurnEvidence};

/// 任意整数 → [0,100]
pub fn clamp_score(raw: i64) -> u8 {
    raw.clamp(0, 100) as u8
}

/// 行内第一个整数（允许负号）
fn first_int(text: &str) -> Option<i64> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() || (bytes[i] == b'-' && bytes.get(i + 1).is_some_and(|b| b.is_ascii_digit())) {
            let start = i;
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            return text[start..i].parse().ok();
        }
        i += 1;
    }
    None
}

/// 大小写不敏感的前缀剥离；前缀为纯 ASCII，切片只按原串字节走，
/// 多字节文本（连字等）不会切在字符中间
fn strip_prefix_ci<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&line[prefix.len()..])
    } else {
        None
    }
}

fn is_dimension_line(line: &str) -> bool {
    let trimmed = line.trim();
    Dimension::ALL
        .iter()
        .any(|d| strip_prefix_ci(trimmed, d.label()).is_some())
}

/// 分号分隔的条目列表；"none" / 空串视为无条目
fn split_items(text: &str) -> Vec<String> {
    text.split(';')
        .map(|s| s.trim().trim_matches('.').to_string())
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("none"))
        .collect()
}

/// 解析单个维度块；找不到标签或分数行无数字 → 默认 50 + 标记
fn parse_dimension(lines: &[&str], dim: Dimension) -> DimensionScore {
    let label = dim.label();
    let start = lines
        .iter()
        .position(|l| strip_prefix_ci(l.trim(), label).is_some());
    let Some(start) = start else {
        return DimensionScore::unavailable();
    };

    let Some(raw) = first_int(lines[start]) else {
        return DimensionScore::unavailable();
    };

    let mut evidence = Vec::new();
    let mut issues = Vec::new();
    for line in lines.iter().skip(start + 1) {
        if is_dimension_line(line) {
            break;
        }
        let trimmed = line.trim();
        if let Some(rest) = strip_prefix_ci(trimmed, "EVIDENCE:") {
            evidence = split_items(rest);
        } else if let Some(rest) = strip_prefix_ci(trimmed, "ISSUES:") {
            issues = split_items(rest);
        }
    }

    DimensionScore {
        score: clamp_score(raw),
        evidence,
        issues,
        parsed: true,
    }
}

/// 解析整轮评分输出（五维独立，互不影响）
pub fn parse_turn_evidence(output: &str) -> TurnEvidence {
    let lines: Vec<&str> = output.lines().collect();
    TurnEvidence {
        policy_adherence: parse_dimension(&lines, Dimension::PolicyAdherence),
        empathy_index: parse_dimension(&lines, Dimension::EmpathyIndex),
        completeness: parse_dimension(&lines, Dimension::Completeness),
        escalation_judgment: parse_dimension(&lines, Dimension::EscalationJudgment),
        time_efficiency: parse_dimension(&lines, Dimension::TimeEfficiency),
    }
}
