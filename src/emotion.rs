//! 情绪弧引擎
//!
//! 纯函数：人设 + 当前轮数 + 对话长度 → 当前情绪、强度与透露策略。
//! 每轮重算、从不持久化；相同输入必得相同输出（可测不变量）。

use serde::{Deserialize, Serialize};

use crate::scenario::Persona;
use crate::scoring::Vocabulary;

/// 走完整条情绪弧的期望轮数
pub const EXPECTED_ARC_TURNS: u32 = 8;

/// 基础情绪强度
const BASE_INTENSITY: f32 = 0.5;
/// 「情绪外露」特质加成
const EXPRESSIVE_BONUS: f32 = 0.2;
/// 对话拖长后的累积加成上限
const LENGTH_BONUS_CAP: f32 = 0.3;
/// 超过此对话长度后每条消息的累积加成
const LENGTH_BONUS_PER_MSG: f32 = 0.05;
/// 累积加成起算的对话长度
const LENGTH_BONUS_START: usize = 5;
/// 高于此强度时优先透露情绪充能的事实
const CHARGED_REVEAL_THRESHOLD: f32 = 0.6;

/// 派生情绪状态（每轮重算，不存储）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalState {
    /// 当前情绪：人设情绪弧中的一个阶段
    pub emotion: String,
    /// 强度 [0,1]
    pub intensity: f32,
    /// 当前情绪的触发关键词
    pub triggers: Vec<String>,
}

/// 计算当前情绪状态
///
/// 弧位置 = floor(turn_count / EXPECTED_ARC_TURNS × 阶段数)，钳到最后一个阶段。
/// 强度 = 0.5 基础 + 0.2 外露特质加成 + 对话超过 5 条后线性累积（上限 0.3），钳到 1.0。
pub fn emotional_state(
    persona: &Persona,
    turn_count: u32,
    history_len: usize,
    vocab: &Vocabulary,
) -> EmotionalState {
    let stages = persona.arc.len();
    debug_assert!(stages > 0, "persona arc must be validated before use");
    let position = ((turn_count as usize * stages) / EXPECTED_ARC_TURNS as usize).min(stages - 1);
    let emotion = persona.arc[position].clone();

    let mut intensity = BASE_INTENSITY;
    let expressive = persona
        .traits
        .iter()
        .any(|t| Vocabulary::matches_any(t, &vocab.expressive_traits));
    if expressive {
        intensity += EXPRESSIVE_BONUS;
    }
    if history_len > LENGTH_BONUS_START {
        let accumulated = (history_len - LENGTH_BONUS_START) as f32 * LENGTH_BONUS_PER_MSG;
        intensity += accumulated.min(LENGTH_BONUS_CAP);
    }
    intensity = intensity.min(1.0);

    let triggers = vocab
        .emotion_words
        .get(&emotion.to_lowercase())
        .cloned()
        .unwrap_or_default();

    EmotionalState {
        emotion,
        intensity,
        triggers,
    }
}

/// 本轮透露计划：最多 floor(intensity × 2) + 1 条未透露事实
///
/// 稳定排序：强度超过阈值时情绪充能的事实排前，其余保持人设原序。
pub fn reveal_plan(
    persona: &Persona,
    state: &EmotionalState,
    already_revealed: &[String],
    vocab: &Vocabulary,
) -> Vec<String> {
    let max_reveals = (state.intensity * 2.0).floor() as usize + 1;

    let mut candidates: Vec<String> = persona
        .hidden_motivations
        .iter()
        .filter(|m| !already_revealed.contains(m))
        .cloned()
        .collect();

    if state.intensity > CHARGED_REVEAL_THRESHOLD {
        // Vec::sort_by_key 是稳定排序：充能事实整体前移，组内保持原序
        candidates.sort_by_key(|m| !Vocabulary::matches_any(m, &vocab.charged_words));
    }

    candidates.truncate(max_reveals);
    candidates
}
