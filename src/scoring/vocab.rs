//! 关键词词表
//!
//! 情绪判定、步骤判定与关键错误匹配用到的全部词表集中在此，
//! 是可替换配置而非业务逻辑：阈值、单调性、钳制规则不依赖具体词条。

use std::collections::HashMap;

use crate::config::ScoringSection;

/// 全部词表（内置默认，可由配置覆盖部分字段）
#[derive(Debug, Clone)]
pub struct Vocabulary {
    /// 「情绪外露」人设特质：命中则基础情绪强度 +0.2
    pub expressive_traits: Vec<String>,
    /// 负面情绪阶段名（共情阈值类关键错误判定用）
    pub negative_emotions: Vec<String>,
    /// 情绪充能词：隐藏动机含这些词视为 emotionally charged，高强度时优先透露
    pub charged_words: Vec<String>,
    /// 各情绪阶段的触发/一致性词表
    pub emotion_words: HashMap<String, Vec<String>>,
    /// 步骤判定关键词
    pub apology_keywords: Vec<String>,
    pub acknowledgment_keywords: Vec<String>,
    pub verification_keywords: Vec<String>,
    pub escalation_keywords: Vec<String>,
    pub resolution_keywords: Vec<String>,
    /// 关键错误语义模式：指责 / 拒绝 / 无依据承诺
    pub blaming_phrases: Vec<String>,
    pub refusal_phrases: Vec<String>,
    pub unverified_claim_phrases: Vec<String>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for Vocabulary {
    fn default() -> Self {
        let mut emotion_words = HashMap::new();
        emotion_words.insert(
            "curious".to_string(),
            words(&["wonder", "question", "how", "why", "what"]),
        );
        emotion_words.insert(
            "concerned".to_string(),
            words(&["worried", "concern", "problem", "issue", "hope"]),
        );
        emotion_words.insert(
            "frustrated".to_string(),
            words(&["ridiculous", "unacceptable", "again", "still", "enough"]),
        );
        emotion_words.insert(
            "angry".to_string(),
            words(&["outrageous", "demand", "now", "manager", "never"]),
        );
        emotion_words.insert(
            "satisfied".to_string(),
            words(&["thank", "appreciate", "great", "relieved", "good"]),
        );

        Self {
            expressive_traits: words(&[
                "impatient",
                "dramatic",
                "hot-tempered",
                "volatile",
                "anxious",
                "emotional",
                "passionate",
                "expressive",
            ]),
            negative_emotions: words(&[
                "angry",
                "frustrated",
                "upset",
                "annoyed",
                "irritated",
                "furious",
                "anxious",
                "distressed",
            ]),
            charged_words: words(&[
                "angry", "furious", "upset", "afraid", "worried", "flight", "before",
                "apology", "overcharged", "again",
            ]),
            emotion_words,
            apology_keywords: words(&["sorry", "apologize", "apologies", "regret"]),
            acknowledgment_keywords: words(&[
                "understand",
                "i see",
                "i hear",
                "acknowledge",
                "that sounds",
            ]),
            verification_keywords: words(&[
                "verify", "confirm", "check", "look up", "pull up", "account", "records",
            ]),
            escalation_keywords: words(&[
                "escalate",
                "supervisor",
                "manager",
                "transfer",
                "specialist",
            ]),
            resolution_keywords: words(&[
                "refund", "resolve", "fix", "credit", "arrange", "offer", "solution",
            ]),
            blaming_phrases: words(&[
                "your fault",
                "you should have",
                "you must have",
                "you caused",
                "that's on you",
            ]),
            refusal_phrases: words(&[
                "can't help",
                "cannot help",
                "not my problem",
                "nothing i can do",
                "won't do that",
            ]),
            unverified_claim_phrases: words(&[
                "i guarantee",
                "definitely will",
                "promise you the refund",
                "certainly get your money",
            ]),
        }
    }
}

impl Vocabulary {
    /// 内置默认 + 配置覆盖
    pub fn from_config(section: &ScoringSection) -> Self {
        let mut vocab = Self::default();
        if let Some(ref t) = section.expressive_traits {
            vocab.expressive_traits = t.clone();
        }
        if let Some(ref n) = section.negative_emotions {
            vocab.negative_emotions = n.clone();
        }
        if let Some(ref a) = section.apology_keywords {
            vocab.apology_keywords = a.clone();
        }
        vocab
    }

    /// 文本是否命中词表中任一词条（大小写不敏感）
    pub fn matches_any(text: &str, keywords: &[String]) -> bool {
        let lower = text.to_lowercase();
        keywords.iter().any(|k| lower.contains(&k.to_lowercase()))
    }

    /// 命中的词条数
    pub fn match_count(text: &str, keywords: &[String]) -> usize {
        let lower = text.to_lowercase();
        keywords
            .iter()
            .filter(|k| lower.contains(&k.to_lowercase()))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_any_case_insensitive() {
        let v = Vocabulary::default();
        assert!(Vocabulary::matches_any("I APOLOGIZE for this", &v.apology_keywords));
        assert!(!Vocabulary::matches_any("hello there", &v.apology_keywords));
    }

    #[test]
    fn test_config_override() {
        let section = ScoringSection {
            apology_keywords: Some(vec!["perdón".to_string()]),
            ..Default::default()
        };
        let v = Vocabulary::from_config(&section);
        assert!(Vocabulary::matches_any("mil perdón", &v.apology_keywords));
        assert!(!Vocabulary::matches_any("sorry", &v.apology_keywords));
        // 未覆盖字段保持默认
        assert!(!v.negative_emotions.is_empty());
    }
}
