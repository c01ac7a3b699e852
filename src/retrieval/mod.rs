//! 语义检索能力
//!
//! 评分与复盘提示的上下文增强：query 进、按相关度排序的段落出。
//! 检索失败不致命——调用侧统一降级为空段落列表继续流程。

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 检索到的段落
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    /// 来源标识（政策文档名等）
    pub source: String,
    /// 段落文本
    pub text: String,
    /// 相关度分数
    pub score: f32,
}

/// 检索能力 trait：query + 过滤词 → 排序段落
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(
        &self,
        query: &str,
        filters: &[String],
        k: usize,
    ) -> Result<Vec<Passage>, String>;
}

/// 关键词重叠检索：内置段落库按 Jaccard 相似度排序
///
/// 外部向量索引是产品侧的事；引擎内只需要一个确定性的检索实现托底。
pub struct KeywordRetriever {
    entries: Vec<(String, String)>,
}

impl KeywordRetriever {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// 预置客服政策段落
    pub fn with_default_policies() -> Self {
        let mut r = Self::new();
        r.add(
            "refund-policy",
            "Refunds require account verification before any amount is promised. \
             Never guarantee a refund outcome without supervisor approval.",
        );
        r.add(
            "service-recovery",
            "Acknowledge the issue, apologize sincerely, and offer a concrete next step. \
             Avoid blaming the customer for billing or booking mistakes.",
        );
        r.add(
            "escalation-guide",
            "Escalate to a supervisor when the customer requests it, when a policy \
             exception is needed, or after two failed resolution attempts.",
        );
        r
    }

    pub fn add(&mut self, source: impl Into<String>, text: impl Into<String>) {
        self.entries.push((source.into(), text.into()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for KeywordRetriever {
    fn default() -> Self {
        Self::with_default_policies()
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(String::from)
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let inter = a.intersection(b).count() as f32;
    let union = a.union(b).count() as f32;
    inter / union
}

#[async_trait]
impl Retriever for KeywordRetriever {
    async fn retrieve(
        &self,
        query: &str,
        filters: &[String],
        k: usize,
    ) -> Result<Vec<Passage>, String> {
        let mut query_tokens = tokenize(query);
        for f in filters {
            query_tokens.extend(tokenize(f));
        }

        let mut scored: Vec<Passage> = self
            .entries
            .iter()
            .map(|(source, text)| Passage {
                source: source.clone(),
                text: text.clone(),
                score: jaccard(&query_tokens, &tokenize(text)),
            })
            .filter(|p| p.score > 0.0)
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }
}

/// 空检索：始终返回空列表（检索能力不可用时的替身）
#[derive(Debug, Default)]
pub struct NoopRetriever;

#[async_trait]
impl Retriever for NoopRetriever {
    async fn retrieve(
        &self,
        _query: &str,
        _filters: &[String],
        _k: usize,
    ) -> Result<Vec<Passage>, String> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ranked_by_overlap() {
        let r = KeywordRetriever::with_default_policies();
        let results = r
            .retrieve("customer wants a refund for a billing mistake", &[], 2)
            .await
            .unwrap();
        assert!(!results.is_empty());
        assert!(results.len() <= 2);
        // 最相关的在前
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn test_no_overlap_returns_empty() {
        let r = KeywordRetriever::with_default_policies();
        let results = r.retrieve("zzz qqq xyzzy", &[], 3).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_noop() {
        let r = NoopRetriever;
        assert!(r.retrieve("anything", &[], 5).await.unwrap().is_empty());
    }
}
