//! 评分引擎
//!
//! 每个学员回合跑一次：检索政策上下文（失败降级为空）→ LLM 产出五维评分块 →
//! 独立解析并钳制 → 叠加确定性的关键错误与步骤判定。
//! 生成失败只兜底一次（全 50 分证据），不重试，保证回合时延有界。

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use crate::conversation::{Message, Speaker, Transcript};
use crate::llm::LlmClient;
use crate::retrieval::{Passage, Retriever};
use crate::scenario::{Persona, Scenario};
use crate::scoring::critical::detect_critical_errors;
use crate::scoring::parser::parse_turn_evidence;
use crate::scoring::steps::detect_completed_steps;
use crate::scoring::types::{CriticalError, TurnEvidence};
use crate::scoring::vocab::Vocabulary;
use crate::session::error::TrainingError;

/// 喂给评分提示的历史窗口（消息条数）
const SCORING_HISTORY_MESSAGES: usize = 8;
/// 检索段落数
const RETRIEVAL_K: usize = 3;

/// 一轮评估的完整结果
#[derive(Debug, Clone)]
pub struct TurnAssessment {
    pub evidence: TurnEvidence,
    pub critical_errors: Vec<CriticalError>,
    /// 本轮新满足的步骤
    pub completed_steps: Vec<String>,
    /// 评分证据是否来自兜底（观测用）
    pub fallback: bool,
}

/// 评分引擎：持有 LLM、检索器与词表
pub struct ScoreEngine {
    llm: Arc<dyn LlmClient>,
    retriever: Arc<dyn Retriever>,
    request_timeout: Duration,
    vocab: Vocabulary,
}

impl ScoreEngine {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        retriever: Arc<dyn Retriever>,
        request_timeout: Duration,
        vocab: Vocabulary,
    ) -> Self {
        Self {
            llm,
            retriever,
            request_timeout,
            vocab,
        }
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    /// 评估学员最新一条消息；永不失败
    pub async fn assess(
        &self,
        trainee_text: &str,
        transcript: &Transcript,
        scenario: &Scenario,
        persona: &Persona,
        already_completed: &[String],
        turn: u32,
    ) -> TurnAssessment {
        let passages = self.retrieve_context(trainee_text, scenario).await;

        let (evidence, fallback) = match self.generate_evidence(trainee_text, transcript, scenario, &passages).await {
            Ok(output) => (parse_turn_evidence(&output), false),
            Err(e) => {
                warn!(turn, error = %e, "scoring generation failed, using neutral fallback evidence");
                (TurnEvidence::unavailable(), true)
            }
        };

        // 关键错误与步骤判定是确定性的：即便评分走了兜底也照常执行
        let critical_errors =
            detect_critical_errors(trainee_text, &evidence, scenario, persona, turn, &self.vocab);
        let completed_steps =
            detect_completed_steps(trainee_text, &evidence, scenario, already_completed, &self.vocab);

        debug!(
            turn,
            fallback,
            criticals = critical_errors.len(),
            new_steps = completed_steps.len(),
            "turn assessed"
        );

        TurnAssessment {
            evidence,
            critical_errors,
            completed_steps,
            fallback,
        }
    }

    /// 检索政策段落；失败降级为空列表（绝不致命）
    async fn retrieve_context(&self, trainee_text: &str, scenario: &Scenario) -> Vec<Passage> {
        let filters = vec![scenario.title.clone()];
        match self.retriever.retrieve(trainee_text, &filters, RETRIEVAL_K).await {
            Ok(passages) => passages,
            Err(e) => {
                let err = TrainingError::Retrieval(e);
                warn!(error = %err, "retrieval failed, proceeding without context");
                Vec::new()
            }
        }
    }

    async fn generate_evidence(
        &self,
        trainee_text: &str,
        transcript: &Transcript,
        scenario: &Scenario,
        passages: &[Passage],
    ) -> Result<String, TrainingError> {
        let history = transcript
            .last_turns(SCORING_HISTORY_MESSAGES)
            .iter()
            .map(|m| {
                let who = match m.speaker {
                    Speaker::Trainee => "TRAINEE",
                    Speaker::Guest => "GUEST",
                    Speaker::System => "SYSTEM",
                };
                format!("{}: {}", who, m.content)
            })
            .collect::<Vec<_>>()
            .join("\n");

        let context = if passages.is_empty() {
            String::new()
        } else {
            let mut block = String::from("Relevant policy excerpts:\n");
            for p in passages {
                block.push_str(&format!("- [{}] {}\n", p.source, p.text));
            }
            block
        };

        let prompt = format!(
            "You silently evaluate a customer-service trainee. Scenario: {} - {}\n\
             Required steps: {}\n{}\n\
             Recent conversation:\n{}\n\n\
             Evaluate ONLY the trainee's latest message:\n{}\n\n\
             Respond with exactly five blocks, one per dimension, in this format:\n\
             POLICY_ADHERENCE: <0-100>\nEVIDENCE: <item>; <item>\nISSUES: <violation or none>\n\
             EMPATHY_INDEX: <0-100>\nEVIDENCE: ...\nISSUES: <missed opportunity or none>\n\
             COMPLETENESS: <0-100>\nEVIDENCE: ...\nISSUES: <missing element or none>\n\
             ESCALATION_JUDGMENT: <0-100>\nEVIDENCE: ...\nISSUES: <inappropriate action or none>\n\
             TIME_EFFICIENCY: <0-100>\nEVIDENCE: ...\nISSUES: <inefficiency or none>",
            scenario.title,
            scenario.description,
            scenario.required_steps.join(", "),
            context,
            history,
            trainee_text
        );

        let messages = vec![Message::system(prompt)];
        timeout(self.request_timeout, self.llm.complete(&messages))
            .await
            .map_err(|_| TrainingError::Generation("scoring request timed out".to_string()))?
            .map_err(TrainingError::Generation)
    }
}
