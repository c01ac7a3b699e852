//! 会话编排引擎
//!
//! 把工厂、情绪弧、评分、客人生成、完成策略与反馈串成完整生命周期：
//! create（注册）→ start（情景/人设 + 开场白，转 active）→ 每轮
//! 评分 → 更新状态 → 客人回复 → 完成判定；转 complete 时恰好聚合一次反馈。
//! 组件失败都在组件内部兜底，引擎只向调用方暴露状态拒绝与会话不存在。

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::AppConfig;
use crate::conversation::Message;
use crate::emotion::{emotional_state, reveal_plan};
use crate::feedback::{FeedbackAggregator, FeedbackReport};
use crate::guest::{GuestReply, GuestResponder};
use crate::llm::{create_llm_from_config, LlmClient};
use crate::retrieval::{KeywordRetriever, Retriever};
use crate::scenario::ScenarioFactory;
use crate::scoring::{ScoreEngine, Vocabulary};
use crate::session::error::TrainingError;
use crate::session::policy::{self, SessionPolicy};
use crate::session::registry::SessionRegistry;
use crate::session::state::{SessionId, SessionState, SessionStatus, TurnDelta};
use crate::session::view::SessionView;

/// 一个学员回合的产出
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub guest: GuestReply,
    /// 本轮是否触发了完成判定
    pub completed: bool,
    /// 对话长度软信号：客人生成器建议收尾（非权威，完成策略才是裁决者）
    pub wrap_up: bool,
    pub view: SessionView,
}

/// 会话编排引擎：持有全部组件与注册表
pub struct SessionEngine {
    factory: ScenarioFactory,
    scorer: ScoreEngine,
    guest: GuestResponder,
    feedback: FeedbackAggregator,
    registry: Arc<SessionRegistry>,
    policy: SessionPolicy,
}

impl SessionEngine {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        retriever: Arc<dyn Retriever>,
        cfg: &AppConfig,
    ) -> Self {
        let request_timeout = Duration::from_secs(cfg.llm.timeouts.request);
        let vocab = Vocabulary::from_config(&cfg.scoring);
        Self {
            factory: ScenarioFactory::new(llm.clone(), request_timeout),
            scorer: ScoreEngine::new(llm.clone(), retriever, request_timeout, vocab),
            guest: GuestResponder::new(
                llm.clone(),
                request_timeout,
                cfg.guest.history_turns,
                cfg.guest.soft_stop_turns,
            ),
            feedback: FeedbackAggregator::new(llm, request_timeout),
            registry: Arc::new(SessionRegistry::new(cfg.session.expiry_secs)),
            policy: SessionPolicy::from(&cfg.session),
        }
    }

    /// 全部从配置装配（provider=mock 时不出网）
    pub fn from_config(cfg: &AppConfig) -> Self {
        let llm = create_llm_from_config(cfg);
        let retriever: Arc<dyn Retriever> = Arc::new(KeywordRetriever::with_default_policies());
        Self::new(llm, retriever, cfg)
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// 注册新会话（creating 态），尚未生成情景
    pub async fn create_session(&self, user_id: &str) -> SessionId {
        let id = self
            .registry
            .insert(SessionState::new(user_id.to_string()))
            .await;
        info!(session_id = %id, user_id, "session created");
        id
    }

    /// 生成情景与人设并激活会话，返回包含客人开场白的回合产出
    ///
    /// 只接受 creating 态；生成失败一律落兜底产物，start 本身不因生成失败报错。
    pub async fn start_session(
        &self,
        session_id: &str,
        scenario_request: &str,
    ) -> Result<TurnOutcome, TrainingError> {
        let handle = self.registry.get(session_id).await?;
        let mut session = handle.lock().await;

        if session.state.status != SessionStatus::Creating {
            return Err(TrainingError::State(format!(
                "cannot start session in {:?} state",
                session.state.status
            )));
        }

        let scenario = self.factory.produce_scenario(scenario_request).await;
        let persona = self.factory.produce_persona(&scenario).await;

        // 开场白：第 0 轮情绪状态，尚无透露
        let emotion = emotional_state(&persona, 0, 0, self.scorer.vocab());
        let opening = self
            .guest
            .respond(
                &persona,
                &scenario,
                &session.state.transcript,
                &emotion,
                &[],
                0,
                self.scorer.vocab(),
            )
            .await;

        let activated = session
            .state
            .clone()
            .activate(&scenario, Message::guest(opening.text.clone()))?;
        session.state = activated;
        session.scenario = Some(scenario);
        session.persona = Some(persona);
        session.touch();

        info!(session_id, fallback = opening.fallback, "session started");
        Ok(TurnOutcome {
            guest: opening,
            completed: false,
            wrap_up: false,
            view: SessionView::project(&session.state),
        })
    }

    /// 接受一条学员消息，走完整回合管线
    ///
    /// 顺序固定：评分（关键错误/步骤判定内含）→ 情绪弧 + 透露计划 →
    /// 客人回复 → 原子应用回合增量 → 完成判定。完成时聚合反馈并存入会话。
    pub async fn continue_session(
        &self,
        session_id: &str,
        trainee_text: &str,
    ) -> Result<TurnOutcome, TrainingError> {
        let handle = self.registry.get(session_id).await?;
        let mut session = handle.lock().await;

        if session.paused {
            return Err(TrainingError::State("session is paused".to_string()));
        }
        session.state.ensure_active()?;

        // 激活后 scenario/persona 必在
        let scenario = session
            .scenario
            .clone()
            .ok_or_else(|| TrainingError::State("active session missing scenario".to_string()))?;
        let persona = session
            .persona
            .clone()
            .ok_or_else(|| TrainingError::State("active session missing persona".to_string()))?;

        let turn = session.state.turn;
        let assessment = self
            .scorer
            .assess(
                trainee_text,
                &session.state.transcript,
                &scenario,
                &persona,
                &session.state.completed_steps,
                turn,
            )
            .await;

        let emotion = emotional_state(
            &persona,
            turn,
            session.state.transcript.len(),
            self.scorer.vocab(),
        );
        let reveals = reveal_plan(
            &persona,
            &emotion,
            &session.state.revealed_facts,
            self.scorer.vocab(),
        );

        let guest_reply = self
            .guest
            .respond(
                &persona,
                &scenario,
                &session.state.transcript,
                &emotion,
                &reveals,
                turn,
                self.scorer.vocab(),
            )
            .await;

        let delta = TurnDelta {
            trainee_message: Message::trainee(trainee_text),
            guest_message: Message::guest(guest_reply.text.clone()),
            evidence: assessment.evidence,
            critical_errors: assessment.critical_errors,
            completed_steps: assessment.completed_steps,
            revealed_facts: reveals,
        };
        let next = session.state.clone().apply_turn(delta)?;
        session.state = next;

        let mut completed = false;
        if let Some(reason) = policy::decide(&session.state, &self.policy) {
            let finished = session.state.clone().complete(reason)?;
            session.state = finished;
            session.feedback = Some(self.feedback.aggregate(&session.state).await);
            completed = true;
            info!(session_id, reason = reason.as_str(), "session completed");
        }
        let wrap_up = !self.guest.should_continue(session.state.turn);
        if wrap_up && !completed {
            info!(session_id, turn = session.state.turn, "guest responder suggests wrapping up");
        }
        session.touch();

        Ok(TurnOutcome {
            guest: guest_reply,
            completed,
            wrap_up,
            view: SessionView::project(&session.state),
        })
    }

    /// 只读视图；无状态变更时两次读取结果逐字节相同
    pub async fn session_status(&self, session_id: &str) -> Result<SessionView, TrainingError> {
        let handle = self.registry.get(session_id).await?;
        let session = handle.lock().await;
        Ok(SessionView::project(&session.state))
    }

    /// 强制收尾：未完成则按当前状态判定原因（兜底自然收尾）并出报告；
    /// 已完成则幂等返回已存的报告
    pub async fn complete_session(
        &self,
        session_id: &str,
    ) -> Result<FeedbackReport, TrainingError> {
        let handle = self.registry.get(session_id).await?;
        let mut session = handle.lock().await;

        if session.state.status == SessionStatus::Complete {
            return session.feedback.clone().ok_or_else(|| {
                TrainingError::State("completed session has no feedback".to_string())
            });
        }

        let reason = policy::decide(&session.state, &self.policy)
            .unwrap_or(crate::session::state::CompletionReason::NaturalConclusion);
        let finished = session.state.clone().complete(reason)?;
        session.state = finished;
        let report = self.feedback.aggregate(&session.state).await;
        session.feedback = Some(report.clone());
        session.touch();
        info!(session_id, reason = reason.as_str(), "session force-completed");
        Ok(report)
    }

    /// 暂停：保留全部状态，后续回合被拒直到 resume
    pub async fn pause_session(&self, session_id: &str) -> Result<(), TrainingError> {
        let handle = self.registry.get(session_id).await?;
        let mut session = handle.lock().await;
        session.state.ensure_active()?;
        session.paused = true;
        session.touch();
        Ok(())
    }

    pub async fn resume_session(&self, session_id: &str) -> Result<(), TrainingError> {
        let handle = self.registry.get(session_id).await?;
        let mut session = handle.lock().await;
        session.state.ensure_active()?;
        session.paused = false;
        session.touch();
        Ok(())
    }
}
