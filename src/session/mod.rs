//! 会话层：状态机、完成策略、注册表、编排引擎与对外视图

pub mod engine;
pub mod error;
pub mod policy;
pub mod registry;
pub mod state;
pub mod view;

pub use engine::{SessionEngine, TurnOutcome};
pub use error::TrainingError;
pub use policy::SessionPolicy;
pub use registry::{SessionRegistry, TrainingSession};
pub use state::{CompletionReason, SessionId, SessionState, SessionStatus, TurnDelta};
pub use view::{LatestScores, Progress, SessionView};
