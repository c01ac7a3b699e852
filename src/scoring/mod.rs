//! 五维评分与证据管线

pub mod critical;
pub mod engine;
pub mod parser;
pub mod steps;
pub mod types;
pub mod vocab;

pub use engine::{ScoreEngine, TurnAssessment};
pub use parser::{clamp_score, parse_turn_evidence};
pub use types::{CriticalError, Dimension, DimensionScore, TurnEvidence};
pub use vocab::Vocabulary;
