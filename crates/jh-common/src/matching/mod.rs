pub mod ranking;
pub mod scoring;
pub mod weights;

pub use ranking::MatchingEngine;
pub use scoring::{score_job, ComponentScore, MatchScore, MatchingConfig};
pub use weights::{Weights, DEFAULT_WEIGHTS};
