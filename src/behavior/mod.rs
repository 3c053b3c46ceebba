//! Behavior Module
//!
//! Navigation recording and next-resource prediction.

mod predictor;
mod recorder;

pub use predictor::{rank_transitions, Prediction, Predictor};
pub use recorder::{BehaviorEvent, BehaviorRecorder, History, DEFAULT_CAPACITY};
