//! The cooperative scheduler: engine, tick outcomes, and configuration

mod config;
mod engine;

pub use config::EngineConfig;
pub use engine::{Engine, EngineState, RunOutcome, Tick};
