//! Awareness Agent: a hierarchical conversation state machine that guides a
//! user through onboarding, profile analysis and education.

pub mod agent;
pub mod analysis;
pub mod channels;
pub mod config;
pub mod error;
pub mod llm;
pub mod profile;
pub mod states;
pub mod store;
