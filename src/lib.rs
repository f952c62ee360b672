//! phishsim: scripted email awareness-exercise engine.

pub mod classifier;
pub mod config;
pub mod error;
pub mod llm;
pub mod mail;
pub mod simulation;
pub mod store;
pub mod templates;
