//! Deployment module

pub mod fsm;
pub mod manifest;
pub mod notify;
pub mod orchestrator;
pub mod validate;
