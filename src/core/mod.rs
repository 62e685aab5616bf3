pub mod config;
pub mod error;
pub mod oracle;
pub mod orchestrator;
pub mod schedule;
pub mod store;
pub mod terminal;
pub mod validation;
