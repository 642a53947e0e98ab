pub mod config;
pub mod logging;

pub mod catalog;
pub mod control;
pub mod export;
pub mod orchestrator;
pub mod pipeline;
pub mod retry;
pub mod sink;
pub mod transport;
pub mod types;
