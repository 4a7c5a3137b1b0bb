//! Scrutiny - heuristic compliance validation
//!
//! Walks a working tree, scores each file against a battery of rules,
//! optionally rewrites files whose issues have a mechanical fix, and writes a
//! JSON run report. A background resource monitor gates batches through a
//! circuit breaker.

pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod fixes;
pub mod models;
pub mod monitor;
pub mod pipeline;
pub mod reporters;
pub mod rules;
pub mod scoring;

pub use error::{ValidatorError, ValidatorResult};
