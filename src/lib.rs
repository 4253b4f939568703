//! Errand Pricer: price recommendations for on-demand errands.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod validator;
pub mod pricing;
pub mod llm;
pub mod storage;
pub mod server;
