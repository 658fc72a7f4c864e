#![forbid(unsafe_code)]

//! Automated lead-response pipeline: a multi-factor decision engine and a
//! resilient conversation loader over a `SQLite` message log.

pub mod config;
pub mod engine;
pub mod errors;
pub mod loader;
pub mod models;
pub mod persistence;
pub mod responder;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
