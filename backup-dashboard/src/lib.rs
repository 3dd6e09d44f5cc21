//! Backup Dashboard
//!
//! HTTP and WebSocket surface over `backup-core`: one request/response per
//! lifecycle operation plus a subscribable event channel for the UI.

pub mod config;
pub mod error;
pub mod routes;
pub mod seed;
pub mod state;
pub mod ws;

pub use config::AppConfig;
pub use error::AppError;
pub use state::AppState;
