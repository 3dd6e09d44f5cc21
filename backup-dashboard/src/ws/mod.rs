//! WebSocket channel to dashboard clients.

pub mod ui;
