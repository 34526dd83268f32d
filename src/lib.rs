//! Realtime direct-messaging and notification core for the mentorship
//! platform.
//!
//! One actix-web server carries the authenticated REST surface under
//! `/api/v1` and the realtime websocket at `/ws`. Conversations and messages
//! are durable in PostgreSQL; presence and typing state live in process
//! memory and reset on restart.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod websocket;
