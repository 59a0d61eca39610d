//! Core module - server configuration, state and bootstrap
//!
//! # Module structure
//!
//! - [`Config`] - server configuration
//! - [`ServerState`] - shared state owning every service
//! - [`Server`] - HTTP server bootstrap

pub mod config;
pub mod server;
pub mod state;

pub use config::Config;
pub use server::Server;
pub use state::ServerState;
