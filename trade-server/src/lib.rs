//! Trade Server - peer-to-peer trade coordination core
//!
//! # Architecture overview
//!
//! This crate is the coordination server for a two-party marketplace
//! exchange flow: a buyer proposes to purchase an item, the seller
//! answers, and the pair drives the resulting transaction to completion
//! or cancellation through a 2-of-2 confirmation quorum.
//!
//! - **Engines** (`trades`): BuyRequest and Transaction state machines
//!   with per-entity write serialization
//! - **Event bus** (`bus`): session registry + non-blocking fan-out of
//!   state-change events to every connected session of both parties
//! - **Session gateway** (`gateway`): authenticated WebSocket sessions
//!   pumping events out and relaying client actions in
//! - **HTTP API** (`api`): RESTful action and query surface
//! - **Auth** (`auth`): JWT bearer authentication
//!
//! # Module structure
//!
//! ```text
//! trade-server/src/
//! ├── core/          # config, state, server bootstrap
//! ├── auth/          # JWT service and middleware
//! ├── trades/        # proposal + transaction engines, stores
//! ├── bus/           # session registry, event fan-out
//! ├── gateway/       # WebSocket session gateway
//! ├── services/      # external collaborators (conversations, catalog)
//! ├── api/           # HTTP routes and handlers
//! └── utils/         # errors, logging, validation
//! ```

pub mod api;
pub mod auth;
pub mod bus;
pub mod core;
pub mod gateway;
pub mod services;
pub mod trades;
pub mod utils;

// Re-export public types
pub use auth::{CurrentUser, JwtService};
pub use bus::{EventBus, SessionRegistry};
pub use core::{Config, Server, ServerState};
pub use trades::{ProposalEngine, TradeError, TradeStore, TransactionEngine};
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

pub fn print_banner() {
    println!(
        r#"
  ______                __
 /_  __/________ _____/ /__
  / / / ___/ __ `/ __  / _ \
 / / / /  / /_/ / /_/ /  __/
/_/ /_/   \__,_/\__,_/\___/
   _____
  / ___/___  ______   _____  _____
  \__ \/ _ \/ ___/ | / / _ \/ ___/
 ___/ /  __/ /   | |/ /  __/ /
/____/\___/_/    |___/\___/_/
    "#
    );
}
