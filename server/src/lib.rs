//! # Nailchain Session Server
//!
//! Authoritative server for a two-player collaborative physics puzzle. Clients
//! draw shapes, place nails, link them with chains and push the shared world;
//! the physics simulation runs on the clients. The server relays those actions
//! and owns the little state both players must agree on.
//!
//! ## Authoritative State
//!
//! ### Collision Categories (`category_pool`)
//! Fifteen collision bitmasks handed out to nails so that nails alive at the
//! same time never share a category. Exhaustion is reported to the caller
//! instead of silently reusing a category.
//!
//! ### Nails (`nail_registry`)
//! Nails keyed by the id their client chose. Registration is idempotent and
//! resolves a category and a never-reused negative group number. Erasing a
//! nail does not return its category; clients release categories explicitly.
//!
//! ### Turns and Pushes (`turn`, `push_gate`)
//! A push is rate limited by a cooldown and hands the turn to the other
//! player. One designated level allows a single push until the level is
//! changed or reset.
//!
//! ### Completed Levels (`levels`)
//! A set that only grows; every completion is broadcast with the full set.
//!
//! ## Event Handling
//!
//! [`session::Session`] turns one inbound event into the outbound events and
//! action records it causes. Payloads are checked by [`validation`] first, so
//! an invalid event is answered with an error and changes nothing.
//!
//! ## Architecture Design
//!
//! ### Single Dispatch Loop
//! Network tasks only decode and encode packets. The session is owned by the
//! dispatch loop in [`network::Server::run`] and mutated there, one event at
//! a time, so no locking is needed around game state.
//!
//! ### UDP-Based Communication
//! Packets are `bincode`-encoded [`shared::Packet`] values. Clients connect
//! with a handshake, keep their slot alive with heartbeats and are dropped
//! after a period of silence.
//!
//! ### Action Log
//! Actions are appended to a CSV file through a best-effort logger that
//! retries, counts failures and never blocks delivery indefinitely.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         bind_addr: "0.0.0.0:3001".to_string(),
//!         ..ServerConfig::default()
//!     };
//!
//!     let mut server = Server::new(config).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod action_log;
pub mod category_pool;
pub mod client_manager;
pub mod config;
pub mod error;
pub mod levels;
pub mod nail_registry;
pub mod network;
pub mod push_gate;
pub mod session;
pub mod turn;
pub mod validation;
