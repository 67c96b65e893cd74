//! portfolio-server: HTTP backend for the portfolio site
//!
//! This crate provides:
//! - Portfolio content and profile documents under `/api`
//! - The contact form and the inbound email webhook, both persisted
//! - Bearer-protected admin reads and export
//! - A key-value browser and hot reload socket for local development
//!
//! # Architecture
//!
//! Requests enter through the tower layers in [`app::Application::into_router`]
//! (panic catching, request ids) and are dispatched by the exact-match
//! [`router::Router`] through its middleware chain (request logging, CORS).
//! Unmatched requests fall through to static files from the content
//! directory.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use portfolio_server::{AppState, Application, ServerConfig};
//! use portfolio_store::KvStore;
//!
//! let config = ServerConfig::from_env()?;
//! let store = Arc::new(KvStore::open(&config.store_config())?);
//! let app = Application::new(AppState::new(store, config)).into_router();
//! ```

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod notify;
pub mod reload;
pub mod router;
pub mod routes;
pub mod state;

// Re-exports for convenience
pub use app::Application;
pub use config::{ConfigError, ServerConfig};
pub use error::{ApiError, ApiResult};
pub use notify::{Notification, Notifier};
pub use reload::ReloadRegistry;
pub use state::AppState;

// Re-export dependent crates
pub use portfolio_core;
pub use portfolio_store;
