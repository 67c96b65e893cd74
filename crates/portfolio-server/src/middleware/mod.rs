//! Middleware for the portfolio server.
//!
//! Two kinds live here: tower layers applied to the whole service
//! (request ids), and chain middleware run by the [`crate::router::Router`]
//! (request logging, CORS).

pub mod cors;
pub mod logging;
pub mod request_id;

pub use cors::Cors;
pub use logging::RequestLogger;
