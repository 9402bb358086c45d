//! threadseek: search and browse threaded conversation history
//!
//! The core of the crate is [`search`]: a query compiler that turns free text
//! plus structured filters into OpenSearch query DSL, and a normalizer that
//! turns engine hits back into [`models::Message`] and
//! [`models::Conversation`] records. [`api`] exposes it over HTTP.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod search;

pub use error::{AppError, Result};
