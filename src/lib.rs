//! Incident tracking service
//!
//! REST API for recording, searching and discussing operational incidents,
//! with bcrypt-backed accounts and bearer-token authentication.

pub mod accounts;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod processing;
pub mod search;
pub mod state;

pub use error::{AppError, Result};
