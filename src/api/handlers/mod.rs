//! API route handlers.

pub mod auth;
pub mod habits;
pub mod health;
pub mod root;
