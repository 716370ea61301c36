//! HTTP route handlers.

pub mod health;
pub mod lra;
pub mod metrics;
pub mod recovery;
