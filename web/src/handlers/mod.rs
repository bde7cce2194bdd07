//! HTTP request handlers, organized by resource.

pub mod activities;
pub mod goals;
pub mod health;
pub mod inbox;
pub mod users;

pub use health::{component_health, health_check};
