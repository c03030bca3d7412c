// Auth Service Library

pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod observability;

pub use config::Config;
pub use errors::{AppError, Result};
