pub mod accounting;
pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod schedule;
pub mod services;
pub mod types;
pub mod validation;

pub use app::app;
