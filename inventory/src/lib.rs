//! Inventory management: products, an append-only stock ledger and the web
//! application around them.

pub mod auth;
pub mod categories;
pub mod config;
pub mod database;
pub mod error;
pub mod format;
pub mod forms;
pub mod models;
pub mod products;
pub mod seed;
pub mod stock;
pub mod users;
pub mod web;

pub use config::Config;
pub use database::Database;
pub use web::{AppState, app, routes};
