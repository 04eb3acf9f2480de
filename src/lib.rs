pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod messenger;
pub mod models;
pub mod observability;
pub mod phone;
pub mod state;
