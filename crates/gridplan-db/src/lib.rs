//! PostgreSQL persistence for month plan documents.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
