pub mod config;
pub mod error;
pub mod es;
pub mod failure;
pub mod models;
pub mod schema;
