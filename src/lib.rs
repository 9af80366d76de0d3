pub mod approvals;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod routes;
pub mod schema;
pub mod state;
pub mod utils;
pub mod validation;
