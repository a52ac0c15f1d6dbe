pub mod app;
pub mod auth;
pub mod comments;
pub mod config;
pub mod domain;
pub mod error;
pub mod extract;
pub mod projects;
pub mod rate_limit;
pub mod repo;
pub mod state;
pub mod telemetry;
pub mod users;
