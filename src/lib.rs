pub mod agent;
pub mod auth;
pub mod config;
pub mod domain;
pub mod process;
pub mod server;
pub mod store;
