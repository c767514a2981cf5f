pub mod common;
pub mod config;
pub mod errors;
pub mod units;

pub mod database;
pub mod server;
pub mod services;
