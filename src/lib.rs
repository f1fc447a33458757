pub mod config;
pub mod models;
pub mod query;
pub mod repositories;
pub mod services;
pub mod state;
pub mod storage;
pub mod ui;
