pub mod ai;
pub mod api;
pub mod config;
pub mod engine;
