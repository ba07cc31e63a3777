pub mod admin;
pub mod ai;
pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod forecast;
pub mod market;
pub mod monitoring;
