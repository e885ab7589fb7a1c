pub mod analytics;
pub mod cli;
pub mod config;
pub mod demo;
pub mod llm;
pub mod metrics;
pub mod monitor;
pub mod scheduler;
pub mod store;
pub mod sustainability;
pub mod utils;
pub mod web;
