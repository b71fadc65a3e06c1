pub mod config;
pub mod error;
pub mod extractor;
pub mod logging;
pub mod monitor;
pub mod renderer;
pub mod service;
pub mod store;
pub mod types;
