pub mod aggregator;
pub mod browser;
pub mod config;
pub mod dataset;
pub mod debug;
pub mod error;
pub mod extractor;
pub mod geocoding;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod tui;
