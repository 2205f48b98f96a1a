pub mod config;
pub mod market_data;
pub mod persist;
pub mod pipeline;
pub mod schema;
pub mod telemetry;
