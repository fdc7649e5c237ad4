pub mod metrics;
pub mod models;
pub mod snapshot;
