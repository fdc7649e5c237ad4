pub mod config;
pub mod domain;
pub mod error;
pub mod extractor;
pub mod lifecycle;
pub mod service;
pub mod test_utils;

pub use config::{AuditConfig, RunOverrides};
pub use domain::models::AuditResult;
pub use error::{AuditError, Result};
pub use service::AuditOrchestrator;
