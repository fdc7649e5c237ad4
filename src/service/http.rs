use reqwest::Client;
use std::time::Duration;

use crate::error::{AuditError, Result};

const USER_AGENT: &str = concat!("storefront-audit/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy)]
pub enum ClientType {
    /// Lab-measurement API. Single long request under a hard deadline.
    LabApi,
    /// Language-model completion service.
    Completion,
}

impl ClientType {
    fn service(&self) -> &'static str {
        match self {
            ClientType::LabApi => "lab",
            ClientType::Completion => "completion",
        }
    }
}

/// Factory for the HTTP clients used to reach external services.
pub fn create_client(client_type: ClientType, timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| {
            AuditError::Configuration(format!(
                "failed to build {} HTTP client: {}",
                client_type.service(),
                e
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_both_client_types() {
        assert!(create_client(ClientType::LabApi, Duration::from_secs(12)).is_ok());
        assert!(create_client(ClientType::Completion, Duration::from_secs(30)).is_ok());
    }
}
