use std::time::Duration;

use async_trait::async_trait;

use crate::filters::{error::FilterError, types::FilterCall};

/// Directory of the services exposed by filter nodes, and the means to call them.
#[async_trait]
pub trait FilterServicePort: Send + Sync {
    async fn service_exists(&self, service: &str) -> bool;

    /// Waits up to `timeout` for `service` to be advertised. Returns whether it exists.
    async fn wait_for_service(&self, service: &str, timeout: Duration) -> bool;

    async fn call(&self, service: &str, call: FilterCall) -> Result<(), FilterError>;
}
