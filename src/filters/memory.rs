use std::{collections::BTreeSet, time::Duration};

use async_trait::async_trait;
use tokio::{
    sync::{Notify, RwLock},
    time::{Instant, timeout_at},
};

use crate::filters::{
    error::{FilterError, call_failed},
    ports::FilterServicePort,
    types::FilterCall,
};

/// Service directory fed by `advertise`. Calls to advertised services are
/// recorded and succeed.
#[derive(Default)]
pub struct InMemoryFilterServices {
    services: RwLock<BTreeSet<String>>,
    calls: RwLock<Vec<(String, FilterCall)>>,
    advertised: Notify,
}

impl InMemoryFilterServices {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn advertise(&self, service: impl Into<String>) {
        let service = service.into();
        tracing::debug!(target: "filters", service = %service, "filter_service_advertised");
        self.services.write().await.insert(service);
        self.advertised.notify_waiters();
    }

    pub async fn calls(&self) -> Vec<(String, FilterCall)> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl FilterServicePort for InMemoryFilterServices {
    async fn service_exists(&self, service: &str) -> bool {
        self.services.read().await.contains(service)
    }

    async fn wait_for_service(&self, service: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.advertised.notified();
            if self.service_exists(service).await {
                return true;
            }
            if timeout_at(deadline, notified).await.is_err() {
                return self.service_exists(service).await;
            }
        }
    }

    async fn call(&self, service: &str, call: FilterCall) -> Result<(), FilterError> {
        if !self.service_exists(service).await {
            return Err(call_failed(format!("service '{service}' is not advertised")));
        }
        self.calls.write().await.push((service.to_string(), call));
        Ok(())
    }
}
