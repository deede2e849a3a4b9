use std::{collections::BTreeMap, sync::Arc, time::Duration};

use tokio::sync::RwLock;

use crate::filters::{
    error::{FilterError, not_found, unsupported_operation},
    ports::FilterServicePort,
    types::{FilterCall, FilterDescriptor, FilterKind, FilterProxies},
};

#[derive(Debug, Clone)]
struct FilterEntry {
    kind: FilterKind,
    proxies: FilterProxies,
    state: String,
}

/// Registry of topic filters keyed by namespace. Registration validates the
/// namespace's services and binds proxies; later calls go through them.
pub struct FilterManager {
    services: Arc<dyn FilterServicePort>,
    service_wait: Duration,
    filters: RwLock<BTreeMap<String, FilterEntry>>,
}

impl FilterManager {
    pub fn new(services: Arc<dyn FilterServicePort>, service_wait: Duration) -> Self {
        Self {
            services,
            service_wait,
            filters: RwLock::new(BTreeMap::new()),
        }
    }

    #[tracing::instrument(name = "filter_register", target = "filters", skip(self))]
    pub async fn register_filter(
        &self,
        ns: &str,
        filter_type: &str,
    ) -> Result<FilterDescriptor, FilterError> {
        let kind = match filter_type.parse::<FilterKind>() {
            Ok(kind) => kind,
            Err(err) => {
                tracing::error!(
                    target: "filters",
                    ns = %ns,
                    filter_type = %filter_type,
                    "filter_type_unsupported"
                );
                return Err(err);
            }
        };

        if let Err(err) = kind
            .validate(self.services.as_ref(), ns, self.service_wait)
            .await
        {
            tracing::error!(
                target: "filters",
                ns = %ns,
                filter_type = %filter_type,
                error = %err,
                "filter_namespace_invalid"
            );
            return Err(err);
        }

        let entry = FilterEntry {
            kind,
            proxies: kind.bind_proxies(ns),
            state: String::new(),
        };
        let replaced = self
            .filters
            .write()
            .await
            .insert(ns.to_string(), entry)
            .is_some();
        tracing::info!(
            target: "filters",
            ns = %ns,
            filter_type = kind.as_str(),
            replaced = replaced,
            "filter_registered"
        );

        Ok(FilterDescriptor {
            name: ns.to_string(),
            filter_type: kind.as_str().to_string(),
            state: String::new(),
        })
    }

    pub async fn get_filters(&self) -> Vec<FilterDescriptor> {
        self.filters
            .read()
            .await
            .iter()
            .map(|(name, entry)| FilterDescriptor {
                name: name.clone(),
                filter_type: entry.kind.as_str().to_string(),
                state: entry.state.clone(),
            })
            .collect()
    }

    pub async fn set_state(&self, ns: &str, state: bool) -> Result<FilterDescriptor, FilterError> {
        self.apply(ns, FilterCall::SetState { state }).await
    }

    pub async fn set_divider_rate(
        &self,
        ns: &str,
        divider: u32,
    ) -> Result<FilterDescriptor, FilterError> {
        self.apply(ns, FilterCall::SetDividerRate { divider }).await
    }

    async fn apply(&self, ns: &str, call: FilterCall) -> Result<FilterDescriptor, FilterError> {
        let (kind, service) = {
            let filters = self.filters.read().await;
            let entry = filters
                .get(ns)
                .ok_or_else(|| not_found(format!("no filter registered under '{ns}'")))?;
            let service = match call {
                FilterCall::SetState { .. } => entry.proxies.set_state.clone(),
                FilterCall::SetDividerRate { .. } => entry.proxies.set_divider_rate.clone(),
            };
            let service = service.ok_or_else(|| {
                unsupported_operation(format!(
                    "{} filter '{ns}' does not support {call:?}",
                    entry.kind
                ))
            })?;
            (entry.kind, service)
        };

        self.services.call(&service, call).await?;

        let state = call.recorded_state();
        let mut filters = self.filters.write().await;
        let entry = filters
            .get_mut(ns)
            .ok_or_else(|| not_found(format!("filter '{ns}' was removed during the call")))?;
        entry.state = state.clone();
        tracing::info!(
            target: "filters",
            ns = %ns,
            filter_type = kind.as_str(),
            service = %service,
            state = %state,
            "filter_state_updated"
        );

        Ok(FilterDescriptor {
            name: ns.to_string(),
            filter_type: kind.as_str().to_string(),
            state,
        })
    }
}
