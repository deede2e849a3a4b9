use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

use crate::filters::{
    error::{FilterError, services_missing, unsupported_type},
    ports::FilterServicePort,
};

pub const SET_STATE_SERVICE: &str = "switch_set_state";
pub const SET_DIVIDER_RATE_SERVICE: &str = "set_divider_rate";

/// `/<ns>/<service>`, tolerant of leading or trailing slashes on `ns`.
pub fn service_path(ns: &str, service: &str) -> String {
    let ns = ns.trim_matches('/');
    if ns.is_empty() {
        format!("/{service}")
    } else {
        format!("/{ns}/{service}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterKind {
    Switch,
    GenericDivider,
}

impl FilterKind {
    pub const ALL: [FilterKind; 2] = [FilterKind::Switch, FilterKind::GenericDivider];

    pub fn as_str(self) -> &'static str {
        match self {
            FilterKind::Switch => "switch_filter",
            FilterKind::GenericDivider => "GenericDivider",
        }
    }

    /// Checks that the services this kind drives exist under `ns`. The generic
    /// divider gives the service up to `wait` to appear.
    pub async fn validate(
        self,
        services: &dyn FilterServicePort,
        ns: &str,
        wait: Duration,
    ) -> Result<(), FilterError> {
        let proxies = self.bind_proxies(ns);
        match self {
            FilterKind::Switch => {
                for service in proxies.services() {
                    if !services.service_exists(service).await {
                        return Err(services_missing(format!(
                            "namespace '{ns}' has no service '{service}'"
                        )));
                    }
                }
                Ok(())
            }
            FilterKind::GenericDivider => {
                let service = service_path(ns, SET_DIVIDER_RATE_SERVICE);
                tracing::debug!(
                    target: "filters",
                    service = %service,
                    wait_ms = wait.as_millis() as u64,
                    "waiting_for_filter_service"
                );
                if services.wait_for_service(&service, wait).await {
                    Ok(())
                } else {
                    Err(services_missing(format!(
                        "namespace '{ns}' has no service '{service}'"
                    )))
                }
            }
        }
    }

    pub fn bind_proxies(self, ns: &str) -> FilterProxies {
        match self {
            FilterKind::Switch => FilterProxies {
                set_state: Some(service_path(ns, SET_STATE_SERVICE)),
                set_divider_rate: Some(service_path(ns, SET_DIVIDER_RATE_SERVICE)),
            },
            FilterKind::GenericDivider => FilterProxies {
                set_state: None,
                set_divider_rate: Some(service_path(ns, SET_DIVIDER_RATE_SERVICE)),
            },
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterKind {
    type Err = FilterError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        FilterKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| {
                unsupported_type(format!(
                    "filter type '{value}' is not supported by the filter manager"
                ))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterProxies {
    pub set_state: Option<String>,
    pub set_divider_rate: Option<String>,
}

impl FilterProxies {
    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.set_state
            .iter()
            .chain(self.set_divider_rate.iter())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterCall {
    SetState { state: bool },
    SetDividerRate { divider: u32 },
}

impl FilterCall {
    pub fn recorded_state(self) -> String {
        match self {
            FilterCall::SetState { state } => state.to_string(),
            FilterCall::SetDividerRate { divider } => divider.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDescriptor {
    pub name: String,
    pub filter_type: String,
    pub state: String,
}
