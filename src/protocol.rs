use serde::{Deserialize, Serialize};

use crate::{
    arbitration::types::{
        ArbitrationEvent, Desire, RegistrationOutcome, ResourceCeilingSnapshot, Strategy,
    },
    filters::FilterDescriptor,
};

#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    AddStrategy(Strategy),
    SetResourceMax { id: String, value: f64 },
    DesiresSet(Vec<Desire>),
    RegisterFilter { ns: String, filter_type: String },
    GetFilters,
    SetFilterState { ns: String, enabled: bool },
    SetFilterDividerRate { ns: String, divider: u32 },
    AdvertiseFilterService { service: String },
    Subscribe,
    Exit,
}

impl ClientMessage {
    pub fn request_name(&self) -> &'static str {
        match self {
            ClientMessage::AddStrategy(_) => "add_strategy",
            ClientMessage::SetResourceMax { .. } => "set_resource_max",
            ClientMessage::DesiresSet(_) => "desires_set",
            ClientMessage::RegisterFilter { .. } => "register_filter",
            ClientMessage::GetFilters => "get_filters",
            ClientMessage::SetFilterState { .. } => "set_filter_state",
            ClientMessage::SetFilterDividerRate { .. } => "set_filter_divider_rate",
            ClientMessage::AdvertiseFilterService { .. } => "advertise_filter_service",
            ClientMessage::Subscribe => "subscribe",
            ClientMessage::Exit => "exit",
        }
    }
}

/// Field-less requests are empty struct variants so `deny_unknown_fields`
/// still applies to them under the internal tag.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
enum WireMessage {
    AddStrategy { strategy: Strategy },
    SetResourceMax { id: String, value: f64 },
    DesiresSet { desires: Vec<Desire> },
    RegisterFilter { ns: String, filter_type: String },
    GetFilters {},
    SetFilterState { ns: String, enabled: bool },
    SetFilterDividerRate { ns: String, divider: u32 },
    AdvertiseFilterService { service: String },
    Subscribe {},
    Exit {},
}

pub fn parse_client_message(line: &str) -> Result<ClientMessage, serde_json::Error> {
    let wire: WireMessage = serde_json::from_str(line)?;
    let message = match wire {
        WireMessage::AddStrategy { strategy } => ClientMessage::AddStrategy(strategy),
        WireMessage::SetResourceMax { id, value } => ClientMessage::SetResourceMax { id, value },
        WireMessage::DesiresSet { desires } => ClientMessage::DesiresSet(desires),
        WireMessage::RegisterFilter { ns, filter_type } => {
            ClientMessage::RegisterFilter { ns, filter_type }
        }
        WireMessage::GetFilters {} => ClientMessage::GetFilters,
        WireMessage::SetFilterState { ns, enabled } => ClientMessage::SetFilterState { ns, enabled },
        WireMessage::SetFilterDividerRate { ns, divider } => {
            ClientMessage::SetFilterDividerRate { ns, divider }
        }
        WireMessage::AdvertiseFilterService { service } => {
            ClientMessage::AdvertiseFilterService { service }
        }
        WireMessage::Subscribe {} => ClientMessage::Subscribe,
        WireMessage::Exit {} => ClientMessage::Exit,
    };
    Ok(message)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    StrategyRegistered {
        strategy_id: String,
        outcome: RegistrationOutcome,
    },
    ResourceMaxSet {
        snapshot: ResourceCeilingSnapshot,
    },
    DesiresAccepted {
        count: usize,
    },
    FilterRegistered {
        filter: FilterDescriptor,
    },
    Filters {
        filters: Vec<FilterDescriptor>,
    },
    FilterUpdated {
        filter: FilterDescriptor,
    },
    ServiceAdvertised {
        service: String,
    },
    Subscribed,
    Rejected {
        request: String,
        message: String,
    },
    Event {
        event: ArbitrationEvent,
    },
}

pub fn encode_server_message(message: &ServerMessage) -> Result<String, serde_json::Error> {
    let encoded = serde_json::to_string(message)?;
    Ok(format!("{encoded}\n"))
}
