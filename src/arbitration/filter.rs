use validator::Validate;

use crate::arbitration::{
    catalog::StrategyCatalog,
    types::{Desire, DroppedDesire},
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilteredDesires {
    pub kept: Vec<Desire>,
    pub dropped: Vec<DroppedDesire>,
}

pub struct DesireFilter;

impl DesireFilter {
    /// Keeps desires whose goal class is served by a registered strategy,
    /// preserving input order. Everything else is dropped with a diagnostic.
    pub fn filter(catalog: &StrategyCatalog, desires: Vec<Desire>) -> FilteredDesires {
        let mut filtered = FilteredDesires {
            kept: Vec::with_capacity(desires.len()),
            dropped: Vec::new(),
        };

        for desire in desires {
            if let Err(err) = desire.validate() {
                tracing::warn!(
                    target: "arbitration",
                    desire_id = %desire.id,
                    goal_class = %desire.goal_class,
                    error = %err,
                    "desire_dropped_malformed"
                );
                filtered.dropped.push(DroppedDesire {
                    desire_id: desire.id,
                    goal_class: desire.goal_class,
                    reason: "malformed".to_string(),
                });
                continue;
            }

            if !catalog.has_class(&desire.goal_class) {
                tracing::warn!(
                    target: "arbitration",
                    desire_id = %desire.id,
                    goal_class = %desire.goal_class,
                    "desire_dropped_unknown_class"
                );
                filtered.dropped.push(DroppedDesire {
                    desire_id: desire.id,
                    goal_class: desire.goal_class,
                    reason: "unknown_class".to_string(),
                });
                continue;
            }

            filtered.kept.push(desire);
        }

        filtered
    }
}
