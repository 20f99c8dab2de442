use serde::{Deserialize, Serialize};

use crate::core::chart_type::ChartType;
use crate::core::types::{DateSpanState, Freshness};
use crate::error::ErrorKind;

/// Read-only view of the shared snapshot passed to listener hooks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotContext {
    pub revision: u64,
    pub source_url: Option<String>,
    pub chart_type: Option<ChartType>,
    pub date_span: DateSpanState,
    pub freshness: Freshness,
}

/// Event stream exposed to snapshot listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SnapshotEvent {
    Refreshed {
        revision: u64,
    },
    RefreshFailed {
        kind: ErrorKind,
        message: String,
    },
    ChartTypeChanged {
        from: Option<ChartType>,
        to: Option<ChartType>,
    },
    DateSpanChanged {
        from: DateSpanState,
        to: DateSpanState,
    },
}

/// Push-notification hook for components that must react to snapshot
/// changes. Components that only read state pull it from the store instead.
pub trait SnapshotListener {
    fn id(&self) -> &str;
    fn on_event(&mut self, event: &SnapshotEvent, context: &SnapshotContext);
}
