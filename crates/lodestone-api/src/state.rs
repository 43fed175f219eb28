//! Shared handler state.

use lodestone_core::{ProgressBounds, SessionRegistry};
use lodestone_events::EventBus;
use lodestone_telemetry::Metrics;

/// Dependencies every handler reaches through `State<Arc<ApiState>>`.
pub(crate) struct ApiState {
    pub(crate) registry: SessionRegistry,
    pub(crate) bounds: ProgressBounds,
    pub(crate) telemetry: Metrics,
    pub(crate) events: EventBus,
}

impl ApiState {
    pub(crate) const fn new(
        registry: SessionRegistry,
        bounds: ProgressBounds,
        telemetry: Metrics,
        events: EventBus,
    ) -> Self {
        Self {
            registry,
            bounds,
            telemetry,
            events,
        }
    }
}
