// ── Runtime collaborators ──
//
// The transport, emitter and reactivity implementations shared by every
// model created from a registry.

use std::fmt;
use std::sync::Arc;

use restmodel_api::{HttpTransport, Transport, TransportConfig};

use crate::error::CoreError;
use crate::events::{Emitter, EventBus};
use crate::reactivity::{DirectReactivity, Reactivity};

/// Injected collaborators. Cheap to clone.
#[derive(Clone)]
pub struct Runtime {
    pub transport: Arc<dyn Transport>,
    pub emitter: Arc<dyn Emitter>,
    pub reactivity: Arc<dyn Reactivity>,
}

impl Runtime {
    /// Use `transport` with a fresh [`EventBus`] and [`DirectReactivity`].
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            emitter: Arc::new(EventBus::new()),
            reactivity: Arc::new(DirectReactivity),
        }
    }

    /// Runtime over the default reqwest transport.
    pub fn http(config: TransportConfig) -> Result<Self, CoreError> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(Arc::new(transport)))
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn Emitter>) -> Self {
        self.emitter = emitter;
        self
    }

    /// Install `bus` as the emitter, keeping a handle for subscribing.
    pub fn with_event_bus(self, bus: &EventBus) -> Self {
        self.with_emitter(Arc::new(bus.clone()))
    }

    pub fn with_reactivity(mut self, reactivity: Arc<dyn Reactivity>) -> Self {
        self.reactivity = reactivity;
        self
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime").finish_non_exhaustive()
    }
}
