// ── Lifecycle events ──
//
// Named events emitted by the request lifecycle, and the default
// in-process bus that delivers them. Handlers registered under a name
// run synchronously in subscription order; every event is additionally
// fanned out on a broadcast channel for async consumers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use strum::{Display, EnumString};
use tokio::sync::broadcast;

use crate::record::Record;

const EVENT_CHANNEL_SIZE: usize = 256;

/// Lifecycle stage an event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum EventKind {
    Before,
    Success,
    Error,
    Complete,
    Prevented,
    Canceled,
}

/// What a settled request produced.
#[derive(Debug, Clone)]
pub enum Received {
    /// Response body of a successful request.
    Data(Value),
    /// Transport failure, including non-2xx responses.
    Error(Arc<restmodel_api::Error>),
}

impl Received {
    /// JSON view: the response body, or the error response body
    /// (`null` when the server never answered).
    pub fn to_value(&self) -> Value {
        match self {
            Self::Data(data) => data.clone(),
            Self::Error(err) => err.body().cloned().unwrap_or(Value::Null),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// One emitted event.
#[derive(Debug, Clone)]
pub struct ModelEvent {
    /// Fully qualified name, e.g. `users.update.success`.
    pub name: String,
    /// Action the event belongs to; `None` for the generic `prevented`.
    pub action: Option<String>,
    pub kind: EventKind,
    /// Payload as sent (or about to be sent).
    pub sent: Option<Record>,
    pub received: Option<Received>,
}

impl ModelEvent {
    pub fn new(prefix: Option<&str>, action: Option<&str>, kind: EventKind) -> Self {
        Self {
            name: event_name(prefix, action, kind),
            action: action.map(str::to_owned),
            kind,
            sent: None,
            received: None,
        }
    }

    #[must_use]
    pub fn sent(mut self, sent: Record) -> Self {
        self.sent = Some(sent);
        self
    }

    #[must_use]
    pub fn received(mut self, received: Received) -> Self {
        self.received = Some(received);
        self
    }
}

/// `{prefix}.{action}.{kind}`; segments that are absent or empty are
/// left out along with their dot.
pub fn event_name(prefix: Option<&str>, action: Option<&str>, kind: EventKind) -> String {
    let kind = kind.to_string();
    [prefix, action, Some(kind.as_str())]
        .into_iter()
        .flatten()
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

/// Receives lifecycle events from models.
pub trait Emitter: Send + Sync {
    fn emit(&self, event: ModelEvent);
}

/// Event handler callback.
pub type Handler = Arc<dyn Fn(&ModelEvent) + Send + Sync>;

/// Opaque handle returned by [`EventBus::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct BusState {
    handlers: HashMap<String, Vec<(SubscriptionId, Handler)>>,
    next_id: u64,
    paused: bool,
    pending: Vec<ModelEvent>,
}

/// Default [`Emitter`]: named handlers with pause/resume buffering.
///
/// Cheaply cloneable; clones share subscriptions.
#[derive(Clone)]
pub struct EventBus {
    state: Arc<Mutex<BusState>>,
    tx: broadcast::Sender<Arc<ModelEvent>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            state: Arc::default(),
            tx,
        }
    }

    /// Register `handler` for events named exactly `name`.
    pub fn on<F>(&self, name: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&ModelEvent) + Send + Sync + 'static,
    {
        let mut state = self.lock();
        let id = SubscriptionId(state.next_id);
        state.next_id += 1;
        state
            .handlers
            .entry(name.into())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler. Returns `false` if it was not registered.
    pub fn off(&self, name: &str, id: SubscriptionId) -> bool {
        let mut state = self.lock();
        let Some(handlers) = state.handlers.get_mut(name) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        before != handlers.len()
    }

    /// Buffer events instead of delivering them.
    pub fn pause(&self) {
        self.lock().paused = true;
    }

    /// Stop buffering and deliver everything buffered, in emission order.
    pub fn resume(&self) {
        let pending = {
            let mut state = self.lock();
            state.paused = false;
            std::mem::take(&mut state.pending)
        };
        for event in pending {
            self.dispatch(event);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    /// Every event delivered from now on, regardless of name.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ModelEvent>> {
        self.tx.subscribe()
    }

    fn dispatch(&self, event: ModelEvent) {
        // Handlers run without the lock held so they may emit or subscribe.
        let handlers: Vec<Handler> = {
            let mut state = self.lock();
            if state.paused {
                state.pending.push(event);
                return;
            }
            state
                .handlers
                .get(&event.name)
                .map(|hs| hs.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default()
        };

        for handler in &handlers {
            handler(&event);
        }
        let _ = self.tx.send(Arc::new(event));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Emitter for EventBus {
    fn emit(&self, event: ModelEvent) {
        self.dispatch(event);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn recorder(bus: &EventBus, name: &str) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.on(name, move |event| sink.lock().unwrap().push(event.name.clone()));
        seen
    }

    #[test]
    fn names_join_present_segments() {
        assert_eq!(
            event_name(Some("users"), Some("update"), EventKind::Success),
            "users.update.success"
        );
        assert_eq!(event_name(Some("users"), None, EventKind::Prevented), "users.prevented");
        assert_eq!(event_name(None, Some("fetch"), EventKind::Before), "fetch.before");
        assert_eq!(event_name(Some(""), Some("fetch"), EventKind::Complete), "fetch.complete");
    }

    #[test]
    fn handlers_run_in_subscription_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 0..3 {
            let order = Arc::clone(&order);
            bus.on("a.before", move |_| order.lock().unwrap().push(n));
        }

        bus.emit(ModelEvent::new(None, Some("a"), EventKind::Before));
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn off_removes_only_that_handler() {
        let bus = EventBus::new();
        let kept = recorder(&bus, "a.success");
        let id = bus.on("a.success", |_| panic!("should be removed"));

        assert!(bus.off("a.success", id));
        assert!(!bus.off("a.success", id));

        bus.emit(ModelEvent::new(None, Some("a"), EventKind::Success));
        assert_eq!(kept.lock().unwrap().len(), 1);
    }

    #[test]
    fn paused_bus_replays_in_emission_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for name in ["a.before", "b.before"] {
            let sink = Arc::clone(&seen);
            bus.on(name, move |event| sink.lock().unwrap().push(event.name.clone()));
        }

        bus.pause();
        bus.emit(ModelEvent::new(None, Some("a"), EventKind::Before));
        bus.emit(ModelEvent::new(None, Some("b"), EventKind::Before));
        bus.emit(ModelEvent::new(None, Some("a"), EventKind::Before));
        assert!(seen.lock().unwrap().is_empty());

        bus.resume();
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["a.before", "b.before", "a.before"]
        );
        assert!(!bus.is_paused());
    }

    #[test]
    fn handlers_may_emit_reentrantly() {
        let bus = EventBus::new();
        let inner = bus.clone();
        bus.on("a.complete", move |_| {
            inner.emit(ModelEvent::new(None, Some("b"), EventKind::Complete));
        });
        let seen = recorder(&bus, "b.complete");

        bus.emit(ModelEvent::new(None, Some("a"), EventKind::Complete));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn subscribers_see_every_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(ModelEvent::new(Some("users"), Some("fetch"), EventKind::Before));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name, "users.fetch.before");
        assert_eq!(event.action.as_deref(), Some("fetch"));
    }
}
