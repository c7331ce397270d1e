// ── Request lifecycle ──
//
// guard → before hook → payload → dispatch → settle. Everything up to
// dispatch runs synchronously inside `act`; settlement runs on a spawned
// task so the request completes even if the caller drops the handle.

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use restmodel_api::{Body, HttpRequest, encode_pairs};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, warn};

use super::Model;
use crate::action::{ActionConfig, ActionDefinition};
use crate::error::CoreError;
use crate::errors::ErrorStore;
use crate::events::{EventKind, ModelEvent, Received};
use crate::record::{Record, display_value};
use crate::route::interpolate;
use crate::settings::GuardScope;

/// How an invocation ended, when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// The request succeeded; holds the response body.
    Completed(Value),
    /// Skipped because another request was in flight.
    Prevented,
    /// Skipped because the `before` hook returned `Break`.
    Canceled,
}

impl ActionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Response body of a completed request.
    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Completed(data) => Some(data),
            Self::Prevented | Self::Canceled => None,
        }
    }
}

type Settled = Result<ActionOutcome, CoreError>;

enum HandleState {
    Ready(Option<Settled>),
    Pending(JoinHandle<Settled>),
}

/// Resolves once an invocation settles.
///
/// Dropping the handle does not abort the request.
pub struct ActionHandle {
    state: HandleState,
}

impl ActionHandle {
    fn ready(result: Settled) -> Self {
        Self {
            state: HandleState::Ready(Some(result)),
        }
    }

    fn pending(task: JoinHandle<Settled>) -> Self {
        Self {
            state: HandleState::Pending(task),
        }
    }

    /// Whether the invocation was skipped or settled without dispatching.
    pub fn is_ready(&self) -> bool {
        match &self.state {
            HandleState::Ready(_) => true,
            HandleState::Pending(task) => task.is_finished(),
        }
    }
}

impl Future for ActionHandle {
    type Output = Settled;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            HandleState::Ready(result) => Poll::Ready(result.take().unwrap_or_else(|| {
                Err(CoreError::Internal("action handle polled after completion".into()))
            })),
            HandleState::Pending(task) => Pin::new(task).poll(cx).map(|joined| {
                joined.unwrap_or_else(|e| {
                    Err(CoreError::Internal(format!("action task failed: {e}")))
                })
            }),
        }
    }
}

impl Model {
    /// Invoke action `name` with its configured settings.
    ///
    /// Unknown actions fail immediately. Everything after dispatch is
    /// reported through the returned handle and the lifecycle events.
    /// Must be called from within a Tokio runtime.
    pub fn act(&self, name: &str) -> Result<ActionHandle, CoreError> {
        self.invoke(name, None)
    }

    /// Invoke action `name` with call-time overrides layered on top of
    /// its configuration.
    pub fn act_with(&self, name: &str, overrides: ActionConfig) -> Result<ActionHandle, CoreError> {
        self.invoke(name, Some(overrides))
    }

    fn invoke(&self, name: &str, overrides: Option<ActionConfig>) -> Result<ActionHandle, CoreError> {
        let definition = self
            .settings()
            .resolve_action(name, overrides.clone(), &self.record())?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            CoreError::Config {
                message: "actions must be invoked from within a Tokio runtime".into(),
            }
        })?;

        if self.is_guarded(name) {
            self.emit_prevented(name);
            return Ok(ActionHandle::ready(Ok(ActionOutcome::Prevented)));
        }

        if let Some(before) = &definition.before {
            if before(self).is_break() {
                debug!(action = name, "canceled by before hook");
                self.emit(ModelEvent::new(self.prefix(), Some(name), EventKind::Canceled));
                return Ok(ActionHandle::ready(Ok(ActionOutcome::Canceled)));
            }
        }

        // The hook ran unlocked, so re-check the guard while claiming the flag.
        {
            let mut state = self.state();
            if self.blocks(&state.in_flight, name) {
                drop(state);
                self.emit_prevented(name);
                return Ok(ActionHandle::ready(Ok(ActionOutcome::Prevented)));
            }
            self.set_in_flight_locked(&mut state, name, true);
        }

        // The hook may have changed the record; route, headers and payload
        // are built from what it left behind.
        let record = self.record();
        let definition = match self.settings().resolve_action(name, overrides, &record) {
            Ok(definition) => definition,
            Err(err) => {
                let mut state = self.state();
                self.set_in_flight_locked(&mut state, name, false);
                return Err(err);
            }
        };

        let sent = self.payload_for(&definition, &record, true);

        self.emit(ModelEvent::new(self.prefix(), Some(name), EventKind::Before).sent(sent.clone()));

        let request = self.build_request(&definition, &record, &sent);
        debug!(action = name, method = %request.method, url = %request.url, "dispatching");
        let task = runtime.spawn(self.clone().settle(definition, request, sent));
        Ok(ActionHandle::pending(task))
    }

    fn is_guarded(&self, name: &str) -> bool {
        self.blocks(&self.state().in_flight, name)
    }

    fn blocks(&self, in_flight: &HashSet<String>, name: &str) -> bool {
        let settings = self.settings();
        if !settings.prevent_simultaneous_actions {
            return false;
        }
        match settings.guard_scope {
            GuardScope::Action => in_flight.contains(name),
            GuardScope::Model => !in_flight.is_empty(),
        }
    }

    fn emit_prevented(&self, name: &str) {
        debug!(action = name, "prevented: another request is in flight");
        self.emit(ModelEvent::new(self.prefix(), None, EventKind::Prevented));
        self.emit(ModelEvent::new(self.prefix(), Some(name), EventKind::Prevented));
    }

    /// Assemble the transport request for one invocation.
    fn build_request(&self, definition: &ActionDefinition, record: &Record, sent: &Record) -> HttpRequest {
        let settings = self.settings();
        let template = format!("{}{}", settings.base_route_for(definition), definition.route);
        let mut request = HttpRequest::new(definition.method, interpolate(&template, record));

        request.headers = definition
            .headers
            .iter()
            .map(|(name, value)| (name.clone(), display_value(value)))
            .collect();
        request.query = encode_pairs(&definition.params);
        request.content_type = settings.content_type_for(definition).map(str::to_owned);

        if definition.method.carries_body() {
            request.body = Some(Body::encode(sent, request.content_type.as_deref()));
        } else {
            request.query.extend(encode_pairs(sent));
        }

        match &settings.http.customize_request {
            Some(customize) => customize(request, definition),
            None => request,
        }
    }

    async fn settle(self, definition: ActionDefinition, request: HttpRequest, sent: Record) -> Settled {
        let name = definition.name.clone();
        let started = Instant::now();
        let result = self.runtime().transport.request(request).await;

        let (received, settled) = match result {
            Ok(response) => {
                sleep_until(started + self.settings().http.take_at_least).await;

                if definition.apply {
                    self.apply(&response.data);
                }
                if definition.validation {
                    self.clear_errors(None);
                }

                let received = Received::Data(response.data.clone());
                self.emit(
                    ModelEvent::new(self.prefix(), Some(&name), EventKind::Success)
                        .sent(sent.clone())
                        .received(received.clone()),
                );
                self.finish_editing();
                (received, Ok(ActionOutcome::Completed(response.data)))
            }
            Err(err) => {
                let err = Arc::new(err);
                let settled = Err(self.settle_failure(&definition, &err));

                let received = Received::Error(err);
                self.emit(
                    ModelEvent::new(self.prefix(), Some(&name), EventKind::Error)
                        .sent(sent.clone())
                        .received(received.clone()),
                );
                (received, settled)
            }
        };

        self.emit(
            ModelEvent::new(self.prefix(), Some(&name), EventKind::Complete)
                .sent(sent)
                .received(received.clone()),
        );

        if let Some(after) = &definition.after {
            after(&self, &received);
        }

        {
            let mut state = self.state();
            self.set_in_flight_locked(&mut state, &name, false);
        }

        settled
    }

    /// Classify a failed request, populating the error store when it is a
    /// recognized validation failure of a validated action.
    fn settle_failure(&self, definition: &ActionDefinition, err: &restmodel_api::Error) -> CoreError {
        if !definition.validation {
            return CoreError::from(err);
        }

        self.clear_errors(None);

        let validation = &self.settings().validation_errors;
        if !(validation.is_validation_error)(err) {
            return CoreError::from(err);
        }

        match ErrorStore::from_value((validation.transform_response)(err)) {
            Ok(store) => {
                self.replace_errors(store.clone());
                CoreError::Validation {
                    status: err.status().unwrap_or_default(),
                    errors: store,
                }
            }
            Err(malformed) => {
                warn!(action = %definition.name, error = %malformed, "ignoring malformed validation errors");
                CoreError::from(err)
            }
        }
    }

    fn finish_editing(&self) {
        let mut state = self.state();
        if state.editing {
            self.set_editing_locked(&mut state, false);
        }
    }

    fn prefix(&self) -> Option<&str> {
        self.settings().event_prefix.as_deref()
    }

    fn emit(&self, event: ModelEvent) {
        self.runtime().emitter.emit(event);
    }
}
