//! Declarative model layer over a REST API.
//!
//! A [`Model`] wraps a plain JSON record and issues configurable requests
//! ("actions") on its behalf:
//!
//! - **Configuration cascade** ([`cascade`], [`settings`]): instance
//!   options over a registered model type over registry-wide options over
//!   the library [`defaults`]. Action definitions cascade the same way,
//!   with call-time overrides on top.
//!
//! - **Payload construction** ([`payload`], [`pipeline`]): an action's
//!   `data` rules pick the keys to send, then the action's own pipeline
//!   function and any steps staged with [`Model::stage`] transform the
//!   result.
//!
//! - **Request lifecycle** ([`Model::act`]): guard, `before` hook,
//!   dispatch through a [`restmodel_api::Transport`], response
//!   application, validation error capture into the [`ErrorStore`], and
//!   [`ModelEvent`]s for every stage.
//!
//! - **[`Registry`]**: named model types plus the [`Runtime`]
//!   collaborators (transport, emitter, reactivity) models are built with.

#[macro_use]
pub mod record;

pub mod action;
pub mod cascade;
pub mod defaults;
pub mod error;
pub mod errors;
pub mod events;
pub mod model;
pub mod payload;
pub mod pipeline;
pub mod reactivity;
pub mod registry;
pub mod route;
pub mod runtime;
pub mod settings;

#[doc(hidden)]
pub use serde_json;

// ── Primary re-exports ──────────────────────────────────────────────
pub use action::{ActionConfig, ActionDefinition, ActionEntry, AfterHook, BeforeHook, PipelineFn};
pub use cascade::{Layered, Setting, resolve};
pub use error::CoreError;
pub use errors::{ErrorStore, FieldError};
pub use events::{Emitter, EventBus, EventKind, ModelEvent, Received, SubscriptionId};
pub use model::{ActionHandle, ActionOutcome, Model, RecordStream, RecordWatchStream};
pub use payload::{DataRules, DataSpec};
pub use pipeline::{DataPipeline, Step, StepArg, StepKind};
pub use reactivity::{DirectReactivity, Reactivity};
pub use record::Record;
pub use registry::Registry;
pub use runtime::Runtime;
pub use settings::{GuardScope, Settings, SettingsLayer};
