//! `act`: run one action and report how it settled.

use serde_json::{Value, json};
use tokio::sync::broadcast::Receiver;

use restmodel_api::Method;
use restmodel_core::{ActionConfig, ActionOutcome, EventBus, ModelEvent};

use crate::cli::{ActArgs, GlobalOpts};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

pub async fn handle(args: &ActArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = util::load_config(global)?;
    let bus = EventBus::new();
    let mut events = bus.subscribe();
    let registry = util::registry(&cfg, &bus)?;
    let model = util::build_model(&registry, &args.target)?;

    let action = args.target.action.as_str();
    let handle = match overrides(args)? {
        Some(overrides) => model.act_with(action, overrides)?,
        None => model.act(action)?,
    };
    let settled = handle.await;

    let (outcome, response) = match &settled {
        Ok(ActionOutcome::Completed(data)) => ("completed", data.clone()),
        Ok(ActionOutcome::Prevented) => ("prevented", Value::Null),
        Ok(ActionOutcome::Canceled) => ("canceled", Value::Null),
        Err(_) => ("failed", Value::Null),
    };

    let report = json!({
        "model": args.target.model,
        "action": action,
        "outcome": outcome,
        "events": drain(&mut events),
        "response": response,
        "record": model.record(),
        "errors": model.errors().to_value(),
    });
    output::print_output(&output::render(global.output, &report), global.quiet);

    settled.map(|_| ()).map_err(CliError::from)
}

/// Call-time overrides from `--method` / `--route`.
fn overrides(args: &ActArgs) -> Result<Option<ActionConfig>, CliError> {
    if args.method.is_none() && args.route.is_none() {
        return Ok(None);
    }

    let mut config = ActionConfig::new();
    if let Some(ref method) = args.method {
        let method: Method = method.parse().map_err(|_| CliError::Validation {
            field: "--method".into(),
            reason: format!("unknown HTTP method '{method}'"),
        })?;
        config = config.method(method);
    }
    if let Some(ref route) = args.route {
        config = config.route(route.clone());
    }
    Ok(Some(config))
}

/// Events emitted so far, as `{name, kind}` pairs.
fn drain(events: &mut Receiver<std::sync::Arc<ModelEvent>>) -> Vec<Value> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(json!({ "name": event.name, "kind": event.kind.to_string() }));
    }
    out
}
