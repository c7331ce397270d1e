//! `preview`: the request an action would send, without sending it.

use serde_json::json;

use restmodel_core::EventBus;
use restmodel_core::route::interpolate;

use crate::cli::{GlobalOpts, PreviewArgs};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

pub fn handle(args: &PreviewArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = util::load_config(global)?;
    let registry = util::registry(&cfg, &EventBus::new())?;
    let model = util::build_model(&registry, &args.target)?;

    let action = args.target.action.as_str();
    let record = model.record();
    let settings = model.settings();
    let definition = settings.resolve_action(action, None, &record)?;
    let route = interpolate(
        &format!("{}{}", settings.base_route_for(&definition), definition.route),
        &record,
    );
    let payload = model.data_for_action(action)?;

    let report = json!({
        "model": args.target.model,
        "action": action,
        "method": definition.method.to_string(),
        "route": route,
        "content_type": settings.content_type_for(&definition),
        "headers": definition.headers,
        "params": definition.params,
        "payload": payload,
    });
    output::print_output(&output::render(global.output, &report), global.quiet);
    Ok(())
}
