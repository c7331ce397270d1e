//! `models`: configured model types and their actions.

use serde_json::{Map, Value, json};

use restmodel_core::{EventBus, SettingsLayer};

use crate::cli::GlobalOpts;
use crate::commands::util;
use crate::error::CliError;
use crate::output;

pub fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = util::load_config(global)?;
    let registry = util::registry(&cfg, &EventBus::new())?;

    let mut models = Map::new();
    for model_type in registry.types() {
        let settings = registry.settings_for(model_type, SettingsLayer::new())?;
        models.insert(
            model_type.to_owned(),
            json!({
                "base_route": settings.base_route,
                "event_prefix": settings.event_prefix,
                "actions": settings.action_names().collect::<Vec<_>>(),
            }),
        );
    }

    output::print_output(&output::render(global.output, &Value::Object(models)), global.quiet);
    Ok(())
}
