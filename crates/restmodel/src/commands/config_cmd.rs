//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&util::config_file(global).display().to_string(), global.quiet);
        }
        ConfigCommand::Show => {
            let cfg = util::load_config(global)?;
            output::print_output(cfg.to_redacted_toml()?.trim_end(), global.quiet);
        }
    }
    Ok(())
}
