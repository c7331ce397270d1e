//! Output formatting: pretty or compact JSON.

use std::io::{self, Write};

use serde_json::Value;

use crate::cli::OutputFormat;

/// Render a JSON document in the chosen format.
pub fn render(format: OutputFormat, data: &Value) -> String {
    match format {
        // Serializing a `Value` cannot fail.
        OutputFormat::Json => serde_json::to_string_pretty(data).unwrap_or_default(),
        OutputFormat::JsonCompact => data.to_string(),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}
