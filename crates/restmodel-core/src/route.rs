// ── Route templates ──
//
// `{key}` placeholders are replaced with the matching record value.
// Placeholders naming a missing key render empty.

use tracing::warn;

use crate::record::{Record, display_value};

/// Substitute every `{key}` in `template` from `record`.
///
/// A `{` with no closing `}` is copied through literally.
pub fn interpolate(template: &str, record: &Record) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };

        let key = after[..close].trim();
        match record.get(key) {
            Some(value) => out.push_str(&display_value(value)),
            None => warn!(template, key, "route placeholder has no matching record value"),
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}
