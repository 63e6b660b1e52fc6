//! Default-export name discovery.

use once_cell::sync::Lazy;
use regex::Regex;

/// Name rendered when no default export can be found.
pub const DEFAULT_COMPONENT: &str = "App";

const IDENT: &str = r"([A-Za-z_$][A-Za-z0-9_$]*)";

static FUNCTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\bexport\s+default\s+(?:async\s+)?function\s*\*?\s*{IDENT}"))
        .expect("valid export function regex")
});

static CLASS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\bexport\s+default\s+class\s+{IDENT}"))
        .expect("valid export class regex")
});

static CONST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\bexport\s+default\s+const\s+{IDENT}\s*="))
        .expect("valid export const regex")
});

static IDENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\bexport\s+default\s+{IDENT}\s*;"))
        .expect("valid export identifier regex")
});

/// Find the identifier the source exports as default, trying
/// `export default function Name`, `export default class Name`,
/// `export default const Name =`, then `export default Name;`.
pub fn default_export_name(source: &str) -> Option<&str> {
    [&*FUNCTION_RE, &*CLASS_RE, &*CONST_RE, &*IDENT_RE]
        .into_iter()
        .find_map(|re| re.captures(source).and_then(|c| c.get(1)))
        .map(|m| m.as_str())
}

/// [`default_export_name`] with a fallback.
pub fn default_export_name_or<'a>(source: &'a str, fallback: &'a str) -> &'a str {
    default_export_name(source).unwrap_or(fallback)
}
