//! Best-effort discovery of external module specifiers in source text.
//!
//! This is a lexical scan, not a parse. Import-like text inside comments or
//! string literals is reported like a real declaration.

use once_cell::sync::Lazy;
use regex::Regex;

/// `import <bindings> from "<spec>"` and the bare `import "<spec>"` form.
/// The binding clause may span lines but never crosses a `;` or a quote.
static IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bimport\s+(?:[^;'"`]*?\s*\bfrom\s*)?['"`]([^'"`\s]+)['"`]"#)
        .expect("valid import regex")
});

/// Discover the distinct external packages referenced by import declarations,
/// in order of first occurrence.
///
/// Relative (`./x`, `../x`) and absolute (`/x`) specifiers are dropped, as are
/// full URLs, which the module loader resolves without a map entry. Subpaths
/// are reduced to their package: `@scope/pkg/sub` → `@scope/pkg`,
/// `pkg/sub` → `pkg`.
///
/// # Examples
///
/// ```
/// use playpen_core::discover_imports;
///
/// assert_eq!(discover_imports(r#"import x from "foo/bar""#), vec!["foo"]);
/// assert!(discover_imports(r#"import x from "./local""#).is_empty());
/// ```
pub fn discover_imports(source: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();

    for caps in IMPORT_RE.captures_iter(source) {
        let Some(spec) = caps.get(1).map(|m| m.as_str()) else {
            continue;
        };
        let Some(package) = package_name(spec) else {
            continue;
        };
        if !found.iter().any(|p| p == package) {
            found.push(package.to_string());
        }
    }

    found
}

/// Reduce a specifier to the package it names, or `None` for local paths.
pub fn package_name(spec: &str) -> Option<&str> {
    if spec.starts_with('.') || spec.starts_with('/') || spec.contains("://") {
        return None;
    }

    let end = if spec.starts_with('@') {
        // @scope/pkg/... keeps two segments
        match spec.match_indices('/').nth(1) {
            Some((idx, _)) => idx,
            None => spec.len(),
        }
    } else {
        spec.find('/').unwrap_or(spec.len())
    };

    let package = &spec[..end];
    if package.is_empty() {
        None
    } else {
        Some(package)
    }
}
