//! Specifier → URL mapping handed to the isolated document's module loader.

use indexmap::IndexMap;
use serde::Serialize;

use crate::config::PreviewConfig;

/// Ordered mapping from module specifier to a loadable URL.
///
/// Baseline entries come first, followed by discovered packages in discovery
/// order. Rebuilt from scratch on every synthesis pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResolutionMap {
    entries: IndexMap<String, String>,
}

impl ResolutionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the specifier is already mapped. First writer wins, which
    /// is how baseline entries take precedence over discovered ones.
    pub fn insert_if_absent(&mut self, specifier: &str, url: String) -> bool {
        if self.entries.contains_key(specifier) {
            return false;
        }
        self.entries.insert(specifier.to_string(), url);
        true
    }

    pub fn get(&self, specifier: &str) -> Option<&str> {
        self.entries.get(specifier).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Template a bare specifier through the module host: `{host}/{specifier}`.
pub fn module_url(module_host: &str, specifier: &str) -> String {
    format!("{}/{}", module_host.trim_end_matches('/'), specifier)
}

/// Builds resolution maps from a fixed baseline plus discovered packages.
#[derive(Debug, Clone)]
pub struct ResolutionMapBuilder {
    module_host: String,
    baseline: Vec<(String, String)>,
}

impl ResolutionMapBuilder {
    pub fn new(module_host: impl Into<String>) -> Self {
        let module_host = module_host.into();
        let baseline = default_baseline()
            .iter()
            .map(|spec| (spec.to_string(), module_url(&module_host, spec)))
            .collect();
        Self {
            module_host,
            baseline,
        }
    }

    pub fn from_config(config: &PreviewConfig) -> Self {
        let mut builder = Self::new(config.module_host.clone());
        if let Some(baseline) = &config.baseline {
            builder.baseline = baseline
                .iter()
                .map(|(spec, url)| {
                    let url = url
                        .clone()
                        .unwrap_or_else(|| module_url(&builder.module_host, spec));
                    (spec.clone(), url)
                })
                .collect();
        }
        builder
    }

    /// Total: every input yields a map, and the baseline is always present.
    pub fn build(&self, discovered: &[String]) -> ResolutionMap {
        let mut map = ResolutionMap::new();
        for (spec, url) in &self.baseline {
            map.insert_if_absent(spec, url.clone());
        }
        for spec in discovered {
            map.insert_if_absent(spec, module_url(&self.module_host, spec));
        }
        map
    }
}

/// Rendering runtime and its client-mount entry point.
pub fn default_baseline() -> &'static [&'static str] {
    &["react", "react-dom/client"]
}
