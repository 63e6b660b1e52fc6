//! Document synthesis: source text + resolution map → a self-contained HTML
//! document that transpiles, resolves and mounts the component.

use askama::Template;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;

use playpen_core::{
    default_export_name_or, discover_imports, package_name, PreviewConfig, ResolutionMap,
    ResolutionMapBuilder, RELAY_MARKER,
};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to render template: {0}")]
    Template(#[from] askama::Error),

    #[error("failed to encode import map: {0}")]
    ImportMap(#[from] serde_json::Error),

    #[error("`{0}` is not a valid component name")]
    InvalidComponent(String),
}

static COMPONENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("valid component regex"));

static SCRIPT_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</(script)|<!--").expect("valid script break regex"));

#[derive(Template)]
#[template(path = "preview.html")]
struct PreviewTemplate<'a> {
    import_map: &'a str,
    relay_marker: &'a str,
    transpiler_url: &'a str,
    head_scripts: &'a [String],
    source: &'a str,
    component: &'a str,
}

#[derive(Template)]
#[template(path = "placeholder.html")]
struct PlaceholderTemplate<'a> {
    message: &'a str,
}

#[derive(Serialize)]
struct ImportMapDecl<'a> {
    imports: &'a IndexMap<String, String>,
}

/// The import-map declaration for `map`, ready to embed in a script element.
///
/// Every root package also gets a `pkg/` prefix entry so that subpath
/// imports of it resolve through the same host.
pub fn import_map_json(map: &ResolutionMap) -> Result<String, RenderError> {
    let mut imports: IndexMap<String, String> = map
        .iter()
        .map(|(spec, url)| (spec.to_string(), url.to_string()))
        .collect();

    for (spec, url) in map.iter() {
        if package_name(spec) == Some(spec) {
            imports
                .entry(format!("{spec}/"))
                .or_insert_with(|| format!("{}/", url.trim_end_matches('/')));
        }
    }

    // `<` only occurs inside JSON strings, where `\u003c` is equivalent.
    let json = serde_json::to_string(&ImportMapDecl { imports: &imports })?;
    Ok(json.replace('<', "\\u003c"))
}

/// Neutralise `</script` and `<!--` so the embedded source can neither
/// close its element nor push the tokenizer into the escaped script states.
pub fn escape_script_text(source: &str) -> String {
    SCRIPT_BREAK_RE
        .replace_all(source, |caps: &Captures| match caps.get(1) {
            Some(tag) => format!(r"<\/{}", tag.as_str()),
            None => r"<\!--".to_string(),
        })
        .into_owned()
}

/// Synthesize the preview document for `source`.
///
/// Pure: the same inputs always yield the same document. Blank source yields
/// the placeholder document instead of an empty shell.
pub fn synthesize(
    source: &str,
    map: &ResolutionMap,
    config: &PreviewConfig,
) -> Result<String, RenderError> {
    if source.trim().is_empty() {
        return placeholder();
    }

    let component = default_export_name_or(source, &config.fallback_component);
    if !COMPONENT_RE.is_match(component) {
        return Err(RenderError::InvalidComponent(component.to_string()));
    }

    let import_map = import_map_json(map)?;
    let source = escape_script_text(source);

    let template = PreviewTemplate {
        import_map: &import_map,
        relay_marker: RELAY_MARKER,
        transpiler_url: &config.transpiler_url,
        head_scripts: &config.head_scripts,
        source: &source,
        component,
    };
    Ok(template.render()?)
}

/// The empty-state document.
pub fn placeholder() -> Result<String, RenderError> {
    let template = PlaceholderTemplate {
        message: "Nothing to preview yet. Start typing in the editor.",
    };
    Ok(template.render()?)
}

/// Output of one synthesis pass.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub html: String,
    pub imports: Vec<String>,
    pub resolution: ResolutionMap,
}

/// Discovery, resolution and synthesis bundled for one configuration.
#[derive(Debug, Clone)]
pub struct Synthesizer {
    builder: ResolutionMapBuilder,
    config: PreviewConfig,
}

impl Synthesizer {
    pub fn new(config: PreviewConfig) -> Self {
        Self {
            builder: ResolutionMapBuilder::from_config(&config),
            config,
        }
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    pub fn resolve(&self, source: &str) -> (Vec<String>, ResolutionMap) {
        let imports = discover_imports(source);
        let resolution = self.builder.build(&imports);
        (imports, resolution)
    }

    pub fn render(&self, source: &str) -> Result<RenderedDocument, RenderError> {
        let (imports, resolution) = self.resolve(source);
        let html = synthesize(source, &resolution, &self.config)?;
        tracing::debug!(
            imports = imports.len(),
            entries = resolution.len(),
            bytes = html.len(),
            "synthesized preview document"
        );
        Ok(RenderedDocument {
            html,
            imports,
            resolution,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PreviewConfig {
        PreviewConfig::default()
    }

    #[test]
    fn test_import_map_declaration() {
        let map = ResolutionMapBuilder::new("https://esm.sh").build(&["framer-motion".to_string()]);
        insta::assert_snapshot!(
            import_map_json(&map).unwrap(),
            @r#"{"imports":{"react":"https://esm.sh/react","react-dom/client":"https://esm.sh/react-dom/client","framer-motion":"https://esm.sh/framer-motion","react/":"https://esm.sh/react/","framer-motion/":"https://esm.sh/framer-motion/"}}"#
        );
    }

    #[test]
    fn test_document_embeds_every_map_entry() {
        let synth = Synthesizer::new(config());
        let source = r#"import { motion } from "framer-motion";
import { IoHeart } from "react-icons/io5";
export default function Card() { return <motion.div><IoHeart /></motion.div>; }"#;
        let doc = synth.render(source).unwrap();

        assert_eq!(doc.imports, vec!["framer-motion", "react-icons"]);
        for (spec, url) in doc.resolution.iter() {
            assert!(doc.html.contains(&format!(r#""{spec}":"{url}""#)), "missing {spec}");
        }
        assert!(doc.html.contains("render(<Card />)"));
        assert!(doc.html.contains(r#"<script type="importmap">"#));
        assert!(doc.html.contains(r#"<div id="root"></div>"#));
        assert!(doc.html.contains(RELAY_MARKER));
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let synth = Synthesizer::new(config());
        let source = "export default function App() { return <p>hi</p>; }";
        assert_eq!(synth.render(source).unwrap().html, synth.render(source).unwrap().html);
    }

    #[test]
    fn test_relay_script_precedes_transpiler() {
        let doc = Synthesizer::new(config()).render("const x = 1;").unwrap();
        let relay = doc.html.find(RELAY_MARKER).unwrap();
        let transpiler = doc.html.find(r#"<script type="module""#).unwrap();
        assert!(relay < transpiler);
    }

    #[test]
    fn test_fallback_component_without_default_export() {
        let doc = Synthesizer::new(config()).render("function Widget() {}").unwrap();
        assert!(doc.html.contains("render(<App />)"));
    }

    #[test]
    fn test_invalid_fallback_is_rejected() {
        let mut cfg = config();
        cfg.fallback_component = "<App>".to_string();
        let err = Synthesizer::new(cfg).render("const x = 1;").unwrap_err();
        assert!(matches!(err, RenderError::InvalidComponent(_)));
    }

    #[test]
    fn test_blank_source_yields_placeholder() {
        let map = ResolutionMapBuilder::new("https://esm.sh").build(&[]);
        let html = synthesize("  \n\t", &map, &config()).unwrap();
        assert!(html.contains("Nothing to preview"));
        assert!(!html.contains("importmap"));
    }

    #[test]
    fn test_script_close_is_escaped() {
        let source = r#"export default function App() { return "</script><script>alert(1)"; }"#;
        let doc = Synthesizer::new(config()).render(source).unwrap();
        assert!(!doc.html.contains("</script><script>alert"));
        assert!(doc.html.contains(r"<\/script><script>alert"));
        assert_eq!(escape_script_text("</SCRIPT>"), r"<\/SCRIPT>");
    }

    #[test]
    fn test_comment_open_is_escaped() {
        let source = r#"export default function App() { return "<!--<script>"; }"#;
        let doc = Synthesizer::new(config()).render(source).unwrap();
        assert!(!doc.html.contains("<!--<script>"));
        assert!(doc.html.contains(r#""<\!--<script>""#));
        assert_eq!(escape_script_text("a <!-- b </script"), r"a <\!-- b <\/script");
    }

    #[test]
    fn test_import_map_cannot_break_out() {
        let map = ResolutionMapBuilder::new("https://esm.sh")
            .build(&["<!--</script>".to_string()]);
        let json = import_map_json(&map).unwrap();
        assert!(!json.contains('<'));
        let decoded: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded["imports"]["<!--</script>"], "https://esm.sh/<!--</script>");
    }

    #[test]
    fn test_head_scripts_are_loaded() {
        let mut cfg = config();
        cfg.head_scripts = vec!["https://cdn.example/style.js".to_string()];
        let doc = Synthesizer::new(cfg).render("const x = 1;").unwrap();
        assert!(doc.html.contains("cdn.example"));
        assert!(doc.html.contains("style.js"));
    }
}
