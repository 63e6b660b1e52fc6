//! # playpen-render
//!
//! Document synthesis and page templates for playpen.
//!
//! This crate turns source text into the isolated preview document and renders
//! the host page, both with Askama.

pub mod host;
pub mod synth;

pub use host::{render_host, HostTemplate};
pub use synth::{
    escape_script_text, import_map_json, placeholder, synthesize, RenderError, RenderedDocument,
    Synthesizer,
};
