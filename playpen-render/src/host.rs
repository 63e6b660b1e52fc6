//! The host page: editing surface, preview frame and console panel.

use askama::Template;

use playpen_core::SandboxPolicy;

use crate::synth::RenderError;

#[derive(Template)]
#[template(path = "host.html")]
pub struct HostTemplate<'a> {
    pub title: &'a str,
    /// Value of the frame's `sandbox` attribute.
    pub sandbox: String,
    pub referrer_policy: &'a str,
}

/// Render the host page with the frame restricted to `policy`.
pub fn render_host(
    title: &str,
    policy: &SandboxPolicy,
    referrer_policy: &str,
) -> Result<String, RenderError> {
    let template = HostTemplate {
        title,
        sandbox: policy.attribute(),
        referrer_policy,
    };
    Ok(template.render()?)
}
