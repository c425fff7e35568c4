//! Text templates
//!
//! Templates are rendered with Tera. The defaults under `templates/` are
//! compiled into the binary; a configured directory may override any of them
//! by using the same relative name.

use anyhow::{Context, Result};
use rust_embed::RustEmbed;
use std::error::Error as _;
use std::fs;
use std::path::Path;
use tera::{Context as TeraContext, Tera};
use thiserror::Error;

/// Name of the flag notification subject template
pub const FLAG_EMAIL_SUBJECT: &str = "packages/flag_email/subject.txt";
/// Name of the flag notification body template
pub const FLAG_EMAIL_BODY: &str = "packages/flag_email/body.txt";

#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.txt"]
#[include = "*.html"]
struct DefaultTemplates;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template error: {0}")]
    Render(String),

    #[error("Invalid template {name}: {message}")]
    Invalid { name: String, message: String },
}

/// Loaded template set
pub struct TemplateEngine {
    tera: Tera,
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine")
            .field("templates", &self.tera.get_template_names().count())
            .finish()
    }
}

impl TemplateEngine {
    /// Load the embedded defaults, then any overrides found in `override_dir`.
    pub fn load(override_dir: Option<&Path>) -> Result<Self> {
        let mut tera = Tera::default();

        for name in DefaultTemplates::iter() {
            let file = DefaultTemplates::get(&name)
                .with_context(|| format!("Embedded template disappeared: {}", name))?;
            let content = std::str::from_utf8(file.data.as_ref())
                .with_context(|| format!("Embedded template is not UTF-8: {}", name))?;
            add_template(&mut tera, &name, content)?;
        }

        if let Some(dir) = override_dir {
            if dir.is_dir() {
                let mut overrides = Vec::new();
                collect_templates(dir, dir, &mut overrides)?;
                for (name, content) in overrides {
                    tracing::debug!("Template override: {}", name);
                    add_template(&mut tera, &name, &content)?;
                }
            } else {
                tracing::warn!("Template directory {:?} does not exist; using built-in templates", dir);
            }
        }

        Ok(Self { tera })
    }

    /// Render a template by name
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        self.tera.render(template, context).map_err(|e| {
            let mut message = format!("Failed to render '{}': {}", template, e);
            let mut source = e.source();
            while let Some(cause) = source {
                message.push_str(&format!("\n  Caused by: {}", cause));
                source = cause.source();
            }
            TemplateError::Render(message).into()
        })
    }

    /// Render a template into a single line, as needed for mail subjects
    pub fn render_line(&self, template: &str, context: &TeraContext) -> Result<String> {
        let rendered = self.render(template, context)?;
        Ok(rendered.lines().collect())
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }
}

fn add_template(tera: &mut Tera, name: &str, content: &str) -> Result<()> {
    tera.add_raw_template(name, content).map_err(|e| {
        TemplateError::Invalid {
            name: name.to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

fn collect_templates(base: &Path, current: &Path, out: &mut Vec<(String, String)>) -> Result<()> {
    for entry in fs::read_dir(current).with_context(|| format!("Failed to read {:?}", current))? {
        let path = entry?.path();

        if path.is_dir() {
            collect_templates(base, &path, out)?;
            continue;
        }

        let is_template = path
            .extension()
            .is_some_and(|ext| ext == "txt" || ext == "html");
        if !is_template {
            continue;
        }

        let name = path
            .strip_prefix(base)
            .context("Template outside its directory")?
            .to_string_lossy()
            .replace('\\', "/");
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read template: {:?}", path))?;
        out.push((name, content));
    }

    Ok(())
}
