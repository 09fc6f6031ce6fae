//! # Templates
//!
//! A deliberately small template engine: `{{name}}` placeholders are replaced by the value
//! bound to `name`. There are no conditionals or loops; choosing which fragment to render is
//! the caller's job, which keeps every fragment a plain, reviewable piece of Rust source.
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("No value bound to placeholder '{{{{{0}}}}}'")]
    UnboundPlaceholder(String),
    #[error("Placeholder opened at byte {0} is never closed")]
    Unterminated(usize),
}

/// Values bound to placeholder names.
#[derive(Debug, Clone, Default)]
pub struct Vars(BTreeMap<&'static str, String>);

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &'static str, value: impl Into<String>) -> &mut Self {
        self.0.insert(name, value.into());
        self
    }

    /// Returns a copy with one more binding.
    pub fn with(&self, name: &'static str, value: impl Into<String>) -> Self {
        let mut vars = self.clone();
        vars.set(name, value);
        vars
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

/// Replaces every `{{name}}` in `template` with its binding.
pub fn render(template: &str, vars: &Vars) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut offset = 0;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let end = after_open
            .find("}}")
            .ok_or(TemplateError::Unterminated(offset + start))?;

        let name = after_open[..end].trim();
        let value = vars
            .get(name)
            .ok_or_else(|| TemplateError::UnboundPlaceholder(name.to_string()))?;
        out.push_str(value);

        let consumed = start + 2 + end + 2;
        offset += consumed;
        rest = &rest[consumed..];
    }

    out.push_str(rest);
    Ok(out)
}
