use std::{fs, path::Path};

use anyhow::{Context, Result, anyhow};

use crate::decision_service::types::Decision;

/// HTML page with `{{.Slot}}` / `{{Slot}}` placeholders, one per decision slot.
#[derive(Debug, Clone)]
pub struct PageTemplate {
    source: String,
}

impl PageTemplate {
    pub fn load(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)
            .with_context(|| format!("failed to read page template {}", path.display()))?;
        Self::from_source(source)
    }

    pub fn from_source(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        if source.trim().is_empty() {
            return Err(anyhow!("page template is empty"));
        }
        Ok(Self { source })
    }

    pub fn render(&self, decision: &Decision) -> String {
        let mut page = self.source.clone();
        for (slot, value) in decision.iter() {
            let escaped = escape_html(value);
            page = page
                .replace(&format!("{{{{.{slot}}}}}"), &escaped)
                .replace(&format!("{{{{{slot}}}}}"), &escaped);
        }
        page
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
