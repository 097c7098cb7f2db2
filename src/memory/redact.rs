//! Query-time redaction of returned text.

use regex::Regex;

use crate::config::RedactionConfig;

/// Compiled redaction patterns. Applied to output only; stored rows and
/// ranking are never touched.
#[derive(Debug, Clone)]
pub struct Redactor {
    patterns: Vec<Regex>,
    replacement: String,
}

impl Redactor {
    /// Compile the configured patterns. Returns `None` when redaction is
    /// disabled or no pattern compiles.
    pub fn from_config(config: &RedactionConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let patterns: Vec<Regex> = config
            .patterns
            .iter()
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    tracing::warn!(pattern = %pattern, error = %e, "skipping invalid redaction pattern");
                    None
                }
            })
            .collect();
        if patterns.is_empty() {
            return None;
        }
        Some(Self {
            patterns,
            replacement: config.replacement.clone(),
        })
    }

    pub fn redact(&self, text: &str) -> String {
        let mut out = text.to_string();
        for regex in &self.patterns {
            out = regex
                .replace_all(&out, regex::NoExpand(&self.replacement))
                .into_owned();
        }
        out
    }

    pub fn redact_opt(&self, text: &mut Option<String>) {
        if let Some(t) = text.as_mut() {
            *t = self.redact(t);
        }
    }
}
