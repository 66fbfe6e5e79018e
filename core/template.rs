use crate::error::{AppError, Result};
use log;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Placeholder names a layout may reference.
pub const PLACEHOLDERS: &[&str] = &[
    "root",
    "tree",
    "files",
    "git_diff",
    "git_log",
    "user_request",
    "instructions",
];

pub const CLOSING_INSTRUCTIONS: &str = "Please analyze the codebase context above and respond to the user request.\nIf you need additional context or clarification, please ask the user.";

static DEFAULT_TEMPLATE: Lazy<Template> = Lazy::new(|| {
    let source = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../data/default_template.md"));
    Template::parse(source).expect("Failed to parse embedded default_template.md")
});

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Value(String),
    /// Rendered only when the named value is present and non-empty.
    Block { name: String, body: Vec<Segment> },
}

/// A parsed output layout.
///
/// `{{name}}` inserts a value, `{{#name}}...{{/name}}` wraps text that only appears when the
/// value is non-empty. Blocks do not nest. Unknown names render as empty text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Default for Template {
    fn default() -> Self {
        DEFAULT_TEMPLATE.clone()
    }
}

impl Template {
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments: Vec<Segment> = Vec::new();
        let mut open_block: Option<(String, Vec<Segment>)> = None;
        let mut rest = source;

        while let Some(start) = rest.find("{{") {
            let (text, after_open) = rest.split_at(start);
            let after_open = &after_open[2..];
            let end = after_open.find("}}").ok_or_else(|| {
                AppError::Template(format!(
                    "unterminated placeholder near '{}'",
                    snippet(&rest[start..])
                ))
            })?;
            let tag = after_open[..end].trim();
            rest = &after_open[end + 2..];

            let target = match open_block.as_mut() {
                Some((_, body)) => body,
                None => &mut segments,
            };
            if !text.is_empty() {
                target.push(Segment::Text(text.to_string()));
            }

            if let Some(name) = tag.strip_prefix('#') {
                let name = name.trim();
                if let Some((open_name, _)) = &open_block {
                    return Err(AppError::Template(format!(
                        "block '{}' opened inside block '{}'; blocks do not nest",
                        name, open_name
                    )));
                }
                open_block = Some((name.to_string(), Vec::new()));
            } else if let Some(name) = tag.strip_prefix('/') {
                let name = name.trim();
                match open_block.take() {
                    Some((open_name, body)) if open_name == name => {
                        segments.push(Segment::Block {
                            name: open_name,
                            body,
                        });
                    }
                    Some((open_name, _)) => {
                        return Err(AppError::Template(format!(
                            "block '{}' closed by '{{{{/{}}}}}'",
                            open_name, name
                        )));
                    }
                    None => {
                        return Err(AppError::Template(format!(
                            "'{{{{/{}}}}}' has no matching block",
                            name
                        )));
                    }
                }
            } else {
                target.push(Segment::Value(tag.to_string()));
            }
        }

        if let Some((open_name, _)) = open_block {
            return Err(AppError::Template(format!("block '{}' is never closed", open_name)));
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_string()));
        }
        for name in referenced_names(&segments) {
            if !PLACEHOLDERS.contains(&name) {
                log::warn!("Template references unknown placeholder '{}'", name);
            }
        }
        Ok(Self { segments })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        log::debug!("Loading template from {}", path.display());
        let source = fs::read_to_string(path).map_err(|e| {
            AppError::Template(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::parse(&source)
            .map_err(|e| AppError::Template(format!("in '{}': {}", path.display(), strip_kind(e))))
    }

    /// True when the layout uses `name` as a value or a block.
    pub fn references(&self, name: &str) -> bool {
        referenced_names(&self.segments).contains(&name)
    }

    pub fn render(&self, values: &HashMap<&str, String>) -> String {
        let mut out = String::new();
        render_segments(&self.segments, values, &mut out);
        out
    }
}

fn render_segments(segments: &[Segment], values: &HashMap<&str, String>, out: &mut String) {
    for segment in segments {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Value(name) => {
                if let Some(value) = values.get(name.as_str()) {
                    out.push_str(value);
                }
            }
            Segment::Block { name, body } => {
                if values.get(name.as_str()).is_some_and(|v| !v.is_empty()) {
                    render_segments(body, values, out);
                }
            }
        }
    }
}

fn referenced_names(segments: &[Segment]) -> Vec<&str> {
    let mut names = Vec::new();
    for segment in segments {
        match segment {
            Segment::Text(_) => {}
            Segment::Value(name) => names.push(name.as_str()),
            Segment::Block { name, body } => {
                names.push(name.as_str());
                names.extend(referenced_names(body));
            }
        }
    }
    names
}

fn snippet(text: &str) -> String {
    text.chars().take(20).collect()
}

fn strip_kind(err: AppError) -> String {
    match err {
        AppError::Template(msg) => msg,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn values(pairs: &[(&'static str, &str)]) -> HashMap<&'static str, String> {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn substitutes_values_and_drops_unknown_names() {
        let template = Template::parse("A {{tree}} B {{ files }} C {{mystery}}.").unwrap();
        let out = template.render(&values(&[("tree", "T"), ("files", "F")]));
        assert_eq!(out, "A T B F C .");
    }

    #[test]
    fn blocks_render_only_for_non_empty_values() {
        let template =
            Template::parse("{{#user_request}}Q: {{user_request}}\n{{/user_request}}end").unwrap();
        assert_eq!(template.render(&values(&[("user_request", "why?")])), "Q: why?\nend");
        assert_eq!(template.render(&values(&[("user_request", "")])), "end");
        assert_eq!(template.render(&HashMap::new()), "end");
    }

    #[test]
    fn references_cover_values_and_blocks() {
        let template = Template::parse("{{#git_diff}}x{{/git_diff}}{{tree}}").unwrap();
        assert!(template.references("git_diff"));
        assert!(template.references("tree"));
        assert!(!template.references("files"));
    }

    #[test]
    fn malformed_templates_are_configuration_errors() {
        for source in [
            "{{tree",
            "{{/files}}",
            "{{#files}}never closed",
            "{{#files}}{{#tree}}{{/tree}}{{/files}}",
            "{{#files}}{{/tree}}",
        ] {
            let err = Template::parse(source).unwrap_err();
            assert!(matches!(err, AppError::Template(_)), "{}", source);
            assert!(err.is_configuration());
        }
    }

    #[test]
    fn default_layout_references_every_section() {
        let template = Template::default();
        for name in PLACEHOLDERS {
            assert!(template.references(name), "{}", name);
        }
    }

    #[test]
    fn template_file_is_loaded_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("layout.md");
        fs::write(&path, "Tree:\n{{tree}}\n").unwrap();
        let template = Template::from_path(&path).unwrap();
        assert!(template.references("tree"));
        assert!(!template.references("files"));

        let err = Template::from_path(&dir.path().join("missing.md")).unwrap_err();
        assert!(matches!(err, AppError::Template(_)));
    }
}
