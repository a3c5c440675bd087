//! Prompt templates: named prompt texts loaded once at startup from a YAML file.
//!
//! Template syntax:
//! - `{name}` is replaced by the variable `name` (ASCII letters, digits, `_`).
//! - `{{` and `}}` render as literal `{` and `}` (needed for JSON examples in prompts).
//! - Any other `{` or `}` is a malformed placeholder and is rejected when the file is loaded.
//!
//! The loaded set is read-only; share it behind an `Arc`.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

/// Template keys the generation pipeline renders. Checked at load time.
pub const REQUIRED_TEMPLATES: &[&str] = &[
    "key_points",
    "generate_with_key_points",
    "generate_direct",
    "optimize",
    "evaluate",
];

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt template '{0}' not found")]
    TemplateNotFound(String),

    #[error("Prompt template '{template}' references missing variable '{variable}'")]
    MissingVariable { template: String, variable: String },

    #[error("Prompt template '{template}' has a malformed placeholder at byte {offset}")]
    MalformedPlaceholder { template: String, offset: usize },

    #[error("Failed to read prompt file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse prompt file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to serialize prompt variable '{variable}': {source}")]
    Serialize {
        variable: String,
        source: serde_json::Error,
    },
}

/// One parsed piece of a template.
#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// Substitution values for a single render call.
///
/// Text values are inserted verbatim. Structured values are pretty-printed as JSON
/// when added, so they read naturally inside the prompt.
#[derive(Debug, Clone, Default)]
pub struct PromptVars {
    values: HashMap<String, String>,
}

impl PromptVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub fn json<T: Serialize + ?Sized>(mut self, name: &str, value: &T) -> Result<Self, PromptError> {
        let rendered =
            serde_json::to_string_pretty(value).map_err(|source| PromptError::Serialize {
                variable: name.to_string(),
                source,
            })?;
        self.values.insert(name.to_string(), rendered);
        Ok(self)
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// The process-wide template set.
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    templates: BTreeMap<String, Vec<Segment>>,
}

impl PromptTemplates {
    /// Reads and parses the YAML template file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PromptError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let templates = Self::from_yaml_str(&raw)?;
        info!(
            path = %path.display(),
            count = templates.templates.len(),
            "Prompt templates loaded"
        );
        Ok(templates)
    }

    /// Parses a YAML mapping of template key → template text.
    pub fn from_yaml_str(raw: &str) -> Result<Self, PromptError> {
        let source: BTreeMap<String, String> = serde_yaml::from_str(raw)?;
        let mut templates = BTreeMap::new();
        for (key, text) in source {
            let segments = parse_template(&key, &text)?;
            templates.insert(key, segments);
        }
        Ok(Self { templates })
    }

    /// Fails with `TemplateNotFound` for the first required key that is absent.
    pub fn ensure_keys(&self, keys: &[&str]) -> Result<(), PromptError> {
        match keys.iter().find(|k| !self.templates.contains_key(**k)) {
            Some(missing) => Err(PromptError::TemplateNotFound(missing.to_string())),
            None => Ok(()),
        }
    }

    /// Renders template `key` with `vars`. Pure: no I/O, no shared mutation.
    pub fn render(&self, key: &str, vars: &PromptVars) -> Result<String, PromptError> {
        let segments = self
            .templates
            .get(key)
            .ok_or_else(|| PromptError::TemplateNotFound(key.to_string()))?;

        let mut out = String::new();
        for segment in segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = vars.get(name).ok_or_else(|| PromptError::MissingVariable {
                        template: key.to_string(),
                        variable: name.clone(),
                    })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

fn is_placeholder_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn parse_template(key: &str, text: &str) -> Result<Vec<Segment>, PromptError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = text.char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        match c {
            '{' if chars.peek().map(|&(_, n)| n) == Some('{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek().map(|&(_, n)| n) == Some('}') => {
                chars.next();
                literal.push('}');
            }
            '}' => {
                return Err(PromptError::MalformedPlaceholder {
                    template: key.to_string(),
                    offset,
                });
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                while let Some(&(_, n)) = chars.peek() {
                    chars.next();
                    if n == '}' {
                        closed = true;
                        break;
                    }
                    if !is_placeholder_char(n) {
                        break;
                    }
                    name.push(n);
                }
                if !closed || name.is_empty() {
                    return Err(PromptError::MalformedPlaceholder {
                        template: key.to_string(),
                        offset,
                    });
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Placeholder(name));
            }
            other => literal.push(other),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::PromptTemplates;

    /// The template file shipped with the service.
    pub const SHIPPED_PROMPTS: &str = include_str!("../prompts/agents.yaml");

    pub fn shipped_templates() -> PromptTemplates {
        PromptTemplates::from_yaml_str(SHIPPED_PROMPTS).expect("shipped prompts parse")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    const SAMPLE: &str = r#"
greet: "Hello {name}, the role is {role}."
example: |
  Return JSON like {{"score": 0}} for {name}.
"#;

    #[test]
    fn test_render_substitutes_text_variables() {
        let templates = PromptTemplates::from_yaml_str(SAMPLE).unwrap();
        let vars = PromptVars::new().text("name", "Ada").text("role", "SRE");
        let out = templates.render("greet", &vars).unwrap();
        assert_eq!(out, "Hello Ada, the role is SRE.");
    }

    #[test]
    fn test_double_braces_render_as_literals() {
        let templates = PromptTemplates::from_yaml_str(SAMPLE).unwrap();
        let vars = PromptVars::new().text("name", "Ada");
        let out = templates.render("example", &vars).unwrap();
        assert_eq!(out, "Return JSON like {\"score\": 0} for Ada.\n");
    }

    #[test]
    fn test_structured_values_are_pretty_printed() {
        let templates = PromptTemplates::from_yaml_str("show: \"Data:\\n{data}\"").unwrap();
        let vars = PromptVars::new()
            .json("data", &json!({"skills": ["Rust", "Go"]}))
            .unwrap();
        let out = templates.render("show", &vars).unwrap();
        assert!(out.contains("{\n  \"skills\": [\n    \"Rust\","));
    }

    #[test]
    fn test_unknown_template_key_fails() {
        let templates = PromptTemplates::from_yaml_str(SAMPLE).unwrap();
        let err = templates.render("farewell", &PromptVars::new()).unwrap_err();
        assert!(matches!(err, PromptError::TemplateNotFound(k) if k == "farewell"));
    }

    #[test]
    fn test_missing_variable_fails() {
        let templates = PromptTemplates::from_yaml_str(SAMPLE).unwrap();
        let vars = PromptVars::new().text("name", "Ada");
        let err = templates.render("greet", &vars).unwrap_err();
        match err {
            PromptError::MissingVariable { template, variable } => {
                assert_eq!(template, "greet");
                assert_eq!(variable, "role");
            }
            other => panic!("expected MissingVariable, got {other:?}"),
        }
    }

    #[test]
    fn test_extra_variables_are_ignored() {
        let templates = PromptTemplates::from_yaml_str(SAMPLE).unwrap();
        let vars = PromptVars::new()
            .text("name", "Ada")
            .text("role", "SRE")
            .text("unused", "x");
        assert!(templates.render("greet", &vars).is_ok());
    }

    #[test]
    fn test_malformed_placeholder_rejected_at_load() {
        let err = PromptTemplates::from_yaml_str("bad: \"Return {\\\"score\\\": 1}\"").unwrap_err();
        assert!(matches!(err, PromptError::MalformedPlaceholder { template, .. } if template == "bad"));

        let err = PromptTemplates::from_yaml_str("bad: \"unterminated {name\"").unwrap_err();
        assert!(matches!(err, PromptError::MalformedPlaceholder { .. }));
    }

    #[test]
    fn test_single_closing_brace_rejected_at_load() {
        let err = PromptTemplates::from_yaml_str("bad: \"Score: 0}\"").unwrap_err();
        assert!(matches!(
            err,
            PromptError::MalformedPlaceholder { template, offset: 8 } if template == "bad"
        ));
    }

    #[test]
    fn test_ensure_keys_reports_first_missing() {
        let templates = PromptTemplates::from_yaml_str(SAMPLE).unwrap();
        assert!(templates.ensure_keys(&["greet", "example"]).is_ok());
        let err = templates.ensure_keys(&["greet", "evaluate"]).unwrap_err();
        assert!(matches!(err, PromptError::TemplateNotFound(k) if k == "evaluate"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let templates = PromptTemplates::load(file.path()).unwrap();
        assert!(templates.ensure_keys(&["greet"]).is_ok());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PromptTemplates::load(dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, PromptError::Io(_)));
    }

    #[test]
    fn test_shipped_prompts_define_every_required_template() {
        let templates = fixtures::shipped_templates();
        templates.ensure_keys(REQUIRED_TEMPLATES).unwrap();
    }
}
