use formfunnel_core::FormFunnelError;
use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Sender, recipient and subject of a message. Template subject files fill
/// in whatever they know; flows override the rest per message.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageConfig {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub target: String,
    pub content: String,
}

impl Replacement {
    pub fn new(target: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedEmail {
    pub config: MessageConfig,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct Template {
    pub kind: String,
    pub envelope: MessageConfig,
    pub body: String,
}

#[derive(Debug, Default)]
pub struct TemplateSet {
    templates: HashMap<String, Template>,
}

impl TemplateSet {
    pub fn new() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// Reads `<kind>.html` and `<kind>_subject.json` from `dir` for every kind.
    pub fn load(dir: impl AsRef<Path>, kinds: &[&str]) -> Result<Self, FormFunnelError> {
        let dir = dir.as_ref();
        let mut set = Self::new();
        for kind in kinds {
            let body_path = dir.join(format!("{kind}.html"));
            let subject_path = dir.join(format!("{kind}_subject.json"));
            let body = std::fs::read_to_string(&body_path).map_err(|e| {
                FormFunnelError::Template(format!("{}: {e}", body_path.display()))
            })?;
            let subject = std::fs::read_to_string(&subject_path).map_err(|e| {
                FormFunnelError::Template(format!("{}: {e}", subject_path.display()))
            })?;
            let envelope: MessageConfig = serde_json::from_str(&subject).map_err(|e| {
                FormFunnelError::Template(format!("{}: {e}", subject_path.display()))
            })?;
            set.insert(Template {
                kind: kind.to_string(),
                envelope,
                body,
            });
        }
        info!("loaded {} email templates from {}", set.templates.len(), dir.display());
        Ok(set)
    }

    pub fn insert(&mut self, template: Template) {
        self.templates.insert(template.kind.clone(), template);
    }

    pub fn get(&self, kind: &str) -> Option<&Template> {
        self.templates.get(kind)
    }

    pub fn envelope(&self, kind: &str) -> Result<&MessageConfig, FormFunnelError> {
        self.get(kind)
            .map(|t| &t.envelope)
            .ok_or_else(|| FormFunnelError::Template(format!("unknown template: {kind}")))
    }

    pub fn compose(
        &self,
        kind: &str,
        config: MessageConfig,
        replacements: &[Replacement],
    ) -> Result<ComposedEmail, FormFunnelError> {
        let template = self
            .get(kind)
            .ok_or_else(|| FormFunnelError::Template(format!("unknown template: {kind}")))?;
        Ok(ComposedEmail {
            config,
            body: fill_placeholders(&template.body, replacements)?,
        })
    }
}

/// Replacement `i` (counting from 1) fills every `{{i//target//}}` marker.
/// The target may appear more than once inside a marker, e.g. `{{1//aa//}}`
/// for target `a`.
pub fn fill_placeholders(
    body: &str,
    replacements: &[Replacement],
) -> Result<String, FormFunnelError> {
    let mut html = body.to_string();
    for (index, replacement) in replacements.iter().enumerate() {
        let pattern = format!(
            r"\{{\{{{}//(?:{})+//\}}\}}",
            index + 1,
            regex::escape(&replacement.target)
        );
        let marker = Regex::new(&pattern).map_err(|e| FormFunnelError::Template(e.to_string()))?;
        html = marker
            .replace_all(&html, NoExpand(&replacement.content))
            .into_owned();
    }
    Ok(html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn fills_numbered_markers() {
        let body = "<p>Hola {{1//nombre//}}</p><a href=\"/v?token={{2//verification-token//}}\">{{1//nombre//}}</a>";
        let html = fill_placeholders(
            body,
            &[
                Replacement::new("nombre", "Harold"),
                Replacement::new("verification-token", "abc"),
            ],
        )
        .expect("fill");
        assert_eq!(
            html,
            "<p>Hola Harold</p><a href=\"/v?token=abc\">Harold</a>"
        );
    }

    #[test]
    fn index_must_match_position() {
        let html = fill_placeholders(
            "{{2//nombre//}} {{1//nombre//}}",
            &[Replacement::new("nombre", "Harold")],
        )
        .expect("fill");
        assert_eq!(html, "{{2//nombre//}} Harold");
    }

    #[test]
    fn repeated_target_and_literal_dollar() {
        let html = fill_placeholders(
            "{{1//rolerole//}}",
            &[Replacement::new("role", "$1 manager")],
        )
        .expect("fill");
        assert_eq!(html, "$1 manager");
    }

    #[test]
    fn empty_content_removes_marker() {
        let html = fill_placeholders(
            "Soy Ana{{1//organization//}}.",
            &[Replacement::new("organization", "")],
        )
        .expect("fill");
        assert_eq!(html, "Soy Ana.");
    }

    #[test]
    fn loads_and_composes() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("verify.html"), "Hola {{1//nombre//}}").expect("write");
        fs::write(
            dir.path().join("verify_subject.json"),
            r#"{"from": "Nodo <hola@example.org>", "subject": "Verify"}"#,
        )
        .expect("write");
        let set = TemplateSet::load(dir.path(), &["verify"]).expect("load");
        let mut envelope = set.envelope("verify").expect("envelope").clone();
        assert_eq!(envelope.to, "");
        envelope.to = "harold@example.org".into();
        let email = set
            .compose("verify", envelope, &[Replacement::new("nombre", "Harold")])
            .expect("compose");
        assert_eq!(email.body, "Hola Harold");
        assert_eq!(email.config.subject, "Verify");
        assert_eq!(email.config.to, "harold@example.org");
        assert!(set.compose("nope", MessageConfig::default(), &[]).is_err());
    }

    #[test]
    fn missing_template_files_fail_to_load() {
        let dir = TempDir::new().expect("tempdir");
        assert!(TemplateSet::load(dir.path(), &["verify"]).is_err());
    }
}
