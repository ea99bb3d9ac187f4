// --- File: crates/courier_templates/src/renderer.rs ---
//! Placeholder substitution with variable-completeness validation.
//!
//! Placeholders look like `{{ name }}`; whitespace around the name is
//! ignored. Values are inserted as their literal string form with no
//! escaping, since templates may intentionally embed markup. Rendering is
//! pure: identical template + variables always produce identical output.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::TemplateError;
use crate::model::{Template, TemplateChannel};
use crate::store::TemplateStore;

/// Channel-shaped output of a render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Rendered {
    Email {
        subject: String,
        html: Option<String>,
        text: Option<String>,
    },
    Message {
        message: String,
    },
}

#[derive(Clone)]
pub struct TemplateRenderer {
    store: Arc<dyn TemplateStore>,
}

impl TemplateRenderer {
    pub fn new(store: Arc<dyn TemplateStore>) -> Self {
        Self { store }
    }

    /// Resolve the active version of (name, language) and render it.
    pub async fn render(
        &self,
        name: &str,
        language: &str,
        variables: &HashMap<String, String>,
    ) -> Result<(Template, Rendered), TemplateError> {
        let template = self
            .store
            .find_active(name, language)
            .await
            .map_err(TemplateError::Common)?
            .ok_or_else(|| TemplateError::NoActiveVersion {
                name: name.to_string(),
                language: language.to_string(),
            })?;
        let rendered = render_template(&template, variables)?;
        Ok((template, rendered))
    }
}

/// Render one concrete template version against a variable map.
///
/// Fails before any substitution when a declared variable is absent.
pub fn render_template(
    template: &Template,
    variables: &HashMap<String, String>,
) -> Result<Rendered, TemplateError> {
    let missing: Vec<String> = template
        .variables
        .iter()
        .filter(|name| !variables.contains_key(*name))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(TemplateError::MissingVariables(missing));
    }

    match template.channel {
        TemplateChannel::Email => {
            let subject = template
                .subject
                .as_deref()
                .ok_or_else(|| TemplateError::EmptyContent(template.name.clone()))?;
            if template.html_body.is_none() && template.text_body.is_none() {
                return Err(TemplateError::EmptyContent(template.name.clone()));
            }
            Ok(Rendered::Email {
                subject: substitute(subject, variables),
                html: template.html_body.as_deref().map(|b| substitute(b, variables)),
                text: template.text_body.as_deref().map(|b| substitute(b, variables)),
            })
        }
        TemplateChannel::Sms | TemplateChannel::WhatsApp => {
            let body = template
                .message_body
                .as_deref()
                .ok_or_else(|| TemplateError::EmptyContent(template.name.clone()))?;
            Ok(Rendered::Message {
                message: substitute(body, variables),
            })
        }
    }
}

/// Replace every `{{ key }}` whose trimmed key is present in the map.
/// Unknown placeholders are left untouched.
pub fn substitute(input: &str, variables: &HashMap<String, String>) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(open) = rest.find("{{") {
        let after_open = &rest[open + 2..];
        match after_open.find("}}") {
            Some(close) => {
                let key = after_open[..close].trim();
                match variables.get(key) {
                    Some(value) => {
                        output.push_str(&rest[..open]);
                        output.push_str(value);
                    }
                    None => {
                        output.push_str(&rest[..open + 2 + close + 2]);
                    }
                }
                rest = &after_open[close + 2..];
            }
            None => break,
        }
    }
    output.push_str(rest);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewTemplate, TemplateStatus};
    use crate::store::InMemoryTemplateStore;
    use chrono::Utc;
    use uuid::Uuid;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn sms_template(body: &str, declared: &[&str]) -> Template {
        let now = Utc::now();
        Template {
            id: Uuid::new_v4(),
            name: "otp_sms".into(),
            channel: TemplateChannel::Sms,
            category: "verification".into(),
            language: "en".into(),
            version: 1,
            status: TemplateStatus::Active,
            is_active: true,
            subject: None,
            html_body: None,
            text_body: None,
            message_body: Some(body.to_string()),
            variables: declared.iter().map(|s| s.to_string()).collect(),
            parent_id: None,
            usage_count: 0,
            last_used_at: None,
            created_by: None,
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn renders_otp_body_exactly() {
        let template = sms_template(
            "Your OTP is: {{otp}}. Valid for {{validMinutes}} minutes.",
            &["otp", "validMinutes"],
        );
        let rendered = render_template(
            &template,
            &vars(&[("otp", "123456"), ("validMinutes", "10")]),
        )
        .unwrap();
        match rendered {
            Rendered::Message { message } => {
                assert_eq!(message, "Your OTP is: 123456. Valid for 10 minutes.");
                assert!(!message.contains("{{"));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn missing_variables_fail_without_partial_render() {
        let template = sms_template(
            "Your OTP is: {{otp}}. Valid for {{validMinutes}} minutes.",
            &["otp", "validMinutes"],
        );
        let err = render_template(&template, &vars(&[("otp", "123456")])).unwrap_err();
        match err {
            TemplateError::MissingVariables(names) => {
                assert_eq!(names, vec!["validMinutes".to_string()])
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rendering_is_deterministic() {
        let template = sms_template("Hi {{ name }}, code {{code}}.", &["name", "code"]);
        let variables = vars(&[("name", "Ada"), ("code", "42")]);
        let first = render_template(&template, &variables).unwrap();
        let second = render_template(&template, &variables).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn whitespace_in_placeholders_is_tolerated() {
        let out = substitute("a {{ x }} b {{x}} c", &vars(&[("x", "1")]));
        assert_eq!(out, "a 1 b 1 c");
    }

    #[test]
    fn unknown_placeholders_are_left_alone() {
        let out = substitute("hello {{who}}", &vars(&[("name", "Ada")]));
        assert_eq!(out, "hello {{who}}");
    }

    #[test]
    fn no_escaping_is_applied() {
        let out = substitute("<p>{{content}}</p>", &vars(&[("content", "<b>hi</b>")]));
        assert_eq!(out, "<p><b>hi</b></p>");
    }

    #[tokio::test]
    async fn render_resolves_only_the_active_version() {
        let store = Arc::new(InMemoryTemplateStore::new());
        let renderer = TemplateRenderer::new(store.clone());

        let err = renderer.render("welcome", "en", &vars(&[])).await.unwrap_err();
        assert!(matches!(err, TemplateError::NoActiveVersion { .. }));

        let manager = crate::manager::TemplateManager::new(store);
        let template = manager
            .create(NewTemplate {
                name: "welcome".into(),
                channel: TemplateChannel::Email,
                category: "transactional".into(),
                language: "en".into(),
                subject: Some("Welcome".into()),
                html_body: Some("<h1>Welcome {{name}}!</h1>".into()),
                text_body: None,
                message_body: None,
                variables: vec!["name".into()],
                created_by: None,
            })
            .await
            .unwrap();
        manager.submit_for_approval(template.id).await.unwrap();
        manager.approve(template.id, "reviewer").await.unwrap();
        manager.activate(template.id).await.unwrap();

        let (resolved, rendered) = renderer
            .render("welcome", "en", &vars(&[("name", "Ada")]))
            .await
            .unwrap();
        assert_eq!(resolved.version, 1);
        match rendered {
            Rendered::Email { subject, html, .. } => {
                assert_eq!(subject, "Welcome");
                assert_eq!(html.as_deref(), Some("<h1>Welcome Ada!</h1>"));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }
}
