// --- File: crates/courier_templates/src/model.rs ---
//! Template entity and the DTOs that drive its lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The channel a template renders for. Push notifications carry inline
/// content only, so they have no template channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateChannel {
    Email,
    Sms,
    WhatsApp,
}

/// Lifecycle state of a template version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateStatus {
    Draft,
    PendingApproval,
    Approved,
    Rejected,
    Active,
    Archived,
}

impl TemplateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateStatus::Draft => "draft",
            TemplateStatus::PendingApproval => "pending_approval",
            TemplateStatus::Approved => "approved",
            TemplateStatus::Rejected => "rejected",
            TemplateStatus::Active => "active",
            TemplateStatus::Archived => "archived",
        }
    }
}

/// A named, versioned message definition for one channel.
///
/// Versions of the same template share (name, language); at most one of them
/// is active at any time. A non-root version references its parent through
/// `parent_id`, forming a simple forward chain back to version 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: Uuid,
    pub name: String,
    pub channel: TemplateChannel,
    pub category: String,
    pub language: String,
    pub version: u32,
    pub status: TemplateStatus,
    pub is_active: bool,

    // Channel-specific content. Email uses subject + html/text bodies,
    // SMS and WhatsApp use message_body.
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub html_body: Option<String>,
    #[serde(default)]
    pub text_body: Option<String>,
    #[serde(default)]
    pub message_body: Option<String>,

    /// Variable names the content declares; rendering requires all of them.
    #[serde(default)]
    pub variables: Vec<String>,

    #[serde(default)]
    pub parent_id: Option<Uuid>,

    pub usage_count: u64,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejection_reason: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Template {
    /// Does this template hold any renderable content at all?
    pub fn has_content(&self) -> bool {
        match self.channel {
            TemplateChannel::Email => {
                self.subject.is_some() && (self.html_body.is_some() || self.text_body.is_some())
            }
            TemplateChannel::Sms | TemplateChannel::WhatsApp => self.message_body.is_some(),
        }
    }
}

/// Payload for creating a brand-new template (version 1, draft).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTemplate {
    pub name: String,
    pub channel: TemplateChannel,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub html_body: Option<String>,
    #[serde(default)]
    pub text_body: Option<String>,
    #[serde(default)]
    pub message_body: Option<String>,
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

impl Default for NewTemplate {
    fn default() -> Self {
        Self {
            name: String::new(),
            channel: TemplateChannel::Email,
            category: default_category(),
            language: default_language(),
            subject: None,
            html_body: None,
            text_body: None,
            message_body: None,
            variables: Vec::new(),
            created_by: None,
        }
    }
}

fn default_category() -> String {
    "transactional".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

/// Partial update applied to an existing template or a freshly cloned
/// version. Content fields on an active template are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateUpdate {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub html_body: Option<String>,
    #[serde(default)]
    pub text_body: Option<String>,
    #[serde(default)]
    pub message_body: Option<String>,
    #[serde(default)]
    pub variables: Option<Vec<String>>,
}

impl TemplateUpdate {
    /// True when the update touches rendered output rather than metadata.
    pub fn changes_content(&self) -> bool {
        self.subject.is_some()
            || self.html_body.is_some()
            || self.text_body.is_some()
            || self.message_body.is_some()
            || self.variables.is_some()
    }

    pub fn apply_to(&self, template: &mut Template) {
        if let Some(category) = &self.category {
            template.category = category.clone();
        }
        if let Some(subject) = &self.subject {
            template.subject = Some(subject.clone());
        }
        if let Some(html) = &self.html_body {
            template.html_body = Some(html.clone());
        }
        if let Some(text) = &self.text_body {
            template.text_body = Some(text.clone());
        }
        if let Some(body) = &self.message_body {
            template.message_body = Some(body.clone());
        }
        if let Some(variables) = &self.variables {
            template.variables = variables.clone();
        }
    }
}

/// Listing filter; all fields are conjunctive, `search` matches name substrings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateFilter {
    #[serde(default)]
    pub channel: Option<TemplateChannel>,
    #[serde(default)]
    pub status: Option<TemplateStatus>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
}

impl TemplateFilter {
    pub fn matches(&self, template: &Template) -> bool {
        if let Some(channel) = self.channel {
            if template.channel != channel {
                return false;
            }
        }
        if let Some(status) = self.status {
            if template.status != status {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if &template.category != category {
                return false;
            }
        }
        if let Some(language) = &self.language {
            if &template.language != language {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            if !template.name.to_lowercase().contains(&needle) {
                return false;
            }
        }
        true
    }
}
