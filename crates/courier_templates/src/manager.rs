// --- File: crates/courier_templates/src/manager.rs ---
//! Template lifecycle manager.
//!
//! Drives the draft -> pending_approval -> approved/rejected -> active ->
//! archived state machine over a [`TemplateStore`]. Content of an active
//! template is immutable; changes go through [`TemplateManager::create_version`].

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use courier_common::error::{not_found, state_error, validation_error, CourierError};

use crate::model::{NewTemplate, Template, TemplateFilter, TemplateStatus, TemplateUpdate};
use crate::store::TemplateStore;

#[derive(Clone)]
pub struct TemplateManager {
    store: Arc<dyn TemplateStore>,
}

impl TemplateManager {
    pub fn new(store: Arc<dyn TemplateStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<dyn TemplateStore> {
        Arc::clone(&self.store)
    }

    /// Create version 1 of a new template, as an inactive draft.
    pub async fn create(&self, definition: NewTemplate) -> Result<Template, CourierError> {
        let now = Utc::now();
        let template = Template {
            id: Uuid::new_v4(),
            name: definition.name,
            channel: definition.channel,
            category: definition.category,
            language: definition.language,
            version: 1,
            status: TemplateStatus::Draft,
            is_active: false,
            subject: definition.subject,
            html_body: definition.html_body,
            text_body: definition.text_body,
            message_body: definition.message_body,
            variables: definition.variables,
            parent_id: None,
            usage_count: 0,
            last_used_at: None,
            created_by: definition.created_by,
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        };
        if !template.has_content() {
            return Err(validation_error(format!(
                "template '{}' is missing content for channel {:?}",
                template.name, template.channel
            )));
        }
        let created = self.store.create(template).await?;
        info!(name = %created.name, language = %created.language, id = %created.id, "Template created");
        Ok(created)
    }

    pub async fn get(&self, id: Uuid) -> Result<Template, CourierError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| not_found(format!("template {id}")))
    }

    pub async fn list(&self, filter: TemplateFilter) -> Result<Vec<Template>, CourierError> {
        self.store.list(filter).await
    }

    pub async fn find_active(
        &self,
        name: &str,
        language: &str,
    ) -> Result<Option<Template>, CourierError> {
        self.store.find_active(name, language).await
    }

    /// Update a template in place. Metadata changes are always allowed;
    /// content changes on an active template fail with a state error.
    pub async fn update(&self, id: Uuid, changes: TemplateUpdate) -> Result<Template, CourierError> {
        let mut template = self.get(id).await?;
        if changes.changes_content() && template.status == TemplateStatus::Active {
            return Err(state_error(
                "cannot edit content of an active template; create a new version",
            ));
        }
        changes.apply_to(&mut template);
        template.updated_at = Utc::now();
        self.store.update(template).await
    }

    /// Clone a template as the next version in its lineage: version+1,
    /// parent reference set, status reset to draft, counters reset.
    pub async fn create_version(
        &self,
        id: Uuid,
        changes: TemplateUpdate,
    ) -> Result<Template, CourierError> {
        let parent = self.get(id).await?;
        let latest = self
            .store
            .find_versions(&parent.name, &parent.language)
            .await?
            .last()
            .map(|t| t.version)
            .unwrap_or(parent.version);

        let now = Utc::now();
        let mut version = Template {
            id: Uuid::new_v4(),
            version: latest + 1,
            status: TemplateStatus::Draft,
            is_active: false,
            parent_id: Some(parent.id),
            usage_count: 0,
            last_used_at: None,
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
            ..parent
        };
        changes.apply_to(&mut version);

        let created = self.store.insert_version(version).await?;
        info!(name = %created.name, version = created.version, id = %created.id, "Template version created");
        Ok(created)
    }

    pub async fn submit_for_approval(&self, id: Uuid) -> Result<Template, CourierError> {
        let mut template = self.get(id).await?;
        if template.status != TemplateStatus::Draft {
            return Err(illegal_transition(template.status, "submit for approval"));
        }
        template.status = TemplateStatus::PendingApproval;
        template.updated_at = Utc::now();
        self.store.update(template).await
    }

    pub async fn approve(&self, id: Uuid, approver: &str) -> Result<Template, CourierError> {
        let mut template = self.get(id).await?;
        if template.status != TemplateStatus::PendingApproval {
            return Err(illegal_transition(template.status, "approve"));
        }
        template.status = TemplateStatus::Approved;
        template.approved_by = Some(approver.to_string());
        template.approved_at = Some(Utc::now());
        template.updated_at = Utc::now();
        let updated = self.store.update(template).await?;
        info!(id = %updated.id, approver, "Template approved");
        Ok(updated)
    }

    pub async fn reject(&self, id: Uuid, reason: &str) -> Result<Template, CourierError> {
        let mut template = self.get(id).await?;
        if template.status != TemplateStatus::PendingApproval {
            return Err(illegal_transition(template.status, "reject"));
        }
        template.status = TemplateStatus::Rejected;
        template.rejection_reason = Some(reason.to_string());
        template.updated_at = Utc::now();
        self.store.update(template).await
    }

    /// Activate an approved version. The store performs the exclusive swap
    /// atomically, so (name, language) never observes two active rows.
    pub async fn activate(&self, id: Uuid) -> Result<Template, CourierError> {
        let activated = self.store.activate(id).await?;
        info!(name = %activated.name, version = activated.version, "Template activated");
        Ok(activated)
    }

    pub async fn archive(&self, id: Uuid) -> Result<Template, CourierError> {
        let mut template = self.get(id).await?;
        if template.status == TemplateStatus::Archived {
            return Err(illegal_transition(template.status, "archive"));
        }
        template.status = TemplateStatus::Archived;
        template.is_active = false;
        template.updated_at = Utc::now();
        self.store.update(template).await
    }
}

fn illegal_transition(from: TemplateStatus, operation: &str) -> CourierError {
    state_error(format!("cannot {operation} a {} template", from.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TemplateChannel;
    use crate::store::InMemoryTemplateStore;

    fn manager() -> TemplateManager {
        TemplateManager::new(Arc::new(InMemoryTemplateStore::new()))
    }

    fn email_definition(name: &str) -> NewTemplate {
        NewTemplate {
            name: name.to_string(),
            channel: TemplateChannel::Email,
            category: "transactional".into(),
            language: "en".into(),
            subject: Some("Welcome".into()),
            html_body: Some("<h1>Welcome {{name}}!</h1>".into()),
            text_body: Some("Welcome {{name}}!".into()),
            message_body: None,
            variables: vec!["name".into()],
            created_by: Some("tests".into()),
        }
    }

    async fn approve_and_activate(manager: &TemplateManager, id: Uuid) -> Template {
        manager.submit_for_approval(id).await.unwrap();
        manager.approve(id, "reviewer").await.unwrap();
        manager.activate(id).await.unwrap()
    }

    #[tokio::test]
    async fn duplicate_name_language_fails() {
        let manager = manager();
        manager.create(email_definition("welcome")).await.unwrap();
        let err = manager.create(email_definition("welcome")).await.unwrap_err();
        assert!(matches!(err, CourierError::ValidationError(_)));
    }

    #[tokio::test]
    async fn activation_requires_approved_status() {
        let manager = manager();
        let draft = manager.create(email_definition("welcome")).await.unwrap();

        // Draft cannot be activated and state is unchanged.
        let err = manager.activate(draft.id).await.unwrap_err();
        assert!(matches!(err, CourierError::StateError(_)));
        let unchanged = manager.get(draft.id).await.unwrap();
        assert_eq!(unchanged.status, TemplateStatus::Draft);
        assert!(!unchanged.is_active);

        manager.submit_for_approval(draft.id).await.unwrap();
        let err = manager.activate(draft.id).await.unwrap_err();
        assert!(matches!(err, CourierError::StateError(_)));

        manager.approve(draft.id, "reviewer").await.unwrap();
        let active = manager.activate(draft.id).await.unwrap();
        assert_eq!(active.status, TemplateStatus::Active);
        assert!(active.is_active);
    }

    #[tokio::test]
    async fn rejected_template_cannot_be_activated() {
        let manager = manager();
        let template = manager.create(email_definition("welcome")).await.unwrap();
        manager.submit_for_approval(template.id).await.unwrap();
        manager.reject(template.id, "tone is off").await.unwrap();
        let err = manager.activate(template.id).await.unwrap_err();
        assert!(matches!(err, CourierError::StateError(_)));
    }

    #[tokio::test]
    async fn activating_new_version_deactivates_previous() {
        let manager = manager();
        let v1 = manager.create(email_definition("welcome_email")).await.unwrap();
        approve_and_activate(&manager, v1.id).await;

        let v2 = manager
            .create_version(
                v1.id,
                TemplateUpdate {
                    html_body: Some("<h1>Hello {{name}}!</h1>".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(v2.version, 2);
        assert_eq!(v2.parent_id, Some(v1.id));
        assert_eq!(v2.status, TemplateStatus::Draft);
        assert_eq!(v2.usage_count, 0);

        approve_and_activate(&manager, v2.id).await;

        let active = manager
            .find_active("welcome_email", "en")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.version, 2);

        let old = manager.get(v1.id).await.unwrap();
        assert!(!old.is_active);

        // At most one active row for (name, language).
        let versions = manager
            .store()
            .find_versions("welcome_email", "en")
            .await
            .unwrap();
        assert_eq!(versions.iter().filter(|t| t.is_active).count(), 1);
    }

    #[tokio::test]
    async fn active_template_content_is_immutable() {
        let manager = manager();
        let template = manager.create(email_definition("welcome")).await.unwrap();
        approve_and_activate(&manager, template.id).await;

        let err = manager
            .update(
                template.id,
                TemplateUpdate {
                    html_body: Some("<p>edited</p>".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CourierError::StateError(_)));

        // Metadata changes stay legal.
        let updated = manager
            .update(
                template.id,
                TemplateUpdate {
                    category: Some("onboarding".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.category, "onboarding");
    }

    #[tokio::test]
    async fn archive_is_terminal() {
        let manager = manager();
        let template = manager.create(email_definition("welcome")).await.unwrap();
        let archived = manager.archive(template.id).await.unwrap();
        assert_eq!(archived.status, TemplateStatus::Archived);
        assert!(!archived.is_active);

        let err = manager.archive(template.id).await.unwrap_err();
        assert!(matches!(err, CourierError::StateError(_)));
        let err = manager.submit_for_approval(template.id).await.unwrap_err();
        assert!(matches!(err, CourierError::StateError(_)));
    }
}
