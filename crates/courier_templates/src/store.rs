// --- File: crates/courier_templates/src/store.rs ---
//! Template persistence seam.
//!
//! The trait keeps the lifecycle manager storage-agnostic; the in-memory
//! arena is the shipped backend for single-process deployments and tests.
//! Activation lives on the store because it is the one cross-row operation
//! that must be atomic: no interleaving may observe zero or two active rows
//! for the same (name, language).

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use uuid::Uuid;

use courier_common::error::{internal_error, not_found, state_error, validation_error, CourierError};
use courier_common::services::BoxFuture;

use crate::model::{Template, TemplateFilter, TemplateStatus};

pub trait TemplateStore: Send + Sync {
    /// Insert version 1 of a new template. Fails with a validation error if
    /// any version with the same (name, language) already exists.
    fn create(&self, template: Template) -> BoxFuture<'_, Template, CourierError>;

    /// Insert a cloned version. Fails if (name, language, version) is taken.
    fn insert_version(&self, template: Template) -> BoxFuture<'_, Template, CourierError>;

    fn get(&self, id: Uuid) -> BoxFuture<'_, Option<Template>, CourierError>;

    fn list(&self, filter: TemplateFilter) -> BoxFuture<'_, Vec<Template>, CourierError>;

    /// All versions sharing (name, language), ascending by version.
    fn find_versions(&self, name: &str, language: &str)
        -> BoxFuture<'_, Vec<Template>, CourierError>;

    /// The single active version of (name, language), if any.
    fn find_active(&self, name: &str, language: &str)
        -> BoxFuture<'_, Option<Template>, CourierError>;

    /// Replace the stored row by id.
    fn update(&self, template: Template) -> BoxFuture<'_, Template, CourierError>;

    /// Atomically activate an approved version: deactivate every other row
    /// sharing (name, language), then mark this row active. Fails with a
    /// state error unless the target is approved.
    fn activate(&self, id: Uuid) -> BoxFuture<'_, Template, CourierError>;

    /// Bump the usage counter and stamp `last_used_at` in one step.
    fn record_dispatch(&self, id: Uuid) -> BoxFuture<'_, (), CourierError>;
}

/// In-memory arena keyed by template id.
#[derive(Default)]
pub struct InMemoryTemplateStore {
    rows: RwLock<HashMap<Uuid, Template>>,
}

impl InMemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_guard(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<Uuid, Template>>, CourierError> {
        self.rows
            .read()
            .map_err(|_| internal_error("template store lock poisoned"))
    }

    fn write_guard(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<Uuid, Template>>, CourierError> {
        self.rows
            .write()
            .map_err(|_| internal_error("template store lock poisoned"))
    }
}

impl TemplateStore for InMemoryTemplateStore {
    fn create(&self, template: Template) -> BoxFuture<'_, Template, CourierError> {
        Box::pin(async move {
            let mut rows = self.write_guard()?;
            let duplicate = rows
                .values()
                .any(|t| t.name == template.name && t.language == template.language);
            if duplicate {
                return Err(validation_error(format!(
                    "template '{}' already exists for language '{}'",
                    template.name, template.language
                )));
            }
            rows.insert(template.id, template.clone());
            Ok(template)
        })
    }

    fn insert_version(&self, template: Template) -> BoxFuture<'_, Template, CourierError> {
        Box::pin(async move {
            let mut rows = self.write_guard()?;
            let duplicate = rows.values().any(|t| {
                t.name == template.name
                    && t.language == template.language
                    && t.version == template.version
            });
            if duplicate {
                return Err(validation_error(format!(
                    "version {} of template '{}' ({}) already exists",
                    template.version, template.name, template.language
                )));
            }
            rows.insert(template.id, template.clone());
            Ok(template)
        })
    }

    fn get(&self, id: Uuid) -> BoxFuture<'_, Option<Template>, CourierError> {
        Box::pin(async move { Ok(self.read_guard()?.get(&id).cloned()) })
    }

    fn list(&self, filter: TemplateFilter) -> BoxFuture<'_, Vec<Template>, CourierError> {
        Box::pin(async move {
            let rows = self.read_guard()?;
            let mut matched: Vec<Template> =
                rows.values().filter(|t| filter.matches(t)).cloned().collect();
            matched.sort_by(|a, b| {
                a.name
                    .cmp(&b.name)
                    .then(a.language.cmp(&b.language))
                    .then(a.version.cmp(&b.version))
            });
            Ok(matched)
        })
    }

    fn find_versions(
        &self,
        name: &str,
        language: &str,
    ) -> BoxFuture<'_, Vec<Template>, CourierError> {
        let name = name.to_string();
        let language = language.to_string();
        Box::pin(async move {
            let rows = self.read_guard()?;
            let mut versions: Vec<Template> = rows
                .values()
                .filter(|t| t.name == name && t.language == language)
                .cloned()
                .collect();
            versions.sort_by_key(|t| t.version);
            Ok(versions)
        })
    }

    fn find_active(
        &self,
        name: &str,
        language: &str,
    ) -> BoxFuture<'_, Option<Template>, CourierError> {
        let name = name.to_string();
        let language = language.to_string();
        Box::pin(async move {
            let rows = self.read_guard()?;
            Ok(rows
                .values()
                .find(|t| t.name == name && t.language == language && t.is_active)
                .cloned())
        })
    }

    fn update(&self, template: Template) -> BoxFuture<'_, Template, CourierError> {
        Box::pin(async move {
            let mut rows = self.write_guard()?;
            if !rows.contains_key(&template.id) {
                return Err(not_found(format!("template {}", template.id)));
            }
            rows.insert(template.id, template.clone());
            Ok(template)
        })
    }

    fn activate(&self, id: Uuid) -> BoxFuture<'_, Template, CourierError> {
        Box::pin(async move {
            // One write guard covers the deactivate-old + activate-new pair.
            let mut rows = self.write_guard()?;
            let target = rows
                .get(&id)
                .cloned()
                .ok_or_else(|| not_found(format!("template {id}")))?;
            if target.status != TemplateStatus::Approved {
                return Err(state_error(format!(
                    "only approved templates can be activated (current: {})",
                    target.status.as_str()
                )));
            }

            let now = Utc::now();
            for row in rows.values_mut() {
                if row.id != id
                    && row.name == target.name
                    && row.language == target.language
                    && row.is_active
                {
                    row.is_active = false;
                    row.updated_at = now;
                }
            }

            let row = rows
                .get_mut(&id)
                .ok_or_else(|| not_found(format!("template {id}")))?;
            row.status = TemplateStatus::Active;
            row.is_active = true;
            row.updated_at = now;
            Ok(row.clone())
        })
    }

    fn record_dispatch(&self, id: Uuid) -> BoxFuture<'_, (), CourierError> {
        Box::pin(async move {
            let mut rows = self.write_guard()?;
            let row = rows
                .get_mut(&id)
                .ok_or_else(|| not_found(format!("template {id}")))?;
            row.usage_count += 1;
            row.last_used_at = Some(Utc::now());
            Ok(())
        })
    }
}
