// --- File: crates/courier_templates/src/lib.rs ---
//! Versioned message templates: lifecycle, rendering and usage analytics.
//!
//! A template is a named, per-channel message definition that moves through
//! a review lifecycle (draft, pending approval, approved or rejected,
//! active, archived). Exactly one version per (name, language) can be
//! active; the renderer resolves that version and substitutes `{{variable}}`
//! placeholders. Every dispatch appends a usage row which later
//! webhook-driven status events upgrade monotonically.

pub mod error;
pub mod manager;
pub mod model;
pub mod renderer;
pub mod seed;
pub mod store;
pub mod usage;

pub use error::TemplateError;
pub use manager::TemplateManager;
pub use model::{
    NewTemplate, Template, TemplateChannel, TemplateFilter, TemplateStatus, TemplateUpdate,
};
pub use renderer::{render_template, Rendered, TemplateRenderer};
pub use store::{InMemoryTemplateStore, TemplateStore};
pub use usage::{
    ApplyOutcome, InMemoryUsageLog, TemplateAnalytics, UsageLog, UsageRecord, UsageStatus,
};
