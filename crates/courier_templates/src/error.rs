// --- File: crates/courier_templates/src/error.rs ---
use courier_common::error::CourierError;
use thiserror::Error;

/// Errors raised while resolving or rendering a template.
#[derive(Error, Debug)]
pub enum TemplateError {
    /// The caller-supplied variable map does not cover the declared set.
    /// No partial rendering is performed.
    #[error("missing required variables: {}", .0.join(", "))]
    MissingVariables(Vec<String>),

    /// No version of (name, language) is currently active.
    #[error("no active template for '{name}' ({language})")]
    NoActiveVersion { name: String, language: String },

    /// The template exists but holds no content for its channel.
    #[error("template '{0}' has no renderable content")]
    EmptyContent(String),

    #[error(transparent)]
    Common(#[from] CourierError),
}

impl From<TemplateError> for CourierError {
    fn from(err: TemplateError) -> Self {
        match err {
            TemplateError::MissingVariables(_) | TemplateError::EmptyContent(_) => {
                CourierError::ValidationError(err.to_string())
            }
            TemplateError::NoActiveVersion { .. } => CourierError::NotFoundError(err.to_string()),
            TemplateError::Common(inner) => inner,
        }
    }
}
