//! Template context: the single substitution value available to templates.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// Rendering payload.
///
/// Templates see exactly one variable, `generated_at`, an RFC 3339 UTC
/// timestamp with seconds precision. Built-in templates narrow it to a date
/// with Tera's `date` filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateContext {
    pub generated_at: String,
}

impl TemplateContext {
    /// Build a context for a render happening at `generated_at`.
    pub fn at(generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at: generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    /// Convert to a [`tera::Context`] for rendering.
    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        tera::Context::from_serialize(self).map_err(RenderError::from)
    }
}
