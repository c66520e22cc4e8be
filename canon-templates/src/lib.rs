//! # canon-templates
//!
//! Tera-based template set that renders the standards rule documents
//! deployed into a project's `.cursor/rules/` directory.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use canon_templates::TemplateSet;
//!
//! fn render_all() {
//!     if let Ok(set) = TemplateSet::builtin() {
//!         if let Ok(artifacts) = set.render(Utc::now()) {
//!             for artifact in artifacts {
//!                 println!("{}: {} bytes", artifact.filename, artifact.content.len());
//!             }
//!         }
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::TemplateContext;
pub use engine::{StandardsDoc, TemplateEngine, TemplateSet, TEMPLATE_SET_VERSION};
pub use error::RenderError;
