//! Tera rendering engine: [`StandardsDoc`], [`TemplateEngine`] and [`TemplateSet`].
//!
//! # Output files
//!
//! | Document      | Filename             |
//! |---------------|----------------------|
//! | CodeQuality   | `code-quality.mdc`   |
//! | Testing       | `testing.mdc`        |
//! | Security      | `security.mdc`       |
//! | GitWorkflow   | `git-workflow.mdc`   |
//! | Documentation | `documentation.mdc`  |
//!
//! Filenames are the identity of an artifact in deployment history; renaming
//! one makes it a brand-new file with no baseline.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tera::Tera;

use canon_core::TemplateArtifact;

use crate::context::TemplateContext;
use crate::error::RenderError;

/// Version recorded with every deployment of the embedded set.
///
/// Bump whenever an embedded template changes.
pub const TEMPLATE_SET_VERSION: &str = "1.2.0";

// ---------------------------------------------------------------------------
// Embedded templates: baked into the binary at compile time via include_str!
// ---------------------------------------------------------------------------

const TPLS: &[(&str, &str)] = &[
    ("shared/_header.tera", include_str!("templates/_partials/header.tera")),
    (
        "rules/code-quality.mdc.tera",
        include_str!("templates/code-quality.mdc.tera"),
    ),
    ("rules/testing.mdc.tera", include_str!("templates/testing.mdc.tera")),
    ("rules/security.mdc.tera", include_str!("templates/security.mdc.tera")),
    (
        "rules/git-workflow.mdc.tera",
        include_str!("templates/git-workflow.mdc.tera"),
    ),
    (
        "rules/documentation.mdc.tera",
        include_str!("templates/documentation.mdc.tera"),
    ),
];

// ---------------------------------------------------------------------------
// Template loading helpers
// ---------------------------------------------------------------------------

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io { path: path.into(), source }
}

fn normalize_template_name(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .to_lowercase()
}

fn collect_template_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), RenderError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let meta = entry.metadata().map_err(|e| io_err(&path, e))?;
        if meta.is_dir() {
            collect_template_files(&path, out)?;
        } else if meta.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

fn load_user_templates(dir: &Path) -> Result<Vec<(String, String)>, RenderError> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut files = Vec::new();
    collect_template_files(dir, &mut files)?;
    let mut templates = Vec::new();
    for path in files {
        if path.extension().and_then(|s| s.to_str()) != Some("tera") {
            continue;
        }
        let rel = path
            .strip_prefix(dir)
            .unwrap_or(path.as_path());
        let name = normalize_template_name(rel);
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        templates.push((name, contents));
    }
    Ok(templates)
}

/// Returns the Tera instance and the number of embedded templates overridden.
fn build_tera(user_template_dir: Option<&Path>) -> Result<(Tera, usize), RenderError> {
    let mut templates: HashMap<String, String> = HashMap::new();
    for (name, content) in TPLS {
        templates.insert(
            normalize_template_name(Path::new(name)),
            (*content).to_string(),
        );
    }
    let mut overridden = 0;
    if let Some(dir) = user_template_dir {
        for (name, content) in load_user_templates(dir)? {
            if templates.insert(name, content).is_some() {
                overridden += 1;
            }
        }
    }

    let mut tera = Tera::default();
    let items: Vec<(String, String)> = templates.into_iter().collect();
    tera.add_raw_templates(items)?;
    Ok((tera, overridden))
}

// ---------------------------------------------------------------------------
// StandardsDoc
// ---------------------------------------------------------------------------

/// Every rule document in the deployed bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardsDoc {
    CodeQuality,
    Testing,
    Security,
    GitWorkflow,
    Documentation,
}

impl StandardsDoc {
    /// All documents in deployment order.
    pub fn all() -> &'static [StandardsDoc] {
        &[
            StandardsDoc::CodeQuality,
            StandardsDoc::Testing,
            StandardsDoc::Security,
            StandardsDoc::GitWorkflow,
            StandardsDoc::Documentation,
        ]
    }

    /// Tera template name rendered for this document.
    pub fn template_name(&self) -> &'static str {
        match self {
            StandardsDoc::CodeQuality   => "rules/code-quality.mdc.tera",
            StandardsDoc::Testing       => "rules/testing.mdc.tera",
            StandardsDoc::Security      => "rules/security.mdc.tera",
            StandardsDoc::GitWorkflow   => "rules/git-workflow.mdc.tera",
            StandardsDoc::Documentation => "rules/documentation.mdc.tera",
        }
    }

    /// Output filename inside the managed directory.
    pub fn filename(&self) -> &'static str {
        match self {
            StandardsDoc::CodeQuality   => "code-quality.mdc",
            StandardsDoc::Testing       => "testing.mdc",
            StandardsDoc::Security      => "security.mdc",
            StandardsDoc::GitWorkflow   => "git-workflow.mdc",
            StandardsDoc::Documentation => "documentation.mdc",
        }
    }
}

// ---------------------------------------------------------------------------
// TemplateEngine
// ---------------------------------------------------------------------------

/// Tera-based engine for rendering templates with optional user overrides.
///
/// `user_template_dir` may contain `.tera` files that override embedded defaults
/// (for example `rules/testing.mdc.tera`). Template names are normalised to
/// lowercase and relative paths.
pub struct TemplateEngine {
    tera: Tera,
    overridden: usize,
}

impl TemplateEngine {
    /// Construct a new [`TemplateEngine`], loading embedded templates plus any
    /// overrides found in `user_template_dir`.
    pub fn new(user_template_dir: Option<&Path>) -> Result<Self, RenderError> {
        let (tera, overridden) = build_tera(user_template_dir)?;
        Ok(TemplateEngine { tera, overridden })
    }

    /// Number of embedded templates replaced by user overrides.
    pub fn overridden(&self) -> usize {
        self.overridden
    }

    /// Render one document. Line endings are normalised to LF.
    pub fn render(
        &self,
        ctx: &TemplateContext,
        doc: StandardsDoc,
    ) -> Result<TemplateArtifact, RenderError> {
        let tera_ctx = ctx.to_tera_context()?;
        let content = self.tera.render(doc.template_name(), &tera_ctx)?;
        Ok(TemplateArtifact::new(
            doc.filename(),
            content.replace("\r\n", "\n"),
        ))
    }
}

// ---------------------------------------------------------------------------
// TemplateSet
// ---------------------------------------------------------------------------

/// The ordered bundle of rule documents deployed together.
///
/// Create once with [`TemplateSet::builtin`] or [`TemplateSet::load`] and
/// render fresh for every reconciliation.
pub struct TemplateSet {
    engine: TemplateEngine,
}

impl TemplateSet {
    /// Embedded templates only.
    pub fn builtin() -> Result<Self, RenderError> {
        Self::load(None)
    }

    /// Embedded templates plus overrides from `user_template_dir`.
    pub fn load(user_template_dir: Option<&Path>) -> Result<Self, RenderError> {
        Ok(TemplateSet {
            engine: TemplateEngine::new(user_template_dir)?,
        })
    }

    /// Version string recorded in deployment history.
    ///
    /// Sets with user overrides carry a `+custom` suffix.
    pub fn version(&self) -> String {
        if self.engine.overridden() > 0 {
            format!("{TEMPLATE_SET_VERSION}+custom")
        } else {
            TEMPLATE_SET_VERSION.to_string()
        }
    }

    /// Output filenames in deployment order.
    pub fn filenames(&self) -> Vec<&'static str> {
        StandardsDoc::all().iter().map(|doc| doc.filename()).collect()
    }

    /// Render every document, substituting `generated_at` everywhere it appears.
    pub fn render(&self, generated_at: DateTime<Utc>) -> Result<Vec<TemplateArtifact>, RenderError> {
        let ctx = TemplateContext::at(generated_at);
        StandardsDoc::all()
            .iter()
            .map(|doc| self.engine.render(&ctx, *doc))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
