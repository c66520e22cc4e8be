//! Unified diffs between on-disk managed files and rendered artifacts.

use std::io::ErrorKind;
use std::path::Path;

use serde::Serialize;
use similar::TextDiff;

use canon_core::TemplateArtifact;

use crate::error::DeployError;

/// A single managed-file diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDiff {
    pub filename: String,
    pub unified_diff: String,
}

/// Compare each artifact with its counterpart in `rules_dir`.
///
/// Comparison is byte-exact, like the content hashes: a file that only
/// changed line endings shows up here. A missing or unreadable file diffs
/// against empty content. Identical files are left out. No files are written.
pub fn diff_artifacts(
    rules_dir: &Path,
    artifacts: &[TemplateArtifact],
) -> Result<Vec<FileDiff>, DeployError> {
    let mut diffs = Vec::new();
    for artifact in artifacts {
        let rendered = artifact.content.as_str();
        let existing = read_existing_or_empty(&rules_dir.join(&artifact.filename));
        if existing == rendered {
            continue;
        }

        let old_header = format!("a/{}", artifact.filename);
        let new_header = format!("b/{}", artifact.filename);
        let unified_diff = TextDiff::from_lines(existing.as_str(), rendered)
            .unified_diff()
            .header(&old_header, &new_header)
            .context_radius(3)
            .to_string();

        diffs.push(FileDiff {
            filename: artifact.filename.clone(),
            unified_diff,
        });
    }
    Ok(diffs)
}

/// Same treatment as the inventory: unreadable files count as absent.
fn read_existing_or_empty(path: &Path) -> String {
    match std::fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
        Err(err) => {
            tracing::warn!("skipping unreadable managed file {}: {err}", path.display());
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn artifacts() -> Vec<TemplateArtifact> {
        vec![
            TemplateArtifact::new("testing.mdc", "# Testing\n\nWrite tests.\n"),
            TemplateArtifact::new("security.mdc", "# Security\n"),
        ]
    }

    #[test]
    fn identical_files_produce_no_diff() {
        let tmp = TempDir::new().expect("tmp");
        for a in artifacts() {
            fs::write(tmp.path().join(&a.filename), &a.content).expect("write");
        }
        assert!(diff_artifacts(tmp.path(), &artifacts()).expect("diff").is_empty());
    }

    #[test]
    fn crlf_on_disk_is_a_difference() {
        let tmp = TempDir::new().expect("tmp");
        fs::write(tmp.path().join("security.mdc"), "# Security\r\n").expect("write");
        let diffs = diff_artifacts(tmp.path(), &artifacts()[1..]).expect("diff");
        assert_eq!(diffs.len(), 1);
        assert!(diffs[0].unified_diff.contains("-# Security\r\n"));
        assert!(diffs[0].unified_diff.contains("+# Security\n"));
    }

    #[test]
    fn unreadable_file_diffs_against_empty() {
        let tmp = TempDir::new().expect("tmp");
        // A directory where the file should be cannot be read as a file.
        fs::create_dir(tmp.path().join("security.mdc")).expect("mkdir");
        let diffs = diff_artifacts(tmp.path(), &artifacts()[1..]).expect("diff");
        assert_eq!(diffs.len(), 1);
        assert!(diffs[0].unified_diff.contains("+# Security"));
    }

    #[test]
    fn local_edit_produces_unified_diff() {
        let tmp = TempDir::new().expect("tmp");
        for a in artifacts() {
            fs::write(tmp.path().join(&a.filename), &a.content).expect("write");
        }
        fs::write(
            tmp.path().join("testing.mdc"),
            "# Testing\n\nWrite tests.\nmanual tweak\n",
        )
        .expect("edit");

        let diffs = diff_artifacts(tmp.path(), &artifacts()).expect("diff");
        assert_eq!(diffs.len(), 1);
        let d = &diffs[0];
        assert_eq!(d.filename, "testing.mdc");
        assert!(d.unified_diff.contains("--- a/testing.mdc"));
        assert!(d.unified_diff.contains("+++ b/testing.mdc"));
        assert!(d.unified_diff.contains("@@"));
        assert!(d.unified_diff.contains("-manual tweak"));
    }

    #[test]
    fn missing_file_diffs_against_empty() {
        let tmp = TempDir::new().expect("tmp");
        let diffs = diff_artifacts(tmp.path(), &artifacts()).expect("diff");
        assert_eq!(diffs.len(), 2);
        assert!(diffs[1].unified_diff.contains("+# Security"));
    }
}
