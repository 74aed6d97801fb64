//! Persisting slot exports and complete analyses to disk.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::ExportError;
use crate::session::{is_path_component, Export, Session, SlotKind};

/// Filename of a saved one-shot analysis inside the project directory.
pub const COMPLETE_ANALYSIS_FILE: &str = "complete_analysis.md";

/// Write an export into `dir`, creating the directory if needed.
///
/// The file holds the export content byte-for-byte.
pub async fn write_export(dir: &Path, export: &Export) -> Result<PathBuf, ExportError> {
    if !is_path_component(&export.filename) {
        return Err(ExportError::InvalidFileName(export.filename.clone()));
    }
    tokio::fs::create_dir_all(dir).await?;

    let path = dir.join(&export.filename);
    tokio::fs::write(&path, export.content.as_bytes()).await?;
    info!(
        path = %path.display(),
        media_type = export.media_type,
        bytes = export.content.len(),
        "Export written"
    );
    Ok(path)
}

/// Export `slot`'s result from `session` into `dir`.
///
/// # Errors
///
/// [`ExportError::Session`] when the slot has no result yet.
pub async fn export_slot(
    session: &Session,
    slot: SlotKind,
    dir: &Path,
) -> Result<PathBuf, ExportError> {
    let export = session.export(slot)?;
    write_export(dir, &export).await
}

/// Save a complete analysis to `<projects_dir>/<project_name>/complete_analysis.md`.
pub async fn save_project_analysis(
    projects_dir: &Path,
    project_name: &str,
    analysis: &str,
) -> Result<PathBuf, ExportError> {
    let project_name = project_name.trim();
    // Project names end up as path components and must stay inside the target directory.
    if !is_path_component(project_name) {
        return Err(ExportError::InvalidProjectName(project_name.to_string()));
    }

    let project_dir = projects_dir.join(project_name);
    tokio::fs::create_dir_all(&project_dir).await?;

    let path = project_dir.join(COMPLETE_ANALYSIS_FILE);
    tokio::fs::write(&path, analysis.as_bytes()).await?;
    info!(path = %path.display(), "Analysis saved");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;
    use crate::session::MEDIA_MARKDOWN;
    use tempfile::TempDir;

    fn sample_export() -> Export {
        Export {
            filename: "acme_requirements.md".to_string(),
            content: "- Req A\n- Req B".to_string(),
            media_type: MEDIA_MARKDOWN,
        }
    }

    #[tokio::test]
    async fn test_write_export_creates_directory() {
        let temp = TempDir::new().expect("temp dir");
        let dir = temp.path().join("out");

        let path = write_export(&dir, &sample_export()).await.expect("written");
        assert_eq!(path, dir.join("acme_requirements.md"));
        assert_eq!(
            std::fs::read_to_string(&path).expect("readable"),
            "- Req A\n- Req B"
        );
    }

    #[tokio::test]
    async fn test_save_project_analysis_layout() {
        let temp = TempDir::new().expect("temp dir");

        let path = save_project_analysis(temp.path(), " acme ", "# Analysis")
            .await
            .expect("saved");
        assert_eq!(path, temp.path().join("acme").join(COMPLETE_ANALYSIS_FILE));
        assert_eq!(std::fs::read_to_string(&path).expect("readable"), "# Analysis");

        // Saving again overwrites.
        save_project_analysis(temp.path(), "acme", "# Second")
            .await
            .expect("saved");
        assert_eq!(std::fs::read_to_string(&path).expect("readable"), "# Second");
    }

    #[tokio::test]
    async fn test_path_like_names_are_rejected() {
        let temp = TempDir::new().expect("temp dir");
        for name in ["../escape", "a/b", "..", "", "c\\d"] {
            let err = save_project_analysis(temp.path(), name, "x").await.unwrap_err();
            assert!(
                matches!(err, ExportError::InvalidProjectName(_)),
                "{name:?} should be rejected"
            );
        }

        let mut export = sample_export();
        export.filename = "../acme_requirements.md".to_string();
        assert!(matches!(
            write_export(temp.path(), &export).await,
            Err(ExportError::InvalidFileName(name)) if name == "../acme_requirements.md"
        ));
    }

    #[tokio::test]
    async fn test_export_slot_without_result() {
        let temp = TempDir::new().expect("temp dir");
        let session = Session::new();
        session.initialize("acme", "reqs").expect("valid input");

        let err = export_slot(&session, SlotKind::Cost, temp.path())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExportError::Session(SessionError::NoResult(SlotKind::Cost))
        ));
        assert_eq!(err.to_string(), SessionError::NoResult(SlotKind::Cost).to_string());
        assert!(std::fs::read_dir(temp.path()).expect("readable").next().is_none());
    }
}
