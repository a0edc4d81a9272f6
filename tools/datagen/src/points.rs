use std::path::{Path, PathBuf};

use cohort_shared::{DirectoryError, DirectoryService};

/// Static document holding the default activity & event points.
pub const AEPOINTS_FILE: &str = "data/aepoints.json";
/// Shared record the document overwrites.
pub const AEPOINTS_RECORD: &str = "aepoints";

#[derive(Debug, thiserror::Error)]
pub enum PointsError {
    #[error("could not read points document {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("points document {path} is not valid JSON: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Overwrites the shared points record wholesale (replace, not merge)
/// from the static document. Any failure ends the run.
pub async fn reset_points<D: DirectoryService>(
    directory: &D,
    document: &Path,
) -> Result<(), PointsError> {
    tracing::info!("Resetting activity & event points");

    let raw = tokio::fs::read_to_string(document)
        .await
        .map_err(|source| PointsError::Io {
            path: document.to_path_buf(),
            source,
        })?;

    let points: serde_json::Value =
        serde_json::from_str(&raw).map_err(|source| PointsError::Malformed {
            path: document.to_path_buf(),
            source,
        })?;

    directory
        .write_record(AEPOINTS_RECORD, &points, false)
        .await?;

    tracing::info!("Done resetting activity & event points");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockDirectory;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn replaces_the_record_wholesale() {
        let directory = MockDirectory::default();
        directory.records.lock().unwrap().insert(
            AEPOINTS_RECORD.to_string(),
            json!({ "stale": true, "conference": 99 }),
        );

        let dir = TempDir::new().unwrap();
        let document = dir.path().join("aepoints.json");
        let defaults = json!({ "conference": 5, "workshop": 2 });
        std::fs::write(&document, defaults.to_string()).unwrap();

        reset_points(&directory, &document).await.unwrap();

        let stored = directory.read_record(AEPOINTS_RECORD).await.unwrap();
        assert_eq!(stored, Some(defaults));
    }

    #[tokio::test]
    async fn missing_document_is_fatal() {
        let directory = MockDirectory::default();
        let err = reset_points(&directory, Path::new("no/such/aepoints.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, PointsError::Io { .. }));
    }

    #[tokio::test]
    async fn rejected_write_is_fatal() {
        let mut directory = MockDirectory::default();
        directory
            .fail_record_writes
            .insert(AEPOINTS_RECORD.to_string());

        let dir = TempDir::new().unwrap();
        let document = dir.path().join("aepoints.json");
        std::fs::write(&document, "{}").unwrap();

        let err = reset_points(&directory, &document).await.unwrap_err();
        assert!(matches!(err, PointsError::Directory(_)));
    }
}
