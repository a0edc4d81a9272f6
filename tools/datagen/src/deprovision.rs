use futures::future::join_all;
use std::io;
use std::path::{Path, PathBuf};

use cohort_shared::{DirectoryError, DirectoryService};

use crate::ledger;

#[derive(Debug, thiserror::Error)]
pub enum DeleteError {
    #[error("could not delete account {identifier}: {source}")]
    DeleteAccount {
        identifier: String,
        #[source]
        source: DirectoryError,
    },
}

/// A failure reading the ledger itself. Fatal to the run; the ledger file
/// is left on disk for retry.
#[derive(Debug, thiserror::Error)]
#[error("could not read ledger {path}: {source}")]
pub struct LedgerReadError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Deletes every account listed in the ledger at `path`.
///
/// Lines are consumed incrementally and fanned out; deletes already
/// issued run to completion even if the read fails partway through. The
/// ledger file is removed only when the read finished cleanly and every
/// item succeeded, so a partial run can simply be re-invoked.
pub async fn deprovision<D: DirectoryService>(
    directory: &D,
    path: &Path,
) -> Result<Vec<Result<String, DeleteError>>, LedgerReadError> {
    tracing::info!("Deleting accounts listed in {}", path.display());

    let mut lines = ledger::open_lines(path)
        .await
        .map_err(|source| LedgerReadError {
            path: path.to_path_buf(),
            source,
        })?;

    let mut tasks = Vec::new();
    let mut read_error = None;

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let identifier = line.trim().to_string();
                if identifier.is_empty() {
                    continue;
                }
                tasks.push(deprovision_one(directory, identifier));
            }
            Ok(None) => break,
            Err(source) => {
                read_error = Some(LedgerReadError {
                    path: path.to_path_buf(),
                    source,
                });
                break;
            }
        }
    }

    let results = join_all(tasks).await;

    if let Some(err) = read_error {
        tracing::error!(
            "Ledger read failed after {} item(s); {} kept for retry",
            results.len(),
            path.display()
        );
        return Err(err);
    }

    let failed = results.iter().filter(|result| result.is_err()).count();
    if failed == 0 {
        match tokio::fs::remove_file(path).await {
            Ok(()) => tracing::info!("All accounts deleted; removed {}", path.display()),
            Err(e) => tracing::warn!(
                "All accounts deleted but {} could not be removed: {}",
                path.display(),
                e
            ),
        }
    } else {
        tracing::warn!(
            "{} deletion(s) failed; {} kept for re-invocation",
            failed,
            path.display()
        );
    }

    Ok(results)
}

async fn deprovision_one<D: DirectoryService>(
    directory: &D,
    identifier: String,
) -> Result<String, DeleteError> {
    directory
        .delete_account(&identifier)
        .await
        .map_err(|source| DeleteError::DeleteAccount {
            identifier: identifier.clone(),
            source,
        })?;

    // The account is already gone; a failed cleanup leaves an orphaned
    // profile record to be removed out-of-band.
    let path = format!("users/{}", identifier);
    if let Err(e) = directory.delete_record(&path).await {
        tracing::warn!(
            "Account {} deleted but its profile record remains: {}",
            identifier,
            e
        );
    }

    tracing::info!("Deprovisioned {}", identifier);
    Ok(identifier)
}

/// Logs the batch outcome and each per-item failure.
pub fn summarize(results: &[Result<String, DeleteError>]) {
    let deleted = results.iter().filter(|result| result.is_ok()).count();
    let failed = results.len() - deleted;

    for result in results {
        if let Err(e) = result {
            tracing::error!("{}", e);
        }
    }

    tracing::info!("De-provisioning finished: {} deleted, {} failed", deleted, failed);
}
